//! # Run a single simulation
//! wheel-backtest run --config config/default.toml --data data
//!
//! # Sweep strike offsets and cycle lengths
//! wheel-backtest sweep --config config/default.toml --data data --output results.json
//!
//! # Print a theoretical premium ladder for a date
//! wheel-backtest chain --data data --date 2024-06-14 --dte 30

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wheel_backtest::pricing::{strike_ladder, year_fraction};
use wheel_backtest::sim::{best_by_return, run_sweep};
use wheel_backtest::{BarLoader, BlackScholes, SimConfig, SweepGrid, WheelDriver, WheelMetrics};

#[derive(Parser)]
#[command(name = "wheel-backtest")]
#[command(about = "Wheel-strategy options simulator over historical bars")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single simulation with the given configuration
    Run {
        /// Path to configuration file (defaults used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Path to data directory
        #[arg(short, long, default_value = "data")]
        data: PathBuf,

        /// Override the configured ticker
        #[arg(long)]
        ticker: Option<String>,

        /// Write the full report (events, snapshots, diagnostics) as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sweep strike offsets and cycle lengths in parallel
    Sweep {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Path to data directory
        #[arg(short, long, default_value = "data")]
        data: PathBuf,

        /// Write full results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show the top N combinations
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Print a theoretical premium ladder around the spot price
    Chain {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Path to data directory
        #[arg(short, long, default_value = "data")]
        data: PathBuf,

        /// Quote date (defaults to the last available date)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Days to expiration
        #[arg(long, default_value_t = 30)]
        dte: i64,

        /// Number of strikes on each side of spot
        #[arg(long, default_value_t = 5)]
        strikes: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            ticker,
            output,
        } => cmd_run(config, data, ticker, output),
        Commands::Sweep {
            config,
            data,
            output,
            top,
        } => cmd_sweep(config, data, output, top),
        Commands::Chain {
            config,
            data,
            date,
            dte,
            strikes,
        } => cmd_chain(config, data, date, dte, strikes),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<SimConfig> {
    match path {
        Some(p) => SimConfig::from_toml_file(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(SimConfig::default()),
    }
}

fn cmd_run(
    config: Option<PathBuf>,
    data: PathBuf,
    ticker: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config.as_ref())?;
    if let Some(ticker) = ticker {
        config.ticker = ticker;
    }
    config.validate()?;

    let loader = BarLoader::new(&data);
    let series = loader
        .load(&config.ticker)
        .with_context(|| format!("failed to load price series for {}", config.ticker))?;

    let driver = WheelDriver::new(config);
    let report = driver.run(&series)?;

    println!("{}", report.summary());
    println!();
    println!("{}", WheelMetrics::from_report(&report).summary());

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("\nReport written to {}", path.display());
    }
    Ok(())
}

fn cmd_sweep(
    config: Option<PathBuf>,
    data: PathBuf,
    output: Option<PathBuf>,
    top: usize,
) -> Result<()> {
    let config = load_config(config.as_ref())?;
    config.validate()?;

    let loader = BarLoader::new(&data);
    let series = loader
        .load(&config.ticker)
        .with_context(|| format!("failed to load price series for {}", config.ticker))?;

    let grid = SweepGrid::default();
    let outcomes = run_sweep(&series, &config, &grid);

    println!(
        "{:<24} {:>14} {:>9} {:>12} {:>8} {:>8} {:>8}",
        "Params", "Final Equity", "Return%", "Premium", "Assign", "Called", "Skipped"
    );
    for outcome in outcomes.iter().take(top) {
        println!(
            "{:<24} {:>14.2} {:>9.2} {:>12.2} {:>8} {:>8} {:>8}",
            outcome.params.key(),
            outcome.final_equity,
            outcome.total_return_pct,
            outcome.premium_collected,
            outcome.assignments,
            outcome.called_away,
            outcome.skipped_cycles,
        );
    }

    if let Some(best) = best_by_return(&outcomes) {
        println!("\nBest: {}", best.params.key());
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&outcomes)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Results written to {}", path.display());
    }
    Ok(())
}

fn cmd_chain(
    config: Option<PathBuf>,
    data: PathBuf,
    date: Option<NaiveDate>,
    dte: i64,
    strikes: usize,
) -> Result<()> {
    let config = load_config(config.as_ref())?;
    config.validate()?;
    anyhow::ensure!(dte > 0, "dte must be positive");

    let loader = BarLoader::new(&data);
    let series = loader
        .load(&config.ticker)
        .with_context(|| format!("failed to load price series for {}", config.ticker))?;

    let date = date.unwrap_or_else(|| series.last_date());
    let (quote_date, spot) = series
        .close_on_or_before(date)
        .with_context(|| format!("no price data for {} at or before {}", config.ticker, date))?;

    let vol = config
        .volatility
        .unwrap_or_else(|| series.realized_volatility(quote_date, config.vol_window_days));
    let model = BlackScholes::new(config.risk_free_rate);
    let time = year_fraction(dte);
    let spot_f64: f64 = spot.try_into().unwrap_or(0.0);

    println!(
        "{} option chain on {} (spot {}, vol {:.1}%, {} DTE)",
        config.ticker,
        quote_date,
        spot,
        vol * 100.0,
        dte
    );
    println!(
        "{:>10} {:>12} {:>12} {:>10} {:>10}",
        "Strike", "Call", "Put", "Call %", "Put %"
    );

    for strike in strike_ladder(spot, strikes, 2.5) {
        let strike_f64: f64 = strike.try_into().unwrap_or(0.0);
        let call = model.call_price(spot_f64, strike_f64, time, vol)?;
        let put = model.put_price(spot_f64, strike_f64, time, vol)?;
        println!(
            "{:>10} {:>12.2} {:>12.2} {:>9.2}% {:>9.2}%",
            strike,
            call,
            put,
            call / spot_f64 * 100.0,
            put / spot_f64 * 100.0,
        );
    }
    Ok(())
}
