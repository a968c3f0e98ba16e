//! Wheel simulation driver.
//!
//! Runs the strategy state machine over a historical price series:
//!
//! 1. FLAT: sell a cash-secured put below spot
//! 2. Put expiry: spot at or above strike -> premium kept, back to FLAT;
//!    spot below strike -> assigned 100 shares
//! 3. Holding stock: sell a covered call above spot
//! 4. Call expiry: spot above strike -> shares called away, back to FLAT;
//!    spot at or below strike -> premium kept, sell another call
//!
//! Exercise is strict: expiration exactly at the strike resolves as not
//! exercised, for both sides. Early assignment is not modeled.
//!
//! All run state is threaded explicitly through the loop; independent runs
//! share nothing and can execute in parallel.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::data::{OptionType, PriceBar, PriceSeries};
use crate::portfolio::{
    LedgerError, OptionContract, Portfolio, TradeEvent, TradeKind, CONTRACT_SIZE,
};
use crate::pricing::{
    call_strike, intrinsic_value, put_strike, year_fraction, BlackScholes, PricingError,
};

use super::config::SimConfig;

/// Recoverable conditions absorbed by the driver and recorded in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// No close on a required date; the nearest preceding close was used.
    DataGap,
    /// Entry skipped for a cycle because collateral was insufficient.
    SkippedCycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub date: NaiveDate,
    pub kind: DiagnosticKind,
    pub detail: String,
}

/// Daily portfolio valuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub date: NaiveDate,
    pub cash: Decimal,
    pub positions_value: Decimal,
    /// Mark-to-model liability of open short contracts (zero or negative).
    pub open_contracts_value: Decimal,
    pub total_equity: Decimal,
}

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("no price data for {ticker} in the requested window")]
    NoData { ticker: String },

    #[error("ledger failure on {date}: {source}")]
    Ledger {
        date: NaiveDate,
        #[source]
        source: LedgerError,
        last_snapshot: Option<PortfolioSnapshot>,
    },

    #[error("pricing failure on {date}: {source}")]
    Pricing {
        date: NaiveDate,
        #[source]
        source: PricingError,
        last_snapshot: Option<PortfolioSnapshot>,
    },
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub starting_cash: Decimal,
    pub final_cash: Decimal,
    pub final_equity: Decimal,
    pub realized_pnl: Decimal,
    pub premium_collected: Decimal,
    pub shares_held: u32,
    pub trading_days: usize,
    pub events: Vec<TradeEvent>,
    pub snapshots: Vec<PortfolioSnapshot>,
    pub diagnostics: Vec<Diagnostic>,
}

impl SimulationReport {
    fn count(&self, kind: TradeKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    pub fn puts_sold(&self) -> usize {
        self.count(TradeKind::SellPut)
    }

    pub fn calls_sold(&self) -> usize {
        self.count(TradeKind::SellCall)
    }

    pub fn assignments(&self) -> usize {
        self.count(TradeKind::Assigned)
    }

    pub fn called_away(&self) -> usize {
        self.count(TradeKind::CalledAway)
    }

    pub fn expired_worthless(&self) -> usize {
        self.count(TradeKind::ExpiredWorthless)
    }

    pub fn skipped_cycles(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::SkippedCycle)
            .count()
    }

    pub fn data_gaps(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::DataGap)
            .count()
    }

    /// Total return percentage over starting cash.
    pub fn total_return_pct(&self) -> f64 {
        let initial: f64 = self.starting_cash.try_into().unwrap_or(1.0);
        let final_eq: f64 = self.final_equity.try_into().unwrap_or(1.0);
        (final_eq - initial) / initial * 100.0
    }

    /// Generate summary string.
    pub fn summary(&self) -> String {
        format!(
            "Wheel Simulation: {} ({} to {})\n\
             ----------------------------------------\n\
             Starting Cash: ${:.2}\n\
             Final Equity: ${:.2}\n\
             Total Return: {:.2}%\n\
             Realized P&L: ${:.2}\n\
             Premium Collected: ${:.2}\n\
             \n\
             Puts Sold: {}  Calls Sold: {}\n\
             Assignments: {}  Called Away: {}  Expired Worthless: {}\n\
             Skipped Cycles: {}  Data Gaps: {}\n\
             Shares Held at End: {}\n\
             Trading Days: {}",
            self.ticker,
            self.start_date,
            self.end_date,
            self.starting_cash,
            self.final_equity,
            self.total_return_pct(),
            self.realized_pnl,
            self.premium_collected,
            self.puts_sold(),
            self.calls_sold(),
            self.assignments(),
            self.called_away(),
            self.expired_worthless(),
            self.skipped_cycles(),
            self.data_gaps(),
            self.shares_held,
            self.trading_days,
        )
    }
}

struct RunState {
    portfolio: Portfolio,
    snapshots: Vec<PortfolioSnapshot>,
    diagnostics: Vec<Diagnostic>,
    /// Set after a skipped cycle; no entries are attempted before this date.
    defer_entry_until: Option<NaiveDate>,
}

/// The wheel strategy driver for a single ticker.
pub struct WheelDriver {
    config: SimConfig,
    model: BlackScholes,
}

impl WheelDriver {
    pub fn new(config: SimConfig) -> Self {
        let model = BlackScholes::new(config.risk_free_rate);
        Self { config, model }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Run the simulation over the configured window of the series.
    pub fn run(&self, series: &PriceSeries) -> Result<SimulationReport, SimulationError> {
        let start = self.config.start_date.unwrap_or_else(|| series.first_date());
        let end = self.config.end_date.unwrap_or_else(|| series.last_date());
        let window = series.window(start, end);
        if window.is_empty() {
            return Err(SimulationError::NoData {
                ticker: self.config.ticker.clone(),
            });
        }

        info!(
            "starting wheel run for {}: {} trading days, {} to {}",
            self.config.ticker,
            window.len(),
            window[0].date,
            window[window.len() - 1].date
        );

        let mut state = RunState {
            portfolio: Portfolio::new(self.config.starting_cash),
            snapshots: Vec::with_capacity(window.len()),
            diagnostics: Vec::new(),
            defer_entry_until: None,
        };

        for bar in window {
            self.resolve_expiration(&mut state, series, bar)?;
            self.enter_position(&mut state, series, bar)?;
            self.take_snapshot(&mut state, series, bar)?;
        }

        Ok(self.build_report(state, window))
    }

    fn volatility_for(&self, series: &PriceSeries, date: NaiveDate) -> f64 {
        self.config
            .volatility
            .unwrap_or_else(|| series.realized_volatility(date, self.config.vol_window_days))
    }

    /// Resolve the open contract once the simulated date reaches its
    /// expiration.
    fn resolve_expiration(
        &self,
        state: &mut RunState,
        series: &PriceSeries,
        bar: &PriceBar,
    ) -> Result<(), SimulationError> {
        let (id, option_type, strike, expiration) =
            match state.portfolio.open_contract(&self.config.ticker) {
                Some(c) if bar.date >= c.expiration => {
                    (c.id, c.option_type, c.strike, c.expiration)
                }
                _ => return Ok(()),
            };

        let (used_date, spot) = match series.close_on_or_before(expiration) {
            Some(pair) => pair,
            // The open date's bar precedes expiration, so this is
            // unreachable; fall back to the current bar.
            None => (bar.date, bar.close),
        };
        if used_date != expiration {
            warn!(
                "no close for {} on expiration {}, using {} close instead",
                self.config.ticker, expiration, used_date
            );
            state.diagnostics.push(Diagnostic {
                date: bar.date,
                kind: DiagnosticKind::DataGap,
                detail: format!("no close on {expiration}; used {used_date}"),
            });
        }

        // Exercised iff spot is strictly beyond the strike in the holder's
        // favor; exactly-at-strike resolves as not exercised.
        let result = match option_type {
            OptionType::Put if spot < strike => state.portfolio.assign_put(id, expiration, spot),
            OptionType::Call if spot > strike => state.portfolio.call_away(id, expiration, spot),
            _ => state.portfolio.expire_worthless(id, expiration, spot),
        };

        let event = result.map_err(|source| SimulationError::Ledger {
            date: bar.date,
            source,
            last_snapshot: state.snapshots.last().cloned(),
        })?;

        info!(
            "{} {:?} {} strike {} resolved at spot {} ({:?})",
            self.config.ticker, option_type, expiration, strike, spot, event.kind
        );
        Ok(())
    }

    /// Open the next contract when nothing is open: a covered call while
    /// holding at least 100 shares, a cash-secured put otherwise.
    fn enter_position(
        &self,
        state: &mut RunState,
        series: &PriceSeries,
        bar: &PriceBar,
    ) -> Result<(), SimulationError> {
        if state.portfolio.open_contract(&self.config.ticker).is_some() {
            return Ok(());
        }
        if let Some(defer) = state.defer_entry_until {
            if bar.date < defer {
                return Ok(());
            }
        }

        let spot = bar.close;
        let cycle_days = self.config.cycle_length();
        let expiration = bar.date + Duration::days(cycle_days);

        let (option_type, strike) =
            if state.portfolio.shares(&self.config.ticker) >= CONTRACT_SIZE {
                (
                    OptionType::Call,
                    call_strike(spot, self.config.call_strike_offset_pct),
                )
            } else {
                (
                    OptionType::Put,
                    put_strike(spot, self.config.put_strike_offset_pct),
                )
            };

        let spot_f64: f64 = spot.try_into().unwrap_or(0.0);
        let strike_f64: f64 = strike.try_into().unwrap_or(0.0);
        let vol = self.volatility_for(series, bar.date);

        let quote = self
            .model
            .price(
                spot_f64,
                strike_f64,
                year_fraction(cycle_days),
                vol,
                option_type,
            )
            .map_err(|source| SimulationError::Pricing {
                date: bar.date,
                source,
                last_snapshot: state.snapshots.last().cloned(),
            })?;
        let premium = Decimal::from_f64_retain(quote)
            .unwrap_or_default()
            .round_dp(2);

        let contract = OptionContract::open(
            &self.config.ticker,
            option_type,
            strike,
            expiration,
            premium,
            bar.date,
            spot,
        );

        let result = match option_type {
            OptionType::Put => state.portfolio.sell_put(contract, spot),
            OptionType::Call => state.portfolio.sell_call(contract, spot),
        };

        match result {
            Ok(event) => {
                info!(
                    "{} sold {:?} strike {} exp {} for {} premium",
                    self.config.ticker, option_type, strike, expiration, event.cash_delta
                );
                state.defer_entry_until = None;
                Ok(())
            }
            Err(LedgerError::InsufficientCollateral {
                required,
                available,
            }) => {
                warn!(
                    "{} skipping cycle on {}: required {}, available {}",
                    self.config.ticker, bar.date, required, available
                );
                state.diagnostics.push(Diagnostic {
                    date: bar.date,
                    kind: DiagnosticKind::SkippedCycle,
                    detail: format!(
                        "insufficient collateral for {:?} strike {strike}: required {required}, available {available}",
                        option_type
                    ),
                });
                state.defer_entry_until = Some(bar.date + Duration::days(cycle_days));
                Ok(())
            }
            Err(source) => Err(SimulationError::Ledger {
                date: bar.date,
                source,
                last_snapshot: state.snapshots.last().cloned(),
            }),
        }
    }

    /// Cost to close an open short contract, per share.
    fn mark_contract(
        &self,
        contract: &OptionContract,
        series: &PriceSeries,
        bar: &PriceBar,
    ) -> Result<f64, PricingError> {
        let spot: f64 = bar.close.try_into().unwrap_or(0.0);
        let strike: f64 = contract.strike.try_into().unwrap_or(0.0);
        let days = contract.days_to_expiration(bar.date);
        if days <= 0 {
            return Ok(intrinsic_value(spot, strike, contract.option_type));
        }
        let vol = self.volatility_for(series, bar.date);
        self.model
            .price(spot, strike, year_fraction(days), vol, contract.option_type)
    }

    fn take_snapshot(
        &self,
        state: &mut RunState,
        series: &PriceSeries,
        bar: &PriceBar,
    ) -> Result<(), SimulationError> {
        let spot = bar.close;

        let positions_value: Decimal = state
            .portfolio
            .positions()
            .map(|lot| {
                if lot.ticker == self.config.ticker {
                    lot.market_value(spot)
                } else {
                    lot.cost_basis
                }
            })
            .sum();

        let mut open_contracts_value = Decimal::ZERO;
        for contract in state.portfolio.open_contracts() {
            let mark = self.mark_contract(contract, series, bar).map_err(|source| {
                SimulationError::Pricing {
                    date: bar.date,
                    source,
                    last_snapshot: state.snapshots.last().cloned(),
                }
            })?;
            let liability = (Decimal::from_f64_retain(mark).unwrap_or_default()
                * Decimal::from(CONTRACT_SIZE))
            .round_dp(2);
            open_contracts_value -= liability;
        }

        let cash = state.portfolio.cash();
        state.snapshots.push(PortfolioSnapshot {
            date: bar.date,
            cash,
            positions_value,
            open_contracts_value,
            total_equity: cash + positions_value + open_contracts_value,
        });
        Ok(())
    }

    fn build_report(&self, state: RunState, window: &[PriceBar]) -> SimulationReport {
        let RunState {
            portfolio,
            snapshots,
            diagnostics,
            ..
        } = state;

        let final_equity = snapshots
            .last()
            .map(|s| s.total_equity)
            .unwrap_or_else(|| portfolio.cash());

        SimulationReport {
            ticker: self.config.ticker.clone(),
            start_date: window[0].date,
            end_date: window[window.len() - 1].date,
            starting_cash: portfolio.starting_cash(),
            final_cash: portfolio.cash(),
            final_equity,
            realized_pnl: portfolio.realized_pnl(),
            premium_collected: portfolio.total_premium_collected(),
            shares_held: portfolio.shares(&self.config.ticker),
            trading_days: snapshots.len(),
            events: portfolio.history().to_vec(),
            snapshots,
            diagnostics,
        }
    }
}
