//! Performance metrics over a completed simulation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::OptionType;
use crate::portfolio::TradeKind;
use crate::sim::{PortfolioSnapshot, SimulationReport};

/// Annualization factor for daily equity returns.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Performance statistics for one wheel run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WheelMetrics {
    // Return metrics
    pub total_return_pct: f64,
    pub cagr_pct: f64,

    // Risk metrics
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,

    // Wheel statistics
    pub premium_collected: Decimal,
    pub realized_pnl: Decimal,
    pub puts_sold: usize,
    pub calls_sold: usize,
    pub assignments: usize,
    pub called_away: usize,
    pub expired_worthless: usize,
    pub skipped_cycles: usize,
    pub data_gaps: usize,

    /// Fraction of resolved puts that were assigned.
    pub assignment_rate: f64,
    /// Fraction of resolved calls that were exercised.
    pub called_away_rate: f64,

    pub trading_days: usize,
}

impl WheelMetrics {
    pub fn from_report(report: &SimulationReport) -> Self {
        let (max_drawdown, max_drawdown_pct) = drawdown(&report.snapshots);

        let resolved_puts = report
            .events
            .iter()
            .filter(|e| {
                e.option_type == OptionType::Put
                    && matches!(e.kind, TradeKind::Assigned | TradeKind::ExpiredWorthless)
            })
            .count();
        let resolved_calls = report
            .events
            .iter()
            .filter(|e| {
                e.option_type == OptionType::Call
                    && matches!(e.kind, TradeKind::CalledAway | TradeKind::ExpiredWorthless)
            })
            .count();

        let assignment_rate = if resolved_puts == 0 {
            0.0
        } else {
            report.assignments() as f64 / resolved_puts as f64
        };
        let called_away_rate = if resolved_calls == 0 {
            0.0
        } else {
            report.called_away() as f64 / resolved_calls as f64
        };

        Self {
            total_return_pct: report.total_return_pct(),
            cagr_pct: cagr(report),
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio: sharpe(&report.snapshots),
            premium_collected: report.premium_collected,
            realized_pnl: report.realized_pnl,
            puts_sold: report.puts_sold(),
            calls_sold: report.calls_sold(),
            assignments: report.assignments(),
            called_away: report.called_away(),
            expired_worthless: report.expired_worthless(),
            skipped_cycles: report.skipped_cycles(),
            data_gaps: report.data_gaps(),
            assignment_rate,
            called_away_rate,
            trading_days: report.trading_days,
        }
    }

    /// Generate a summary report.
    pub fn summary(&self) -> String {
        format!(
            "Performance Summary\n\
             ====================\n\
             \n\
             Total Return: {:.2}%\n\
             CAGR: {:.2}%\n\
             Max Drawdown: {:.2}%\n\
             Sharpe Ratio: {:.2}\n\
             \n\
             Premium Collected: ${:.2}\n\
             Realized P&L: ${:.2}\n\
             \n\
             Puts Sold: {} (assigned: {:.0}%)\n\
             Calls Sold: {} (called away: {:.0}%)\n\
             Expired Worthless: {}\n\
             Skipped Cycles: {}\n\
             Data Gaps: {}\n\
             Trading Days: {}",
            self.total_return_pct,
            self.cagr_pct,
            self.max_drawdown_pct,
            self.sharpe_ratio,
            self.premium_collected,
            self.realized_pnl,
            self.puts_sold,
            self.assignment_rate * 100.0,
            self.calls_sold,
            self.called_away_rate * 100.0,
            self.expired_worthless,
            self.skipped_cycles,
            self.data_gaps,
            self.trading_days,
        )
    }
}

/// Peak-to-trough drawdown over the equity curve.
fn drawdown(snapshots: &[PortfolioSnapshot]) -> (Decimal, f64) {
    let mut peak = Decimal::ZERO;
    let mut max_dd = Decimal::ZERO;
    let mut max_dd_pct = 0.0;

    for snapshot in snapshots {
        if snapshot.total_equity > peak {
            peak = snapshot.total_equity;
        }
        let dd = peak - snapshot.total_equity;
        if dd > max_dd {
            max_dd = dd;
            let peak_f64: f64 = peak.try_into().unwrap_or(1.0);
            let dd_f64: f64 = dd.try_into().unwrap_or(0.0);
            if peak_f64 > 0.0 {
                max_dd_pct = dd_f64 / peak_f64 * 100.0;
            }
        }
    }

    (max_dd, max_dd_pct)
}

/// Annualized Sharpe ratio over daily equity returns (risk-free rate 0).
fn sharpe(snapshots: &[PortfolioSnapshot]) -> f64 {
    if snapshots.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = snapshots
        .windows(2)
        .map(|w| {
            let prev: f64 = w[0].total_equity.try_into().unwrap_or(1.0);
            let curr: f64 = w[1].total_equity.try_into().unwrap_or(1.0);
            (curr - prev) / prev
        })
        .collect();

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return 0.0;
    }

    (mean * TRADING_DAYS_PER_YEAR.sqrt()) / std_dev
}

/// Compound annual growth rate over the simulated calendar span.
fn cagr(report: &SimulationReport) -> f64 {
    let days = (report.end_date - report.start_date).num_days();
    if days <= 0 {
        return 0.0;
    }
    let initial: f64 = report.starting_cash.try_into().unwrap_or(1.0);
    let final_eq: f64 = report.final_equity.try_into().unwrap_or(1.0);
    if initial <= 0.0 || final_eq <= 0.0 {
        return 0.0;
    }
    let years = days as f64 / 365.0;
    ((final_eq / initial).powf(1.0 / years) - 1.0) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::TradeEvent;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn snapshot(d: NaiveDate, equity: Decimal) -> PortfolioSnapshot {
        PortfolioSnapshot {
            date: d,
            cash: equity,
            positions_value: Decimal::ZERO,
            open_contracts_value: Decimal::ZERO,
            total_equity: equity,
        }
    }

    fn event(kind: TradeKind, option_type: OptionType) -> TradeEvent {
        TradeEvent {
            date: date(2024, 1, 15),
            kind,
            contract_id: 1,
            ticker: "AAPL".to_string(),
            option_type,
            strike: dec!(95),
            cash_delta: Decimal::ZERO,
            resulting_value: dec!(100000),
        }
    }

    fn sample_report() -> SimulationReport {
        SimulationReport {
            ticker: "AAPL".to_string(),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
            starting_cash: dec!(100000),
            final_cash: dec!(105000),
            final_equity: dec!(105000),
            realized_pnl: dec!(5000),
            premium_collected: dec!(1200),
            shares_held: 0,
            trading_days: 4,
            events: vec![
                event(TradeKind::SellPut, OptionType::Put),
                event(TradeKind::ExpiredWorthless, OptionType::Put),
                event(TradeKind::SellPut, OptionType::Put),
                event(TradeKind::Assigned, OptionType::Put),
                event(TradeKind::SellCall, OptionType::Call),
                event(TradeKind::CalledAway, OptionType::Call),
            ],
            snapshots: vec![
                snapshot(date(2024, 1, 1), dec!(100000)),
                snapshot(date(2024, 4, 1), dec!(102000)),
                snapshot(date(2024, 8, 1), dec!(101000)),
                snapshot(date(2024, 12, 31), dec!(105000)),
            ],
            diagnostics: vec![],
        }
    }

    #[test]
    fn test_metrics_from_report() {
        let metrics = WheelMetrics::from_report(&sample_report());

        assert_eq!(metrics.total_return_pct, 5.0);
        assert_eq!(metrics.puts_sold, 2);
        assert_eq!(metrics.calls_sold, 1);
        assert_eq!(metrics.assignments, 1);
        assert_eq!(metrics.called_away, 1);
        assert_eq!(metrics.expired_worthless, 1);

        // One of two resolved puts was assigned; the only call was exercised.
        assert_eq!(metrics.assignment_rate, 0.5);
        assert_eq!(metrics.called_away_rate, 1.0);
    }

    #[test]
    fn test_drawdown_tracks_peak_to_trough() {
        let metrics = WheelMetrics::from_report(&sample_report());

        // Peak 102000, trough 101000.
        assert_eq!(metrics.max_drawdown, dec!(1000));
        assert!((metrics.max_drawdown_pct - 0.9803921568627451).abs() < 1e-9);
    }

    #[test]
    fn test_cagr_close_to_total_return_over_one_year() {
        let metrics = WheelMetrics::from_report(&sample_report());
        // 365 days of simulation: CAGR and total return nearly coincide.
        assert!((metrics.cagr_pct - 5.0).abs() < 0.1);
    }

    #[test]
    fn test_sharpe_zero_for_flat_curve() {
        let mut report = sample_report();
        report.snapshots = vec![
            snapshot(date(2024, 1, 1), dec!(100000)),
            snapshot(date(2024, 1, 2), dec!(100000)),
            snapshot(date(2024, 1, 3), dec!(100000)),
        ];
        report.final_equity = dec!(100000);

        let metrics = WheelMetrics::from_report(&report);
        assert_eq!(metrics.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_rates_default_to_zero_without_resolutions() {
        let mut report = sample_report();
        report.events.clear();

        let metrics = WheelMetrics::from_report(&report);
        assert_eq!(metrics.assignment_rate, 0.0);
        assert_eq!(metrics.called_away_rate, 0.0);
    }

    #[test]
    fn test_summary_formats() {
        let metrics = WheelMetrics::from_report(&sample_report());
        let summary = metrics.summary();
        assert!(summary.contains("Total Return: 5.00%"));
        assert!(summary.contains("Puts Sold: 2"));
    }
}
