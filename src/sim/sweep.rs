//! Parallel parameter sweeps.
//!
//! Each combination runs its own driver with an isolated portfolio; rayon
//! schedules the runs and results merge only after every run completes.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::PriceSeries;

use super::config::SimConfig;
use super::driver::WheelDriver;

/// Parameter values to sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepGrid {
    /// Put strike offsets, percent below spot.
    pub put_offsets_pct: Vec<f64>,
    /// Call strike offsets, percent above spot.
    pub call_offsets_pct: Vec<f64>,
    /// Expiration cycles, in days.
    pub cycle_days: Vec<i64>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            put_offsets_pct: vec![1.0, 2.5, 5.0],
            call_offsets_pct: vec![1.0, 2.5, 5.0],
            cycle_days: vec![7, 14, 30, 45],
        }
    }
}

impl SweepGrid {
    /// Calculate total number of parameter combinations.
    pub fn total_combinations(&self) -> usize {
        self.put_offsets_pct.len() * self.call_offsets_pct.len() * self.cycle_days.len()
    }

    /// Generate all parameter combinations.
    pub fn combinations(&self) -> Vec<SweepParams> {
        let mut combos = Vec::with_capacity(self.total_combinations());
        for &put_offset_pct in &self.put_offsets_pct {
            for &call_offset_pct in &self.call_offsets_pct {
                for &cycle_days in &self.cycle_days {
                    combos.push(SweepParams {
                        put_offset_pct,
                        call_offset_pct,
                        cycle_days,
                    });
                }
            }
        }
        combos
    }
}

/// A single parameter combination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweepParams {
    pub put_offset_pct: f64,
    pub call_offset_pct: f64,
    pub cycle_days: i64,
}

impl SweepParams {
    /// Apply this combination to a base configuration.
    pub fn apply_to(&self, config: &mut SimConfig) {
        config.put_strike_offset_pct = self.put_offset_pct;
        config.call_strike_offset_pct = self.call_offset_pct;
        config.target_cycle_days = self.cycle_days;
        config.cycle_lengths_days = vec![self.cycle_days];
    }

    /// Create a unique key for this combination.
    pub fn key(&self) -> String {
        format!(
            "put{:.1}_call{:.1}_dte{}",
            self.put_offset_pct, self.call_offset_pct, self.cycle_days
        )
    }
}

/// Summary of one sweep run.
#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub params: SweepParams,
    pub final_equity: Decimal,
    pub total_return_pct: f64,
    pub realized_pnl: Decimal,
    pub premium_collected: Decimal,
    pub assignments: usize,
    pub called_away: usize,
    pub skipped_cycles: usize,
}

/// Run every grid combination over the series, best return first.
///
/// Combinations that fail (for example a window with no data) are logged and
/// dropped rather than aborting the sweep.
pub fn run_sweep(
    series: &PriceSeries,
    base_config: &SimConfig,
    grid: &SweepGrid,
) -> Vec<SweepOutcome> {
    let combos = grid.combinations();
    let total = combos.len();
    info!("running sweep: {} combinations", total);

    let progress = AtomicUsize::new(0);

    let mut outcomes: Vec<SweepOutcome> = combos
        .par_iter()
        .filter_map(|params| {
            let mut config = base_config.clone();
            params.apply_to(&mut config);
            let driver = WheelDriver::new(config);
            let result = driver.run(series);

            let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
            if done % (total / 10).max(1) == 0 || done == total {
                info!("sweep progress: {}/{}", done, total);
            }

            match result {
                Ok(report) => Some(SweepOutcome {
                    params: *params,
                    final_equity: report.final_equity,
                    total_return_pct: report.total_return_pct(),
                    realized_pnl: report.realized_pnl,
                    premium_collected: report.premium_collected,
                    assignments: report.assignments(),
                    called_away: report.called_away(),
                    skipped_cycles: report.skipped_cycles(),
                }),
                Err(e) => {
                    warn!("sweep combination {} failed: {}", params.key(), e);
                    None
                }
            }
        })
        .collect();

    outcomes.sort_by(|a, b| {
        b.total_return_pct
            .partial_cmp(&a.total_return_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    outcomes
}

/// The combination with the highest total return.
pub fn best_by_return(outcomes: &[SweepOutcome]) -> Option<&SweepOutcome> {
    outcomes.iter().max_by(|a, b| {
        a.total_return_pct
            .partial_cmp(&b.total_return_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PriceBar, PriceSeries};
    use chrono::{Duration, NaiveDate};

    fn small_series() -> PriceSeries {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<PriceBar> = (0..60)
            .map(|i| {
                let close = Decimal::from_f64_retain(100.0 + 5.0 * ((i as f64) * 0.3).sin())
                    .unwrap();
                PriceBar {
                    date: base + Duration::days(i),
                    open: close,
                    high: close,
                    low: close,
                    close,
                }
            })
            .collect();
        PriceSeries::new("AAPL", bars).unwrap()
    }

    #[test]
    fn test_grid_combinations() {
        let grid = SweepGrid {
            put_offsets_pct: vec![1.0, 2.5],
            call_offsets_pct: vec![2.5],
            cycle_days: vec![7, 14],
        };
        assert_eq!(grid.total_combinations(), 4);
        assert_eq!(grid.combinations().len(), 4);
    }

    #[test]
    fn test_params_apply_and_key() {
        let params = SweepParams {
            put_offset_pct: 5.0,
            call_offset_pct: 1.0,
            cycle_days: 14,
        };
        let mut config = SimConfig::default();
        params.apply_to(&mut config);

        assert_eq!(config.put_strike_offset_pct, 5.0);
        assert_eq!(config.call_strike_offset_pct, 1.0);
        assert_eq!(config.cycle_length(), 14);
        assert_eq!(params.key(), "put5.0_call1.0_dte14");
    }

    #[test]
    fn test_sweep_runs_all_combinations_sorted() {
        let grid = SweepGrid {
            put_offsets_pct: vec![1.0, 5.0],
            call_offsets_pct: vec![2.5],
            cycle_days: vec![7],
        };
        let config = SimConfig {
            volatility: Some(0.25),
            ..SimConfig::default()
        };

        let outcomes = run_sweep(&small_series(), &config, &grid);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].total_return_pct >= outcomes[1].total_return_pct);

        let best = best_by_return(&outcomes).unwrap();
        assert_eq!(best.total_return_pct, outcomes[0].total_return_pct);
    }
}
