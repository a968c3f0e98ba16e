//! Simulation configuration.

use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a wheel simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Underlying ticker.
    pub ticker: String,

    /// Starting cash.
    pub starting_cash: Decimal,

    /// Available expiration cycles, in days.
    pub cycle_lengths_days: Vec<i64>,

    /// Preferred cycle length; entries use the configured cycle nearest to
    /// this value.
    pub target_cycle_days: i64,

    /// Put strikes sit this percentage below spot.
    pub put_strike_offset_pct: f64,

    /// Call strikes sit this percentage above spot.
    pub call_strike_offset_pct: f64,

    /// Fixed annualized volatility. When unset, entries use the trailing
    /// realized volatility of the price series.
    pub volatility: Option<f64>,

    /// Trailing window for the realized-volatility estimate, in days.
    pub vol_window_days: usize,

    /// Annualized risk-free rate.
    pub risk_free_rate: f64,

    /// First simulated date (defaults to the start of the series).
    pub start_date: Option<NaiveDate>,

    /// Last simulated date (defaults to the end of the series).
    pub end_date: Option<NaiveDate>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticker: "AAPL".to_string(),
            starting_cash: Decimal::from(100_000),
            cycle_lengths_days: vec![7, 14, 30, 45],
            target_cycle_days: 30,
            put_strike_offset_pct: 2.5,
            call_strike_offset_pct: 2.5,
            volatility: None,
            vol_window_days: 30,
            risk_free_rate: 0.045,
            start_date: None,
            end_date: None,
        }
    }
}

impl SimConfig {
    /// Load and validate a configuration from a TOML file. Missing fields
    /// fall back to the defaults.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticker.is_empty() {
            return Err(ConfigError::Invalid("ticker must not be empty".to_string()));
        }
        if self.starting_cash <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "starting_cash must be positive".to_string(),
            ));
        }
        if self.cycle_lengths_days.is_empty() {
            return Err(ConfigError::Invalid(
                "cycle_lengths_days must not be empty".to_string(),
            ));
        }
        if self.cycle_lengths_days.iter().any(|&d| d <= 0) {
            return Err(ConfigError::Invalid(
                "cycle lengths must be positive".to_string(),
            ));
        }
        if self.target_cycle_days <= 0 {
            return Err(ConfigError::Invalid(
                "target_cycle_days must be positive".to_string(),
            ));
        }
        if !(0.0..100.0).contains(&self.put_strike_offset_pct) {
            return Err(ConfigError::Invalid(
                "put_strike_offset_pct must be in [0, 100)".to_string(),
            ));
        }
        if self.call_strike_offset_pct < 0.0 {
            return Err(ConfigError::Invalid(
                "call_strike_offset_pct must be non-negative".to_string(),
            ));
        }
        if let Some(vol) = self.volatility {
            if !vol.is_finite() || vol < 0.0 {
                return Err(ConfigError::Invalid(
                    "volatility must be non-negative".to_string(),
                ));
            }
        }
        if self.vol_window_days < 2 {
            return Err(ConfigError::Invalid(
                "vol_window_days must be at least 2".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ConfigError::Invalid(format!(
                    "start_date {start} is after end_date {end}"
                )));
            }
        }
        Ok(())
    }

    /// Cycle length for new contracts: the configured set member nearest to
    /// the target, ties preferring the shorter cycle.
    pub fn cycle_length(&self) -> i64 {
        self.cycle_lengths_days
            .iter()
            .copied()
            .min_by_key(|len| ((len - self.target_cycle_days).abs(), *len))
            .unwrap_or(self.target_cycle_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.starting_cash, dec!(100000));
        assert_eq!(config.cycle_lengths_days, vec![7, 14, 30, 45]);
        assert_eq!(config.target_cycle_days, 30);
        assert_eq!(config.risk_free_rate, 0.045);
        assert!(config.volatility.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let config: SimConfig = toml::from_str(
            r#"
            ticker = "MSFT"
            starting_cash = 250000
            volatility = 0.25
            target_cycle_days = 14
            "#,
        )
        .unwrap();

        assert_eq!(config.ticker, "MSFT");
        assert_eq!(config.starting_cash, dec!(250000));
        assert_eq!(config.volatility, Some(0.25));
        assert_eq!(config.target_cycle_days, 14);
        // untouched defaults survive
        assert_eq!(config.cycle_lengths_days, vec![7, 14, 30, 45]);
    }

    #[test]
    fn test_cycle_length_picks_nearest() {
        let mut config = SimConfig::default();
        assert_eq!(config.cycle_length(), 30);

        config.target_cycle_days = 20;
        assert_eq!(config.cycle_length(), 14);

        // 22 is equidistant from 14 and 30; the shorter cycle wins
        config.target_cycle_days = 22;
        assert_eq!(config.cycle_length(), 14);

        config.target_cycle_days = 60;
        assert_eq!(config.cycle_length(), 45);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = SimConfig::default();
        config.starting_cash = Decimal::ZERO;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.cycle_lengths_days.clear();
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.put_strike_offset_pct = 100.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.volatility = Some(-0.1);
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.start_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        config.end_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert!(config.validate().is_err());
    }
}
