//! Core data types for the wheel simulator.
//!
//! A `PriceSeries` is the source of truth for the spot price on any simulated
//! date. It is validated at construction and immutable afterwards; the driver
//! only ever reads from it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CALL",
            Self::Put => "PUT",
        }
    }
}

/// Daily bar for an underlying.
///
/// Doubles as the CSV row schema for the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Validation failures for a bar series.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("price series for {0} is empty")]
    Empty(String),

    #[error("bars out of order at {date}: dates must be strictly ascending")]
    OutOfOrder { date: NaiveDate },

    #[error("non-positive price on {date}")]
    NonPositive { date: NaiveDate },
}

/// Annualization factor for daily close-to-close returns.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Fallback volatility when the trailing window is too short to estimate.
pub const DEFAULT_VOLATILITY: f64 = 0.30;

/// Ordered, validated sequence of daily bars for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series, validating that it is non-empty, strictly ascending by
    /// date, and strictly positive everywhere.
    pub fn new(ticker: &str, bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty(ticker.to_string()));
        }
        for bar in &bars {
            if bar.open <= Decimal::ZERO
                || bar.high <= Decimal::ZERO
                || bar.low <= Decimal::ZERO
                || bar.close <= Decimal::ZERO
            {
                return Err(SeriesError::NonPositive { date: bar.date });
            }
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(SeriesError::OutOfOrder { date: pair[1].date });
            }
        }
        Ok(Self {
            ticker: ticker.to_string(),
            bars,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }

    /// Closing price on an exact trading date.
    pub fn close_on(&self, date: NaiveDate) -> Option<Decimal> {
        self.bars
            .binary_search_by_key(&date, |b| b.date)
            .ok()
            .map(|idx| self.bars[idx].close)
    }

    /// Closing price on the nearest available date at or before `date`.
    ///
    /// This is the gap/holiday substitution rule: a missing date resolves to
    /// the closest preceding close. Returns the date actually used alongside
    /// the price so callers can tell whether substitution happened.
    pub fn close_on_or_before(&self, date: NaiveDate) -> Option<(NaiveDate, Decimal)> {
        let idx = self.bars.partition_point(|b| b.date <= date);
        if idx == 0 {
            return None;
        }
        let bar = &self.bars[idx - 1];
        Some((bar.date, bar.close))
    }

    /// Bars within `[start, end]` inclusive.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> &[PriceBar] {
        let lo = self.bars.partition_point(|b| b.date < start);
        let hi = self.bars.partition_point(|b| b.date <= end);
        &self.bars[lo..hi]
    }

    /// Annualized close-to-close volatility over the trailing window ending
    /// at `as_of`.
    ///
    /// Sample standard deviation of daily returns scaled by sqrt(252). Falls
    /// back to [`DEFAULT_VOLATILITY`] when fewer than two returns are
    /// available.
    pub fn realized_volatility(&self, as_of: NaiveDate, window_days: usize) -> f64 {
        let end = self.bars.partition_point(|b| b.date <= as_of);
        let start = end.saturating_sub(window_days + 1);
        let closes: Vec<f64> = self.bars[start..end]
            .iter()
            .map(|b| b.close.try_into().unwrap_or(0.0))
            .collect();

        if closes.len() < 3 {
            return DEFAULT_VOLATILITY;
        }

        let returns: Vec<f64> = closes
            .windows(2)
            .filter(|w| w[0] > 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect();

        if returns.len() < 2 {
            return DEFAULT_VOLATILITY;
        }

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
            / (returns.len() - 1) as f64;

        variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt()
    }
}
