//! Black-Scholes pricing for European-style options.
//!
//! Quotes the theoretical premium the simulator collects when writing a put
//! or call, plus the first-order Greeks used in reporting. All inputs are
//! f64; currency conversion to `Decimal` happens at the caller's boundary.
//!
//! Premiums are floored at intrinsic value. The classic closed form prices a
//! deep in-the-money European put below intrinsic when rates are positive,
//! and the simulator treats premiums as immediately-collectible cash, so the
//! no-arbitrage floor `price >= max(0, intrinsic)` holds for every valid
//! input.

use std::f64::consts::PI;

use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::data::OptionType;

/// Malformed pricing parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("invalid pricing input: {0}")]
    InvalidInput(String),
}

/// Convert days to expiration into the model's year fraction.
pub fn year_fraction(days: i64) -> f64 {
    days as f64 / 365.0
}

/// Intrinsic value of an option at a given spot.
pub fn intrinsic_value(spot: f64, strike: f64, option_type: OptionType) -> f64 {
    match option_type {
        OptionType::Call => (spot - strike).max(0.0),
        OptionType::Put => (strike - spot).max(0.0),
    }
}

/// Black-Scholes calculator.
///
/// Carries the annualized risk-free rate; spot, strike, time, and volatility
/// vary per quote. Zero-duration options must resolve through the
/// intrinsic-value path in the driver, never through `price`.
#[derive(Debug, Clone, Copy)]
pub struct BlackScholes {
    /// Risk-free interest rate (annualized).
    pub risk_free_rate: f64,
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.045,
        }
    }
}

impl BlackScholes {
    pub fn new(risk_free_rate: f64) -> Self {
        Self { risk_free_rate }
    }

    /// Calculate d1 parameter.
    fn d1(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let numerator = (spot / strike).ln() + (self.risk_free_rate + 0.5 * vol * vol) * time;
        numerator / (vol * time.sqrt())
    }

    /// Calculate d2 parameter.
    fn d2(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        self.d1(spot, strike, time, vol) - vol * time.sqrt()
    }

    /// Standard normal CDF.
    fn norm_cdf(x: f64) -> f64 {
        let normal = Normal::new(0.0, 1.0).unwrap();
        normal.cdf(x)
    }

    /// Standard normal PDF.
    fn norm_pdf(x: f64) -> f64 {
        (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
    }

    fn validate(spot: f64, strike: f64, time: f64, vol: f64) -> Result<(), PricingError> {
        if !spot.is_finite() || spot <= 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "spot must be positive, got {spot}"
            )));
        }
        if !strike.is_finite() || strike <= 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "strike must be positive, got {strike}"
            )));
        }
        if !time.is_finite() || time <= 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "time to expiration must be positive, got {time}"
            )));
        }
        if !vol.is_finite() || vol < 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "volatility must be non-negative, got {vol}"
            )));
        }
        Ok(())
    }

    /// Theoretical premium for either option type.
    pub fn price(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
        option_type: OptionType,
    ) -> Result<f64, PricingError> {
        Self::validate(spot, strike, time, vol)?;

        let discounted_strike = strike * (-self.risk_free_rate * time).exp();

        // Zero volatility degenerates to discounted-intrinsic pricing.
        let raw = if vol == 0.0 {
            match option_type {
                OptionType::Call => spot - discounted_strike,
                OptionType::Put => discounted_strike - spot,
            }
        } else {
            let d1 = self.d1(spot, strike, time, vol);
            let d2 = self.d2(spot, strike, time, vol);
            match option_type {
                OptionType::Call => {
                    spot * Self::norm_cdf(d1) - discounted_strike * Self::norm_cdf(d2)
                }
                OptionType::Put => {
                    discounted_strike * Self::norm_cdf(-d2) - spot * Self::norm_cdf(-d1)
                }
            }
        };

        Ok(raw.max(intrinsic_value(spot, strike, option_type)).max(0.0))
    }

    /// Calculate call option premium.
    pub fn call_price(&self, spot: f64, strike: f64, time: f64, vol: f64) -> Result<f64, PricingError> {
        self.price(spot, strike, time, vol, OptionType::Call)
    }

    /// Calculate put option premium.
    pub fn put_price(&self, spot: f64, strike: f64, time: f64, vol: f64) -> Result<f64, PricingError> {
        self.price(spot, strike, time, vol, OptionType::Put)
    }

    /// Calculate delta.
    pub fn delta(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
        option_type: OptionType,
    ) -> Result<f64, PricingError> {
        Self::validate(spot, strike, time, vol)?;

        if vol == 0.0 {
            let discounted_strike = strike * (-self.risk_free_rate * time).exp();
            return Ok(match option_type {
                OptionType::Call => {
                    if spot > discounted_strike {
                        1.0
                    } else {
                        0.0
                    }
                }
                OptionType::Put => {
                    if spot < discounted_strike {
                        -1.0
                    } else {
                        0.0
                    }
                }
            });
        }

        let d1 = self.d1(spot, strike, time, vol);
        Ok(match option_type {
            OptionType::Call => Self::norm_cdf(d1),
            OptionType::Put => Self::norm_cdf(d1) - 1.0,
        })
    }

    /// Calculate gamma (same for calls and puts).
    pub fn gamma(&self, spot: f64, strike: f64, time: f64, vol: f64) -> Result<f64, PricingError> {
        Self::validate(spot, strike, time, vol)?;
        if vol == 0.0 {
            return Ok(0.0);
        }

        let d1 = self.d1(spot, strike, time, vol);
        Ok(Self::norm_pdf(d1) / (spot * vol * time.sqrt()))
    }

    /// Calculate vega (same for calls and puts), per 1% change in volatility.
    pub fn vega(&self, spot: f64, strike: f64, time: f64, vol: f64) -> Result<f64, PricingError> {
        Self::validate(spot, strike, time, vol)?;
        if vol == 0.0 {
            return Ok(0.0);
        }

        let d1 = self.d1(spot, strike, time, vol);
        Ok(spot * Self::norm_pdf(d1) * time.sqrt() / 100.0)
    }

    /// Calculate theta (per calendar day).
    pub fn theta(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
        option_type: OptionType,
    ) -> Result<f64, PricingError> {
        Self::validate(spot, strike, time, vol)?;
        if vol == 0.0 {
            return Ok(0.0);
        }

        let d1 = self.d1(spot, strike, time, vol);
        let d2 = self.d2(spot, strike, time, vol);
        let discount = (-self.risk_free_rate * time).exp();

        let decay = -spot * Self::norm_pdf(d1) * vol / (2.0 * time.sqrt());
        let carry = self.risk_free_rate * strike * discount;

        Ok(match option_type {
            OptionType::Call => (decay - carry * Self::norm_cdf(d2)) / 365.0,
            OptionType::Put => (decay + carry * Self::norm_cdf(-d2)) / 365.0,
        })
    }
}
