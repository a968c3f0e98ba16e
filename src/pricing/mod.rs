//! Option pricing: closed-form Black-Scholes premiums and Greeks, plus
//! strike-grid selection for entries.

pub mod black_scholes;
pub mod strikes;

pub use black_scholes::{intrinsic_value, year_fraction, BlackScholes, PricingError};
pub use strikes::{call_strike, put_strike, strike_at_or_above, strike_at_or_below, strike_ladder};
