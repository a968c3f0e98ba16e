//! Historical bar data: types, validation, and CSV loading.

pub mod loader;
pub mod types;

pub use loader::{read_bars, BarLoader, LoaderError};
pub use types::{OptionType, PriceBar, PriceSeries, SeriesError, DEFAULT_VOLATILITY};
