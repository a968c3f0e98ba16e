pub mod data;
pub mod metrics;
pub mod portfolio;
pub mod pricing;
pub mod sim;

// Re-export commonly used types
pub use data::{BarLoader, LoaderError, OptionType, PriceBar, PriceSeries, SeriesError};
pub use metrics::WheelMetrics;
pub use portfolio::{
    ContractStatus, LedgerError, OptionContract, Portfolio, StockLot, TradeEvent, TradeKind,
    CONTRACT_SIZE,
};
pub use pricing::{BlackScholes, PricingError};
pub use sim::{
    ConfigError, Diagnostic, DiagnosticKind, PortfolioSnapshot, SimConfig, SimulationError,
    SimulationReport, SweepGrid, SweepOutcome, WheelDriver,
};
