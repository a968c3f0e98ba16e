//! Simulation: configuration, the wheel driver, and parameter sweeps.

pub mod config;
pub mod driver;
pub mod sweep;

pub use config::{ConfigError, SimConfig};
pub use driver::{
    Diagnostic, DiagnosticKind, PortfolioSnapshot, SimulationError, SimulationReport, WheelDriver,
};
pub use sweep::{best_by_return, run_sweep, SweepGrid, SweepOutcome, SweepParams};
