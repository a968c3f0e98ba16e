//! Portfolio state: contracts, stock lots, and the ledger that applies
//! trade events atomically while maintaining the collateral invariants.

pub mod contract;
pub mod ledger;
pub mod position;

pub use contract::{ContractStatus, OptionContract, CONTRACT_SIZE};
pub use ledger::{LedgerError, Portfolio, TradeEvent, TradeKind};
pub use position::StockLot;
