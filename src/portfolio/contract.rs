//! Short option contracts written by the wheel.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::OptionType;

/// Shares per contract.
pub const CONTRACT_SIZE: u32 = 100;

/// Lifecycle status of a written contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
    /// Contract is open.
    Open,
    /// Expired out of the money; premium kept.
    ExpiredOtm,
    /// Put exercised against the writer; shares purchased at the strike.
    Assigned,
    /// Call exercised against the writer; shares sold at the strike.
    CalledAway,
}

/// A single short option position: one contract, 100 underlying shares.
///
/// Created by the driver when a position opens; mutated only by the ledger
/// when resolved at expiration; immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    /// Unique contract ID.
    pub id: u64,
    /// Underlying ticker.
    pub ticker: String,
    /// Put or call.
    pub option_type: OptionType,
    /// Strike price.
    pub strike: Decimal,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Premium collected at open, per share.
    pub premium: Decimal,
    /// Date the contract was written.
    pub open_date: NaiveDate,
    /// Underlying price when the contract was written.
    pub spot_at_open: Decimal,
    /// Lifecycle status.
    pub status: ContractStatus,
}

impl OptionContract {
    /// Create a new contract ID.
    pub fn new_id() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        COUNTER.fetch_add(1, Ordering::Relaxed)
    }

    /// Open a new contract.
    pub fn open(
        ticker: &str,
        option_type: OptionType,
        strike: Decimal,
        expiration: NaiveDate,
        premium: Decimal,
        open_date: NaiveDate,
        spot_at_open: Decimal,
    ) -> Self {
        Self {
            id: Self::new_id(),
            ticker: ticker.to_string(),
            option_type,
            strike,
            expiration,
            premium,
            open_date,
            spot_at_open,
            status: ContractStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ContractStatus::Open
    }

    /// Check if the contract has reached expiration.
    pub fn is_expired(&self, date: NaiveDate) -> bool {
        date >= self.expiration
    }

    pub fn days_to_expiration(&self, date: NaiveDate) -> i64 {
        (self.expiration - date).num_days().max(0)
    }

    /// Total premium collected for the contract.
    pub fn total_premium(&self) -> Decimal {
        self.premium * Decimal::from(CONTRACT_SIZE)
    }

    /// Cash collateral securing a short put.
    pub fn collateral(&self) -> Decimal {
        self.strike * Decimal::from(CONTRACT_SIZE)
    }
}
