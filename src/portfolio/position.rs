//! Stock lots acquired through put assignment.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shares held in one underlying.
///
/// Created on put assignment and removed when the last shares are called
/// away. `cost_basis` is the total dollar basis for the lot, recorded net of
/// the premium collected on the assigning put.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLot {
    pub ticker: String,
    /// Share count; a multiple of 100 while wheel-eligible.
    pub quantity: u32,
    /// Total dollar basis for the lot.
    pub cost_basis: Decimal,
    /// Date the first shares were assigned.
    pub acquired: NaiveDate,
}

impl StockLot {
    pub fn market_value(&self, spot: Decimal) -> Decimal {
        spot * Decimal::from(self.quantity)
    }

    pub fn unrealized_pnl(&self, spot: Decimal) -> Decimal {
        self.market_value(spot) - self.cost_basis
    }

    pub fn basis_per_share(&self) -> Decimal {
        if self.quantity == 0 {
            Decimal::ZERO
        } else {
            self.cost_basis / Decimal::from(self.quantity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_lot_valuation() {
        let lot = StockLot {
            ticker: "AAPL".to_string(),
            quantity: 100,
            cost_basis: dec!(9350),
            acquired: NaiveDate::from_ymd_opt(2024, 2, 16).unwrap(),
        };

        assert_eq!(lot.market_value(dec!(97)), dec!(9700));
        assert_eq!(lot.unrealized_pnl(dec!(97)), dec!(350));
        assert_eq!(lot.unrealized_pnl(dec!(90)), dec!(-350));
        assert_eq!(lot.basis_per_share(), dec!(93.50));
    }
}
