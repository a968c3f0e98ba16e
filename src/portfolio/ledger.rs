//! Portfolio ledger: cash, collateral, stock lots, open contracts, and the
//! append-only trade-event history.
//!
//! Every operation is atomic: it validates completely, then applies the full
//! state delta and appends exactly one `TradeEvent`, or it returns a typed
//! failure and changes nothing.
//!
//! Collateral discipline: selling a cash-secured put reserves `strike * 100`
//! of cash without spending it. A second put can only be written against
//! cash that is not already committed (`free_cash`), and the reservation is
//! released when the put resolves.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::OptionType;

use super::contract::{ContractStatus, OptionContract, CONTRACT_SIZE};
use super::position::StockLot;

/// Kind of portfolio mutation recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    SellPut,
    Assigned,
    SellCall,
    CalledAway,
    ExpiredWorthless,
}

/// Immutable audit-trail record. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub date: NaiveDate,
    pub kind: TradeKind,
    pub contract_id: u64,
    pub ticker: String,
    pub option_type: OptionType,
    pub strike: Decimal,
    /// Net cash change applied by this event.
    pub cash_delta: Decimal,
    /// Cash plus stock value after the event (open short marks are reported
    /// in snapshots, which carry the pricing model's view).
    pub resulting_value: Decimal,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("insufficient collateral: required {required}, available {available}")]
    InsufficientCollateral {
        required: Decimal,
        available: Decimal,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Cash, stock, and option state for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    starting_cash: Decimal,
    cash: Decimal,
    reserved_collateral: Decimal,
    positions: HashMap<String, StockLot>,
    open_contracts: Vec<OptionContract>,
    resolved_contracts: Vec<OptionContract>,
    realized_pnl: Decimal,
    history: Vec<TradeEvent>,
}

impl Portfolio {
    pub fn new(starting_cash: Decimal) -> Self {
        Self {
            starting_cash,
            cash: starting_cash,
            reserved_collateral: Decimal::ZERO,
            positions: HashMap::new(),
            open_contracts: Vec::new(),
            resolved_contracts: Vec::new(),
            realized_pnl: Decimal::ZERO,
            history: Vec::new(),
        }
    }

    pub fn starting_cash(&self) -> Decimal {
        self.starting_cash
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn reserved_collateral(&self) -> Decimal {
        self.reserved_collateral
    }

    /// Cash not committed as put collateral.
    pub fn free_cash(&self) -> Decimal {
        self.cash - self.reserved_collateral
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn history(&self) -> &[TradeEvent] {
        &self.history
    }

    pub fn open_contracts(&self) -> &[OptionContract] {
        &self.open_contracts
    }

    pub fn resolved_contracts(&self) -> &[OptionContract] {
        &self.resolved_contracts
    }

    pub fn position(&self, ticker: &str) -> Option<&StockLot> {
        self.positions.get(ticker)
    }

    pub fn positions(&self) -> impl Iterator<Item = &StockLot> {
        self.positions.values()
    }

    pub fn shares(&self, ticker: &str) -> u32 {
        self.positions.get(ticker).map_or(0, |lot| lot.quantity)
    }

    /// The at-most-one open contract for a ticker.
    pub fn open_contract(&self, ticker: &str) -> Option<&OptionContract> {
        self.open_contracts.iter().find(|c| c.ticker == ticker)
    }

    /// Total premium collected across open and resolved contracts.
    pub fn total_premium_collected(&self) -> Decimal {
        self.open_contracts
            .iter()
            .chain(self.resolved_contracts.iter())
            .map(|c| c.total_premium())
            .sum()
    }

    /// Cash plus stock value, marking the given ticker's lot at `spot` and
    /// any other lots at their basis.
    fn liquidation_value(&self, ticker: &str, spot: Decimal) -> Decimal {
        let stock: Decimal = self
            .positions
            .values()
            .map(|lot| {
                if lot.ticker == ticker {
                    lot.market_value(spot)
                } else {
                    lot.cost_basis
                }
            })
            .sum();
        self.cash + stock
    }

    fn record(
        &mut self,
        date: NaiveDate,
        kind: TradeKind,
        contract: &OptionContract,
        cash_delta: Decimal,
        spot: Decimal,
    ) -> TradeEvent {
        let event = TradeEvent {
            date,
            kind,
            contract_id: contract.id,
            ticker: contract.ticker.clone(),
            option_type: contract.option_type,
            strike: contract.strike,
            cash_delta,
            resulting_value: self.liquidation_value(&contract.ticker, spot),
        };
        self.history.push(event.clone());
        debug_assert!(self.cash >= Decimal::ZERO);
        debug_assert!(self.reserved_collateral >= Decimal::ZERO);
        debug_assert!(self.reserved_collateral <= self.cash);
        event
    }

    fn find_open(&self, contract_id: u64) -> Result<usize, LedgerError> {
        self.open_contracts
            .iter()
            .position(|c| c.id == contract_id)
            .ok_or_else(|| {
                LedgerError::InvalidState(format!("contract {contract_id} is not open"))
            })
    }

    fn check_no_open_contract(&self, ticker: &str) -> Result<(), LedgerError> {
        if self.open_contract(ticker).is_some() {
            return Err(LedgerError::InvalidState(format!(
                "an open contract already exists for {ticker}"
            )));
        }
        Ok(())
    }

    /// Sell a cash-secured put. Requires free cash to cover the full strike
    /// value; the collateral stays reserved until the put resolves.
    pub fn sell_put(
        &mut self,
        contract: OptionContract,
        spot: Decimal,
    ) -> Result<TradeEvent, LedgerError> {
        if contract.option_type != OptionType::Put {
            return Err(LedgerError::InvalidState(
                "sell_put requires a put contract".to_string(),
            ));
        }
        if contract.status != ContractStatus::Open {
            return Err(LedgerError::InvalidState(format!(
                "contract {} is already resolved",
                contract.id
            )));
        }
        self.check_no_open_contract(&contract.ticker)?;

        let required = contract.collateral();
        let available = self.free_cash();
        if available < required {
            return Err(LedgerError::InsufficientCollateral {
                required,
                available,
            });
        }

        let premium = contract.total_premium();
        self.reserved_collateral += required;
        self.cash += premium;

        let event = self.record(contract.open_date, TradeKind::SellPut, &contract, premium, spot);
        self.open_contracts.push(contract);
        Ok(event)
    }

    /// Sell a covered call against an existing lot of at least 100 shares.
    pub fn sell_call(
        &mut self,
        contract: OptionContract,
        spot: Decimal,
    ) -> Result<TradeEvent, LedgerError> {
        if contract.option_type != OptionType::Call {
            return Err(LedgerError::InvalidState(
                "sell_call requires a call contract".to_string(),
            ));
        }
        if contract.status != ContractStatus::Open {
            return Err(LedgerError::InvalidState(format!(
                "contract {} is already resolved",
                contract.id
            )));
        }
        self.check_no_open_contract(&contract.ticker)?;

        let lot = self.positions.get(&contract.ticker).ok_or_else(|| {
            LedgerError::InvalidState(format!(
                "cannot sell a call with no stock position in {}",
                contract.ticker
            ))
        })?;
        if lot.quantity < CONTRACT_SIZE {
            return Err(LedgerError::InsufficientCollateral {
                required: Decimal::from(CONTRACT_SIZE),
                available: Decimal::from(lot.quantity),
            });
        }

        let premium = contract.total_premium();
        self.cash += premium;

        let event = self.record(contract.open_date, TradeKind::SellCall, &contract, premium, spot);
        self.open_contracts.push(contract);
        Ok(event)
    }

    /// Resolve a short put exercised against the writer: buy 100 shares at
    /// the strike. The lot's basis is recorded net of the put's premium.
    pub fn assign_put(
        &mut self,
        contract_id: u64,
        date: NaiveDate,
        spot: Decimal,
    ) -> Result<TradeEvent, LedgerError> {
        let idx = self.find_open(contract_id)?;
        if self.open_contracts[idx].option_type != OptionType::Put {
            return Err(LedgerError::InvalidState(format!(
                "contract {contract_id} is not a put"
            )));
        }

        let mut contract = self.open_contracts.remove(idx);
        let cost = contract.collateral();

        self.reserved_collateral -= cost;
        self.cash -= cost;

        let basis_added = cost - contract.total_premium();
        match self.positions.get_mut(&contract.ticker) {
            Some(lot) => {
                lot.quantity += CONTRACT_SIZE;
                lot.cost_basis += basis_added;
            }
            None => {
                self.positions.insert(
                    contract.ticker.clone(),
                    StockLot {
                        ticker: contract.ticker.clone(),
                        quantity: CONTRACT_SIZE,
                        cost_basis: basis_added,
                        acquired: date,
                    },
                );
            }
        }

        contract.status = ContractStatus::Assigned;
        let event = self.record(date, TradeKind::Assigned, &contract, -cost, spot);
        self.resolved_contracts.push(contract);
        Ok(event)
    }

    /// Resolve a short call exercised against the writer: sell 100 shares at
    /// the strike. Realizes the stock gain over the relieved basis plus this
    /// contract's premium.
    pub fn call_away(
        &mut self,
        contract_id: u64,
        date: NaiveDate,
        spot: Decimal,
    ) -> Result<TradeEvent, LedgerError> {
        let idx = self.find_open(contract_id)?;
        if self.open_contracts[idx].option_type != OptionType::Call {
            return Err(LedgerError::InvalidState(format!(
                "contract {contract_id} is not a call"
            )));
        }
        let ticker = self.open_contracts[idx].ticker.clone();
        let premium = self.open_contracts[idx].total_premium();
        let proceeds = self.open_contracts[idx].collateral();

        let lot = match self.positions.get_mut(&ticker) {
            Some(lot) if lot.quantity >= CONTRACT_SIZE => lot,
            _ => {
                return Err(LedgerError::InvalidState(format!(
                    "no covered shares in {ticker} to deliver"
                )))
            }
        };
        let basis_relieved =
            lot.cost_basis * Decimal::from(CONTRACT_SIZE) / Decimal::from(lot.quantity);
        lot.quantity -= CONTRACT_SIZE;
        lot.cost_basis -= basis_relieved;
        let lot_empty = lot.quantity == 0;
        if lot_empty {
            self.positions.remove(&ticker);
        }

        self.cash += proceeds;
        self.realized_pnl += proceeds - basis_relieved + premium;

        let mut contract = self.open_contracts.remove(idx);
        contract.status = ContractStatus::CalledAway;
        let event = self.record(date, TradeKind::CalledAway, &contract, proceeds, spot);
        self.resolved_contracts.push(contract);
        Ok(event)
    }

    /// Resolve an out-of-the-money expiry. No cash or position change beyond
    /// the premium already booked at open; the premium becomes realized.
    pub fn expire_worthless(
        &mut self,
        contract_id: u64,
        date: NaiveDate,
        spot: Decimal,
    ) -> Result<TradeEvent, LedgerError> {
        let idx = self.find_open(contract_id)?;
        let mut contract = self.open_contracts.remove(idx);

        if contract.option_type == OptionType::Put {
            self.reserved_collateral -= contract.collateral();
        }
        self.realized_pnl += contract.total_premium();

        contract.status = ContractStatus::ExpiredOtm;
        let event = self.record(
            date,
            TradeKind::ExpiredWorthless,
            &contract,
            Decimal::ZERO,
            spot,
        );
        self.resolved_contracts.push(contract);
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn put(ticker: &str, strike: Decimal, premium: Decimal) -> OptionContract {
        OptionContract::open(
            ticker,
            OptionType::Put,
            strike,
            date(2024, 2, 16),
            premium,
            date(2024, 1, 15),
            dec!(100),
        )
    }

    fn call(ticker: &str, strike: Decimal, premium: Decimal) -> OptionContract {
        OptionContract::open(
            ticker,
            OptionType::Call,
            strike,
            date(2024, 3, 15),
            premium,
            date(2024, 2, 16),
            dec!(95),
        )
    }

    #[test]
    fn test_sell_put_collects_premium_and_reserves_collateral() {
        let mut portfolio = Portfolio::new(dec!(100000));
        let event = portfolio.sell_put(put("AAPL", dec!(95), dec!(1.50)), dec!(100)).unwrap();

        assert_eq!(event.kind, TradeKind::SellPut);
        assert_eq!(event.cash_delta, dec!(150));
        assert_eq!(portfolio.cash(), dec!(100150));
        assert_eq!(portfolio.reserved_collateral(), dec!(9500));
        assert_eq!(portfolio.free_cash(), dec!(90650));
        assert_eq!(portfolio.open_contracts().len(), 1);
    }

    #[test]
    fn test_sell_put_rejects_unaffordable_strike() {
        let mut portfolio = Portfolio::new(dec!(100000));
        let err = portfolio
            .sell_put(put("AAPL", dec!(1200), dec!(3.00)), dec!(1210))
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientCollateral {
                required: dec!(120000),
                available: dec!(100000),
            }
        );
        assert_eq!(portfolio.cash(), dec!(100000));
        assert!(portfolio.history().is_empty());
    }

    #[test]
    fn test_reserved_collateral_blocks_second_put() {
        let mut portfolio = Portfolio::new(dec!(100000));
        portfolio.sell_put(put("AAPL", dec!(600), dec!(2.00)), dec!(620)).unwrap();

        // Raw cash (100200) would cover a second 600 strike, but 60000 of it
        // is already committed.
        let err = portfolio
            .sell_put(put("MSFT", dec!(600), dec!(2.00)), dec!(620))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientCollateral {
                required: dec!(60000),
                available: dec!(40200),
            }
        );
    }

    #[test]
    fn test_one_open_contract_per_ticker() {
        let mut portfolio = Portfolio::new(dec!(100000));
        portfolio.sell_put(put("AAPL", dec!(95), dec!(1.50)), dec!(100)).unwrap();

        let err = portfolio
            .sell_put(put("AAPL", dec!(90), dec!(1.00)), dec!(100))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }

    #[test]
    fn test_assignment_scenario() {
        let mut portfolio = Portfolio::new(dec!(100000));
        let contract = put("AAPL", dec!(95), dec!(1.50));
        let id = contract.id;
        portfolio.sell_put(contract, dec!(100)).unwrap();

        let event = portfolio.assign_put(id, date(2024, 2, 16), dec!(90)).unwrap();

        // 100000 + 150 - 9500
        assert_eq!(portfolio.cash(), dec!(90650));
        assert_eq!(portfolio.reserved_collateral(), dec!(0));
        assert_eq!(portfolio.shares("AAPL"), 100);
        let lot = portfolio.position("AAPL").unwrap();
        assert_eq!(lot.cost_basis, dec!(9350));
        assert_eq!(event.cash_delta, dec!(-9500));
        // cash + 100 shares at spot 90
        assert_eq!(event.resulting_value, dec!(99650));
        assert_eq!(portfolio.realized_pnl(), dec!(0));
    }

    #[test]
    fn test_sell_call_requires_shares() {
        let mut portfolio = Portfolio::new(dec!(100000));
        let err = portfolio
            .sell_call(call("AAPL", dec!(99), dec!(1.20)), dec!(95))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }

    #[test]
    fn test_full_wheel_cycle_cash_identity() {
        let mut portfolio = Portfolio::new(dec!(100000));

        let p = put("AAPL", dec!(95), dec!(1.50));
        let put_id = p.id;
        portfolio.sell_put(p, dec!(100)).unwrap();
        portfolio.assign_put(put_id, date(2024, 2, 16), dec!(92)).unwrap();

        let c = call("AAPL", dec!(99), dec!(1.20));
        let call_id = c.id;
        portfolio.sell_call(c, dec!(92)).unwrap();
        portfolio.call_away(call_id, date(2024, 3, 15), dec!(102)).unwrap();

        // startingCash + sum(premiums) + (callStrike - putStrike) * 100
        let expected = dec!(100000) + dec!(150) + dec!(120) + dec!(400);
        assert_eq!(portfolio.cash(), expected);
        assert_eq!(portfolio.shares("AAPL"), 0);
        assert!(portfolio.position("AAPL").is_none());
        // (9900 - 9350) + 120
        assert_eq!(portfolio.realized_pnl(), dec!(670));
        assert_eq!(portfolio.total_premium_collected(), dec!(270));
        assert_eq!(portfolio.history().len(), 4);
    }

    #[test]
    fn test_put_expiring_worthless_releases_collateral() {
        let mut portfolio = Portfolio::new(dec!(100000));
        let contract = put("AAPL", dec!(95), dec!(1.50));
        let id = contract.id;
        portfolio.sell_put(contract, dec!(100)).unwrap();

        let event = portfolio
            .expire_worthless(id, date(2024, 2, 16), dec!(97))
            .unwrap();

        assert_eq!(event.kind, TradeKind::ExpiredWorthless);
        assert_eq!(event.cash_delta, dec!(0));
        assert_eq!(portfolio.cash(), dec!(100150));
        assert_eq!(portfolio.reserved_collateral(), dec!(0));
        assert_eq!(portfolio.free_cash(), dec!(100150));
        assert_eq!(portfolio.realized_pnl(), dec!(150));
    }

    #[test]
    fn test_call_expiring_worthless_keeps_shares() {
        let mut portfolio = Portfolio::new(dec!(100000));
        let p = put("AAPL", dec!(95), dec!(1.50));
        let put_id = p.id;
        portfolio.sell_put(p, dec!(100)).unwrap();
        portfolio.assign_put(put_id, date(2024, 2, 16), dec!(92)).unwrap();

        let c = call("AAPL", dec!(99), dec!(1.20));
        let call_id = c.id;
        portfolio.sell_call(c, dec!(92)).unwrap();
        portfolio
            .expire_worthless(call_id, date(2024, 3, 15), dec!(96))
            .unwrap();

        assert_eq!(portfolio.shares("AAPL"), 100);
        // put premium stays embedded in the basis; the call premium realizes
        assert_eq!(portfolio.realized_pnl(), dec!(120));
        assert!(portfolio.open_contract("AAPL").is_none());
    }

    #[test]
    fn test_failed_operation_changes_nothing() {
        let mut portfolio = Portfolio::new(dec!(100000));
        let c = call("AAPL", dec!(99), dec!(1.20));
        let id = c.id;

        // No shares: sell_call must fail atomically.
        assert!(portfolio.sell_call(c, dec!(95)).is_err());
        assert!(portfolio.history().is_empty());
        assert_eq!(portfolio.cash(), dec!(100000));

        // Unknown contract id on every resolution path.
        assert!(portfolio.assign_put(id, date(2024, 3, 15), dec!(90)).is_err());
        assert!(portfolio.call_away(id, date(2024, 3, 15), dec!(102)).is_err());
        assert!(portfolio
            .expire_worthless(id, date(2024, 3, 15), dec!(96))
            .is_err());
        assert!(portfolio.history().is_empty());
    }

    #[test]
    fn test_resolution_rejects_wrong_type() {
        let mut portfolio = Portfolio::new(dec!(100000));
        let p = put("AAPL", dec!(95), dec!(1.50));
        let put_id = p.id;
        portfolio.sell_put(p, dec!(100)).unwrap();

        let err = portfolio
            .call_away(put_id, date(2024, 2, 16), dec!(102))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
        assert_eq!(portfolio.open_contracts().len(), 1);
    }
}
