//! Strike selection on the listed-strike grid.
//!
//! Strikes snap to $0.50 increments below $50 and $1.00 increments above,
//! matching how equity option chains are listed. Entry strikes come from the
//! configured offset percentage applied to the current spot.

use rust_decimal::Decimal;

fn grid_increment(price: Decimal) -> Decimal {
    if price < Decimal::from(50) {
        // $0.50
        Decimal::new(5, 1)
    } else {
        Decimal::ONE
    }
}

/// Nearest listed strike at or below the target price.
pub fn strike_at_or_below(target: Decimal) -> Decimal {
    let inc = grid_increment(target);
    (target / inc).floor() * inc
}

/// Nearest listed strike at or above the target price.
pub fn strike_at_or_above(target: Decimal) -> Decimal {
    let inc = grid_increment(target);
    (target / inc).ceil() * inc
}

fn pct(offset_pct: f64) -> Decimal {
    Decimal::from_f64_retain(offset_pct).unwrap_or_default() / Decimal::ONE_HUNDRED
}

/// Put entry strike: the listed strike at or below spot minus the offset.
pub fn put_strike(spot: Decimal, offset_pct: f64) -> Decimal {
    strike_at_or_below(spot * (Decimal::ONE - pct(offset_pct)))
}

/// Call entry strike: the listed strike at or above spot plus the offset.
pub fn call_strike(spot: Decimal, offset_pct: f64) -> Decimal {
    strike_at_or_above(spot * (Decimal::ONE + pct(offset_pct)))
}

/// Evenly spaced strikes around the spot for chain display,
/// `per_side` strikes in each direction snapped to the listed grid.
pub fn strike_ladder(spot: Decimal, per_side: usize, spacing_pct: f64) -> Vec<Decimal> {
    let spacing = pct(spacing_pct);
    let mut strikes = Vec::with_capacity(per_side * 2 + 1);
    for i in -(per_side as i64)..=(per_side as i64) {
        let target = spot * (Decimal::ONE + spacing * Decimal::from(i));
        if target <= Decimal::ZERO {
            continue;
        }
        let inc = grid_increment(target);
        strikes.push((target / inc).round() * inc);
    }
    strikes.sort();
    strikes.dedup();
    strikes
}
