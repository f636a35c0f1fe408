//! Discount arithmetic and the "atypical" review heuristics.

use bigdecimal::{BigDecimal, Zero};

/// Decimal places kept on stored discount ratios.
pub const RATIO_SCALE: i64 = 6;

/// `(list_price - amount) / list_price`, clamped to `[0, 1]`.
///
/// `None` when there is no usable list price.
pub fn discount_ratio(list_price: Option<&BigDecimal>, amount: &BigDecimal) -> Option<BigDecimal> {
    let list_price = list_price.filter(|p| **p > BigDecimal::zero())?;
    let ratio = (list_price - amount) / list_price;
    Some(clamp_unit(ratio).round(RATIO_SCALE))
}

fn clamp_unit(value: BigDecimal) -> BigDecimal {
    let one = BigDecimal::from(1);
    if value < BigDecimal::zero() {
        BigDecimal::zero()
    } else if value > one {
        one
    } else {
        value
    }
}

/// Flags a ratio that is outside `[0, 1]` or carries digits past the second
/// decimal place.
pub fn is_atypical_ratio(ratio: &BigDecimal) -> bool {
    if *ratio < BigDecimal::zero() || *ratio > BigDecimal::from(1) {
        return true;
    }
    ratio.with_scale(2) != *ratio
}

/// Same heuristic applied to `amount / list_price`.
pub fn is_atypical_price_ratio(amount: &BigDecimal, list_price: Option<&BigDecimal>) -> bool {
    match list_price.filter(|p| **p > BigDecimal::zero()) {
        Some(price) => is_atypical_ratio(&(amount / price)),
        None => false,
    }
}
