use crate::models::Row;

/// Percentage change from `base` to `current`.
///
/// A zero base has no meaningful return and yields `None`.
pub fn percent_return(current: f64, base: f64) -> Option<f64> {
    if base == 0.0 {
        return None;
    }
    Some((current - base) / base * 100.0)
}

/// Fill every slot's return from the row's current price. Slots without a
/// close, and rows without a current price, end up with no return.
pub fn apply_returns(row: &mut Row) {
    let current = row.current_price;
    for slot in &mut row.slots {
        slot.return_pct = match (current, slot.close) {
            (Some(now), Some(close)) => percent_return(now, close),
            _ => None,
        };
    }
}
