//! Lot selection.
//!
//! Selection works in two stages. [`greedy_pull`] takes an account's open
//! lots oldest first until they cover the requirement; the pulled set is the
//! pool a disposal or transfer is allowed to touch. Within the pool,
//! [`choose`] prefers a lot whose size exactly matches the increment still
//! needed and otherwise falls back to the oldest lot.
//!
//! The exact-size preference departs from strict date FIFO on purpose:
//! downstream reports depend on the fragmentation it produces.

use lotledger_core::{Lot, LotId};
use rust_decimal::Decimal;

/// Pull open lots oldest-acquisition-first until they cover `required`.
///
/// `open` must be in lot-list order; lots with equal acquisition dates keep
/// that order. Returns `None` when all open lots together fall short by more
/// than `tolerance`.
pub fn greedy_pull(open: &[&Lot], required: Decimal, tolerance: Decimal) -> Option<Vec<LotId>> {
    let mut candidates: Vec<&Lot> = open.to_vec();
    candidates.sort_by_key(|lot| lot.acquired);

    let mut pulled = Vec::new();
    let mut total = Decimal::ZERO;
    for lot in candidates {
        if total + tolerance >= required {
            break;
        }
        total += lot.shares;
        pulled.push(lot.id);
    }

    (total + tolerance >= required).then_some(pulled)
}

/// Pick the pool entry to consume next.
///
/// `pool` is oldest first. Returns the index of the first lot whose shares
/// equal `needed` within `tolerance`, or index 0 when there is none.
pub fn choose<'a>(
    pool: &[LotId],
    lookup: impl Fn(LotId) -> Option<&'a Lot>,
    needed: Decimal,
    tolerance: Decimal,
) -> Option<usize> {
    if pool.is_empty() {
        return None;
    }
    let exact = pool.iter().position(|id| {
        lookup(*id).is_some_and(|lot| (lot.shares - needed).abs() <= tolerance)
    });
    Some(exact.unwrap_or(0))
}
