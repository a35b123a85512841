//! Ordering and grouping of a security's transaction stream.
//!
//! Before allocation a security's transactions are:
//!
//! 1. sorted by date, with a fixed same-day rule between share-removing and
//!    share-adding transactions ([`compare`]),
//! 2. stripped of duplicate split records ([`dedup_splits`]),
//! 3. grouped into [`Event`]s, where every set of transactions joined by
//!    counterpart links becomes one atomic [`TransferCluster`]
//!    ([`group_events`]).

use lotledger_core::{Ident, InvestmentTransaction, ShareEffect, TxnId};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::{debug, warn};

use crate::AllocationError;

/// Same-day rule across accounts: the share-removing transaction sorts
/// before the share-adding one, so a transfer's debit precedes its credit.
pub const CROSS_ACCOUNT_REMOVAL_FIRST: bool = true;

/// Same-day rule within one account: the share-adding transaction sorts
/// before the share-removing one.
///
/// Together with [`CROSS_ACCOUNT_REMOVAL_FIRST`] this asymmetry decides which
/// lots every historical transfer was assigned. Do not change either
/// constant without re-checking against real ledgers.
pub const SAME_ACCOUNT_ADDITION_FIRST: bool = true;

/// Compare two transactions of the same security.
///
/// Dates ascend. On the same date a share-removing transaction (sell or
/// shares-out family) is ordered against a share-adding one according to
/// [`CROSS_ACCOUNT_REMOVAL_FIRST`] and [`SAME_ACCOUNT_ADDITION_FIRST`]. All
/// other same-day pairs compare equal.
///
/// Same-day pairs that compare equal are unconstrained, so this is not a
/// total order and cannot drive `sort_by`. [`sort_transactions`] treats each
/// `Less` as a precedence edge and emits the same-day run in a topological
/// order, taking the lowest id whenever several transactions are free.
pub fn compare(a: &InvestmentTransaction, b: &InvestmentTransaction) -> Ordering {
    a.date.cmp(&b.date).then_with(|| same_day(a, b))
}

fn same_day(a: &InvestmentTransaction, b: &InvestmentTransaction) -> Ordering {
    let (a_removes, b_removes) = (a.removes_shares(), b.removes_shares());
    if a_removes == b_removes {
        return Ordering::Equal;
    }

    let removal_first = if a.account == b.account {
        !SAME_ACCOUNT_ADDITION_FIRST
    } else {
        CROSS_ACCOUNT_REMOVAL_FIRST
    };

    if a_removes == removal_first {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Sort transactions into processing order.
///
/// Transactions are first put in canonical `(date, id)` order, then each
/// same-date run is reordered by [`order_same_day`]. The result depends only
/// on the set of transactions, not on input order.
pub fn sort_transactions(txns: &mut [&InvestmentTransaction]) {
    txns.sort_by_key(|txn| (txn.date, txn.id));

    let mut start = 0;
    while start < txns.len() {
        let date = txns[start].date;
        let end = txns[start..]
            .iter()
            .position(|txn| txn.date != date)
            .map_or(txns.len(), |offset| start + offset);

        order_same_day(&mut txns[start..end]);
        start = end;
    }
}

/// Reorder one same-date run, given in id order.
///
/// Every pair that [`compare`] orders becomes an edge of a precedence graph,
/// which is emitted with Kahn's algorithm, lowest id first among the ready
/// transactions. Mixed buys and sells in two accounts can form a cycle; the
/// lowest remaining id is then emitted to break it.
fn order_same_day(run: &mut [&InvestmentTransaction]) {
    if run.len() < 2 {
        return;
    }

    let mut successors = vec![Vec::new(); run.len()];
    let mut pending = vec![0_usize; run.len()];
    for (i, a) in run.iter().enumerate() {
        for (j, b) in run.iter().enumerate() {
            if same_day(a, b) == Ordering::Less {
                successors[i].push(j);
                pending[j] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..run.len()).filter(|&i| pending[i] == 0).collect();
    let mut remaining: BTreeSet<usize> = (0..run.len()).collect();
    let mut ordered = Vec::with_capacity(run.len());
    while let Some(&lowest) = remaining.first() {
        let next = ready.pop_first().unwrap_or_else(|| {
            debug!(txn = %run[lowest].id, "breaking same-day ordering cycle");
            lowest
        });
        remaining.remove(&next);
        ordered.push(run[next]);
        for &j in &successors[next] {
            pending[j] = pending[j].saturating_sub(1);
            if pending[j] == 0 && remaining.contains(&j) {
                ready.insert(j);
            }
        }
    }
    run.copy_from_slice(&ordered);
}

/// Keep only the first split recorded on each date.
///
/// Source ledgers record a split once per account holding the security; the
/// allocator applies a split to every account itself. Returns the ids of the
/// dropped duplicates.
pub fn dedup_splits(txns: &mut Vec<&InvestmentTransaction>) -> Vec<TxnId> {
    let mut seen = BTreeSet::new();
    let mut dropped = Vec::new();
    txns.retain(|txn| {
        if txn.effect() != ShareEffect::Split || seen.insert(txn.date) {
            true
        } else {
            dropped.push(txn.id);
            false
        }
    });
    dropped
}

/// Sort and de-duplicate a security's transactions.
pub fn order_transactions(txns: &[InvestmentTransaction]) -> Vec<&InvestmentTransaction> {
    let mut ordered: Vec<&InvestmentTransaction> = txns.iter().collect();
    sort_transactions(&mut ordered);
    for id in dedup_splits(&mut ordered) {
        debug!(txn = %id, "dropped duplicate split record");
    }
    ordered
}

/// One transfer event: the transitively linked transactions on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCluster<'a> {
    /// The transaction that seeded the cluster (first in processing order).
    pub seed: TxnId,
    /// Share-removing legs, in processing order.
    pub sources: Vec<&'a InvestmentTransaction>,
    /// Share-adding legs, in processing order.
    pub destinations: Vec<&'a InvestmentTransaction>,
}

impl TransferCluster<'_> {
    /// Total shares leaving the source accounts.
    pub fn source_shares(&self) -> Decimal {
        self.sources.iter().map(|txn| txn.shares()).sum()
    }

    /// Total shares arriving in the destination accounts.
    pub fn destination_shares(&self) -> Decimal {
        self.destinations.iter().map(|txn| txn.shares()).sum()
    }

    /// All members, sources first.
    pub fn members(&self) -> impl Iterator<Item = &InvestmentTransaction> {
        self.sources
            .iter()
            .chain(self.destinations.iter())
            .copied()
    }
}

/// A unit of work for the allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<'a> {
    /// A transaction processed on its own.
    Single(&'a InvestmentTransaction),
    /// A transfer cluster processed atomically.
    Transfer(TransferCluster<'a>),
}

impl Event<'_> {
    /// Transactions covered by this event.
    pub fn transactions(&self) -> Vec<&InvestmentTransaction> {
        match self {
            Self::Single(txn) => vec![*txn],
            Self::Transfer(cluster) => cluster.members().collect(),
        }
    }

    /// The last transaction id of the event, used in diagnostics.
    pub fn last_id(&self) -> Option<TxnId> {
        self.transactions().iter().map(|txn| txn.id).max()
    }
}

const fn moves_shares(txn: &InvestmentTransaction) -> bool {
    txn.action.adds_shares() || txn.action.removes_shares()
}

/// Group an ordered stream into events.
///
/// A share-moving transaction with counterpart links seeds a breadth-first
/// expansion over the links (followed in both directions). The expansion
/// must cover exactly the contiguous run starting at the seed; otherwise the
/// stream is rejected with [`AllocationError::OrphanedTransferIndex`]. The
/// two sides must move the same number of shares within `tolerance`.
///
/// Links to transactions outside the stream (cash counterparts) are ignored.
/// A cluster that ends up with only one side is emitted member by member.
pub fn group_events<'a>(
    security: &Ident,
    ordered: &[&'a InvestmentTransaction],
    tolerance: Decimal,
) -> Result<Vec<Event<'a>>, AllocationError> {
    let position: HashMap<TxnId, usize> = ordered
        .iter()
        .enumerate()
        .map(|(i, txn)| (txn.id, i))
        .collect();

    let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, txn) in ordered.iter().enumerate() {
        for link in &txn.links {
            if let Some(&j) = position.get(link) {
                adjacency.entry(i).or_default().push(j);
                adjacency.entry(j).or_default().push(i);
            } else {
                debug!(txn = %txn.id, link = %link, "ignoring link outside {security}");
            }
        }
    }

    let mut events = Vec::with_capacity(ordered.len());
    let mut cursor = 0;
    while cursor < ordered.len() {
        let seed = ordered[cursor];
        if !moves_shares(seed) || !adjacency.contains_key(&cursor) {
            events.push(Event::Single(seed));
            cursor += 1;
            continue;
        }

        let mut members = BTreeSet::from([cursor]);
        let mut queue = VecDeque::from([cursor]);
        while let Some(k) = queue.pop_front() {
            for &j in adjacency.get(&k).into_iter().flatten() {
                if moves_shares(ordered[j]) && members.insert(j) {
                    queue.push_back(j);
                }
            }
        }

        let first = members.first().copied().unwrap_or(cursor);
        let last = members.last().copied().unwrap_or(cursor);
        if first != cursor || last - first + 1 != members.len() {
            let stray: Vec<TxnId> = (first..=last)
                .filter(|i| !members.contains(i))
                .map(|i| ordered[i].id)
                .chain(
                    members
                        .iter()
                        .filter(|&&i| i < cursor)
                        .map(|&i| ordered[i].id),
                )
                .collect();
            return Err(AllocationError::OrphanedTransferIndex {
                security: security.clone(),
                seed: seed.id,
                members: members.iter().map(|&i| ordered[i].id).collect(),
                stray,
            });
        }

        let (sources, destinations): (Vec<_>, Vec<_>) = members
            .iter()
            .map(|&i| ordered[i])
            .partition(|txn| txn.removes_shares());

        if sources.is_empty() || destinations.is_empty() {
            warn!(
                txn = %seed.id,
                "transfer in {security} has only one side, processing legs individually"
            );
            events.extend(
                sources
                    .into_iter()
                    .chain(destinations)
                    .map(Event::Single),
            );
        } else {
            let cluster = TransferCluster {
                seed: seed.id,
                sources,
                destinations,
            };
            let (out, into) = (cluster.source_shares(), cluster.destination_shares());
            if (out - into).abs() > tolerance {
                return Err(AllocationError::TransferShareMismatch {
                    security: security.clone(),
                    seed: seed.id,
                    source_shares: out,
                    destination_shares: into,
                });
            }
            events.push(Event::Transfer(cluster));
        }
        cursor = last + 1;
    }

    Ok(events)
}
