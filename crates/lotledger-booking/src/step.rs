//! Staged changes for one allocation step.
//!
//! A [`Step`] plans the effect of one event against a read-only view of the
//! lot store. New lots get the ids they will have once committed, so later
//! operations in the same step can split or move them. Nothing touches the
//! store until [`Changes::apply`], which means a step that fails half way
//! leaves the store exactly as it was.

use lotledger_core::{
    Ident, Lot, LotId, LotStore, Placement, StoreError, SyntheticId, SyntheticTransaction,
    TxnRef,
};
use rust_decimal::Decimal;

use crate::select;

/// Where moved shares go during [`Step::consume`].
#[derive(Debug, Clone, Copy)]
pub struct Destination<'d> {
    /// Account receiving the shares.
    pub account: &'d Ident,
    /// Destination-side transaction creating the received lots.
    pub txn: TxnRef,
}

/// Planning view over a lot store.
#[derive(Debug)]
pub struct Step<'s> {
    store: &'s LotStore,
    changes: Changes,
}

/// Owned result of a planned step.
#[derive(Debug, Default)]
pub struct Changes {
    staged: Vec<(Lot, Placement)>,
    closes: Vec<(LotId, TxnRef)>,
    synthetic: Vec<SyntheticTransaction>,
}

impl<'s> Step<'s> {
    /// Start planning against `store`.
    pub fn new(store: &'s LotStore) -> Self {
        Self {
            store,
            changes: Changes::default(),
        }
    }

    /// Look up a lot, staged or committed, as it will be after this step.
    pub fn lot(&self, id: LotId) -> Option<&Lot> {
        let committed = self.store.len();
        if id.index() < committed {
            self.store.get(id)
        } else {
            self.changes
                .staged
                .get(id.index() - committed)
                .map(|(lot, _)| lot)
        }
    }

    /// Whether `id` is open after the changes planned so far.
    pub fn is_open(&self, id: LotId) -> bool {
        self.lot(id).is_some_and(Lot::is_open)
            && !self.changes.closes.iter().any(|(closed, _)| *closed == id)
    }

    /// Id the next staged lot will receive.
    pub fn next_id(&self) -> LotId {
        LotId((self.store.len() + self.changes.staged.len()) as u32)
    }

    /// Stage a new lot. Its id must be [`Step::next_id`].
    pub fn stage(&mut self, lot: Lot, placement: Placement) -> Result<LotId, StoreError> {
        let expected = self.next_id();
        if lot.id != expected {
            return Err(StoreError::OutOfSequence {
                expected,
                got: lot.id,
            });
        }
        self.changes.staged.push((lot, placement));
        Ok(expected)
    }

    /// Close a lot, staged or committed.
    pub fn close(&mut self, id: LotId, by: TxnRef) -> Result<(), StoreError> {
        let committed = self.store.len();
        if id.index() >= committed {
            let (lot, _) = self
                .changes
                .staged
                .get_mut(id.index() - committed)
                .ok_or(StoreError::UnknownLot(id))?;
            if let Some(first) = lot.disposed_by {
                return Err(StoreError::AlreadyClosed { lot: id, by: first });
            }
            lot.disposed_by = Some(by);
            return Ok(());
        }

        let lot = self.store.get(id).ok_or(StoreError::UnknownLot(id))?;
        let earlier = lot.disposed_by.or_else(|| {
            self.changes
                .closes
                .iter()
                .find(|(closed, _)| *closed == id)
                .map(|(_, first)| *first)
        });
        if let Some(first) = earlier {
            return Err(StoreError::AlreadyClosed { lot: id, by: first });
        }
        self.changes.closes.push((id, by));
        Ok(())
    }

    /// Register a synthetic transaction and return its future id.
    pub fn add_synthetic(&mut self, txn: SyntheticTransaction) -> SyntheticId {
        let offset = self.changes.synthetic.len() as u32;
        let id = SyntheticId(self.store.next_synthetic_id().0 + offset);
        self.changes.synthetic.push(SyntheticTransaction { id, ..txn });
        id
    }

    /// Split an open lot into a consumed part of `shares` and a remainder.
    ///
    /// Both children inherit the parent's account and acquisition date. The
    /// consumed child's cost basis is pro-rated by share count and the
    /// remainder receives the rest, so the pair conserves shares and cost
    /// exactly. The parent is closed by `by`. Returns `(consumed, remainder)`.
    pub fn split(
        &mut self,
        id: LotId,
        shares: Decimal,
        by: TxnRef,
    ) -> Result<(LotId, LotId), StoreError> {
        let parent = self.lot(id).cloned().ok_or(StoreError::UnknownLot(id))?;
        self.close(id, by)?;

        let consumed_cost = parent.cost_of(shares);
        let consumed = parent.derive(
            self.next_id(),
            parent.account.clone(),
            shares,
            consumed_cost,
            by,
        );
        let consumed = self.stage(consumed, Placement::After(id))?;

        let remainder = parent.derive(
            self.next_id(),
            parent.account.clone(),
            parent.shares - shares,
            parent.cost_basis - consumed_cost,
            by,
        );
        let remainder = self.stage(remainder, Placement::After(consumed))?;

        Ok((consumed, remainder))
    }

    /// Consume `amount` shares from `pool`, closing lots with `by`.
    ///
    /// Lots are taken with [`select::choose`]. A lot that is larger than the
    /// increment still needed is split and its remainder takes its place in
    /// the pool. With a destination, every consumed lot is succeeded by a new
    /// open lot in the destination account, created by the destination
    /// transaction.
    ///
    /// Returns the shares that could not be covered by the pool (zero when
    /// the pool was large enough).
    pub fn consume(
        &mut self,
        pool: &mut Vec<LotId>,
        amount: Decimal,
        by: TxnRef,
        destination: Option<Destination<'_>>,
        tolerance: Decimal,
    ) -> Result<Decimal, StoreError> {
        let mut needed = amount;
        while needed > tolerance {
            let Some(index) = select::choose(pool, |id| self.lot(id), needed, tolerance) else {
                return Ok(needed);
            };
            let id = pool[index];
            let shares = self.lot(id).ok_or(StoreError::UnknownLot(id))?.shares;

            let moved = if shares <= needed + tolerance {
                pool.remove(index);
                self.close(id, by)?;
                needed -= shares;
                id
            } else {
                let (consumed, remainder) = self.split(id, needed, by)?;
                self.close(consumed, by)?;
                pool[index] = remainder;
                needed = Decimal::ZERO;
                consumed
            };

            if let Some(dest) = destination {
                let moved = self.lot(moved).cloned().ok_or(StoreError::UnknownLot(moved))?;
                let successor = moved.derive(
                    self.next_id(),
                    dest.account.clone(),
                    moved.shares,
                    moved.cost_basis,
                    dest.txn,
                );
                self.stage(successor, Placement::ByAcquisition)?;
            }
        }
        Ok(Decimal::ZERO)
    }

    /// Finish planning.
    pub fn finish(self) -> Changes {
        self.changes
    }
}

impl Changes {
    /// Whether the step changes nothing.
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty() && self.closes.is_empty() && self.synthetic.is_empty()
    }

    /// Commit the planned changes to `store`.
    ///
    /// Synthetic transactions are registered first, then existing lots are
    /// closed, then staged lots are inserted in staging order.
    pub fn apply(self, store: &mut LotStore) -> Result<(), StoreError> {
        for txn in self.synthetic {
            store.push_synthetic(txn);
        }
        for (id, by) in self.closes {
            store.close(id, by)?;
        }
        for (lot, placement) in self.staged {
            store.insert(lot, placement)?;
        }
        Ok(())
    }
}
