//! The lot store: an arena of every lot ever created for one security.
//!
//! Lots are addressed by [`LotId`], which doubles as the arena index. The
//! store additionally keeps the security's ordered lot list (the order in
//! which open lots are offered for allocation), the synthetic transactions
//! generated while allocating, and for every transaction the lots it created
//! and closed.
//!
//! Parent/child relationships are stored only as `Lot::source`; child lists
//! are derived on demand.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::{Ident, Lot, LotId, SyntheticId, SyntheticTransaction, TxnRef};

/// Errors raised when a store mutation would break the arena structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The referenced lot does not exist.
    #[error("unknown lot {0}")]
    UnknownLot(LotId),
    /// The lot was already closed and cannot be closed again.
    #[error("lot {lot} already closed by {by}")]
    AlreadyClosed {
        /// The lot.
        lot: LotId,
        /// The transaction that closed it first.
        by: TxnRef,
    },
    /// A lot was inserted with an id other than the next free one.
    #[error("lot {got} inserted out of sequence, expected {expected}")]
    OutOfSequence {
        /// The next free id.
        expected: LotId,
        /// The id that was supplied.
        got: LotId,
    },
}

/// Where a newly inserted lot goes in the security's lot list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Directly after the given lot.
    After(LotId),
    /// Before the first open lot acquired later than the new lot.
    ///
    /// Closed lots do not take part in placement.
    ByAcquisition,
}

/// Lots created and closed by one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxnLots {
    /// Lots this transaction brought into existence.
    pub created: Vec<LotId>,
    /// Lots this transaction closed.
    pub closed: Vec<LotId>,
}

/// All lots of one security.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotStore {
    security: Ident,
    lots: Vec<Lot>,
    order: Vec<LotId>,
    synthetic: Vec<SyntheticTransaction>,
    txn_lots: BTreeMap<TxnRef, TxnLots>,
}

impl LotStore {
    /// Create an empty store for `security`.
    pub fn new(security: impl Into<Ident>) -> Self {
        Self {
            security: security.into(),
            lots: Vec::new(),
            order: Vec::new(),
            synthetic: Vec::new(),
            txn_lots: BTreeMap::new(),
        }
    }

    /// The security this store belongs to.
    pub const fn security(&self) -> &Ident {
        &self.security
    }

    /// Look up a lot by id.
    pub fn get(&self, id: LotId) -> Option<&Lot> {
        self.lots.get(id.index())
    }

    /// Number of lots ever created.
    pub fn len(&self) -> usize {
        self.lots.len()
    }

    /// Whether no lot has been created.
    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// The id the next inserted lot must carry.
    pub fn next_lot_id(&self) -> LotId {
        LotId(self.lots.len() as u32)
    }

    /// The id the next synthetic transaction must carry.
    pub fn next_synthetic_id(&self) -> SyntheticId {
        SyntheticId(self.synthetic.len() as u32)
    }

    /// All lots, open and closed, in list order.
    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.order.iter().filter_map(|id| self.get(*id))
    }

    /// The ordered lot list as ids.
    pub fn order(&self) -> &[LotId] {
        &self.order
    }

    /// Open lots of every account, in list order.
    pub fn open_lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots().filter(|lot| lot.is_open())
    }

    /// Open lots held by `account`, in list order.
    pub fn open_lots_in<'a>(&'a self, account: &'a str) -> impl Iterator<Item = &'a Lot> + 'a {
        self.lots().filter(move |lot| lot.is_open_in(account))
    }

    /// Total open shares held by `account`.
    pub fn open_shares(&self, account: &str) -> Decimal {
        self.open_lots_in(account).map(|lot| lot.shares).sum()
    }

    /// Total open shares across all accounts.
    pub fn total_open_shares(&self) -> Decimal {
        self.open_lots().map(|lot| lot.shares).sum()
    }

    /// Accounts holding at least one open lot, sorted.
    pub fn open_accounts(&self) -> BTreeSet<Ident> {
        self.open_lots().map(|lot| lot.account.clone()).collect()
    }

    /// Lots derived directly from `id`, in creation order.
    pub fn children(&self, id: LotId) -> Vec<&Lot> {
        self.lots
            .iter()
            .filter(|lot| lot.source == Some(id))
            .collect()
    }

    /// Child ids of every lot that has children.
    pub fn child_index(&self) -> BTreeMap<LotId, Vec<LotId>> {
        let mut index: BTreeMap<LotId, Vec<LotId>> = BTreeMap::new();
        for lot in &self.lots {
            if let Some(parent) = lot.source {
                index.entry(parent).or_default().push(lot.id);
            }
        }
        index
    }

    /// Lots with no source, in list order.
    pub fn roots(&self) -> impl Iterator<Item = &Lot> {
        self.lots().filter(|lot| lot.source.is_none())
    }

    /// Lots created and closed by `txn`.
    pub fn txn_lots(&self, txn: impl Into<TxnRef>) -> Option<&TxnLots> {
        self.txn_lots.get(&txn.into())
    }

    /// Every transaction that created or closed a lot.
    pub fn touched_transactions(&self) -> impl Iterator<Item = (&TxnRef, &TxnLots)> {
        self.txn_lots.iter()
    }

    /// Synthetic transactions generated for this security.
    pub fn synthetic(&self) -> &[SyntheticTransaction] {
        &self.synthetic
    }

    /// Look up a synthetic transaction.
    pub fn synthetic_txn(&self, id: SyntheticId) -> Option<&SyntheticTransaction> {
        self.synthetic.get(id.0 as usize)
    }

    /// Insert a new lot and record it as created by its creating transaction.
    pub fn insert(&mut self, lot: Lot, placement: Placement) -> Result<LotId, StoreError> {
        let expected = self.next_lot_id();
        if lot.id != expected {
            return Err(StoreError::OutOfSequence {
                expected,
                got: lot.id,
            });
        }

        let position = match placement {
            Placement::After(anchor) => {
                self.order
                    .iter()
                    .position(|id| *id == anchor)
                    .ok_or(StoreError::UnknownLot(anchor))?
                    + 1
            }
            Placement::ByAcquisition => self
                .order
                .iter()
                .position(|id| {
                    self.get(*id)
                        .is_some_and(|other| other.is_open() && other.acquired > lot.acquired)
                })
                .unwrap_or(self.order.len()),
        };

        let id = lot.id;
        self.txn_lots
            .entry(lot.created_by)
            .or_default()
            .created
            .push(id);
        if let Some(by) = lot.disposed_by {
            self.txn_lots.entry(by).or_default().closed.push(id);
        }
        self.order.insert(position, id);
        self.lots.push(lot);
        Ok(id)
    }

    /// Close an open lot. Closing is permanent.
    pub fn close(&mut self, id: LotId, by: TxnRef) -> Result<(), StoreError> {
        let lot = self
            .lots
            .get_mut(id.index())
            .ok_or(StoreError::UnknownLot(id))?;
        if let Some(first) = lot.disposed_by {
            return Err(StoreError::AlreadyClosed { lot: id, by: first });
        }
        lot.disposed_by = Some(by);
        self.txn_lots.entry(by).or_default().closed.push(id);
        Ok(())
    }

    /// Register a synthetic transaction. Its id must be the next free one.
    pub fn push_synthetic(&mut self, txn: SyntheticTransaction) -> SyntheticId {
        let id = self.next_synthetic_id();
        self.synthetic.push(SyntheticTransaction { id, ..txn });
        id
    }
}
