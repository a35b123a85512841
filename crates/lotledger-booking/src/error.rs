//! Allocation errors.
//!
//! Every error here describes input data that violates a structural
//! assumption of the allocator. None of them are transient, so nothing is
//! retried.

use chrono::NaiveDate;
use lotledger_core::{Ident, Lot, LotId, StoreError, TxnId};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// One line of an account's open-lot ledger, attached to shortfall errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenLotSummary {
    /// The lot.
    pub lot: LotId,
    /// Open shares.
    pub shares: Decimal,
    /// Cost basis.
    pub cost_basis: Decimal,
    /// Acquisition date.
    pub acquired: NaiveDate,
}

impl From<&Lot> for OpenLotSummary {
    fn from(lot: &Lot) -> Self {
        Self {
            lot: lot.id,
            shares: lot.shares,
            cost_basis: lot.cost_basis,
            acquired: lot.acquired,
        }
    }
}

impl fmt::Display for OpenLotSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} sh cost {} acquired {}",
            self.lot, self.shares, self.cost_basis, self.acquired
        )
    }
}

/// Errors that can occur during allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// An account's open lots cannot cover a disposal or transfer.
    #[error(
        "insufficient open lots of {security} in {account} for {txn}: required {required}, available {available}"
    )]
    InsufficientOpenLots {
        /// Security being allocated.
        security: Ident,
        /// Account that ran short.
        account: Ident,
        /// Transaction that needed the shares.
        txn: TxnId,
        /// Shares required.
        required: Decimal,
        /// Shares held in open lots.
        available: Decimal,
        /// The account's open lots at the time of failure.
        open_lots: Vec<OpenLotSummary>,
    },

    /// A transfer cluster does not occupy a contiguous run of the ordered
    /// stream starting at its seed transaction.
    #[error("transfer cluster seeded by {seed} in {security} is not contiguous (stray: {stray:?})")]
    OrphanedTransferIndex {
        /// Security being allocated.
        security: Ident,
        /// First transaction of the cluster.
        seed: TxnId,
        /// Transactions reached through counterpart links.
        members: Vec<TxnId>,
        /// Transactions inside the cluster's span that belong to neither side,
        /// or linked transactions that precede the seed.
        stray: Vec<TxnId>,
    },

    /// The two sides of a transfer cluster move different share counts.
    #[error(
        "transfer cluster seeded by {seed} in {security} does not balance: {source_shares} out, {destination_shares} in"
    )]
    TransferShareMismatch {
        /// Security being allocated.
        security: Ident,
        /// First transaction of the cluster.
        seed: TxnId,
        /// Total shares leaving the source accounts.
        source_shares: Decimal,
        /// Total shares arriving in the destination accounts.
        destination_shares: Decimal,
    },

    /// A transaction's action has no known share effect. Not fatal.
    #[error("unclassified action {action} on {txn}, skipped")]
    UnclassifiedAction {
        /// The skipped transaction.
        txn: TxnId,
        /// The recorded action.
        action: String,
    },

    /// Open lots and the running share balance of an account diverged.
    #[error(
        "open lots of {security} in {account} hold {actual} shares after {after}, running balance is {expected}"
    )]
    BalanceDrift {
        /// Security being allocated.
        security: Ident,
        /// Account whose balance drifted.
        account: Ident,
        /// Last transaction applied.
        after: TxnId,
        /// Balance computed from transaction quantities.
        expected: Decimal,
        /// Sum of the account's open lots.
        actual: Decimal,
    },

    /// A split transaction carries a ratio that is not strictly positive.
    #[error("split {txn} has invalid ratio {ratio}")]
    InvalidSplitRatio {
        /// The split transaction.
        txn: TxnId,
        /// The recorded ratio.
        ratio: Decimal,
    },

    /// The lot store rejected a mutation.
    #[error("lot store: {0}")]
    Store(#[from] StoreError),
}

impl AllocationError {
    /// Whether the error aborts allocation of the security.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::UnclassifiedAction { .. })
    }
}
