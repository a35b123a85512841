//! Tax lots.
//!
//! A [`Lot`] is a parcel of shares of one security, held in one account, with
//! a single acquisition date and cost basis. Lots are never deleted: when a
//! lot is sold, moved, or subdivided it is closed by setting its disposing
//! transaction, and its successors point back to it through `source`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Ident, TxnRef};

/// Identifier of a lot within a lot store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(pub u32);

impl LotId {
    /// Position of this lot in the store arena.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A tax lot.
///
/// # Examples
///
/// ```
/// use lotledger_core::{Lot, LotId, TxnId, TxnRef};
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let lot = Lot::new(
///     LotId(0),
///     "Brokerage",
///     "VTI",
///     dec!(100),
///     dec!(1000),
///     NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
///     TxnRef::Ledger(TxnId(1)),
/// );
///
/// assert!(lot.is_open());
/// assert_eq!(lot.cost_per_share(), dec!(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    /// Unique id.
    pub id: LotId,
    /// Account currently holding the shares.
    pub account: Ident,
    /// Security of the shares.
    pub security: Ident,
    /// Share count, always positive.
    pub shares: Decimal,
    /// Total cost of the shares.
    pub cost_basis: Decimal,
    /// Date the shares were originally acquired.
    pub acquired: NaiveDate,
    /// Transaction that brought this lot into existence.
    pub created_by: TxnRef,
    /// Transaction that closed this lot; `None` while open.
    pub disposed_by: Option<TxnRef>,
    /// Lot this one was derived from; `None` for an original acquisition.
    pub source: Option<LotId>,
}

impl Lot {
    /// Create a new open, parentless lot.
    pub fn new(
        id: LotId,
        account: impl Into<Ident>,
        security: impl Into<Ident>,
        shares: Decimal,
        cost_basis: Decimal,
        acquired: NaiveDate,
        created_by: TxnRef,
    ) -> Self {
        Self {
            id,
            account: account.into(),
            security: security.into(),
            shares,
            cost_basis,
            acquired,
            created_by,
            disposed_by: None,
            source: None,
        }
    }

    /// Derive an open successor of this lot.
    ///
    /// The successor keeps the acquisition date and security and records
    /// this lot as its source.
    pub fn derive(
        &self,
        id: LotId,
        account: Ident,
        shares: Decimal,
        cost_basis: Decimal,
        created_by: TxnRef,
    ) -> Self {
        Self {
            id,
            account,
            security: self.security.clone(),
            shares,
            cost_basis,
            acquired: self.acquired,
            created_by,
            disposed_by: None,
            source: Some(self.id),
        }
    }

    /// Whether the lot is still open.
    pub const fn is_open(&self) -> bool {
        self.disposed_by.is_none()
    }

    /// Whether the lot is open and held by `account`.
    pub fn is_open_in(&self, account: &str) -> bool {
        self.is_open() && self.account == account
    }

    /// Cost basis per share.
    pub fn cost_per_share(&self) -> Decimal {
        if self.shares.is_zero() {
            Decimal::ZERO
        } else {
            self.cost_basis / self.shares
        }
    }

    /// Cost basis attributable to `shares` of this lot.
    ///
    /// Computed as a proportion of the total cost so that splitting a lot
    /// does not accumulate per-share rounding.
    pub fn cost_of(&self, shares: Decimal) -> Decimal {
        if self.shares.is_zero() || shares == self.shares {
            self.cost_basis
        } else {
            self.cost_basis * shares / self.shares
        }
    }
}

impl fmt::Display for Lot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} sh {} cost {} acquired {}",
            self.id, self.account, self.shares, self.security, self.cost_basis, self.acquired
        )?;
        match self.disposed_by {
            None => write!(f, " [open]"),
            Some(txn) => write!(f, " [closed by {txn}]"),
        }
    }
}
