//! Investment transactions and the references lots keep to them.
//!
//! [`InvestmentTransaction`]s are supplied by the loading pipeline and never
//! change once constructed. The allocator may additionally generate
//! [`SyntheticTransaction`]s (for example the per-account effect of a stock
//! split recorded in only one account); those belong to the lot store and are
//! never part of the user-visible ledger.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Action, Ident, ShareEffect};

/// Identifier of a ledger transaction, unique within one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnId(pub u64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// An investment transaction as handed over by the loading pipeline.
///
/// Counterpart links must already have been established by the transfer
/// matching pass; a transaction with links is one leg of a transfer event.
///
/// # Examples
///
/// ```
/// use lotledger_core::{Action, InvestmentTransaction, ShareEffect, TxnId};
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let buy = InvestmentTransaction::new(
///     TxnId(1),
///     NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
///     "Brokerage",
///     "VTI",
///     Action::Buy,
///     dec!(100),
/// )
/// .with_price(dec!(10));
///
/// assert_eq!(buy.effect(), ShareEffect::NewShares);
/// assert_eq!(buy.cost(), dec!(1000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestmentTransaction {
    /// Unique id within the load.
    pub id: TxnId,
    /// Transaction date.
    pub date: NaiveDate,
    /// Account holding the shares.
    pub account: Ident,
    /// Security traded.
    pub security: Ident,
    /// Recorded action.
    pub action: Action,
    /// Signed share quantity. For splits, the split ratio.
    pub quantity: Decimal,
    /// Price per share.
    #[serde(default)]
    pub price: Decimal,
    /// Counterpart transactions forming the same transfer event.
    #[serde(default)]
    pub links: Vec<TxnId>,
}

impl InvestmentTransaction {
    /// Create a transaction without price or links.
    pub fn new(
        id: TxnId,
        date: NaiveDate,
        account: impl Into<Ident>,
        security: impl Into<Ident>,
        action: Action,
        quantity: Decimal,
    ) -> Self {
        Self {
            id,
            date,
            account: account.into(),
            security: security.into(),
            action,
            quantity,
            price: Decimal::ZERO,
            links: Vec::new(),
        }
    }

    /// Set the per-share price.
    #[must_use]
    pub const fn with_price(mut self, price: Decimal) -> Self {
        self.price = price;
        self
    }

    /// Add a counterpart link.
    #[must_use]
    pub fn with_link(mut self, other: TxnId) -> Self {
        self.links.push(other);
        self
    }

    /// The share effect of this transaction.
    pub const fn effect(&self) -> ShareEffect {
        self.action.share_effect(!self.links.is_empty())
    }

    /// Whether this transaction takes shares out of its account.
    pub const fn removes_shares(&self) -> bool {
        self.action.removes_shares()
    }

    /// Unsigned share count moved by this transaction.
    pub fn shares(&self) -> Decimal {
        self.quantity.abs()
    }

    /// Change in the holding account's share balance, ignoring splits.
    pub fn balance_delta(&self) -> Decimal {
        if self.action.adds_shares() {
            self.shares()
        } else if self.action.removes_shares() {
            -self.shares()
        } else {
            Decimal::ZERO
        }
    }

    /// Total cost of acquired shares (`shares * price`).
    pub fn cost(&self) -> Decimal {
        self.shares() * self.price
    }
}

impl fmt::Display for InvestmentTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.id, self.date, self.account, self.action, self.quantity, self.security
        )
    }
}

/// Identifier of an allocator-generated transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyntheticId(pub u32);

impl fmt::Display for SyntheticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// What a synthetic transaction stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyntheticKind {
    /// A stock split applied to an account other than the recording one.
    Split,
}

/// A transaction generated by the allocator, never shown as a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticTransaction {
    /// Identifier within the owning lot store.
    pub id: SyntheticId,
    /// What this transaction represents.
    pub kind: SyntheticKind,
    /// Effective date, copied from the originating transaction.
    pub date: NaiveDate,
    /// Account the synthetic transaction acts on.
    pub account: Ident,
    /// Split ratio for [`SyntheticKind::Split`].
    pub ratio: Decimal,
    /// The ledger transaction this was generated from.
    pub origin: TxnId,
}

/// Reference from a lot to the transaction that created or closed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TxnRef {
    /// A transaction from the input ledger.
    Ledger(TxnId),
    /// An allocator-generated transaction.
    Synthetic(SyntheticId),
}

impl TxnRef {
    /// The ledger id, if this is a ledger transaction.
    pub const fn ledger(self) -> Option<TxnId> {
        match self {
            Self::Ledger(id) => Some(id),
            Self::Synthetic(_) => None,
        }
    }

    /// Whether this references a synthetic transaction.
    pub const fn is_synthetic(self) -> bool {
        matches!(self, Self::Synthetic(_))
    }
}

impl From<TxnId> for TxnRef {
    fn from(id: TxnId) -> Self {
        Self::Ledger(id)
    }
}

impl fmt::Display for TxnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ledger(id) => write!(f, "{id}"),
            Self::Synthetic(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_balance_delta_ignores_recorded_sign() {
        let sell_negative = InvestmentTransaction::new(
            TxnId(1),
            date(2024, 1, 1),
            "A",
            "VTI",
            Action::Sell,
            dec!(-40),
        );
        let sell_positive = InvestmentTransaction::new(
            TxnId(2),
            date(2024, 1, 1),
            "A",
            "VTI",
            Action::Sell,
            dec!(40),
        );
        assert_eq!(sell_negative.balance_delta(), dec!(-40));
        assert_eq!(sell_positive.balance_delta(), dec!(-40));
    }

    #[test]
    fn test_links_turn_shares_out_into_transfer() {
        let txn = InvestmentTransaction::new(
            TxnId(3),
            date(2024, 1, 1),
            "A",
            "VTI",
            Action::ShrsOut,
            dec!(30),
        );
        assert_eq!(txn.effect(), ShareEffect::DisposeShares);
        assert_eq!(txn.with_link(TxnId(4)).effect(), ShareEffect::TransferOut);
    }

    #[test]
    fn test_split_has_no_balance_delta() {
        let split = InvestmentTransaction::new(
            TxnId(5),
            date(2024, 6, 1),
            "A",
            "VTI",
            Action::StkSplit,
            dec!(2),
        );
        assert_eq!(split.balance_delta(), Decimal::ZERO);
        assert_eq!(split.effect(), ShareEffect::Split);
    }

    #[test]
    fn test_txn_ref_display() {
        assert_eq!(TxnRef::Ledger(TxnId(7)).to_string(), "T7");
        assert_eq!(TxnRef::Synthetic(SyntheticId(2)).to_string(), "S2");
        assert!(TxnRef::Synthetic(SyntheticId(2)).is_synthetic());
    }

    #[test]
    fn test_deserialize_defaults_price_and_links() {
        let json = r#"{"id":9,"date":"2024-03-01","account":"A","security":"VTI","action":"Buy","quantity":"10"}"#;
        let txn: InvestmentTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(txn.id, TxnId(9));
        assert_eq!(txn.price, Decimal::ZERO);
        assert!(txn.links.is_empty());
    }
}
