//! Read-only audit of allocated tax lots.
//!
//! Nothing here mutates a lot store; the audit exists to verify and debug the
//! allocator's output:
//!
//! - [`lot_tree`] - genealogy of every lot, roots first
//! - [`balance_timeline`] - running open-share balance per account
//! - [`check`] - structural invariants, reported as [`Finding`]s
//!
//! # Finding Codes
//!
//! | Code | Description |
//! |------|-------------|
//! | A001 | Children do not conserve the parent's shares |
//! | A002 | Children do not conserve the parent's cost basis |
//! | A003 | Acquisition date differs from the source lot |
//! | A004 | Final open shares differ from the transaction balance |
//! | A005 | Open lot with non-positive shares |
//! | A006 | Lot refers to a source lot that does not exist |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod balance;
mod tree;

pub use balance::{balance_timeline, BalancePoint, BalanceTimeline};
pub use tree::lot_tree;

use lotledger_core::{Ident, Lot, LotId, LotStore, Security, ShareEffect, TxnRef};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

/// Audit finding codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FindingCode {
    /// A001: Children's shares differ from the parent's (scaled for splits).
    SharesNotConserved,
    /// A002: Children's cost basis differs from the parent's.
    CostNotConserved,
    /// A003: Acquisition date changed along a lineage.
    AcquisitionDateDrift,
    /// A004: Final open shares differ from the raw transaction balance.
    FinalBalanceMismatch,
    /// A005: Open lot holding zero or negative shares.
    NonPositiveOpenLot,
    /// A006: Source lot reference does not resolve.
    DanglingSource,
}

impl FindingCode {
    /// Get the finding code string (e.g., "A001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SharesNotConserved => "A001",
            Self::CostNotConserved => "A002",
            Self::AcquisitionDateDrift => "A003",
            Self::FinalBalanceMismatch => "A004",
            Self::NonPositiveOpenLot => "A005",
            Self::DanglingSource => "A006",
        }
    }
}

impl std::fmt::Display for FindingCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for FindingCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// An audit finding.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("[{code}] {message}")]
pub struct Finding {
    /// Finding code.
    pub code: FindingCode,
    /// Human-readable description.
    pub message: String,
    /// Lot the finding is about, if any.
    pub lot: Option<LotId>,
    /// Account the finding is about, if any.
    pub account: Option<Ident>,
}

impl Finding {
    /// Create a new finding.
    #[must_use]
    pub fn new(code: FindingCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            lot: None,
            account: None,
        }
    }

    /// Attach the lot this finding is about.
    #[must_use]
    pub const fn with_lot(mut self, lot: LotId) -> Self {
        self.lot = Some(lot);
        self
    }

    /// Attach the account this finding is about.
    #[must_use]
    pub fn with_account(mut self, account: Ident) -> Self {
        self.account = Some(account);
        self
    }
}

/// Check a finished lot store against its security's transactions.
///
/// Findings are returned in code order, then lot order.
pub fn check(security: &Security, store: &LotStore, tolerance: Decimal) -> Vec<Finding> {
    let mut findings = Vec::new();
    check_lineage(store, &mut findings);
    check_conservation(security, store, tolerance, &mut findings);
    check_open_lots(store, &mut findings);
    check_final_balance(security, store, tolerance, &mut findings);

    findings.sort_by_key(|finding| (finding.code, finding.lot));
    debug!(security = %security.id, findings = findings.len(), "audit complete");
    findings
}

fn check_lineage(store: &LotStore, findings: &mut Vec<Finding>) {
    for lot in store.lots() {
        let Some(source) = lot.source else {
            continue;
        };
        match store.get(source) {
            None => findings.push(
                Finding::new(
                    FindingCode::DanglingSource,
                    format!("{} refers to missing source lot {source}", lot.id),
                )
                .with_lot(lot.id),
            ),
            Some(parent) if parent.acquired != lot.acquired => findings.push(
                Finding::new(
                    FindingCode::AcquisitionDateDrift,
                    format!(
                        "{} acquired {} but its source {} was acquired {}",
                        lot.id, lot.acquired, parent.id, parent.acquired
                    ),
                )
                .with_lot(lot.id),
            ),
            Some(_) => {}
        }
    }
}

fn check_conservation(
    security: &Security,
    store: &LotStore,
    tolerance: Decimal,
    findings: &mut Vec<Finding>,
) {
    for (parent, children) in store.child_index() {
        let Some(parent) = store.get(parent) else {
            continue;
        };
        let children: Vec<&Lot> = children.iter().filter_map(|id| store.get(*id)).collect();
        let ratio = parent
            .disposed_by
            .and_then(|by| split_ratio(security, store, by))
            .unwrap_or(Decimal::ONE);

        let expected = parent.shares * ratio;
        let shares: Decimal = children.iter().map(|lot| lot.shares).sum();
        if (shares - expected).abs() > tolerance {
            findings.push(
                Finding::new(
                    FindingCode::SharesNotConserved,
                    format!("children of {} hold {shares} shares, expected {expected}", parent.id),
                )
                .with_lot(parent.id),
            );
        }

        let cost: Decimal = children.iter().map(|lot| lot.cost_basis).sum();
        if (cost - parent.cost_basis).abs() > tolerance {
            findings.push(
                Finding::new(
                    FindingCode::CostNotConserved,
                    format!(
                        "children of {} carry cost {cost}, expected {}",
                        parent.id, parent.cost_basis
                    ),
                )
                .with_lot(parent.id),
            );
        }
    }
}

/// Split ratio of the transaction that closed a lot, if it was a split.
fn split_ratio(security: &Security, store: &LotStore, by: TxnRef) -> Option<Decimal> {
    match by {
        TxnRef::Synthetic(id) => store.synthetic_txn(id).map(|txn| txn.ratio),
        TxnRef::Ledger(id) => security
            .transaction(id)
            .filter(|txn| txn.effect() == ShareEffect::Split)
            .map(|txn| txn.quantity),
    }
}

fn check_open_lots(store: &LotStore, findings: &mut Vec<Finding>) {
    for lot in store.open_lots().filter(|lot| lot.shares <= Decimal::ZERO) {
        findings.push(
            Finding::new(
                FindingCode::NonPositiveOpenLot,
                format!("{} is open with {} shares", lot.id, lot.shares),
            )
            .with_lot(lot.id)
            .with_account(lot.account.clone()),
        );
    }
}

fn check_final_balance(
    security: &Security,
    store: &LotStore,
    tolerance: Decimal,
    findings: &mut Vec<Finding>,
) {
    let expected = balance::expected_balances(security);
    let mut accounts: BTreeSet<Ident> = store.open_accounts();
    accounts.extend(expected.keys().cloned());

    for account in accounts {
        let want = expected.get(&account).copied().unwrap_or_default();
        let have = store.open_shares(&account);
        if (want - have).abs() > tolerance {
            findings.push(
                Finding::new(
                    FindingCode::FinalBalanceMismatch,
                    format!("{account}: open lots hold {have} shares, transactions leave {want}"),
                )
                .with_account(account),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lotledger_booking::{allocate, AllocatorOptions};
    use lotledger_core::{Action, InvestmentTransaction, Placement, TxnId};
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn buy(id: u64, day: u32, account: &str, qty: Decimal) -> InvestmentTransaction {
        InvestmentTransaction::new(TxnId(id), date(2024, 5, day), account, "VTI", Action::Buy, qty)
            .with_price(dec!(3))
    }

    #[test]
    fn test_allocated_store_is_clean() {
        let security = Security::new("VTI")
            .with_transaction(buy(1, 1, "A", dec!(10)))
            .with_transaction(buy(2, 2, "B", dec!(7)))
            .with_transaction(InvestmentTransaction::new(
                TxnId(3),
                date(2024, 5, 3),
                "A",
                "VTI",
                Action::StkSplit,
                dec!(3),
            ))
            .with_transaction(InvestmentTransaction::new(
                TxnId(4),
                date(2024, 5, 4),
                "B",
                "VTI",
                Action::Sell,
                dec!(-4),
            ));
        let store = allocate(&security, &AllocatorOptions::default())
            .unwrap()
            .store;
        assert!(check(&security, &store, dec!(0.001)).is_empty());
    }

    #[test]
    fn test_final_balance_mismatch() {
        let security = Security::new("VTI").with_transaction(buy(1, 1, "A", dec!(10)));
        let store = LotStore::new("VTI");

        let findings = check(&security, &store, dec!(0.001));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, FindingCode::FinalBalanceMismatch);
        assert_eq!(findings[0].account.as_deref(), Some("A"));
        assert_eq!(
            findings[0].to_string(),
            "[A004] A: open lots hold 0 shares, transactions leave 10"
        );
    }

    #[test]
    fn test_broken_lineage_detected() {
        let security = Security::new("VTI").with_transaction(buy(1, 1, "A", dec!(10)));
        let mut store = LotStore::new("VTI");
        let by = TxnRef::Ledger(TxnId(9));
        let parent = Lot::new(
            store.next_lot_id(),
            "A",
            "VTI",
            dec!(10),
            dec!(30),
            date(2024, 5, 1),
            TxnRef::Ledger(TxnId(1)),
        );
        store.insert(parent.clone(), Placement::ByAcquisition).unwrap();
        store.close(LotId(0), by).unwrap();

        // Loses a share and a day, and points at a lot that was never created.
        let mut child = parent.derive(store.next_lot_id(), parent.account.clone(), dec!(9), dec!(30), by);
        child.acquired = date(2024, 5, 2);
        store.insert(child, Placement::After(LotId(0))).unwrap();
        let mut orphan = parent.derive(store.next_lot_id(), parent.account.clone(), dec!(1), dec!(0), by);
        orphan.source = Some(LotId(42));
        store.insert(orphan, Placement::After(LotId(1))).unwrap();

        let codes: Vec<&str> = check(&security, &store, dec!(0.001))
            .iter()
            .map(|finding| finding.code.code())
            .collect();
        assert_eq!(codes, ["A001", "A003", "A006"]);
    }

    #[test]
    fn test_non_positive_open_lot() {
        let security = Security::new("VTI");
        let mut store = LotStore::new("VTI");
        let lot = Lot::new(
            store.next_lot_id(),
            "A",
            "VTI",
            dec!(0),
            dec!(0),
            date(2024, 5, 1),
            TxnRef::Ledger(TxnId(1)),
        );
        store.insert(lot, Placement::ByAcquisition).unwrap();

        let findings = check(&security, &store, dec!(0.001));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, FindingCode::NonPositiveOpenLot);
        assert_eq!(findings[0].lot, Some(LotId(0)));
    }

    #[test]
    fn test_finding_serializes_code_string() {
        let finding = Finding::new(FindingCode::DanglingSource, "gone").with_lot(LotId(3));
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["code"], "A006");
        assert_eq!(json["lot"], 3);
    }
}
