//! Securities and their transaction streams.

use std::collections::BTreeMap;

use crate::{Ident, InvestmentTransaction};

/// A tradable security with its full transaction list.
///
/// The list is in no particular order; ordering is the allocator's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Security {
    /// Security id (symbol).
    pub id: Ident,
    /// Every transaction of this security, across all accounts.
    pub transactions: Vec<InvestmentTransaction>,
}

impl Security {
    /// Create a security with no transactions.
    pub fn new(id: impl Into<Ident>) -> Self {
        Self {
            id: id.into(),
            transactions: Vec::new(),
        }
    }

    /// Add a transaction.
    #[must_use]
    pub fn with_transaction(mut self, txn: InvestmentTransaction) -> Self {
        self.transactions.push(txn);
        self
    }

    /// Look up a transaction by id.
    pub fn transaction(&self, id: crate::TxnId) -> Option<&InvestmentTransaction> {
        self.transactions.iter().find(|txn| txn.id == id)
    }
}

/// Group a flat transaction list into securities, sorted by security id.
pub fn group_by_security(
    transactions: impl IntoIterator<Item = InvestmentTransaction>,
) -> Vec<Security> {
    let mut grouped: BTreeMap<Ident, Vec<InvestmentTransaction>> = BTreeMap::new();
    for txn in transactions {
        grouped.entry(txn.security.clone()).or_default().push(txn);
    }
    grouped
        .into_iter()
        .map(|(id, transactions)| Security { id, transactions })
        .collect()
}
