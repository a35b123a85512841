//! Running open-share balances.
//!
//! A timeline is computed twice over: once from the lot store (which lots
//! were open at the end of each transaction date) and once from the raw
//! transaction quantities. The two must agree at every point.

use chrono::NaiveDate;
use lotledger_booking::order::order_transactions;
use lotledger_core::{
    Ident, InvestmentTransaction, Lot, LotStore, Security, ShareEffect, TxnId, TxnRef,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Balances at the end of one transaction date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancePoint {
    /// The date.
    pub date: NaiveDate,
    /// Open lot shares per account.
    pub accounts: BTreeMap<Ident, Decimal>,
    /// Running balance per account from raw transaction quantities.
    pub expected: BTreeMap<Ident, Decimal>,
}

impl BalancePoint {
    /// Open lot shares across all accounts.
    pub fn total(&self) -> Decimal {
        self.accounts.values().sum()
    }

    /// Accounts whose open lots differ from the running balance by more than
    /// `tolerance`, with `(expected, actual)`.
    pub fn drift(&self, tolerance: Decimal) -> Vec<(&Ident, Decimal, Decimal)> {
        let accounts: BTreeSet<&Ident> = self.accounts.keys().chain(self.expected.keys()).collect();
        accounts
            .into_iter()
            .filter_map(|account| {
                let expected = self.expected.get(account).copied().unwrap_or_default();
                let actual = self.accounts.get(account).copied().unwrap_or_default();
                ((expected - actual).abs() > tolerance).then_some((account, expected, actual))
            })
            .collect()
    }
}

/// Running balance of one security.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceTimeline {
    /// Security id.
    pub security: Ident,
    /// One point per transaction date, ascending.
    pub points: Vec<BalancePoint>,
    /// Open lot shares per account once every transaction is applied.
    pub final_balance: BTreeMap<Ident, Decimal>,
}

impl BalanceTimeline {
    /// Total open shares once every transaction is applied.
    pub fn final_total(&self) -> Decimal {
        self.final_balance.values().sum()
    }
}

/// Build the running open-share balance of `security` from its lot store.
pub fn balance_timeline(security: &Security, store: &LotStore) -> BalanceTimeline {
    let dates: HashMap<TxnId, NaiveDate> = security
        .transactions
        .iter()
        .map(|txn| (txn.id, txn.date))
        .collect();
    let txn_date = |txn: TxnRef| match txn {
        TxnRef::Ledger(id) => dates.get(&id).copied(),
        TxnRef::Synthetic(id) => store.synthetic_txn(id).map(|s| s.date),
    };

    let mut accounts: BTreeSet<Ident> = store.lots().map(|lot| lot.account.clone()).collect();
    accounts.extend(security.transactions.iter().map(|txn| txn.account.clone()));

    let points = running_balances(security)
        .into_iter()
        .map(|(date, expected)| {
            let mut held: BTreeMap<Ident, Decimal> = accounts
                .iter()
                .map(|account| (account.clone(), Decimal::ZERO))
                .collect();
            for lot in store.lots().filter(|lot| open_at(lot, date, &txn_date)) {
                *held.entry(lot.account.clone()).or_default() += lot.shares;
            }
            BalancePoint {
                date,
                accounts: held,
                expected,
            }
        })
        .collect();

    let final_balance = accounts
        .iter()
        .map(|account| (account.clone(), store.open_shares(account)))
        .collect();

    BalanceTimeline {
        security: security.id.clone(),
        points,
        final_balance,
    }
}

/// Whether `lot` was open at the end of `date`.
fn open_at(lot: &Lot, date: NaiveDate, txn_date: &impl Fn(TxnRef) -> Option<NaiveDate>) -> bool {
    let created = txn_date(lot.created_by).is_some_and(|created| created <= date);
    let closed = lot
        .disposed_by
        .and_then(txn_date)
        .is_some_and(|closed| closed <= date);
    created && !closed
}

/// Running per-account balance after each transaction date, from raw
/// quantities in processing order.
pub fn running_balances(security: &Security) -> Vec<(NaiveDate, BTreeMap<Ident, Decimal>)> {
    let mut balances: BTreeMap<Ident, Decimal> = BTreeMap::new();
    let mut points: Vec<(NaiveDate, BTreeMap<Ident, Decimal>)> = Vec::new();

    for txn in order_transactions(&security.transactions) {
        apply(&mut balances, txn);
        match points.last_mut() {
            Some((date, snapshot)) if *date == txn.date => snapshot.clone_from(&balances),
            _ => points.push((txn.date, balances.clone())),
        }
    }
    points
}

/// Per-account balance once every transaction of `security` is applied.
pub fn expected_balances(security: &Security) -> BTreeMap<Ident, Decimal> {
    running_balances(security)
        .pop()
        .map(|(_, balances)| balances)
        .unwrap_or_default()
}

fn apply(balances: &mut BTreeMap<Ident, Decimal>, txn: &InvestmentTransaction) {
    if txn.effect() == ShareEffect::Split {
        for balance in balances.values_mut() {
            *balance *= txn.quantity;
        }
    } else {
        *balances.entry(txn.account.clone()).or_default() += txn.balance_delta();
    }
}
