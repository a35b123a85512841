//! End-to-end allocation scenarios.
//!
//! Each test feeds a small transaction history through the allocator and
//! checks the exact lot structure it produces.

use chrono::NaiveDate;
use lotledger_booking::order::{group_events, order_transactions};
use lotledger_booking::{allocate, AllocationError, AllocatorOptions, LotAllocator};
use lotledger_core::{
    Action, InvestmentTransaction, Lot, LotId, LotStore, Security, TxnId, TxnRef,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn txn(id: u64, day: u32, account: &str, action: Action, qty: Decimal) -> InvestmentTransaction {
    InvestmentTransaction::new(TxnId(id), date(2024, 3, day), account, "VTI", action, qty)
}

fn security(txns: Vec<InvestmentTransaction>) -> Security {
    txns.into_iter()
        .fold(Security::new("VTI"), Security::with_transaction)
}

fn lot(store: &LotStore, id: u32) -> &Lot {
    store.get(LotId(id)).unwrap()
}

fn by(id: u64) -> Option<TxnRef> {
    Some(TxnRef::Ledger(TxnId(id)))
}

#[test]
fn test_partial_sale_splits_lot() {
    let security = security(vec![
        txn(1, 1, "Brokerage", Action::Buy, dec!(100)).with_price(dec!(10)),
        txn(2, 20, "Brokerage", Action::Sell, dec!(-40)).with_price(dec!(12)),
    ]);
    let outcome = allocate(&security, &AllocatorOptions::default()).unwrap();
    let store = &outcome.store;

    assert_eq!(store.len(), 3);
    let parent = lot(store, 0);
    assert_eq!(parent.disposed_by, by(2));

    let children = store.children(LotId(0));
    assert_eq!(children.len(), 2);
    let (sold, kept) = (children[0], children[1]);
    assert_eq!((sold.shares, sold.cost_basis), (dec!(40), dec!(400)));
    assert_eq!(sold.disposed_by, by(2));
    assert_eq!((kept.shares, kept.cost_basis), (dec!(60), dec!(600)));
    assert!(kept.is_open());

    for child in children {
        assert_eq!(child.acquired, date(2024, 3, 1));
        assert_eq!(child.account, "Brokerage");
        assert_eq!(child.created_by, TxnRef::Ledger(TxnId(2)));
    }

    assert_eq!(store.order(), [LotId(0), LotId(1), LotId(2)]);
    let touched = store.txn_lots(TxnId(2)).unwrap();
    assert_eq!(touched.created, [LotId(1), LotId(2)]);
    assert_eq!(touched.closed, [LotId(0), LotId(1)]);
}

#[test]
fn test_split_applies_to_every_account() {
    let security = security(vec![
        txn(1, 1, "Brokerage", Action::Buy, dec!(50)).with_price(dec!(20)),
        txn(2, 2, "IRA", Action::Buy, dec!(50)).with_price(dec!(22)),
        txn(3, 15, "Brokerage", Action::StkSplit, dec!(2)),
        // Recorded again by the second account; dropped as a duplicate.
        txn(4, 15, "IRA", Action::StkSplit, dec!(2)),
    ]);
    let outcome = allocate(&security, &AllocatorOptions::default()).unwrap();
    let store = &outcome.store;

    assert!(!lot(store, 0).is_open());
    assert!(!lot(store, 1).is_open());

    let brokerage: Vec<&Lot> = store.open_lots_in("Brokerage").collect();
    let ira: Vec<&Lot> = store.open_lots_in("IRA").collect();
    assert_eq!(brokerage.len(), 1);
    assert_eq!(ira.len(), 1);

    assert_eq!(brokerage[0].shares, dec!(100));
    assert_eq!(brokerage[0].cost_basis, dec!(1000));
    assert_eq!(brokerage[0].acquired, date(2024, 3, 1));
    assert_eq!(brokerage[0].source, Some(LotId(0)));

    assert_eq!(ira[0].shares, dec!(100));
    assert_eq!(ira[0].cost_basis, dec!(1100));
    assert_eq!(ira[0].acquired, date(2024, 3, 2));
    assert_eq!(ira[0].source, Some(LotId(1)));

    // Only the recording account's lots reference the ledger split.
    assert_eq!(store.synthetic().len(), 1);
    assert!(store.txn_lots(TxnId(4)).is_none());
}

#[test]
fn test_same_day_transfer_between_accounts() {
    let security = security(vec![
        txn(1, 1, "A", Action::Buy, dec!(100)).with_price(dec!(10)),
        txn(2, 9, "A", Action::ShrsOut, dec!(-30)).with_link(TxnId(3)),
        txn(3, 9, "B", Action::ShrsIn, dec!(30)).with_link(TxnId(2)),
    ]);
    let outcome = allocate(&security, &AllocatorOptions::default()).unwrap();
    let store = &outcome.store;

    assert_eq!(store.len(), 4);
    assert_eq!(lot(store, 0).disposed_by, by(2));

    let moved = lot(store, 1);
    assert_eq!(moved.shares, dec!(30));
    assert_eq!(moved.account, "A");
    assert_eq!(moved.disposed_by, by(2));

    let remainder = lot(store, 2);
    assert_eq!(remainder.shares, dec!(70));
    assert_eq!(remainder.cost_basis, dec!(700));
    assert!(remainder.is_open_in("A"));

    let received = lot(store, 3);
    assert!(received.is_open_in("B"));
    assert_eq!(received.shares, dec!(30));
    assert_eq!(received.cost_basis, dec!(300));
    assert_eq!(received.acquired, date(2024, 3, 1));
    assert_eq!(received.source, Some(LotId(1)));
    assert_eq!(received.created_by, TxnRef::Ledger(TxnId(3)));

    assert_eq!(store.open_shares("A"), dec!(70));
    assert_eq!(store.open_shares("B"), dec!(30));
}

#[test]
fn test_same_day_buy_then_transfer_out() {
    let security = security(vec![
        txn(1, 1, "C", Action::Buy, dec!(10)).with_price(dec!(5)),
        txn(2, 9, "B", Action::ShrsIn, dec!(30)).with_link(TxnId(4)),
        txn(3, 9, "A", Action::Buy, dec!(30)).with_price(dec!(10)),
        txn(4, 9, "A", Action::ShrsOut, dec!(-30)).with_link(TxnId(2)),
        txn(5, 9, "C", Action::Sell, dec!(-10)),
    ]);
    let ordered: Vec<u64> = order_transactions(&security.transactions)
        .iter()
        .map(|txn| txn.id.0)
        .collect();
    assert_eq!(ordered, [1, 5, 3, 4, 2]);

    let outcome = allocate(&security, &AllocatorOptions::default()).unwrap();
    let store = &outcome.store;
    assert_eq!(store.len(), 3);
    assert_eq!(lot(store, 0).disposed_by, by(5));
    assert_eq!(lot(store, 1).disposed_by, by(4));

    let received = lot(store, 2);
    assert!(received.is_open_in("B"));
    assert_eq!(received.shares, dec!(30));
    assert_eq!(received.cost_basis, dec!(300));
    assert_eq!(received.source, Some(LotId(1)));
    assert_eq!(received.created_by, TxnRef::Ledger(TxnId(2)));
    assert_eq!(store.open_shares("A"), Decimal::ZERO);
}

#[test]
fn test_transfer_order_independent_of_input_order() {
    let forward = security(vec![
        txn(1, 1, "A", Action::Buy, dec!(100)).with_price(dec!(10)),
        txn(2, 9, "A", Action::ShrsOut, dec!(-30)).with_link(TxnId(3)),
        txn(3, 9, "B", Action::ShrsIn, dec!(30)).with_link(TxnId(2)),
    ]);
    let mut reversed = forward.clone();
    reversed.transactions.reverse();

    let options = AllocatorOptions::default();
    assert_eq!(
        allocate(&forward, &options).unwrap(),
        allocate(&reversed, &options).unwrap()
    );
}

#[test]
fn test_insufficient_lots_fails_without_mutation() {
    let security = security(vec![
        txn(1, 1, "Brokerage", Action::Buy, dec!(30)).with_price(dec!(10)),
        txn(2, 5, "Brokerage", Action::Sell, dec!(-50)),
    ]);
    let options = AllocatorOptions::default();

    let err = allocate(&security, &options).unwrap_err();
    match &err {
        AllocationError::InsufficientOpenLots {
            account,
            txn,
            required,
            available,
            open_lots,
            ..
        } => {
            assert_eq!(account, "Brokerage");
            assert_eq!(*txn, TxnId(2));
            assert_eq!(*required, dec!(50));
            assert_eq!(*available, dec!(30));
            assert_eq!(open_lots.len(), 1);
            assert_eq!(open_lots[0].lot, LotId(0));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_fatal());

    let ordered = order_transactions(&security.transactions);
    let events = group_events(&security.id, &ordered, options.tolerance).unwrap();
    let mut allocator = LotAllocator::new(&security, &options);
    allocator.process(&events[0]).unwrap();
    let before = allocator.store().clone();

    assert!(allocator.process(&events[1]).is_err());
    assert_eq!(allocator.store(), &before);
}

#[test]
fn test_transfer_shortfall_rejects_whole_cluster() {
    let security = security(vec![
        txn(1, 1, "A", Action::Buy, dec!(20)).with_price(dec!(10)),
        txn(2, 4, "A", Action::ShrsOut, dec!(-30)).with_link(TxnId(3)),
        txn(3, 4, "B", Action::ShrsIn, dec!(30)).with_link(TxnId(2)),
    ]);
    let options = AllocatorOptions::default();
    let ordered = order_transactions(&security.transactions);
    let events = group_events(&security.id, &ordered, options.tolerance).unwrap();
    assert_eq!(events.len(), 2);

    let mut allocator = LotAllocator::new(&security, &options);
    allocator.process(&events[0]).unwrap();
    let err = allocator.process(&events[1]).unwrap_err();
    assert!(matches!(err, AllocationError::InsufficientOpenLots { .. }));
    assert_eq!(allocator.store().len(), 1);
    assert!(allocator.store().open_lots_in("B").next().is_none());
}

#[test]
fn test_sale_spanning_several_lots() {
    let security = security(vec![
        txn(1, 1, "A", Action::Buy, dec!(10)).with_price(dec!(5)),
        txn(2, 2, "A", Action::ReinvDiv, dec!(0.5)).with_price(dec!(6)),
        txn(3, 3, "A", Action::Buy, dec!(10)).with_price(dec!(7)),
        txn(4, 8, "A", Action::Sell, dec!(-15)),
    ]);
    let outcome = allocate(&security, &AllocatorOptions::default()).unwrap();
    let store = &outcome.store;

    // The two oldest lots are taken whole, the third is split.
    assert_eq!(lot(store, 0).disposed_by, by(4));
    assert_eq!(lot(store, 1).disposed_by, by(4));
    assert_eq!(lot(store, 2).disposed_by, by(4));

    let open: Vec<&Lot> = store.open_lots().collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].shares, dec!(5.5));
    assert_eq!(open[0].cost_basis, dec!(38.5));
    assert_eq!(open[0].acquired, date(2024, 3, 3));
}

#[test]
fn test_replay_is_deterministic() {
    let security = security(vec![
        txn(1, 1, "A", Action::Buy, dec!(100)).with_price(dec!(10)),
        txn(2, 2, "B", Action::Buy, dec!(40)).with_price(dec!(11)),
        txn(3, 5, "A", Action::ShrsOut, dec!(-60)).with_link(TxnId(4)),
        txn(4, 5, "B", Action::ShrsIn, dec!(60)).with_link(TxnId(3)),
        txn(5, 9, "B", Action::StkSplit, dec!(1.5)),
        txn(6, 12, "B", Action::Sell, dec!(-75)),
    ]);
    let options = AllocatorOptions::default();
    let first = allocate(&security, &options).unwrap();
    let second = allocate(&security, &options).unwrap();
    assert_eq!(first, second);

    assert_eq!(first.store.open_shares("A"), dec!(60));
    assert_eq!(first.store.open_shares("B"), dec!(75));
}

#[test]
fn test_balance_drift_disabled() {
    let options = AllocatorOptions::default().with_verify_balances(false);
    let security = security(vec![txn(1, 1, "A", Action::Buy, dec!(10))]);
    let outcome = allocate(&security, &options).unwrap();
    assert_eq!(outcome.store.total_open_shares(), dec!(10));
}
