//! Allocation performance benchmarks.
//!
//! Run with: cargo bench -p lotledger-booking

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{Days, NaiveDate};
use lotledger_booking::order::{group_events, order_transactions};
use lotledger_booking::{allocate, AllocatorOptions};
use lotledger_core::{Action, InvestmentTransaction, Security, TxnId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Monthly buys with a partial sale every fourth month.
fn generate_buys_and_sells(num_months: u64) -> Security {
    let mut security = Security::new("VTI");
    let mut id = 0;
    for month in 0..num_months {
        let day = date(2010, 1, 1) + Days::new(month * 30);
        id += 1;
        security.transactions.push(
            InvestmentTransaction::new(TxnId(id), day, "Brokerage", "VTI", Action::Buy, dec!(10))
                .with_price(dec!(50) + Decimal::from(month)),
        );
        if month % 4 == 3 {
            id += 1;
            security.transactions.push(InvestmentTransaction::new(
                TxnId(id),
                day,
                "Brokerage",
                "VTI",
                Action::Sell,
                dec!(-25),
            ));
        }
    }
    security
}

/// Monthly buys with a linked transfer of half the month's shares.
fn generate_transfers(num_months: u64) -> Security {
    let mut security = Security::new("VTI");
    let mut id = 0;
    for month in 0..num_months {
        let day = date(2010, 1, 1) + Days::new(month * 30);
        security.transactions.push(
            InvestmentTransaction::new(TxnId(id + 1), day, "Brokerage", "VTI", Action::Buy, dec!(10))
                .with_price(dec!(50)),
        );
        security.transactions.push(
            InvestmentTransaction::new(TxnId(id + 2), day, "Brokerage", "VTI", Action::ShrsOut, dec!(-5))
                .with_link(TxnId(id + 3)),
        );
        security.transactions.push(
            InvestmentTransaction::new(TxnId(id + 3), day, "IRA", "VTI", Action::ShrsIn, dec!(5))
                .with_link(TxnId(id + 2)),
        );
        id += 3;
    }
    security
}

fn bench_allocate_buys_and_sells(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_buys_and_sells");
    let options = AllocatorOptions::default();

    for months in [12, 120, 600] {
        let security = generate_buys_and_sells(months);
        group.throughput(Throughput::Elements(security.transactions.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(months), &security, |b, security| {
            b.iter(|| black_box(allocate(security, &options)));
        });
    }

    group.finish();
}

fn bench_allocate_transfers(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_transfers");
    let options = AllocatorOptions::default();

    for months in [12, 120, 600] {
        let security = generate_transfers(months);
        group.throughput(Throughput::Elements(security.transactions.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(months), &security, |b, security| {
            b.iter(|| black_box(allocate(security, &options)));
        });
    }

    group.finish();
}

fn bench_group_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_events");

    for months in [120, 600] {
        let security = generate_transfers(months);

        group.bench_with_input(BenchmarkId::from_parameter(months), &security, |b, security| {
            b.iter(|| {
                let ordered = order_transactions(&security.transactions);
                black_box(group_events(&security.id, &ordered, dec!(0.001)))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_allocate_buys_and_sells,
    bench_allocate_transfers,
    bench_group_events,
);
criterion_main!(benches);
