//! Tax-lot allocation engine.
//!
//! This crate reconstructs, for each security, the set of tax lots implied by
//! its transaction history:
//!
//! - [`order`] - processing order, split de-duplication, transfer clustering
//! - [`select`] - oldest-first pulling and exact-size lot choice
//! - [`step`] - staged, all-or-nothing changes to a lot store
//! - [`LotAllocator`] - the dispatcher walking one security's stream
//!
//! Allocation is a one-shot, single-threaded batch pass. Counterpart links
//! between transfer legs must already be populated on the input.
//!
//! # Example
//!
//! ```
//! use lotledger_booking::{allocate, AllocatorOptions};
//! use lotledger_core::{Action, InvestmentTransaction, Security, TxnId};
//! use rust_decimal_macros::dec;
//! use chrono::NaiveDate;
//!
//! let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
//! let security = Security::new("VTI")
//!     .with_transaction(
//!         InvestmentTransaction::new(TxnId(1), d(1), "Brokerage", "VTI", Action::Buy, dec!(100))
//!             .with_price(dec!(10)),
//!     )
//!     .with_transaction(
//!         InvestmentTransaction::new(TxnId(2), d(9), "Brokerage", "VTI", Action::Sell, dec!(-40)),
//!     );
//!
//! let outcome = allocate(&security, &AllocatorOptions::default()).unwrap();
//! assert_eq!(outcome.store.open_shares("Brokerage"), dec!(60));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod allocator;
mod error;
mod options;
pub mod order;
pub mod select;
pub mod step;

pub use allocator::{AllocationOutcome, LotAllocator};
pub use error::{AllocationError, OpenLotSummary};
pub use options::{AllocatorOptions, DEFAULT_TOLERANCE};

use lotledger_core::{Ident, Security};
use std::collections::BTreeMap;
use tracing::error;

/// Allocate one security's transactions to lots with a fresh lot store.
pub fn allocate(
    security: &Security,
    options: &AllocatorOptions,
) -> Result<AllocationOutcome, AllocationError> {
    LotAllocator::new(security, options).run()
}

/// Per-security results of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Result for every security, keyed by security id.
    pub results: BTreeMap<Ident, Result<AllocationOutcome, AllocationError>>,
}

impl BatchOutcome {
    /// Whether every security allocated successfully.
    pub fn is_success(&self) -> bool {
        self.results.values().all(Result::is_ok)
    }

    /// Securities whose allocation failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&Ident, &AllocationError)> {
        self.results
            .iter()
            .filter_map(|(id, result)| result.as_ref().err().map(|err| (id, err)))
    }

    /// Securities that allocated successfully.
    pub fn successes(&self) -> impl Iterator<Item = (&Ident, &AllocationOutcome)> {
        self.results
            .iter()
            .filter_map(|(id, result)| result.as_ref().ok().map(|outcome| (id, outcome)))
    }
}

/// Allocate every security independently, in security id order.
///
/// A fatal error aborts only the security it occurred in; it is reported in
/// the returned [`BatchOutcome`] and logged.
pub fn allocate_all(securities: &[Security], options: &AllocatorOptions) -> BatchOutcome {
    let mut ordered: Vec<&Security> = securities.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    let mut outcome = BatchOutcome::default();
    for security in ordered {
        let result = allocate(security, options);
        if let Err(err) = &result {
            error!(security = %security.id, "allocation failed: {err}");
        }
        outcome.results.insert(security.id.clone(), result);
    }
    outcome
}
