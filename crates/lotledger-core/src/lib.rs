//! Core types for lotledger
//!
//! This crate provides the data model shared by the allocator and the audit
//! tools:
//!
//! - [`Ident`] - Interned account and security identifiers
//! - [`Action`] / [`ShareEffect`] - Recorded actions and their classification
//! - [`InvestmentTransaction`] - An immutable transaction from the ledger
//! - [`SyntheticTransaction`] - An allocator-generated transaction
//! - [`Lot`] - A tax lot with acquisition date and cost basis
//! - [`LotStore`] - The arena of every lot created for one security
//! - [`Security`] - A security and its transaction stream
//!
//! # Example
//!
//! ```
//! use lotledger_core::{Lot, LotStore, Placement, TxnId, TxnRef};
//! use rust_decimal_macros::dec;
//! use chrono::NaiveDate;
//!
//! let mut store = LotStore::new("VTI");
//! let lot = Lot::new(
//!     store.next_lot_id(),
//!     "Brokerage",
//!     "VTI",
//!     dec!(100),
//!     dec!(1000),
//!     NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
//!     TxnRef::Ledger(TxnId(1)),
//! );
//! store.insert(lot, Placement::ByAcquisition).unwrap();
//!
//! assert_eq!(store.open_shares("Brokerage"), dec!(100));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod ident;
pub mod lot;
pub mod security;
pub mod store;
pub mod transaction;

pub use action::{Action, ShareEffect};
pub use ident::{Ident, IdentInterner};
pub use lot::{Lot, LotId};
pub use security::{group_by_security, Security};
pub use store::{LotStore, Placement, StoreError, TxnLots};
pub use transaction::{
    InvestmentTransaction, SyntheticId, SyntheticKind, SyntheticTransaction, TxnId, TxnRef,
};

// Re-export commonly used external types
pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;
