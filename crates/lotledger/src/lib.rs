//! Tax-lot reconstruction CLI.
//!
//! This crate provides the `lotledger` command, which reads a JSON handoff
//! file of already-linked investment transactions, allocates every security
//! to tax lots and prints one of several reports:
//!
//! - `lots`: every lot, open and closed
//! - `tree`: lot genealogy
//! - `balances`: running open-share balance per account
//! - `check`: invariant audit of the allocated lots
//!
//! # Example Usage
//!
//! ```bash
//! lotledger transactions.json lots
//! lotledger transactions.json check --format json
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
pub mod input;
