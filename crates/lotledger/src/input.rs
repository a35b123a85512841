//! Loading transaction handoff files.
//!
//! The input is a JSON document produced by the loading pipeline once
//! counterpart links between transfer legs have been established:
//!
//! ```json
//! {
//!   "options": { "tolerance": "0.001", "verify_balances": true },
//!   "transactions": [
//!     { "id": 1, "date": "2024-01-02", "account": "Brokerage", "security": "VTI",
//!       "action": "Buy", "quantity": "100", "price": "10", "links": [] }
//!   ]
//! }
//! ```
//!
//! `options`, `price` and `links` may be omitted.

use anyhow::{Context, Result};
use lotledger_booking::AllocatorOptions;
use lotledger_core::{IdentInterner, InvestmentTransaction};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// A parsed input document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Input {
    /// Allocator options embedded in the file.
    #[serde(default)]
    pub options: Option<AllocatorOptions>,
    /// Every transaction, across securities and accounts.
    pub transactions: Vec<InvestmentTransaction>,
}

impl Input {
    /// Parse an input document from a JSON string.
    pub fn parse(source: &str) -> Result<Self> {
        let mut input: Self = serde_json::from_str(source)?;
        input.check_unique_ids()?;
        input.reintern();
        Ok(input)
    }

    /// Share account and security names between transactions.
    ///
    /// Returns the number of names that were deduplicated.
    pub fn reintern(&mut self) -> usize {
        let mut interner = IdentInterner::new();
        let mut seen = 0;
        for txn in &mut self.transactions {
            txn.account = interner.intern(&txn.account);
            txn.security = interner.intern(&txn.security);
            seen += 2;
        }
        seen - interner.len()
    }

    fn check_unique_ids(&self) -> Result<()> {
        let mut ids = BTreeSet::new();
        for txn in &self.transactions {
            if !ids.insert(txn.id) {
                anyhow::bail!("duplicate transaction id {}", txn.id);
            }
        }
        Ok(())
    }
}

/// Load an input document from `path`.
pub fn load(path: &Path) -> Result<Input> {
    if !path.exists() {
        anyhow::bail!("file not found: {}", path.display());
    }
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Input::parse(&source).with_context(|| format!("failed to parse {}", path.display()))
}
