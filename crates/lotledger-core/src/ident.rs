//! Interned identifiers for accounts and securities.
//!
//! Account and security ids are repeated on every transaction and every lot,
//! so they are stored once and shared through reference-counted handles.
//!
//! # Example
//!
//! ```
//! use lotledger_core::ident::IdentInterner;
//!
//! let mut interner = IdentInterner::new();
//!
//! let a1 = interner.intern("Brokerage");
//! let a2 = interner.intern("Brokerage");
//! let a3 = interner.intern("IRA");
//!
//! assert!(a1.ptr_eq(&a2));
//! assert!(!a1.ptr_eq(&a3));
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An interned identifier (account id or security id).
///
/// A thin wrapper around `Arc<str>`: cloning is a reference-count bump and
/// equality takes a pointer fast path before comparing contents.
#[derive(Debug, Clone, Eq)]
pub struct Ident(Arc<str>);

impl Serialize for Ident {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Ident {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(s))
    }
}

impl PartialOrd for Ident {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ident {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Ident {
    /// Create an identifier without going through an interner.
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    /// Get the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if two identifiers share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl std::hash::Hash for Ident {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for Ident {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for Ident {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Ident {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&Self> for Ident {
    fn from(s: &Self) -> Self {
        s.clone()
    }
}

impl PartialEq<str> for Ident {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Ident {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl std::borrow::Borrow<str> for Ident {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

/// Deduplicates identifiers while a batch of transactions is loaded.
#[derive(Debug, Default)]
pub struct IdentInterner {
    idents: HashSet<Arc<str>>,
}

impl IdentInterner {
    /// Create a new empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an identifier, reusing the existing allocation when present.
    pub fn intern(&mut self, s: &str) -> Ident {
        if let Some(existing) = self.idents.get(s) {
            Ident(existing.clone())
        } else {
            let arc: Arc<str> = s.into();
            self.idents.insert(arc.clone());
            Ident(arc)
        }
    }

    /// Number of distinct identifiers.
    pub fn len(&self) -> usize {
        self.idents.len()
    }

    /// Check if nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.idents.is_empty()
    }
}
