//! `tree` report: lot genealogy.

use anyhow::Result;
use lotledger_audit::lot_tree;
use lotledger_booking::BatchOutcome;
use lotledger_core::{Lot, LotId, LotStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

use super::{json_entries, write_heading, write_json, OutputFormat};

/// A lot with its descendants, for JSON output.
#[derive(Debug, Serialize)]
pub struct LotNode<'a> {
    /// The lot itself.
    #[serde(flatten)]
    pub lot: &'a Lot,
    /// Lots derived from this one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LotNode<'a>>,
}

/// Build the genealogy forest of a store, roots in list order.
pub fn forest(store: &LotStore) -> Vec<LotNode<'_>> {
    let children = store.child_index();
    store
        .roots()
        .map(|root| node(store, &children, root))
        .collect()
}

fn node<'a>(store: &'a LotStore, children: &BTreeMap<LotId, Vec<LotId>>, lot: &'a Lot) -> LotNode<'a> {
    LotNode {
        lot,
        children: children
            .get(&lot.id)
            .into_iter()
            .flatten()
            .filter_map(|id| store.get(*id))
            .map(|child| node(store, children, child))
            .collect(),
    }
}

/// Write the lot tree of every allocated security.
pub fn report<W: Write>(batch: &BatchOutcome, format: OutputFormat, writer: &mut W) -> Result<bool> {
    if format == OutputFormat::Json {
        let entries = json_entries(batch, |_, outcome| forest(&outcome.store));
        write_json(&entries, writer)?;
        return Ok(true);
    }

    for (security, outcome) in batch.successes() {
        write_heading(security, writer)?;
        write!(writer, "{}", lot_tree(&outcome.store))?;
        writeln!(writer)?;
    }
    Ok(true)
}
