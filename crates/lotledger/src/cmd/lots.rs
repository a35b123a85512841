//! `lots` report: every lot in lot-list order.

use anyhow::Result;
use lotledger_booking::BatchOutcome;
use lotledger_core::{Lot, SyntheticTransaction};
use serde::Serialize;
use std::io::Write;

use super::{json_entries, write_heading, write_json, OutputFormat};

#[derive(Debug, Serialize)]
struct LotsReport<'a> {
    lots: Vec<&'a Lot>,
    synthetic: &'a [SyntheticTransaction],
}

/// Write the lot listing of every allocated security.
///
/// Returns `true`; listing lots never produces findings.
pub fn report<W: Write>(batch: &BatchOutcome, format: OutputFormat, writer: &mut W) -> Result<bool> {
    if format == OutputFormat::Json {
        let entries = json_entries(batch, |_, outcome| LotsReport {
            lots: outcome.store.lots().collect(),
            synthetic: outcome.store.synthetic(),
        });
        write_json(&entries, writer)?;
        return Ok(true);
    }

    for (security, outcome) in batch.successes() {
        write_heading(security, writer)?;
        for lot in outcome.store.lots() {
            writeln!(writer, "{lot}")?;
        }
        for txn in outcome.store.synthetic() {
            writeln!(
                writer,
                "{} split x{} {} {} (from {})",
                txn.id, txn.ratio, txn.account, txn.date, txn.origin
            )?;
        }
        writeln!(writer)?;
    }
    Ok(true)
}
