//! `check` report: audit findings for every allocated security.

use anyhow::Result;
use lotledger_audit::{check, Finding};
use lotledger_booking::BatchOutcome;
use lotledger_core::Security;
use rust_decimal::Decimal;
use std::io::Write;

use super::{json_entries, write_json, OutputFormat};

/// Audit every allocated security and write its findings.
///
/// Returns `true` when no security has findings.
pub fn report<W: Write>(
    securities: &[Security],
    batch: &BatchOutcome,
    tolerance: Decimal,
    format: OutputFormat,
    writer: &mut W,
) -> Result<bool> {
    let mut total = 0;
    let entries = json_entries(batch, |id, outcome| {
        let findings: Vec<Finding> = securities
            .iter()
            .find(|security| security.id == *id)
            .map(|security| check(security, &outcome.store, tolerance))
            .unwrap_or_default();
        total += findings.len();
        findings
    });

    if format == OutputFormat::Json {
        write_json(&entries, writer)?;
        return Ok(total == 0);
    }

    for entry in &entries {
        for finding in entry.report.iter().flatten() {
            writeln!(writer, "{}: {finding}", entry.security)?;
        }
    }
    let checked = entries.iter().filter(|entry| entry.report.is_some()).count();
    let noun = if checked == 1 { "security" } else { "securities" };
    writeln!(writer, "{total} finding(s) in {checked} {noun}")?;
    Ok(total == 0)
}
