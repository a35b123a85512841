//! `balances` report: running open-share balance per account.

use anyhow::Result;
use lotledger_audit::{balance_timeline, BalanceTimeline};
use lotledger_booking::BatchOutcome;
use lotledger_core::{Ident, LotStore, Security};
use std::io::Write;

use super::{json_entries, write_heading, write_json, OutputFormat};

/// Write the balance timeline of every allocated security.
pub fn report<W: Write>(
    securities: &[Security],
    batch: &BatchOutcome,
    format: OutputFormat,
    writer: &mut W,
) -> Result<bool> {
    let timeline = |id: &Ident, store: &LotStore| {
        securities
            .iter()
            .find(|security| security.id == *id)
            .map(|security| balance_timeline(security, store))
    };

    if format == OutputFormat::Json {
        let entries = json_entries(batch, |id, outcome| timeline(id, &outcome.store));
        write_json(&entries, writer)?;
        return Ok(true);
    }

    for (id, outcome) in batch.successes() {
        if let Some(timeline) = timeline(id, &outcome.store) {
            write_timeline(&timeline, writer)?;
        }
    }
    Ok(true)
}

fn write_timeline<W: Write>(timeline: &BalanceTimeline, writer: &mut W) -> Result<()> {
    write_heading(&timeline.security, writer)?;
    for point in &timeline.points {
        writeln!(writer, "{}  total {}", point.date, point.total())?;
        for (account, shares) in &point.accounts {
            let expected = point.expected.get(account).copied().unwrap_or_default();
            if expected == *shares {
                writeln!(writer, "  {account:<30} {shares:>15}")?;
            } else {
                writeln!(writer, "  {account:<30} {shares:>15}  (transactions: {expected})")?;
            }
        }
    }
    writeln!(writer, "final  total {}", timeline.final_total())?;
    for (account, shares) in &timeline.final_balance {
        writeln!(writer, "  {account:<30} {shares:>15}")?;
    }
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lotledger_booking::{allocate_all, AllocatorOptions};
    use lotledger_core::{group_by_security, Action, InvestmentTransaction, TxnId};
    use rust_decimal_macros::dec;

    fn securities() -> Vec<Security> {
        let d = |day| NaiveDate::from_ymd_opt(2024, 4, day).unwrap();
        group_by_security(vec![
            InvestmentTransaction::new(TxnId(1), d(1), "Brokerage", "VTI", Action::Buy, dec!(100)),
            InvestmentTransaction::new(TxnId(2), d(2), "Brokerage", "VTI", Action::ShrsOut, dec!(-30))
                .with_link(TxnId(3)),
            InvestmentTransaction::new(TxnId(3), d(2), "IRA", "VTI", Action::ShrsIn, dec!(30))
                .with_link(TxnId(2)),
        ])
    }

    #[test]
    fn test_text_timeline() {
        let securities = securities();
        let batch = allocate_all(&securities, &AllocatorOptions::default());
        let mut out = Vec::new();
        report(&securities, &batch, OutputFormat::Text, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("2024-04-01  total 100\n"));
        assert!(text.contains("2024-04-02  total 100\n"));
        assert!(text.contains("final  total 100\n"));
        assert!(!text.contains("(transactions:"));
        let ira = format!("  {:<30} {:>15}", "IRA", "30");
        assert!(text.contains(&ira));
    }

    #[test]
    fn test_json_timeline() {
        let securities = securities();
        let batch = allocate_all(&securities, &AllocatorOptions::default());
        let mut out = Vec::new();
        report(&securities, &batch, OutputFormat::Json, &mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();

        let report = &json[0]["report"];
        assert_eq!(report["points"].as_array().unwrap().len(), 2);
        assert_eq!(report["final_balance"]["Brokerage"], "70");
        assert_eq!(report["final_balance"]["IRA"], "30");
    }
}
