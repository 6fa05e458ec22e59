use std::io::Write;

use concord_core::Transaction;
use concord_engine::ReconciliationResult;

use crate::{polarity_label, source_label, ExportError};

pub const CSV_HEADER: [&str; 8] = [
    "Status",
    "Source",
    "Date",
    "Description",
    "Amount",
    "Type",
    "Match-ID",
    "Match-Reason",
];

/// Writes one row per transaction: matched rows in group order (bank lines
/// before ledger lines), then unmatched bank, then unmatched ledger.
pub fn write_csv<W: Write>(result: &ReconciliationResult, writer: W) -> Result<(), ExportError> {
    let mut csv = ::csv::WriterBuilder::new()
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(CSV_HEADER)?;

    for group in &result.matches {
        for tx in group.bank.iter().chain(&group.ledger) {
            write_row(&mut csv, "Matched", tx, &group.id, &group.reason)?;
        }
    }
    for tx in result.unmatched_bank.iter().chain(&result.unmatched_ledger) {
        write_row(&mut csv, "Unmatched", tx, "", "")?;
    }

    csv.flush()?;
    Ok(())
}

fn write_row<W: Write>(
    csv: &mut ::csv::Writer<W>,
    status: &str,
    tx: &Transaction,
    match_id: &str,
    reason: &str,
) -> Result<(), ExportError> {
    let date = tx.date.format("%Y-%m-%d").to_string();
    let amount = tx.amount.to_string();
    csv.write_record([
        status,
        source_label(tx.side),
        date.as_str(),
        tx.description.as_str(),
        amount.as_str(),
        polarity_label(tx.polarity),
        match_id,
        reason,
    ])?;
    Ok(())
}
