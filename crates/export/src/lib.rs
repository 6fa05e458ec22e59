//! Writers for [`ReconciliationResult`](concord_engine::ReconciliationResult):
//! a flat CSV of every transaction and a Markdown report.

pub mod csv;
pub mod report;

use thiserror::Error;

pub use crate::csv::{write_csv, CSV_HEADER};
pub use crate::report::render_report;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV write error: {0}")]
    Csv(#[from] ::csv::Error),
}

fn source_label(side: concord_core::Side) -> &'static str {
    match side {
        concord_core::Side::Bank => "Bank",
        concord_core::Side::Ledger => "Ledger",
    }
}

fn polarity_label(polarity: concord_core::Polarity) -> &'static str {
    match polarity {
        concord_core::Polarity::Credit => "Credit",
        concord_core::Polarity::Debit => "Debit",
    }
}
