pub mod csv;
pub mod ofx;

use concord_core::Side;
use thiserror::Error;

pub use crate::csv::{detect_mapping, import_csv, CsvColumnMapping, CsvImportProfile};
pub use crate::ofx::{import_ofx, OfxError, OfxStatement, OfxTransaction};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("OFX error: {0}")]
    Ofx(#[from] OfxError),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Row {row}: invalid date '{value}'")]
    InvalidDate { row: u64, value: String },
    #[error("Row {row}: invalid amount '{value}'")]
    InvalidAmount { row: u64, value: String },
    #[error("Row {row}: unknown transaction type '{value}'")]
    InvalidType { row: u64, value: String },
    #[error("Duplicate {side} transaction id '{id}'")]
    DuplicateId { side: Side, id: String },
    #[error("No data rows")]
    NoDataRows,
}
