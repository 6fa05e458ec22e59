use chrono::NaiveDate;
use concord_core::{Money, Polarity, Side, Transaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::str::FromStr;
use tracing::debug;

use crate::ImportError;

/// Zero-based column positions. A mapping needs a date column plus either an
/// amount column or a debit/credit pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvColumnMapping {
    pub id_column: Option<usize>,
    pub date_column: Option<usize>,
    pub description_column: Option<usize>,
    pub amount_column: Option<usize>,
    pub debit_column: Option<usize>,
    pub credit_column: Option<usize>,
    /// Explicit credit/debit marker. When mapped, amounts are read as
    /// magnitudes and their sign is ignored.
    pub type_column: Option<usize>,
    pub memo_column: Option<usize>,
    pub date_format: String,
}

impl Default for CsvColumnMapping {
    fn default() -> Self {
        Self {
            id_column: None,
            date_column: None,
            description_column: None,
            amount_column: None,
            debit_column: None,
            credit_column: None,
            type_column: None,
            memo_column: None,
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}

impl CsvColumnMapping {
    fn has_amount(&self) -> bool {
        self.amount_column.is_some() || (self.debit_column.is_some() && self.credit_column.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvImportProfile {
    pub name: String,
    /// Without a date column the mapping is detected from the header row.
    pub mapping: CsvColumnMapping,
    pub has_header: bool,
    pub delimiter: String,
}

impl Default for CsvImportProfile {
    fn default() -> Self {
        Self {
            name: "Unnamed Profile".to_string(),
            mapping: CsvColumnMapping::default(),
            has_header: true,
            delimiter: ",".to_string(),
        }
    }
}

/// Guesses a column mapping from header names. Matching is case-insensitive
/// and the first matching column wins.
pub fn detect_mapping<S: AsRef<str>>(headers: &[S]) -> CsvColumnMapping {
    let names: Vec<String> = headers
        .iter()
        .map(|h| h.as_ref().trim().to_lowercase())
        .collect();
    let find = |candidates: &[&str]| {
        names
            .iter()
            .position(|n| candidates.iter().any(|c| n == c))
            .or_else(|| {
                names
                    .iter()
                    .position(|n| candidates.iter().any(|c| n.contains(c)))
            })
    };

    CsvColumnMapping {
        id_column: find(&["id", "transaction id", "reference", "ref", "fitid"]),
        date_column: find(&["date", "posted", "value date", "transaction date"]),
        description_column: find(&["description", "narration", "details", "payee", "name"]),
        amount_column: find(&["amount", "value"]),
        debit_column: find(&["debit", "withdrawal", "paid out"]),
        credit_column: find(&["credit", "deposit", "paid in"]),
        type_column: find(&["type", "dr/cr", "cr/dr"]),
        memo_column: find(&["memo", "notes"]),
        ..CsvColumnMapping::default()
    }
}

struct RowReader<'m> {
    mapping: &'m CsvColumnMapping,
    side: Side,
}

impl RowReader<'_> {
    fn read(&self, record: &csv::StringRecord, row: u64, seq: usize) -> Result<Transaction, ImportError> {
        let mapping = self.mapping;
        let field = |col: Option<usize>| col.and_then(|c| record.get(c)).map(str::trim);

        let date_field = field(mapping.date_column)
            .ok_or_else(|| ImportError::MissingColumn("date".to_string()))?;
        let date = parse_date(date_field, &mapping.date_format).ok_or_else(|| ImportError::InvalidDate {
            row,
            value: date_field.to_string(),
        })?;

        let mut description = field(mapping.description_column).unwrap_or_default().to_string();
        if let Some(memo) = field(mapping.memo_column).filter(|m| !m.is_empty() && *m != description) {
            if !description.is_empty() {
                description.push(' ');
            }
            description.push_str(memo);
        }

        let amount = |value: &str| {
            parse_amount(value).ok_or_else(|| ImportError::InvalidAmount {
                row,
                value: value.to_string(),
            })
        };

        let (signed, mut polarity) = if mapping.amount_column.is_some() {
            let value = field(mapping.amount_column).unwrap_or_default();
            let signed = amount(value)?;
            (signed, sign_polarity(signed))
        } else {
            let debit = field(mapping.debit_column)
                .filter(|s| !s.is_empty())
                .map(&amount)
                .transpose()?;
            let credit = field(mapping.credit_column)
                .filter(|s| !s.is_empty())
                .map(&amount)
                .transpose()?;
            match (debit, credit) {
                (Some(d), _) if !d.is_zero() => (d, Polarity::Debit),
                (_, Some(c)) => (c, Polarity::Credit),
                (Some(d), None) => (d, Polarity::Debit),
                (None, None) => {
                    return Err(ImportError::InvalidAmount { row, value: String::new() });
                }
            }
        };

        if let Some(kind) = field(mapping.type_column).filter(|s| !s.is_empty()) {
            polarity = Polarity::from_str(kind).map_err(|_| ImportError::InvalidType {
                row,
                value: kind.to_string(),
            })?;
        }

        let id = field(mapping.id_column)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{}", self.side, seq));

        Ok(Transaction::new(id, date, description, signed.abs(), polarity, self.side))
    }
}

fn sign_polarity(amount: Money) -> Polarity {
    if amount.as_decimal().is_sign_negative() && !amount.is_zero() {
        Polarity::Debit
    } else {
        Polarity::Credit
    }
}

/// Reads one side's transactions. Negative amounts are debits unless a type
/// column says otherwise; rows without an id get `"{side}-{n}"`.
pub fn import_csv<R: Read>(
    data: R,
    profile: &CsvImportProfile,
    side: Side,
) -> Result<Vec<Transaction>, ImportError> {
    let delimiter = profile
        .delimiter
        .as_bytes()
        .first()
        .copied()
        .unwrap_or(b',');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(profile.has_header)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data);

    let mapping = if profile.mapping.date_column.is_none() && profile.has_header {
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let detected = CsvColumnMapping {
            date_format: profile.mapping.date_format.clone(),
            ..detect_mapping(&headers)
        };
        debug!(profile = %profile.name, ?detected, "detected column mapping");
        detected
    } else {
        profile.mapping.clone()
    };

    if mapping.date_column.is_none() {
        return Err(ImportError::MissingColumn("date".to_string()));
    }
    if !mapping.has_amount() {
        return Err(ImportError::MissingColumn("amount".to_string()));
    }

    let rows = RowReader { mapping: &mapping, side };
    let mut seen = HashSet::new();
    let mut transactions = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let row = record
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 1);

        let tx = rows.read(&record, row, transactions.len() + 1)?;
        if !seen.insert(tx.id.clone()) {
            return Err(ImportError::DuplicateId { side, id: tx.id });
        }
        transactions.push(tx);
    }

    if transactions.is_empty() {
        return Err(ImportError::NoDataRows);
    }

    debug!(count = transactions.len(), %side, "imported csv");
    Ok(transactions)
}

fn parse_date(s: &str, format: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, format) {
        return Some(date);
    }

    [
        "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y", "%m-%d-%Y", "%d %b %Y",
    ]
    .iter()
    .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parses a signed amount. Accepts currency symbols, thousands separators
/// and accounting parentheses.
fn parse_amount(s: &str) -> Option<Money> {
    let s = s.trim();
    let (negative, s) = match s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '£' | '€' | '₹' | ' '))
        .collect();
    let mut dec = Decimal::from_str(&cleaned).ok()?;
    if negative {
        dec = -dec;
    }
    Some(Money::from_decimal(dec))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cents(s: &str) -> i64 {
        parse_amount(s).unwrap().to_cents()
    }

    // ── parse_amount ──────────────────────────────────────────────────────────

    #[test]
    fn parse_amount_plain() {
        assert_eq!(cents("123.45"), 12345);
        assert_eq!(cents("100"), 10000);
        assert_eq!(cents("0.01"), 1);
    }

    #[test]
    fn parse_amount_with_symbols_and_commas() {
        assert_eq!(cents("$99.99"), 9999);
        assert_eq!(cents("1,234.56"), 123456);
        assert_eq!(cents("₹ 2,500.00"), 250000);
    }

    #[test]
    fn parse_amount_negative_forms() {
        assert_eq!(cents("-50.00"), -5000);
        assert_eq!(cents("(75.25)"), -7525);
    }

    #[test]
    fn parse_amount_invalid() {
        assert!(parse_amount("not_a_number").is_none());
        assert!(parse_amount("").is_none());
    }

    // ── parse_date ────────────────────────────────────────────────────────────

    #[test]
    fn parse_date_uses_profile_format_first() {
        let d = parse_date("03/04/2024", "%m/%d/%Y").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }

    #[test]
    fn parse_date_falls_back() {
        let d = parse_date("15/01/2024", "%Y-%m-%d").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(parse_date("not-a-date", "%Y-%m-%d").is_none());
    }

    // ── detect_mapping ────────────────────────────────────────────────────────

    #[test]
    fn detect_mapping_from_bank_headers() {
        let m = detect_mapping(&["Txn Date", "Narration", "Withdrawal", "Deposit", "Balance"]);
        assert_eq!(m.date_column, Some(0));
        assert_eq!(m.description_column, Some(1));
        assert_eq!(m.debit_column, Some(2));
        assert_eq!(m.credit_column, Some(3));
        assert_eq!(m.amount_column, None);
    }

    #[test]
    fn detect_mapping_prefers_exact_names() {
        let m = detect_mapping(&["Reference", "Date", "Description", "Amount", "Type"]);
        assert_eq!(m.id_column, Some(0));
        assert_eq!(m.date_column, Some(1));
        assert_eq!(m.amount_column, Some(3));
        assert_eq!(m.type_column, Some(4));
    }

    // ── import_csv ────────────────────────────────────────────────────────────

    fn profile() -> CsvImportProfile {
        CsvImportProfile {
            name: "test".to_string(),
            mapping: CsvColumnMapping {
                date_column: Some(0),
                description_column: Some(1),
                amount_column: Some(2),
                ..CsvColumnMapping::default()
            },
            ..CsvImportProfile::default()
        }
    }

    #[test]
    fn import_signed_amounts() {
        let data = b"date,description,amount\n2024-01-15,AMAZON,49.99\n2024-01-16,STARBUCKS,-5.00\n";
        let txs = import_csv(data.as_ref(), &profile(), Side::Bank).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].id, "bank-1");
        assert_eq!(txs[0].amount_cents(), 4999);
        assert_eq!(txs[0].polarity, Polarity::Credit);
        assert_eq!(txs[1].id, "bank-2");
        assert_eq!(txs[1].amount_cents(), 500);
        assert_eq!(txs[1].polarity, Polarity::Debit);
        assert_eq!(txs[1].side, Side::Bank);
    }

    #[test]
    fn import_debit_credit_columns() {
        let data = b"date,description,debit,credit\n2024-01-15,PAYMENT,,100.00\n2024-01-16,CHARGE,50.00,\n";
        let profile = CsvImportProfile {
            mapping: CsvColumnMapping {
                date_column: Some(0),
                description_column: Some(1),
                debit_column: Some(2),
                credit_column: Some(3),
                ..CsvColumnMapping::default()
            },
            ..profile()
        };
        let txs = import_csv(data.as_ref(), &profile, Side::Ledger).unwrap();
        assert_eq!(txs[0].polarity, Polarity::Credit);
        assert_eq!(txs[0].amount_cents(), 10000);
        assert_eq!(txs[1].polarity, Polarity::Debit);
        assert_eq!(txs[1].amount_cents(), 5000);
        assert_eq!(txs[1].id, "ledger-2");
    }

    #[test]
    fn type_column_overrides_sign() {
        let data = b"id,date,description,amount,type\nJ-1,2024-02-01,Rent,1200.00,DR\nJ-2,2024-02-02,Refund,-15.00,credit\n";
        let txs = import_csv(data.as_ref(), &CsvImportProfile::default(), Side::Ledger).unwrap();
        assert_eq!(txs[0].id, "J-1");
        assert_eq!(txs[0].polarity, Polarity::Debit);
        assert_eq!(txs[1].polarity, Polarity::Credit);
        assert_eq!(txs[1].amount_cents(), 1500);
    }

    #[test]
    fn detects_mapping_when_profile_has_none() {
        let data = b"Date,Narration,Amount\n2024-03-01,NEFT ACME,-250.00\n";
        let txs = import_csv(data.as_ref(), &CsvImportProfile::default(), Side::Bank).unwrap();
        assert_eq!(txs[0].description, "NEFT ACME");
        assert_eq!(txs[0].amount_cents(), 25000);
    }

    #[test]
    fn memo_is_appended_to_description() {
        let data = b"date,description,amount,memo\n2024-01-15,ACME,10.00,INV 4411\n";
        let mut profile = profile();
        profile.mapping.memo_column = Some(3);
        let txs = import_csv(data.as_ref(), &profile, Side::Bank).unwrap();
        assert_eq!(txs[0].description, "ACME INV 4411");
    }

    #[test]
    fn semicolon_delimiter() {
        let data = b"date;description;amount\n2024-01-15;ACME;10.00\n";
        let profile = CsvImportProfile {
            delimiter: ";".to_string(),
            ..profile()
        };
        assert_eq!(import_csv(data.as_ref(), &profile, Side::Bank).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let data = b"id,date,description,amount\nX1,2024-01-15,A,1.00\nX1,2024-01-16,B,2.00\n";
        let err = import_csv(data.as_ref(), &CsvImportProfile::default(), Side::Bank).unwrap_err();
        assert!(matches!(err, ImportError::DuplicateId { side: Side::Bank, ref id } if id == "X1"));
    }

    #[test]
    fn bad_date_reports_row() {
        let data = b"date,description,amount\n2024-01-15,A,1.00\nyesterday,B,2.00\n";
        let err = import_csv(data.as_ref(), &profile(), Side::Bank).unwrap_err();
        assert!(matches!(err, ImportError::InvalidDate { row: 3, .. }));
    }

    #[test]
    fn bad_amount_reports_row() {
        let data = b"date,description,amount\n2024-01-15,A,lots\n";
        let err = import_csv(data.as_ref(), &profile(), Side::Bank).unwrap_err();
        assert!(matches!(err, ImportError::InvalidAmount { row: 2, .. }));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let data = b"date,description,amount,type\n2024-01-15,A,1.00,sideways\n";
        let err = import_csv(data.as_ref(), &CsvImportProfile::default(), Side::Bank).unwrap_err();
        assert!(matches!(err, ImportError::InvalidType { .. }));
    }

    #[test]
    fn no_data_rows_errors() {
        let data = b"date,description,amount\n";
        let result = import_csv(data.as_ref(), &profile(), Side::Bank);
        assert!(matches!(result, Err(ImportError::NoDataRows)));
    }

    #[test]
    fn missing_amount_column_errors() {
        let data = b"date,description\n2024-01-15,A\n";
        let result = import_csv(data.as_ref(), &CsvImportProfile::default(), Side::Bank);
        assert!(matches!(result, Err(ImportError::MissingColumn(ref c)) if c == "amount"));
    }

    #[test]
    fn profile_loads_from_toml() {
        let profile: CsvImportProfile = toml::from_str(
            r#"
            name = "hdfc"
            delimiter = ";"
            [mapping]
            date_column = 0
            description_column = 2
            amount_column = 4
            date_format = "%d/%m/%Y"
            "#,
        )
        .unwrap();
        assert!(profile.has_header);
        assert_eq!(profile.mapping.amount_column, Some(4));
        assert_eq!(profile.mapping.debit_column, None);
        assert_eq!(profile.mapping.date_format, "%d/%m/%Y");
    }
}
