use chrono::NaiveDate;
use concord_core::{Money, Polarity, Side, Transaction};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::ImportError;

/// One `<STMTTRN>` block. Amounts keep the statement's sign.
#[derive(Debug, Clone)]
pub struct OfxTransaction {
    pub fit_id: Option<String>,
    pub date: NaiveDate,
    pub amount: Money,
    pub name: Option<String>,
    pub memo: Option<String>,
    pub check_number: Option<String>,
}

impl OfxTransaction {
    /// NAME and MEMO joined, with the cheque number appended when neither
    /// already mentions it.
    pub fn description(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for part in [&self.name, &self.memo].into_iter().flatten() {
            if !part.is_empty() && !parts.contains(&part.as_str()) {
                parts.push(part);
            }
        }
        let mut description = parts.join(" ");
        if let Some(num) = self.check_number.as_deref().filter(|n| !description.contains(n)) {
            if !description.is_empty() {
                description.push(' ');
            }
            description.push_str("CHQ ");
            description.push_str(num);
        }
        description
    }
}

#[derive(Debug, Clone, Default)]
pub struct OfxStatement {
    pub account_id: Option<String>,
    pub currency: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub transactions: Vec<OfxTransaction>,
}

#[derive(Error, Debug)]
pub enum OfxError {
    #[error("Not an OFX document")]
    NotOfx,
    #[error("Transaction {index}: missing {field}")]
    MissingField { index: usize, field: &'static str },
    #[error("Transaction {index}: invalid {field} '{value}'")]
    InvalidField {
        index: usize,
        field: &'static str,
        value: String,
    },
}

#[derive(Default)]
struct PendingTrx {
    fit_id: Option<String>,
    date: Option<String>,
    amount: Option<String>,
    name: Option<String>,
    memo: Option<String>,
    check_number: Option<String>,
}

impl PendingTrx {
    fn finish(self, index: usize) -> Result<OfxTransaction, OfxError> {
        let missing = |field| OfxError::MissingField { index, field };
        let date_raw = self.date.ok_or_else(|| missing("DTPOSTED"))?;
        let amount_raw = self.amount.ok_or_else(|| missing("TRNAMT"))?;

        let date = parse_ofx_date(&date_raw).ok_or_else(|| OfxError::InvalidField {
            index,
            field: "DTPOSTED",
            value: date_raw.clone(),
        })?;
        let amount = parse_ofx_amount(&amount_raw).ok_or_else(|| OfxError::InvalidField {
            index,
            field: "TRNAMT",
            value: amount_raw.clone(),
        })?;

        Ok(OfxTransaction {
            fit_id: self.fit_id,
            date,
            amount,
            name: self.name,
            memo: self.memo,
            check_number: self.check_number,
        })
    }
}

/// Splits `<TAG>value` (SGML) or `<TAG>value</TAG>` (XML) into its parts.
fn split_tag(line: &str) -> Option<(String, &str)> {
    let rest = line.strip_prefix('<')?;
    let (name, value) = rest.split_once('>').unwrap_or((rest, ""));
    let value = value.split("</").next().unwrap_or_default().trim();
    Some((name.trim().to_uppercase(), value))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Parses the statement blocks of an OFX 1.x (SGML) or 2.x (XML) document.
pub fn parse(data: &str) -> Result<OfxStatement, OfxError> {
    if !data.to_uppercase().contains("<OFX>") {
        return Err(OfxError::NotOfx);
    }

    let mut statement = OfxStatement::default();
    let mut pending: Option<PendingTrx> = None;

    // XML exports often put a whole block on one line.
    let normalized = data.replace("><", ">\n<");

    for line in normalized.lines().map(str::trim) {
        let Some((tag, value)) = split_tag(line) else {
            continue;
        };

        match (tag.as_str(), pending.as_mut()) {
            ("STMTTRN", _) => pending = Some(PendingTrx::default()),
            ("/STMTTRN", Some(_)) => {
                if let Some(trx) = pending.take() {
                    let index = statement.transactions.len() + 1;
                    statement.transactions.push(trx.finish(index)?);
                }
            }
            ("FITID", Some(trx)) => trx.fit_id = non_empty(value),
            ("DTPOSTED", Some(trx)) => trx.date = non_empty(value),
            ("TRNAMT", Some(trx)) => trx.amount = non_empty(value),
            ("NAME", Some(trx)) => trx.name = non_empty(value),
            ("MEMO", Some(trx)) => trx.memo = non_empty(value),
            ("CHECKNUM", Some(trx)) => trx.check_number = non_empty(value),
            ("ACCTID", None) => statement.account_id = non_empty(value),
            ("CURDEF", None) => statement.currency = non_empty(value),
            ("DTSTART", None) => statement.start_date = parse_ofx_date(value),
            ("DTEND", None) => statement.end_date = parse_ofx_date(value),
            _ => {}
        }
    }

    Ok(statement)
}

/// Loads bank transactions from an OFX/QFX file. FITID becomes the id
/// (`bank-{n}` when absent) and the TRNAMT sign the polarity.
pub fn import_ofx(data: &[u8]) -> Result<Vec<Transaction>, ImportError> {
    let content = String::from_utf8_lossy(data);
    let statement = parse(&content)?;
    if statement.transactions.is_empty() {
        return Err(ImportError::NoDataRows);
    }

    let mut seen = HashSet::new();
    let mut transactions = Vec::with_capacity(statement.transactions.len());
    for (n, trx) in statement.transactions.iter().enumerate() {
        let id = trx
            .fit_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", Side::Bank, n + 1));
        if !seen.insert(id.clone()) {
            return Err(ImportError::DuplicateId { side: Side::Bank, id });
        }
        let polarity = if trx.amount.as_decimal().is_sign_negative() && !trx.amount.is_zero() {
            Polarity::Debit
        } else {
            Polarity::Credit
        };
        transactions.push(Transaction::new(
            id,
            trx.date,
            trx.description(),
            trx.amount.abs(),
            polarity,
            Side::Bank,
        ));
    }

    debug!(
        count = transactions.len(),
        account = statement.account_id.as_deref().unwrap_or("unknown"),
        "imported ofx"
    );
    Ok(transactions)
}

fn parse_ofx_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let y: i32 = s.get(0..4)?.parse().ok()?;
    let m: u32 = s.get(4..6)?.parse().ok()?;
    let d: u32 = s.get(6..8)?.parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

fn parse_ofx_amount(s: &str) -> Option<Money> {
    let s = s.trim().replace(',', "");
    Decimal::from_str(&s).ok().map(Money::from_decimal)
}
