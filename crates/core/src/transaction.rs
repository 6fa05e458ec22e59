use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::money::Money;
use super::ModelError;

/// Direction of a transaction. Matching only happens within one polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Credit,
    Debit,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Credit => write!(f, "credit"),
            Polarity::Debit => write!(f, "debit"),
        }
    }
}

impl FromStr for Polarity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "credit" | "cr" | "c" | "deposit" | "inflow" => Ok(Polarity::Credit),
            "debit" | "dr" | "d" | "withdrawal" | "outflow" => Ok(Polarity::Debit),
            other => Err(ModelError::UnknownPolarity(other.to_string())),
        }
    }
}

/// Which of the two ledgers a transaction was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Bank,
    Ledger,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bank => write!(f, "bank"),
            Side::Ledger => write!(f, "ledger"),
        }
    }
}

impl FromStr for Side {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bank" => Ok(Side::Bank),
            "ledger" | "book" | "books" => Ok(Side::Ledger),
            other => Err(ModelError::UnknownSide(other.to_string())),
        }
    }
}

/// One line of a bank statement or ledger export.
///
/// `amount` is always the unsigned magnitude; direction lives in `polarity`.
/// Records are produced once by ingestion and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub polarity: Polarity,
    pub side: Side,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        description: impl Into<String>,
        amount: Money,
        polarity: Polarity,
        side: Side,
    ) -> Self {
        Transaction {
            id: id.into(),
            date,
            description: description.into(),
            amount: amount.abs(),
            polarity,
            side,
        }
    }

    /// Builds a record from a signed amount: negative is a debit, anything
    /// else a credit.
    pub fn from_signed_cents(
        id: impl Into<String>,
        date: NaiveDate,
        description: impl Into<String>,
        signed_cents: i64,
        side: Side,
    ) -> Self {
        let polarity = if signed_cents < 0 {
            Polarity::Debit
        } else {
            Polarity::Credit
        };
        Transaction::new(
            id,
            date,
            description,
            Money::from_cents(signed_cents.saturating_abs()),
            polarity,
            side,
        )
    }

    pub fn amount_cents(&self) -> i64 {
        self.amount.to_cents()
    }

    /// Absolute day difference to another transaction.
    pub fn days_apart(&self, other: &Transaction) -> i64 {
        (self.date - other.date).num_days().abs()
    }
}
