use concord_core::{DateRange, Money, Side, Transaction};
use serde::Serialize;
use std::fmt;

use crate::config::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    /// One bank line settles several ledger lines.
    SplitOneToMany,
    /// Several bank lines settle one ledger line.
    MergeManyToOne,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKind::Exact => write!(f, "exact"),
            MatchKind::Fuzzy => write!(f, "fuzzy"),
            MatchKind::SplitOneToMany => write!(f, "split"),
            MatchKind::MergeManyToOne => write!(f, "merge"),
        }
    }
}

/// Bank and ledger lines judged to be the same economic event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchGroup {
    pub id: String,
    pub bank: Vec<Transaction>,
    pub ledger: Vec<Transaction>,
    /// Strength of evidence in [0, 1]; not a probability.
    pub confidence: f64,
    /// Audit text only. Never read by matching logic.
    pub reason: String,
    pub kind: MatchKind,
}

impl MatchGroup {
    pub fn bank_total(&self) -> Money {
        self.bank.iter().map(|t| t.amount).sum()
    }

    pub fn ledger_total(&self) -> Money {
        self.ledger.iter().map(|t| t.amount).sum()
    }

    /// Bank total minus ledger total, in cents.
    pub fn difference_cents(&self) -> i64 {
        self.bank.iter().map(Transaction::amount_cents).sum::<i64>()
            - self.ledger.iter().map(Transaction::amount_cents).sum::<i64>()
    }

    pub fn len(&self) -> usize {
        self.bank.len() + self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Outcome {
    Complete,
    /// Stopped at a pass boundary (or inside the split/merge search). Groups
    /// accepted so far are kept; everything else is reported unmatched.
    Cancelled { completed_passes: u8 },
}

impl Outcome {
    pub fn is_complete(self) -> bool {
        matches!(self, Outcome::Complete)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KindCounts {
    pub exact: usize,
    pub fuzzy: usize,
    pub split: usize,
    pub merge: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_bank: usize,
    pub total_ledger: usize,
    pub matched_bank: usize,
    pub matched_ledger: usize,
    pub unmatched_bank: usize,
    pub unmatched_ledger: usize,
    pub group_count: usize,
    pub by_kind: KindCounts,
    pub matched_bank_amount: Money,
    pub matched_ledger_amount: Money,
    pub unmatched_bank_amount: Money,
    pub unmatched_ledger_amount: Money,
    /// Matched items over all items, as a percentage. 0 when there are no items.
    pub match_rate: f64,
    pub bank_period: Option<DateRange>,
    pub ledger_period: Option<DateRange>,
}

/// Output of one reconciliation. Derived entirely from the final claim state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub run_id: String,
    pub mode: Mode,
    pub outcome: Outcome,
    /// In the order the passes accepted them.
    pub matches: Vec<MatchGroup>,
    pub unmatched_bank: Vec<Transaction>,
    pub unmatched_ledger: Vec<Transaction>,
    pub stats: Stats,
}

impl ReconciliationResult {
    /// The group holding transaction `id` from `side`, if any.
    pub fn group_of(&self, side: Side, id: &str) -> Option<&MatchGroup> {
        self.matches.iter().find(|g| {
            let members = match side {
                Side::Bank => &g.bank,
                Side::Ledger => &g.ledger,
            };
            members.iter().any(|t| t.id == id)
        })
    }
}
