use concord_core::{DateRange, Money, Side, Transaction};

use crate::claims::ClaimState;
use crate::config::Mode;
use crate::model::{KindCounts, MatchGroup, MatchKind, Outcome, ReconciliationResult, Stats};
use crate::passes::Workspace;

/// Derives unmatched lists and statistics from the final claim state.
pub(crate) fn summarize(
    ws: &Workspace<'_>,
    claims: &ClaimState,
    matches: Vec<MatchGroup>,
    run_id: String,
    mode: Mode,
    outcome: Outcome,
) -> ReconciliationResult {
    let unmatched_bank = unclaimed(&ws.bank, claims, Side::Bank);
    let unmatched_ledger = unclaimed(&ws.ledger, claims, Side::Ledger);
    let stats = compute_stats(ws, &matches, &unmatched_bank, &unmatched_ledger);

    ReconciliationResult {
        run_id,
        mode,
        outcome,
        matches,
        unmatched_bank,
        unmatched_ledger,
        stats,
    }
}

fn unclaimed(sorted: &[&Transaction], claims: &ClaimState, side: Side) -> Vec<Transaction> {
    claims.unclaimed(side).map(|p| sorted[p].clone()).collect()
}

fn compute_stats(
    ws: &Workspace<'_>,
    matches: &[MatchGroup],
    unmatched_bank: &[Transaction],
    unmatched_ledger: &[Transaction],
) -> Stats {
    let total_bank = ws.bank.len();
    let total_ledger = ws.ledger.len();
    let matched_bank: usize = matches.iter().map(|g| g.bank.len()).sum();
    let matched_ledger: usize = matches.iter().map(|g| g.ledger.len()).sum();

    let mut by_kind = KindCounts::default();
    for group in matches {
        match group.kind {
            MatchKind::Exact => by_kind.exact += 1,
            MatchKind::Fuzzy => by_kind.fuzzy += 1,
            MatchKind::SplitOneToMany => by_kind.split += 1,
            MatchKind::MergeManyToOne => by_kind.merge += 1,
        }
    }

    Stats {
        total_bank,
        total_ledger,
        matched_bank,
        matched_ledger,
        unmatched_bank: unmatched_bank.len(),
        unmatched_ledger: unmatched_ledger.len(),
        group_count: matches.len(),
        by_kind,
        matched_bank_amount: matches.iter().map(MatchGroup::bank_total).sum(),
        matched_ledger_amount: matches.iter().map(MatchGroup::ledger_total).sum(),
        unmatched_bank_amount: total_of(unmatched_bank),
        unmatched_ledger_amount: total_of(unmatched_ledger),
        match_rate: match_rate(matched_bank + matched_ledger, total_bank + total_ledger),
        bank_period: DateRange::spanning(ws.bank.iter().map(|t| t.date)),
        ledger_period: DateRange::spanning(ws.ledger.iter().map(|t| t.date)),
    }
}

fn total_of(transactions: &[Transaction]) -> Money {
    transactions.iter().map(|t| t.amount).sum()
}

/// Percentage of items matched; 0 when there are no items at all.
pub fn match_rate(matched: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    matched as f64 / total as f64 * 100.0
}
