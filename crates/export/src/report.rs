use concord_core::{DateRange, Transaction};
use concord_engine::{MatchGroup, Outcome, ReconciliationResult};

use crate::{polarity_label, source_label};

/// Renders a Markdown reconciliation report: summary, matched groups, and the
/// two unmatched lists.
pub fn render_report(result: &ReconciliationResult) -> String {
    let mut lines = Vec::new();
    summary(result, &mut lines);
    matched_table(&result.matches, &mut lines);
    unmatched_table("Unmatched bank transactions", &result.unmatched_bank, &mut lines);
    unmatched_table("Unmatched ledger transactions", &result.unmatched_ledger, &mut lines);
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn summary(result: &ReconciliationResult, lines: &mut Vec<String>) {
    let stats = &result.stats;
    lines.push("# Reconciliation report".to_string());
    lines.push(String::new());

    if let Outcome::Cancelled { completed_passes } = result.outcome {
        lines.push(format!(
            "> **Cancelled** after {completed_passes} of 5 passes. Results are partial."
        ));
        lines.push(String::new());
    }

    lines.push(format!("- Run: `{}`", result.run_id));
    lines.push(format!("- Mode: {}", result.mode));
    lines.push(format!("- Bank period: {}", period(stats.bank_period)));
    lines.push(format!("- Ledger period: {}", period(stats.ledger_period)));
    lines.push(format!("- Match rate: {:.1}%", stats.match_rate));
    lines.push(String::new());

    lines.push("| | Bank | Ledger |".to_string());
    lines.push("|---|---:|---:|".to_string());
    lines.push(format!("| Transactions | {} | {} |", stats.total_bank, stats.total_ledger));
    lines.push(format!("| Matched | {} | {} |", stats.matched_bank, stats.matched_ledger));
    lines.push(format!("| Unmatched | {} | {} |", stats.unmatched_bank, stats.unmatched_ledger));
    lines.push(format!(
        "| Matched amount | {} | {} |",
        stats.matched_bank_amount, stats.matched_ledger_amount
    ));
    lines.push(format!(
        "| Unmatched amount | {} | {} |",
        stats.unmatched_bank_amount, stats.unmatched_ledger_amount
    ));
    lines.push(String::new());

    let kinds = &stats.by_kind;
    lines.push(format!(
        "{} match groups: {} exact, {} fuzzy, {} split, {} merge.",
        stats.group_count, kinds.exact, kinds.fuzzy, kinds.split, kinds.merge
    ));
    lines.push(String::new());
}

fn matched_table(groups: &[MatchGroup], lines: &mut Vec<String>) {
    lines.push(format!("## Matched groups ({})", groups.len()));
    lines.push(String::new());
    if groups.is_empty() {
        lines.push("_None._".to_string());
        lines.push(String::new());
        return;
    }

    lines.push("| Match-ID | Kind | Confidence | Source | Date | Description | Amount | Reason |".to_string());
    lines.push("|---|---|---:|---|---|---|---:|---|".to_string());
    for group in groups {
        for (i, tx) in group.bank.iter().chain(&group.ledger).enumerate() {
            // Group columns only on the first line of each group.
            let (id, kind, confidence, reason) = if i == 0 {
                (
                    group.id.clone(),
                    group.kind.to_string(),
                    format!("{:.2}", group.confidence),
                    escape(&group.reason),
                )
            } else {
                Default::default()
            };
            lines.push(format!(
                "| {id} | {kind} | {confidence} | {} | {} | {} | {} | {reason} |",
                source_label(tx.side),
                tx.date,
                escape(&tx.description),
                tx.amount,
            ));
        }
    }
    lines.push(String::new());
}

fn unmatched_table(title: &str, txs: &[Transaction], lines: &mut Vec<String>) {
    lines.push(format!("## {title} ({})", txs.len()));
    lines.push(String::new());
    if txs.is_empty() {
        lines.push("_None._".to_string());
        lines.push(String::new());
        return;
    }

    lines.push("| ID | Date | Description | Amount | Type |".to_string());
    lines.push("|---|---|---|---:|---|".to_string());
    for tx in txs {
        lines.push(format!(
            "| {} | {} | {} | {} | {} |",
            escape(&tx.id),
            tx.date,
            escape(&tx.description),
            tx.amount,
            polarity_label(tx.polarity),
        ));
    }
    lines.push(String::new());
}

fn period(range: Option<DateRange>) -> String {
    range.map_or_else(|| "n/a".to_string(), |r| r.to_string())
}

fn escape(text: &str) -> String {
    text.replace('|', "\\|")
}
