use concord_core::Transaction;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::aggregate::summarize;
use crate::claims::ClaimState;
use crate::config::EngineConfig;
use crate::model::{Outcome, ReconciliationResult};
use crate::passes::{GroupLog, PassRunner, Workspace};
use crate::progress::{CancelToken, Checkpoint, ProgressSink, Stage};
use crate::similarity::SimilarityScorer;

/// Reconciles a bank collection against a ledger collection.
///
/// Inputs are assumed well-formed (unique ids per side, non-negative
/// amounts); nothing is validated here. Every input transaction ends up in
/// exactly one place: one match group, or its side's unmatched list.
pub fn reconcile(
    bank: &[Transaction],
    ledger: &[Transaction],
    config: &EngineConfig,
    progress: Option<&dyn ProgressSink>,
) -> ReconciliationResult {
    let mut reconciler = Reconciler::new(config);
    if let Some(sink) = progress {
        reconciler = reconciler.with_progress(sink);
    }
    reconciler.run(bank, ledger)
}

/// A configured reconciliation run. Holds no state between runs.
pub struct Reconciler<'a> {
    config: EngineConfig,
    progress: Option<&'a dyn ProgressSink>,
    cancel: Option<CancelToken>,
    run_id: Option<String>,
}

impl<'a> Reconciler<'a> {
    /// Out-of-range settings are clamped rather than rejected; callers that
    /// want an error should call [`EngineConfig::validate`] first.
    pub fn new(config: &EngineConfig) -> Self {
        let clamped = config.clamped();
        if clamped != *config {
            tracing::warn!("engine settings out of range, clamped to valid bounds");
        }
        Self {
            config: clamped,
            progress: None,
            cancel: None,
            run_id: None,
        }
    }

    pub fn with_progress(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Checked at every pass boundary and inside the split/merge search.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Prefix for match group ids. Defaults to a fingerprint of the inputs.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn run(&self, bank: &[Transaction], ledger: &[Transaction]) -> ReconciliationResult {
        let run_id = self
            .run_id
            .clone()
            .unwrap_or_else(|| fingerprint(bank, ledger, &self.config));
        let _span = tracing::info_span!("reconcile", run = %run_id, mode = %self.config.mode).entered();
        info!(bank = bank.len(), ledger = ledger.len(), "starting reconciliation");

        let (sorted_bank, sorted_ledger) = Workspace::sorted(bank, ledger);
        self.report(Stage::Sorted, 0);

        let scorer = SimilarityScorer::new(self.config.normalizer());
        let ws = Workspace::index(sorted_bank, sorted_ledger, &scorer);
        self.report(Stage::Indexed, 0);

        let runner = PassRunner {
            ws: &ws,
            config: &self.config,
            cancel: self.cancel.as_ref(),
        };
        let mut claims = ClaimState::new(ws.bank.len(), ws.ledger.len());
        let mut log = GroupLog::new(run_id.clone());
        let outcome = self.run_passes(&runner, &mut claims, &mut log);

        let result = summarize(&ws, &claims, log.into_groups(), run_id, self.config.mode, outcome);
        info!(
            groups = result.stats.group_count,
            unmatched_bank = result.stats.unmatched_bank,
            unmatched_ledger = result.stats.unmatched_ledger,
            match_rate = format!("{:.1}", result.stats.match_rate),
            "reconciliation finished"
        );
        self.report(Stage::Finished, result.stats.group_count);
        result
    }

    fn run_passes(&self, runner: &PassRunner<'_, '_>, claims: &mut ClaimState, log: &mut GroupLog) -> Outcome {
        type OneToOne<'p> = &'p dyn Fn(&mut ClaimState, &mut GroupLog) -> usize;
        let one_to_one: [(Stage, OneToOne<'_>); 4] = [
            (Stage::ReferencePass, &|c: &mut ClaimState, l: &mut GroupLog| runner.reference_pass(c, l)),
            (Stage::ExactDatePass, &|c: &mut ClaimState, l: &mut GroupLog| runner.exact_date_pass(c, l)),
            (Stage::StrictWindowPass, &|c: &mut ClaimState, l: &mut GroupLog| runner.strict_window_pass(c, l)),
            (Stage::FuzzyPass, &|c: &mut ClaimState, l: &mut GroupLog| runner.fuzzy_pass(c, l)),
        ];

        for (completed, (stage, pass)) in one_to_one.into_iter().enumerate() {
            if self.is_cancelled() {
                return self.cancelled(completed as u8);
            }
            let accepted = pass(claims, log);
            info!(pass = ?stage, accepted, "pass complete");
            self.report(stage, log.len());
        }

        if self.is_cancelled() {
            return self.cancelled(4);
        }
        match runner.split_merge_pass(claims, log) {
            Ok(accepted) => {
                info!(pass = ?Stage::SplitMergePass, accepted, "pass complete");
                self.report(Stage::SplitMergePass, log.len());
                Outcome::Complete
            }
            Err(_) => self.cancelled(4),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn cancelled(&self, completed_passes: u8) -> Outcome {
        tracing::warn!(completed_passes, "reconciliation cancelled");
        Outcome::Cancelled { completed_passes }
    }

    fn report(&self, stage: Stage, groups_so_far: usize) {
        if let Some(sink) = self.progress {
            sink.checkpoint(Checkpoint {
                stage,
                percent: stage.percent(),
                groups_so_far,
            });
        }
    }
}

/// Short content hash of both inputs and the configuration, so identical runs
/// produce identical group ids.
fn fingerprint(bank: &[Transaction], ledger: &[Transaction], config: &EngineConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{config:?}").as_bytes());
    for (tag, side) in [(b'B', bank), (b'L', ledger)] {
        for tx in side {
            hasher.update([tag]);
            hasher.update(tx.id.as_bytes());
            hasher.update([0]);
            hasher.update(tx.date.to_string().as_bytes());
            hasher.update(tx.amount_cents().to_le_bytes());
            hasher.update(tx.polarity.to_string().as_bytes());
            hasher.update(tx.description.as_bytes());
            hasher.update([0]);
        }
    }
    let digest: [u8; 32] = hasher.finalize().into();
    to_hex(&digest[..6])
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use concord_core::Side;
    use std::cell::RefCell;

    fn tx(id: &str, side: Side, day: u32, desc: &str, cents: i64) -> Transaction {
        Transaction::from_signed_cents(
            id,
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            desc,
            cents,
            side,
        )
    }

    #[test]
    fn fingerprint_is_stable_and_input_sensitive() {
        let config = EngineConfig::default();
        let bank = vec![tx("b1", Side::Bank, 5, "Rent", -100000)];
        let ledger = vec![tx("l1", Side::Ledger, 5, "Rent", -100000)];
        let a = fingerprint(&bank, &ledger, &config);
        assert_eq!(a.len(), 12);
        assert_eq!(a, fingerprint(&bank, &ledger, &config));
        assert_ne!(a, fingerprint(&ledger, &bank, &config));
    }

    #[test]
    fn progress_reports_every_milestone_in_order() {
        let config = EngineConfig::default();
        let seen = RefCell::new(Vec::new());
        let sink = |c: Checkpoint| seen.borrow_mut().push(c.percent);
        let bank = vec![tx("b1", Side::Bank, 5, "Rent", -100000)];
        let ledger = vec![tx("l1", Side::Ledger, 5, "Rent", -100000)];
        reconcile(&bank, &ledger, &config, Some(&sink));
        assert_eq!(*seen.borrow(), vec![5, 15, 30, 50, 70, 85, 92, 100]);
    }

    #[test]
    fn explicit_run_id_prefixes_group_ids() {
        let config = EngineConfig::default();
        let bank = vec![tx("b1", Side::Bank, 5, "Rent", -100000)];
        let ledger = vec![tx("l1", Side::Ledger, 5, "Rent", -100000)];
        let result = Reconciler::new(&config).with_run_id("jan").run(&bank, &ledger);
        assert_eq!(result.run_id, "jan");
        assert_eq!(result.matches[0].id, "jan-0001");
    }

    #[test]
    fn cancel_before_start_leaves_everything_unmatched() {
        let config = EngineConfig::default();
        let token = CancelToken::new();
        token.cancel();
        let bank = vec![tx("b1", Side::Bank, 5, "Rent", -100000)];
        let ledger = vec![tx("l1", Side::Ledger, 5, "Rent", -100000)];
        let result = Reconciler::new(&config).with_cancel(token).run(&bank, &ledger);
        assert_eq!(result.outcome, Outcome::Cancelled { completed_passes: 0 });
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_bank.len(), 1);
        assert_eq!(result.unmatched_ledger.len(), 1);
    }

    #[test]
    fn cancel_mid_run_keeps_accepted_groups() {
        let config = EngineConfig::default();
        let token = CancelToken::new();
        let trigger = token.clone();
        let sink = move |c: Checkpoint| {
            if c.stage == Stage::ExactDatePass {
                trigger.cancel();
            }
        };
        let bank = vec![
            tx("b1", Side::Bank, 5, "Rent", -100000),
            tx("b2", Side::Bank, 9, "Coffee", -450),
        ];
        let ledger = vec![
            tx("l1", Side::Ledger, 5, "Rent", -100000),
            tx("l2", Side::Ledger, 10, "Coffee", -450),
        ];
        let result = Reconciler::new(&config)
            .with_progress(&sink)
            .with_cancel(token)
            .run(&bank, &ledger);
        assert_eq!(result.outcome, Outcome::Cancelled { completed_passes: 2 });
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.unmatched_bank[0].id, "b2");
        assert_eq!(result.unmatched_ledger[0].id, "l2");
    }

    #[test]
    fn out_of_range_config_is_clamped_not_fatal() {
        let config = EngineConfig {
            strict_window_days: i64::MAX / 1000,
            loose_window_days: -3,
            reference_window_days: i64::MAX,
            amount_tolerance_cents: i64::MAX,
            max_combination_depth: usize::MAX,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let bank = vec![
            tx("b1", Side::Bank, 5, "Rent", -100000),
            tx("b2", Side::Bank, 9, "Deposit", 10000),
        ];
        let ledger = vec![
            tx("l1", Side::Ledger, 5, "Rent", -100000),
            tx("l2", Side::Ledger, 20, "A", 6000),
            tx("l3", Side::Ledger, 28, "B", 4000),
        ];
        let result = reconcile(&bank, &ledger, &config, None);
        assert_eq!(result.outcome, Outcome::Complete);
        assert_eq!(result.matches.len(), 2);
        assert!(result.unmatched_bank.is_empty());
        assert!(result.unmatched_ledger.is_empty());
    }
}
