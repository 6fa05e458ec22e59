//! The five matching passes. Each pass only sees transactions no earlier pass
//! has claimed, and claims accumulate in a [`ClaimState`] passed in by the
//! caller. Bank transactions are the anchors for the 1:1 passes.

use chrono::{NaiveDate, TimeDelta};
use concord_core::{Side, Transaction};
use tracing::debug;

use crate::claims::ClaimState;
use crate::config::EngineConfig;
use crate::index::AmountIndex;
use crate::model::{MatchGroup, MatchKind};
use crate::progress::CancelToken;
use crate::reference::first_shared;
use crate::similarity::{score_features, DescriptionFeatures, SimilarityScorer};
use crate::subset::{Candidate, SearchOutcome, SubsetSearch};

pub const REFERENCE_CONFIDENCE: f64 = 0.99;
pub const EXACT_DATE_CONFIDENCE: f64 = 0.95;
pub const STRICT_WINDOW_CONFIDENCE: f64 = 0.9;
pub const SPLIT_MERGE_CONFIDENCE: f64 = 0.85;

/// Similarity above which an exact-date match is reported as perfect.
const PERFECT_SIMILARITY: f64 = 0.8;
/// Strict-window acceptance: this similarity, or dates at most a day apart.
const STRICT_MIN_SIMILARITY: f64 = 0.5;
const STRICT_NEAR_DAYS: i64 = 1;

/// The split/merge search was interrupted by a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

/// Date-sorted views of both inputs plus everything derived from them once
/// per run. Read-only while the passes execute.
pub(crate) struct Workspace<'a> {
    pub bank: Vec<&'a Transaction>,
    pub ledger: Vec<&'a Transaction>,
    pub bank_features: Vec<DescriptionFeatures>,
    pub ledger_features: Vec<DescriptionFeatures>,
    pub ledger_index: AmountIndex,
}

impl<'a> Workspace<'a> {
    pub fn sorted(bank: &'a [Transaction], ledger: &'a [Transaction]) -> (Vec<&'a Transaction>, Vec<&'a Transaction>) {
        let mut bank: Vec<&Transaction> = bank.iter().collect();
        let mut ledger: Vec<&Transaction> = ledger.iter().collect();
        // Stable, so same-day records keep their input order.
        bank.sort_by_key(|t| t.date);
        ledger.sort_by_key(|t| t.date);
        (bank, ledger)
    }

    pub fn index(
        bank: Vec<&'a Transaction>,
        ledger: Vec<&'a Transaction>,
        scorer: &SimilarityScorer,
    ) -> Self {
        let bank_features = bank.iter().map(|t| scorer.features(&t.description)).collect();
        let ledger_features = ledger.iter().map(|t| scorer.features(&t.description)).collect();
        let ledger_index = AmountIndex::build(ledger.iter().copied());
        Self {
            bank,
            ledger,
            bank_features,
            ledger_features,
            ledger_index,
        }
    }

    fn side(&self, side: Side) -> &[&'a Transaction] {
        match side {
            Side::Bank => &self.bank,
            Side::Ledger => &self.ledger,
        }
    }
}

/// Accepted groups in acceptance order, with per-run sequential ids.
pub(crate) struct GroupLog {
    run_id: String,
    groups: Vec<MatchGroup>,
}

impl GroupLog {
    pub fn new(run_id: String) -> Self {
        Self { run_id, groups: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn into_groups(self) -> Vec<MatchGroup> {
        self.groups
    }

    /// Claims the positions and records the group. The single writer for
    /// claims. Callers only offer unclaimed positions; a group whose members
    /// are already taken is dropped.
    #[allow(clippy::too_many_arguments)]
    fn accept(
        &mut self,
        claims: &mut ClaimState,
        ws: &Workspace<'_>,
        mut bank: Vec<usize>,
        mut ledger: Vec<usize>,
        kind: MatchKind,
        confidence: f64,
        reason: String,
    ) {
        let claimed = claims.claim_group(&bank, &ledger);
        debug_assert!(claimed, "match group offered an already claimed position");
        if !claimed {
            return;
        }
        bank.sort_unstable();
        ledger.sort_unstable();

        let id = format!("{}-{:04}", self.run_id, self.groups.len() + 1);
        debug!(group = %id, %kind, confidence, %reason, "accepted match");
        self.groups.push(MatchGroup {
            id,
            bank: bank.iter().map(|&p| ws.bank[p].clone()).collect(),
            ledger: ledger.iter().map(|&p| ws.ledger[p].clone()).collect(),
            confidence: confidence.clamp(0.0, 1.0),
            reason,
            kind,
        });
    }
}

/// A ledger candidate for a bank anchor.
#[derive(Debug, Clone, Copy)]
struct Scored {
    pos: usize,
    similarity: f64,
    days: i64,
}

pub(crate) struct PassRunner<'r, 'a> {
    pub ws: &'r Workspace<'a>,
    pub config: &'r EngineConfig,
    pub cancel: Option<&'r CancelToken>,
}

impl PassRunner<'_, '_> {
    /// Unclaimed, same-polarity ledger positions in the anchor's amount
    /// bucket (± tolerance) and within `window_days`.
    fn candidates(&self, claims: &ClaimState, anchor: usize, window_days: i64) -> Vec<usize> {
        let tx = self.ws.bank[anchor];
        self.ws
            .ledger_index
            .lookup(tx.amount_cents(), self.config.amount_tolerance_cents)
            .into_iter()
            .filter(|&l| {
                let other = self.ws.ledger[l];
                !claims.is_claimed(Side::Ledger, l)
                    && other.polarity == tx.polarity
                    && tx.days_apart(other) <= window_days
            })
            .collect()
    }

    fn scored(&self, claims: &ClaimState, anchor: usize, window_days: i64) -> Vec<Scored> {
        let features = &self.ws.bank_features[anchor];
        self.candidates(claims, anchor, window_days)
            .into_iter()
            .map(|pos| Scored {
                pos,
                similarity: score_features(features, &self.ws.ledger_features[pos]),
                days: self.ws.bank[anchor].days_apart(self.ws.ledger[pos]),
            })
            .collect()
    }

    fn open_anchors(&self, claims: &ClaimState) -> Vec<usize> {
        claims.unclaimed(Side::Bank).collect()
    }

    /// Pass 1: a shared reference number within the reference window.
    pub fn reference_pass(&self, claims: &mut ClaimState, log: &mut GroupLog) -> usize {
        let before = log.len();
        for b in self.open_anchors(claims) {
            let anchor = self.ws.bank[b];
            let refs = &self.ws.bank_features[b].references;
            if refs.is_empty() {
                continue;
            }

            let best = self
                .candidates(claims, b, self.config.reference_window_days)
                .into_iter()
                .filter_map(|l| {
                    first_shared(refs, &self.ws.ledger_features[l].references)
                        .map(|shared| (l, shared))
                })
                .min_by_key(|&(l, _)| {
                    let other = self.ws.ledger[l];
                    (
                        anchor.days_apart(other),
                        (anchor.amount_cents() - other.amount_cents()).abs(),
                        l,
                    )
                });

            if let Some((l, shared)) = best {
                let days = anchor.days_apart(self.ws.ledger[l]);
                let reason = format!("shared reference {shared} ({days} day(s) apart)");
                log.accept(claims, self.ws, vec![b], vec![l], MatchKind::Exact, REFERENCE_CONFIDENCE, reason);
            }
        }
        log.len() - before
    }

    /// Pass 2: same amount on the same calendar day, best description wins.
    pub fn exact_date_pass(&self, claims: &mut ClaimState, log: &mut GroupLog) -> usize {
        let before = log.len();
        for b in self.open_anchors(claims) {
            let best = first_max(self.scored(claims, b, 0), |c| c.similarity);
            if let Some(c) = best {
                let reason = if c.similarity > PERFECT_SIMILARITY {
                    "perfect match: amount, date and description".to_string()
                } else {
                    "amount & exact date".to_string()
                };
                log.accept(claims, self.ws, vec![b], vec![c.pos], MatchKind::Exact, EXACT_DATE_CONFIDENCE, reason);
            }
        }
        log.len() - before
    }

    /// Pass 3: strict date window, ranked by similarity with near-ties going
    /// to the closer date.
    pub fn strict_window_pass(&self, claims: &mut ClaimState, log: &mut GroupLog) -> usize {
        let before = log.len();
        let margin = self.config.strict_tie_margin;
        for b in self.open_anchors(claims) {
            let scored = self.scored(claims, b, self.config.strict_window_days);

            // The tie rule is not transitive, so pick by scanning rather than sorting.
            let mut best: Option<Scored> = None;
            for c in scored {
                best = match best {
                    None => Some(c),
                    Some(cur) => {
                        let better = if (c.similarity - cur.similarity).abs() > margin {
                            c.similarity > cur.similarity
                        } else {
                            c.days < cur.days
                        };
                        Some(if better { c } else { cur })
                    }
                };
            }

            if let Some(c) = best {
                if c.similarity >= STRICT_MIN_SIMILARITY || c.days <= STRICT_NEAR_DAYS {
                    let reason = format!(
                        "amount within {} day(s), description similarity {:.2}",
                        c.days, c.similarity
                    );
                    log.accept(claims, self.ws, vec![b], vec![c.pos], MatchKind::Exact, STRICT_WINDOW_CONFIDENCE, reason);
                }
            }
        }
        log.len() - before
    }

    /// Pass 4: loose window, similarity minus a linear date penalty. Only the
    /// top-scoring candidate is considered.
    pub fn fuzzy_pass(&self, claims: &mut ClaimState, log: &mut GroupLog) -> usize {
        let before = log.len();
        let window = self.config.loose_window_days;
        let penalty = self.config.fuzzy_date_penalty;
        for b in self.open_anchors(claims) {
            let best = first_max(self.scored(claims, b, window), |c| {
                c.similarity - (c.days as f64 / window as f64) * penalty
            });

            if let Some(c) = best {
                if c.similarity >= self.config.fuzzy_threshold {
                    let score = c.similarity - (c.days as f64 / window as f64) * penalty;
                    let reason = format!(
                        "fuzzy: similarity {:.2}, {} day(s) apart",
                        c.similarity, c.days
                    );
                    log.accept(claims, self.ws, vec![b], vec![c.pos], MatchKind::Fuzzy, score, reason);
                }
            }
        }
        log.len() - before
    }

    /// Pass 5: one anchor against several opposite-side items whose amounts
    /// add up to it. Bank anchors (splits) run to completion before ledger
    /// anchors (merges).
    pub fn split_merge_pass(
        &self,
        claims: &mut ClaimState,
        log: &mut GroupLog,
    ) -> Result<usize, Interrupted> {
        if self.config.max_combination_depth == 0 {
            return Ok(0);
        }
        let before = log.len();
        self.combine_from(Side::Bank, claims, log)?;
        self.combine_from(Side::Ledger, claims, log)?;
        Ok(log.len() - before)
    }

    fn combine_from(
        &self,
        anchor_side: Side,
        claims: &mut ClaimState,
        log: &mut GroupLog,
    ) -> Result<(), Interrupted> {
        let pool_side = match anchor_side {
            Side::Bank => Side::Ledger,
            Side::Ledger => Side::Bank,
        };
        let mut search = SubsetSearch::new(
            self.config.max_combination_depth,
            self.config.amount_tolerance_cents,
        )
        .with_min_items(2);
        if let Some(token) = self.cancel {
            search = search.with_cancel(token);
        }

        let anchors: Vec<usize> = claims.unclaimed(anchor_side).collect();
        for a in anchors {
            if self.cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(Interrupted);
            }
            if claims.is_claimed(anchor_side, a) {
                continue;
            }
            let anchor = self.ws.side(anchor_side)[a];
            let target = anchor.amount_cents();
            if target <= 0 {
                continue;
            }

            let pool = self.pool_for(anchor, pool_side, claims);
            let keys = match search.find(&pool, target) {
                SearchOutcome::Found(keys) => keys,
                SearchOutcome::NotFound => continue,
                SearchOutcome::Cancelled => return Err(Interrupted),
            };

            let count = keys.len();
            let total: i64 = keys.iter().map(|&k| self.ws.side(pool_side)[k].amount_cents()).sum();
            let (bank, ledger, kind, reason) = match anchor_side {
                Side::Bank => (
                    vec![a],
                    keys,
                    MatchKind::SplitOneToMany,
                    format!("split: 1 bank item settles {count} ledger items"),
                ),
                Side::Ledger => (
                    keys,
                    vec![a],
                    MatchKind::MergeManyToOne,
                    format!("merge: {count} bank items settle 1 ledger item"),
                ),
            };
            debug!(target_cents = target, total_cents = total, "subset found");
            log.accept(claims, self.ws, bank, ledger, kind, SPLIT_MERGE_CONFIDENCE, reason);
        }
        Ok(())
    }

    /// Unclaimed, same-polarity, non-zero items within the strict window that
    /// are each no larger than the anchor, nearest date first.
    fn pool_for(&self, anchor: &Transaction, pool_side: Side, claims: &ClaimState) -> Vec<Candidate> {
        let items = self.ws.side(pool_side);
        let window = TimeDelta::try_days(self.config.strict_window_days);
        let from = window
            .and_then(|w| anchor.date.checked_sub_signed(w))
            .unwrap_or(NaiveDate::MIN);
        let to = window
            .and_then(|w| anchor.date.checked_add_signed(w))
            .unwrap_or(NaiveDate::MAX);
        let lo = items.partition_point(|t| t.date < from);
        let hi = items.partition_point(|t| t.date <= to);
        let target = anchor.amount_cents();

        let mut pool: Vec<(i64, Candidate)> = (lo..hi)
            .filter(|&p| {
                let t = items[p];
                !claims.is_claimed(pool_side, p)
                    && t.polarity == anchor.polarity
                    && (1..=target).contains(&t.amount_cents())
            })
            .map(|p| {
                let t = items[p];
                (anchor.days_apart(t), Candidate { key: p, cents: t.amount_cents() })
            })
            .collect();
        pool.sort_by_key(|(days, c)| (*days, c.key));
        pool.into_iter().map(|(_, c)| c).collect()
    }
}

/// Highest-scoring item, keeping the earliest one on ties.
fn first_max<F>(items: Vec<Scored>, score: F) -> Option<Scored>
where
    F: Fn(&Scored) -> f64,
{
    let mut best: Option<(f64, Scored)> = None;
    for item in items {
        let s = score(&item);
        if best.as_ref().map_or(true, |(top, _)| s > *top) {
            best = Some((s, item));
        }
    }
    best.map(|(_, item)| item)
}
