//! Description similarity. A shared reference number outranks any lexical
//! signal; otherwise the best of token overlap, containment and edit distance.

use std::collections::BTreeSet;

use crate::reference::{extract_references, shares_reference};
use crate::text::TextNormalizer;
use crate::util::levenshtein_distance;

pub const REFERENCE_SCORE: f64 = 0.98;
pub const CONTAINMENT_SCORE: f64 = 0.85;

/// Everything the scorer needs from one description, computed once per
/// transaction rather than once per candidate pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptionFeatures {
    pub normalized: String,
    pub tokens: BTreeSet<String>,
    pub references: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer {
    normalizer: TextNormalizer,
}

impl SimilarityScorer {
    pub fn new(normalizer: TextNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn features(&self, description: &str) -> DescriptionFeatures {
        let tokens = self.normalizer.tokens(description);
        DescriptionFeatures {
            normalized: tokens.join(" "),
            tokens: tokens.into_iter().collect(),
            references: extract_references(description),
        }
    }

    /// Scores two raw descriptions in [0.0, 1.0].
    pub fn score(&self, a: &str, b: &str) -> f64 {
        score_features(&self.features(a), &self.features(b))
    }
}

/// Scores two precomputed descriptions in [0.0, 1.0].
pub fn score_features(a: &DescriptionFeatures, b: &DescriptionFeatures) -> f64 {
    if shares_reference(&a.references, &b.references) {
        return REFERENCE_SCORE;
    }

    if a.normalized.is_empty() || b.normalized.is_empty() {
        return 0.0;
    }
    if a.normalized == b.normalized {
        return 1.0;
    }

    jaccard(&a.tokens, &b.tokens)
        .max(containment(&a.normalized, &b.normalized))
        .max(edit_similarity(&a.normalized, &b.normalized))
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn containment(a: &str, b: &str) -> f64 {
    if a.contains(b) || b.contains(a) {
        CONTAINMENT_SCORE
    } else {
        0.0
    }
}

/// Only meaningful for strings of comparable length; 0.0 otherwise.
fn edit_similarity(a: &str, b: &str) -> f64 {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la <= 3 || lb <= 3 || la.abs_diff(lb) >= 5 {
        return 0.0;
    }
    let max_len = la.max(lb);
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}
