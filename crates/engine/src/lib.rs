//! `concord-engine`: matches bank transactions against ledger transactions.
//!
//! Pure engine crate: receives pre-loaded records, returns match groups,
//! leftovers and statistics. No file or network IO.

pub mod aggregate;
pub mod claims;
pub mod config;
pub mod engine;
pub mod index;
pub mod model;
mod passes;
pub mod progress;
pub mod reference;
pub mod similarity;
pub mod subset;
pub mod text;
pub(crate) mod util;

pub use config::{ConfigError, EngineConfig, EngineOverrides, Mode};
pub use engine::{reconcile, Reconciler};
pub use model::{KindCounts, MatchGroup, MatchKind, Outcome, ReconciliationResult, Stats};
pub use passes::{
    EXACT_DATE_CONFIDENCE, REFERENCE_CONFIDENCE, SPLIT_MERGE_CONFIDENCE, STRICT_WINDOW_CONFIDENCE,
};
pub use progress::{CancelToken, Checkpoint, NoProgress, ProgressSink, Stage};
pub use similarity::{DescriptionFeatures, SimilarityScorer};
pub use text::{StopWords, TextNormalizer};
