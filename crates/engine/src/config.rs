use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::text::{StopWords, TextNormalizer};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Upper bound for any date window.
pub const MAX_WINDOW_DAYS: i64 = 3660;
/// Upper bound for the amount tolerance; the amount index scans one key per cent.
pub const MAX_TOLERANCE_CENTS: i64 = 100_000;
/// Upper bound for split/merge group size; the subset search is exponential in it.
pub const MAX_COMBINATION_DEPTH: usize = 10;

/// Trade-off preset: `Accuracy` widens date windows and accepts weaker text
/// evidence, `Speed` narrows both and caps combination depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Accuracy,
    Speed,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Accuracy => write!(f, "accuracy"),
            Mode::Speed => write!(f, "speed"),
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accuracy" => Ok(Mode::Accuracy),
            "speed" => Ok(Mode::Speed),
            other => Err(ConfigError::Invalid(format!("unknown mode '{other}'"))),
        }
    }
}

/// Every tunable of a reconciliation run. Built once by the caller and passed
/// to the engine explicitly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    pub mode: Mode,
    pub strict_window_days: i64,
    pub loose_window_days: i64,
    pub reference_window_days: i64,
    /// Minimum raw similarity for the fuzzy pass.
    pub fuzzy_threshold: f64,
    /// Largest split/merge group on the multi-item side. 0 disables the pass.
    pub max_combination_depth: usize,
    /// Amount tolerance in cents: the 1:1 passes accept amounts this far
    /// apart, subset sums must land strictly closer than this.
    pub amount_tolerance_cents: i64,
    /// Weight of the linear date penalty in the fuzzy pass.
    pub fuzzy_date_penalty: f64,
    /// Similarity gap under which the strict-window pass prefers the closer date.
    pub strict_tie_margin: f64,
    pub extra_stop_words: Vec<String>,
}

impl EngineConfig {
    pub fn for_mode(mode: Mode) -> Self {
        let (strict, loose, reference, threshold, depth) = match mode {
            Mode::Accuracy => (3, 10, 45, 0.6, 4),
            Mode::Speed => (1, 3, 10, 0.85, 2),
        };
        Self {
            mode,
            strict_window_days: strict,
            loose_window_days: loose,
            reference_window_days: reference,
            fuzzy_threshold: threshold,
            max_combination_depth: depth,
            amount_tolerance_cents: 1,
            fuzzy_date_penalty: 0.2,
            strict_tie_margin: 0.1,
            extra_stop_words: Vec::new(),
        }
    }

    /// Parses the `[engine]` table of a TOML document. Other tables are ignored
    /// so the engine section can share a file with other settings.
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct Document {
            #[serde(default)]
            engine: EngineOverrides,
        }

        let doc: Document = toml::from_str(toml_content)?;
        doc.engine.resolve(None)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };

        if !(1..=MAX_TOLERANCE_CENTS).contains(&self.amount_tolerance_cents) {
            return invalid(format!(
                "amount_tolerance_cents must be within 1..={MAX_TOLERANCE_CENTS}, got {}",
                self.amount_tolerance_cents
            ));
        }
        for (name, days) in [
            ("strict_window_days", self.strict_window_days),
            ("loose_window_days", self.loose_window_days),
            ("reference_window_days", self.reference_window_days),
        ] {
            if !(0..=MAX_WINDOW_DAYS).contains(&days) {
                return invalid(format!("{name} must be within 0..={MAX_WINDOW_DAYS}, got {days}"));
            }
        }
        if self.max_combination_depth > MAX_COMBINATION_DEPTH {
            return invalid(format!(
                "max_combination_depth must be at most {MAX_COMBINATION_DEPTH}, got {}",
                self.max_combination_depth
            ));
        }
        if self.loose_window_days == 0 {
            return invalid("loose_window_days must be at least 1".to_string());
        }
        for (name, value) in [
            ("fuzzy_threshold", self.fuzzy_threshold),
            ("fuzzy_date_penalty", self.fuzzy_date_penalty),
            ("strict_tie_margin", self.strict_tie_margin),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must be within 0..=1, got {value}"));
            }
        }
        Ok(())
    }

    /// A copy with every field forced into the range `validate` accepts. The
    /// engine runs on this so a hand-built config cannot overflow date or
    /// index arithmetic.
    pub fn clamped(&self) -> Self {
        let unit = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self {
            mode: self.mode,
            strict_window_days: self.strict_window_days.clamp(0, MAX_WINDOW_DAYS),
            loose_window_days: self.loose_window_days.clamp(1, MAX_WINDOW_DAYS),
            reference_window_days: self.reference_window_days.clamp(0, MAX_WINDOW_DAYS),
            fuzzy_threshold: unit(self.fuzzy_threshold),
            max_combination_depth: self.max_combination_depth.min(MAX_COMBINATION_DEPTH),
            amount_tolerance_cents: self.amount_tolerance_cents.clamp(1, MAX_TOLERANCE_CENTS),
            fuzzy_date_penalty: unit(self.fuzzy_date_penalty),
            strict_tie_margin: unit(self.strict_tie_margin),
            extra_stop_words: self.extra_stop_words.clone(),
        }
    }

    pub fn stop_words(&self) -> StopWords {
        StopWords::with_extra(&self.extra_stop_words)
    }

    pub fn normalizer(&self) -> TextNormalizer {
        TextNormalizer::new(self.stop_words())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_mode(Mode::default())
    }
}

/// The `[engine]` table as written by a user: `mode` picks the preset, any
/// other key overrides a single field of it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineOverrides {
    pub mode: Option<Mode>,
    pub strict_window_days: Option<i64>,
    pub loose_window_days: Option<i64>,
    pub reference_window_days: Option<i64>,
    pub fuzzy_threshold: Option<f64>,
    pub max_combination_depth: Option<usize>,
    pub amount_tolerance_cents: Option<i64>,
    pub fuzzy_date_penalty: Option<f64>,
    pub strict_tie_margin: Option<f64>,
    #[serde(default)]
    pub extra_stop_words: Vec<String>,
}

impl EngineOverrides {
    /// Applies the overrides to a preset. `mode` takes precedence over the
    /// file's own `mode` when given (e.g. from a command-line flag).
    pub fn resolve(self, mode: Option<Mode>) -> Result<EngineConfig, ConfigError> {
        let mut config = EngineConfig::for_mode(mode.or(self.mode).unwrap_or_default());

        if let Some(v) = self.strict_window_days {
            config.strict_window_days = v;
        }
        if let Some(v) = self.loose_window_days {
            config.loose_window_days = v;
        }
        if let Some(v) = self.reference_window_days {
            config.reference_window_days = v;
        }
        if let Some(v) = self.fuzzy_threshold {
            config.fuzzy_threshold = v;
        }
        if let Some(v) = self.max_combination_depth {
            config.max_combination_depth = v;
        }
        if let Some(v) = self.amount_tolerance_cents {
            config.amount_tolerance_cents = v;
        }
        if let Some(v) = self.fuzzy_date_penalty {
            config.fuzzy_date_penalty = v;
        }
        if let Some(v) = self.strict_tie_margin {
            config.strict_tie_margin = v;
        }
        config.extra_stop_words = self.extra_stop_words;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_modes() {
        let a = EngineConfig::for_mode(Mode::Accuracy);
        assert_eq!(
            (a.strict_window_days, a.loose_window_days, a.reference_window_days),
            (3, 10, 45)
        );
        assert_eq!(a.fuzzy_threshold, 0.6);
        assert_eq!(a.max_combination_depth, 4);

        let s = EngineConfig::for_mode(Mode::Speed);
        assert_eq!(
            (s.strict_window_days, s.loose_window_days, s.reference_window_days),
            (1, 3, 10)
        );
        assert_eq!(s.fuzzy_threshold, 0.85);
        assert_eq!(s.max_combination_depth, 2);
        assert_eq!(s.amount_tolerance_cents, 1);
    }

    #[test]
    fn empty_document_is_accuracy_preset() {
        assert_eq!(EngineConfig::from_toml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn mode_selects_preset_and_fields_override() {
        let cfg = EngineConfig::from_toml(
            r#"
[engine]
mode = "speed"
loose_window_days = 5
extra_stop_words = ["pos"]

[import.bank]
delimiter = ";"
"#,
        )
        .unwrap();
        assert_eq!(cfg.mode, Mode::Speed);
        assert_eq!(cfg.loose_window_days, 5);
        assert_eq!(cfg.strict_window_days, 1);
        assert!(cfg.stop_words().contains("pos"));
    }

    #[test]
    fn explicit_mode_beats_file_mode() {
        let overrides = EngineOverrides {
            mode: Some(Mode::Speed),
            ..Default::default()
        };
        let cfg = overrides.resolve(Some(Mode::Accuracy)).unwrap();
        assert_eq!(cfg.mode, Mode::Accuracy);
        assert_eq!(cfg.reference_window_days, 45);
    }

    #[test]
    fn unknown_engine_key_is_rejected() {
        let err = EngineConfig::from_toml("[engine]\nstrict_window = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_tolerance_is_invalid() {
        let err = EngineConfig::from_toml("[engine]\namount_tolerance_cents = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn oversized_tolerance_is_invalid() {
        let err = EngineConfig::from_toml("[engine]\namount_tolerance_cents = 5000000\n").unwrap_err();
        assert!(err.to_string().contains("amount_tolerance_cents"));
    }

    #[test]
    fn clamped_is_identity_for_valid_configs() {
        for mode in [Mode::Accuracy, Mode::Speed] {
            let config = EngineConfig::for_mode(mode);
            assert_eq!(config.clamped(), config);
        }
    }

    #[test]
    fn clamped_forces_out_of_range_fields_valid() {
        let config = EngineConfig {
            strict_window_days: i64::MAX / 1000,
            loose_window_days: 0,
            reference_window_days: -5,
            fuzzy_threshold: f64::NAN,
            max_combination_depth: usize::MAX,
            amount_tolerance_cents: i64::MAX,
            fuzzy_date_penalty: 3.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let clamped = config.clamped();
        assert!(clamped.validate().is_ok());
        assert_eq!(clamped.strict_window_days, MAX_WINDOW_DAYS);
        assert_eq!(clamped.loose_window_days, 1);
        assert_eq!(clamped.reference_window_days, 0);
        assert_eq!(clamped.fuzzy_threshold, 0.0);
        assert_eq!(clamped.max_combination_depth, MAX_COMBINATION_DEPTH);
        assert_eq!(clamped.amount_tolerance_cents, MAX_TOLERANCE_CENTS);
        assert_eq!(clamped.fuzzy_date_penalty, 1.0);
    }

    #[test]
    fn deep_combinations_are_invalid() {
        let err = EngineConfig::from_toml("[engine]\nmax_combination_depth = 64\n").unwrap_err();
        assert!(err.to_string().contains("max_combination_depth"));
    }

    #[test]
    fn threshold_out_of_range_is_invalid() {
        let err = EngineConfig::from_toml("[engine]\nfuzzy_threshold = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("fuzzy_threshold"));
    }

    #[test]
    fn mode_parse() {
        assert_eq!("Speed".parse::<Mode>().unwrap(), Mode::Speed);
        assert!("turbo".parse::<Mode>().is_err());
    }
}
