use std::path::Path;

use anyhow::Context;
use concord_engine::{EngineConfig, EngineOverrides, Mode};
use concord_import::CsvImportProfile;
use serde::Deserialize;

/// Contents of `concord.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineOverrides,
    #[serde(default)]
    pub import: ImportSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportSettings {
    pub bank: Option<CsvImportProfile>,
    pub ledger: Option<CsvImportProfile>,
}

impl Settings {
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Missing file path means built-in defaults.
    pub fn load_optional(path: Option<&Path>) -> anyhow::Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn engine_config(&self, mode: Option<Mode>) -> anyhow::Result<EngineConfig> {
        Ok(self.engine.clone().resolve(mode)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load_optional(None).unwrap();
        assert_eq!(settings.engine_config(None).unwrap(), EngineConfig::default());
        assert!(settings.import.bank.is_none());
    }

    #[test]
    fn full_file() {
        let settings = Settings::from_toml(
            r#"
[engine]
mode = "speed"
reference_window_days = 30

[import.ledger]
name = "books"
delimiter = ";"

[import.ledger.mapping]
id_column = 0
date_column = 1
description_column = 2
amount_column = 3
date_format = "%d.%m.%Y"
"#,
        )
        .unwrap();
        let config = settings.engine_config(None).unwrap();
        assert_eq!(config.mode, Mode::Speed);
        assert_eq!(config.reference_window_days, 30);

        let ledger = settings.import.ledger.unwrap();
        assert_eq!(ledger.delimiter, ";");
        assert_eq!(ledger.mapping.id_column, Some(0));
        assert_eq!(ledger.mapping.date_format, "%d.%m.%Y");
    }

    #[test]
    fn cli_mode_overrides_file() {
        let settings = Settings::from_toml("[engine]\nmode = \"speed\"\n").unwrap();
        let config = settings.engine_config(Some(Mode::Accuracy)).unwrap();
        assert_eq!(config.mode, Mode::Accuracy);
        assert_eq!(config.loose_window_days, 10);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Settings::from_toml("[engine]\nloose_window = 4\n").is_err());
        assert!(Settings::from_toml("[reporting]\nformat = \"pdf\"\n").is_err());
    }

    #[test]
    fn invalid_values_fail_on_resolve() {
        let settings = Settings::from_toml("[engine]\nfuzzy_threshold = 1.5\n").unwrap();
        assert!(settings.engine_config(None).is_err());
    }
}
