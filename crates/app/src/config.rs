use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use baixa_core::EngineConfig;
use baixa_import::ColumnMapping;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "baixa.toml";

/// Contents of `baixa.toml`; every section is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub mapping: ColumnMapping,
    /// Field separator of the statement CSV.
    pub delimiter: char,
    pub database: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            mapping: ColumnMapping::default(),
            delimiter: ',',
            database: None,
        }
    }
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.engine.validate()?;
        config.delimiter_byte()?;
        Ok(config)
    }

    /// Reads `path`, or `<data_dir>/baixa.toml` when no path is given. A missing
    /// default file means defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>, data_dir: &Path) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (data_dir.join(CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn delimiter_byte(&self) -> Result<u8> {
        if !self.delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character, got {:?}", self.delimiter);
        }
        Ok(self.delimiter as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config() {
        let config = AppConfig::from_toml(
            r#"
            delimiter = ";"
            database = "/tmp/baixa.db"

            [engine]
            tolerance_days = 5
            default_payment_method = "Boleto"

            [mapping]
            date_column = "Data"
            description_column = "Histórico"
            amount_column = "Valor"
            identifier_column = "Documento"
            negative_means_outbound = true
            "#,
        )
        .unwrap();
        assert_eq!(config.delimiter_byte().unwrap(), b';');
        assert_eq!(config.database, Some(PathBuf::from("/tmp/baixa.db")));
        assert_eq!(config.engine.tolerance_days, 5);
        assert_eq!(config.engine.chunk_size, 50);
        assert_eq!(config.mapping.description_column, "Histórico");
        assert_eq!(config.mapping.identifier_column.as_deref(), Some("Documento"));
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(AppConfig::from_toml("delimiter = \"§\"").is_err());
        assert!(AppConfig::from_toml("[engine]\nchunk_size = 0").is_err());
    }

    #[test]
    fn missing_default_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(AppConfig::load(None, dir.path()).unwrap(), AppConfig::default());
        assert!(AppConfig::load(Some(&dir.path().join("nope.toml")), dir.path()).is_err());
    }
}
