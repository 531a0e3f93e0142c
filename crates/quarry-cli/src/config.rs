//! CLI configuration
//!
//! Settings are layered: built-in defaults, then the TOML config file, then
//! `QUARRY_*` environment variables, then command-line flags. The last two
//! are merged by clap before they reach [`Config`].

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::Backend;

/// Get the default config file path
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quarry")
        .join("config.toml")
}

/// Values stored in the config file; unset keys fall through to defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_extensions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagate_fetch_errors: Option<bool>,
}

impl Config {
    /// Load the config file, or defaults if it does not exist
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Starter config written by `quarry config init`
    pub fn starter() -> Self {
        Self {
            backend: Some("memory".to_string()),
            depth: Some(quarry_core::limits::DEFAULT_DEPTH),
            page_size: Some(quarry_core::limits::DEFAULT_PAGE_SIZE),
            format: Some("json".to_string()),
            include_extensions: Some(false),
            propagate_fetch_errors: Some(false),
            ..Self::default()
        }
    }

    pub fn keys() -> &'static [&'static str] {
        &[
            "dataset",
            "database",
            "backend",
            "depth",
            "page_size",
            "format",
            "include_extensions",
            "propagate_fetch_errors",
        ]
    }

    /// Current value of a key; `Ok(None)` if the key is unset
    pub fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value = match key {
            "dataset" => self.dataset.as_ref().map(|p| p.display().to_string()),
            "database" => self.database.as_ref().map(|p| p.display().to_string()),
            "backend" => self.backend.clone(),
            "depth" => self.depth.map(|v| v.to_string()),
            "page_size" => self.page_size.map(|v| v.to_string()),
            "format" => self.format.clone(),
            "include_extensions" => self.include_extensions.map(|v| v.to_string()),
            "propagate_fetch_errors" => self.propagate_fetch_errors.map(|v| v.to_string()),
            _ => anyhow::bail!(
                "Unknown config key: {} (available: {})",
                key,
                Self::keys().join(", ")
            ),
        };
        Ok(value)
    }

    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "dataset" => self.dataset = Some(PathBuf::from(value)),
            "database" => self.database = Some(PathBuf::from(value)),
            "backend" => {
                Backend::from_str(value, true)
                    .map_err(|e| anyhow::anyhow!("Invalid backend '{}': {}", value, e))?;
                self.backend = Some(value.to_lowercase());
            }
            "depth" => {
                let depth: u32 = value.parse().context("depth must be a positive integer")?;
                quarry_core::limits::validate_depth(depth)?;
                self.depth = Some(depth);
            }
            "page_size" => {
                let size: usize = value.parse().context("page_size must be a positive integer")?;
                quarry_core::limits::validate_page_size(size)?;
                self.page_size = Some(size);
            }
            "format" => {
                let format: quarry_core::ExportFormat = value.parse()?;
                self.format = Some(format.as_str().to_string());
            }
            "include_extensions" => {
                self.include_extensions = Some(value.parse().context("expected true or false")?)
            }
            "propagate_fetch_errors" => {
                self.propagate_fetch_errors = Some(value.parse().context("expected true or false")?)
            }
            _ => anyhow::bail!(
                "Unknown config key: {} (available: {})",
                key,
                Self::keys().join(", ")
            ),
        }
        Ok(())
    }

    /// Configured backend, if any
    pub fn backend(&self) -> anyhow::Result<Option<Backend>> {
        self.backend
            .as_deref()
            .map(|b| {
                Backend::from_str(b, true)
                    .map_err(|e| anyhow::anyhow!("Invalid backend '{}' in config: {}", b, e))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());

        config.set("depth", "3").unwrap();
        config.set("backend", "SQLite").unwrap();
        config.set("format", "JSON-pretty").unwrap();
        config.set("include_extensions", "true").unwrap();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.get("depth").unwrap().as_deref(), Some("3"));
        assert_eq!(loaded.get("format").unwrap().as_deref(), Some("json-pretty"));
        assert_eq!(loaded.backend().unwrap(), Some(Backend::Sqlite));
        assert_eq!(loaded.get("dataset").unwrap(), None);
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("depth", "0").is_err());
        assert!(config.set("depth", "21").is_err());
        assert!(config.set("page_size", "5000").is_err());
        assert!(config.set("format", "xml").is_err());
        assert!(config.set("backend", "postgres").is_err());
        assert!(config.set("colour", "blue").is_err());
        assert!(config.get("colour").is_err());
    }
}
