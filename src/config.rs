//! Configuration management for coremodel runtimes and registries
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (coremodels.toml)
//! - Environment variables (COREMODELS__*)
//!
//! ## Example config file (coremodels.toml):
//! ```toml
//! [runtime]
//! draft = "draft7"
//! shared_documents_dir = "./shared"
//! enforce_minor_compatibility = true
//!
//! [registry]
//! lineages_dir = "./lineages"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoremodelConfig {
    /// Runtime settings
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Registry settings
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Settings for the shared schema runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// JSON Schema dialect every shape is checked against
    #[serde(default)]
    pub draft: SchemaDraft,

    /// Directory of shared JSON Schema documents resolvable via `$ref`
    #[serde(default)]
    pub shared_documents_dir: Option<PathBuf>,

    /// Reject minor bumps whose shape breaks instances of the previous version
    #[serde(default = "default_true")]
    pub enforce_minor_compatibility: bool,
}

/// Registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory of lineage definition files (`.json` / `.toml`)
    #[serde(default = "default_lineages_dir")]
    pub lineages_dir: PathBuf,
}

/// Supported JSON Schema drafts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchemaDraft {
    Draft4,
    Draft6,
    #[default]
    Draft7,
}

impl SchemaDraft {
    pub fn as_draft(&self) -> Draft {
        match self {
            SchemaDraft::Draft4 => Draft::Draft4,
            SchemaDraft::Draft6 => Draft::Draft6,
            SchemaDraft::Draft7 => Draft::Draft7,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_lineages_dir() -> PathBuf {
    PathBuf::from("lineages")
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            draft: SchemaDraft::default(),
            shared_documents_dir: None,
            enforce_minor_compatibility: true,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            lineages_dir: default_lineages_dir(),
        }
    }
}

impl CoremodelConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["coremodels.toml", ".coremodels.toml", "config/coremodels.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "coremodels", "coremodels") {
            let xdg_config = config_dir.config_dir().join("coremodels.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // COREMODELS__RUNTIME__DRAFT=draft6
        builder = builder.add_source(
            Environment::with_prefix("COREMODELS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get the lineages directory (resolves relative paths)
    pub fn lineages_dir(&self) -> PathBuf {
        if self.registry.lineages_dir.is_absolute() {
            self.registry.lineages_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.registry.lineages_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = CoremodelConfig::default();
        assert!(config.runtime.enforce_minor_compatibility);
        assert_eq!(config.runtime.draft, SchemaDraft::Draft7);
        assert_eq!(config.registry.lineages_dir, PathBuf::from("lineages"));
    }

    #[test]
    fn test_serialize_config() {
        let config = CoremodelConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[runtime]"));
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("draft = \"draft7\""));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[runtime]\ndraft = \"draft4\"\nenforce_minor_compatibility = false\n\n[registry]\nlineages_dir = \"/srv/lineages\"\n",
        )
        .unwrap();

        let config = CoremodelConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.runtime.draft, SchemaDraft::Draft4);
        assert!(!config.runtime.enforce_minor_compatibility);
        assert_eq!(config.lineages_dir(), PathBuf::from("/srv/lineages"));
    }
}
