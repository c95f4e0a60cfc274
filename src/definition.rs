//! Lineage definition files
//!
//! A lineage can be declared as data instead of code: its versions with
//! their JSON Schema shapes, and the declarative lens ops joining them.
//!
//! ```toml
//! name = "dashboard"
//!
//! [[versions]]
//! version = "1.0"
//! schema = { type = "object", required = ["title"] }
//!
//! [[versions]]
//! version = "2.0"
//! schema = { type = "object", required = ["name"] }
//!
//! [[lenses]]
//! from = "1.0"
//! to = "2.0"
//! forward = [{ op = "rename", from = "title", to = "name" }]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::coremodel::DefinedCoremodel;
use crate::error::ConstructionError;
use crate::lens::{invert_ops, Lens, LensOp};
use crate::lineage::Lineage;
use crate::runtime::Runtime;
use crate::version::Ordinal;

/// A lineage declared as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub versions: Vec<VersionDefinition>,
    #[serde(default)]
    pub lenses: Vec<LensDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDefinition {
    pub version: Ordinal,
    pub schema: Value,
    #[serde(default)]
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensDefinition {
    pub from: Ordinal,
    pub to: Ordinal,
    #[serde(default)]
    pub forward: Vec<LensOp>,
    /// Derived by inverting `forward` when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backward: Option<Vec<LensOp>>,
}

impl LensDefinition {
    pub fn to_lens(&self) -> Lens {
        let backward = self
            .backward
            .clone()
            .unwrap_or_else(|| invert_ops(&self.forward));
        Lens::from_ops(self.from, self.to, self.forward.clone(), backward)
    }
}

impl LineageDefinition {
    /// Read a `.json` or `.toml` definition file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConstructionError> {
        let path = path.as_ref();
        let fail = |reason: String| ConstructionError::Definition {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| fail(e.to_string())),
            Some("toml") => toml::from_str(&content).map_err(|e| fail(e.to_string())),
            _ => Err(fail("expected a .json or .toml file".to_string())),
        }
    }

    /// Load the lineage this definition declares
    pub fn build(&self, runtime: &Runtime) -> Result<Lineage, ConstructionError> {
        let mut builder = Lineage::builder(self.name.clone());
        for version in &self.versions {
            builder = if version.deprecated {
                builder.deprecated_version(version.version, version.schema.clone())
            } else {
                builder.version(version.version, version.schema.clone())
            };
        }
        for lens in &self.lenses {
            builder = builder.lens(lens.to_lens());
        }
        builder.build(runtime)
    }

    pub fn into_coremodel(self, runtime: &Runtime) -> Result<DefinedCoremodel, ConstructionError> {
        let lineage = self.build(runtime)?;
        let coremodel = DefinedCoremodel::new(lineage);
        Ok(match self.description {
            Some(description) => coremodel.with_description(description),
            None => coremodel,
        })
    }
}

/// Paths of every definition file in a directory, sorted by file name
pub fn definition_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ConstructionError> {
    let dir = dir.as_ref();
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| ConstructionError::Definition {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        let is_definition = matches!(
            entry.path().extension().and_then(|e| e.to_str()),
            Some("json") | Some("toml")
        );
        if entry.file_type().is_file() && is_definition {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Read every definition file in a directory, in file name order
pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<LineageDefinition>, ConstructionError> {
    definition_files(dir)?
        .iter()
        .map(|path| {
            debug!(path = %path.display(), "reading lineage definition");
            LineageDefinition::from_path(path)
        })
        .collect()
}
