//! Shared schema runtime
//!
//! Loads and type-checks shape descriptions. One runtime is built per
//! process and handed by reference to every lineage under construction; it
//! keeps no per-coremodel state.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::RuntimeConfig;
use crate::error::ConstructionError;
use crate::schema::Shape;

/// A shape description that failed to load
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ShapeError {
    pub reason: String,
}

/// Loader and type-checker for shape descriptions
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    /// Shared documents by id, resolvable through `$ref`
    documents: BTreeMap<String, Value>,
}

impl Runtime {
    /// Build a runtime, loading shared documents from the configured directory
    pub fn new(config: RuntimeConfig) -> Result<Self, ConstructionError> {
        let documents = match &config.shared_documents_dir {
            Some(dir) => load_documents(dir)?,
            None => BTreeMap::new(),
        };
        Self::with_documents(config, documents)
    }

    /// Build a runtime with an explicit set of shared documents
    pub fn with_documents(
        config: RuntimeConfig,
        documents: BTreeMap<String, Value>,
    ) -> Result<Self, ConstructionError> {
        let runtime = Self { config, documents };

        // Each shared document must itself be a well-formed shape
        for (id, document) in &runtime.documents {
            runtime
                .check_references(document)
                .and_then(|()| runtime.compile(document))
                .map_err(|e| ConstructionError::MalformedShape {
                    subject: format!("shared document '{}'", id),
                    reason: e.reason,
                })?;
        }

        info!(
            draft = ?runtime.config.draft,
            shared_documents = runtime.documents.len(),
            "schema runtime ready"
        );

        Ok(runtime)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Ids of the shared documents this runtime resolves
    pub fn document_ids(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    /// Parse and type-check a shape description
    pub fn load_and_check(&self, raw: &Value) -> Result<Shape, ShapeError> {
        if !raw.is_object() && !raw.is_boolean() {
            return Err(ShapeError {
                reason: "shape must be a JSON object or boolean".to_string(),
            });
        }
        self.check_references(raw)?;
        let compiled = self.compile(raw)?;
        Ok(Shape::new(raw.clone(), compiled))
    }

    /// Parse a JSON string and type-check it as a shape description
    pub fn load_and_check_str(&self, raw: &str) -> Result<Shape, ShapeError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| ShapeError {
            reason: format!("invalid JSON: {}", e),
        })?;
        self.load_and_check(&value)
    }

    /// Every `$ref` must land in the shape itself or in a shared document
    fn check_references(&self, raw: &Value) -> Result<(), ShapeError> {
        let own_id = raw.get("$id").and_then(Value::as_str);
        let mut references = Vec::new();
        collect_references(raw, &mut references);

        for reference in references {
            let (base, fragment) = reference.split_once('#').unwrap_or((reference, ""));
            let target = if base.is_empty() || own_id.map(|id| id.trim_end_matches('#')) == Some(base) {
                raw
            } else {
                self.documents.get(base).ok_or_else(|| ShapeError {
                    reason: format!("unresolvable $ref '{}': no shared document '{}'", reference, base),
                })?
            };
            if fragment.starts_with('/') && target.pointer(fragment).is_none() {
                return Err(ShapeError {
                    reason: format!("unresolvable $ref '{}': nothing at '{}'", reference, fragment),
                });
            }
        }
        Ok(())
    }

    fn compile(&self, raw: &Value) -> Result<JSONSchema, ShapeError> {
        let mut options = JSONSchema::options();
        options.with_draft(self.config.draft.as_draft());
        for (id, document) in &self.documents {
            options.with_document(id.clone(), document.clone());
        }
        options.compile(raw).map_err(|e| ShapeError {
            reason: e.to_string(),
        })
    }
}

/// Every string-valued `$ref` in a shape, skipping literal instance values
fn collect_references<'a>(value: &'a Value, references: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("$ref", Value::String(reference)) => references.push(reference),
                    ("enum" | "const" | "default" | "examples", _) => {}
                    _ => collect_references(child, references),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, references);
            }
        }
        _ => {}
    }
}

/// Load every `.json` document under a directory, keyed by `$id` or file stem
fn load_documents(dir: &Path) -> Result<BTreeMap<String, Value>, ConstructionError> {
    let mut documents = BTreeMap::new();
    let definition_error = |path: &Path, reason: String| ConstructionError::Definition {
        path: path.display().to_string(),
        reason,
    };

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| definition_error(dir, e.to_string()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let content = fs::read_to_string(path).map_err(|e| definition_error(path, e.to_string()))?;
        let document: Value =
            serde_json::from_str(&content).map_err(|e| definition_error(path, e.to_string()))?;

        let id = match document.get("$id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string(),
        };
        debug!(id = %id, path = %path.display(), "loaded shared document");
        documents.insert(id, document);
    }

    Ok(documents)
}
