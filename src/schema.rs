//! Schema versions and their validators

use std::fmt;

use jsonschema::error::ValidationErrorKind;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checksum::Checksum;
use crate::error::ValidationError;
use crate::version::Ordinal;

/// What kind of expectation an instance failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A required field is absent
    MissingField,
    /// A value has the wrong JSON type
    TypeMismatch,
    /// A value falls outside a declared constraint (enum, range, pattern, ...)
    Constraint,
}

/// A single failed expectation within an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer into the instance (`""` is the root)
    pub path: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

/// A compiled, type-checked shape description.
///
/// Produced only by [`Runtime::load_and_check`](crate::Runtime::load_and_check).
pub struct Shape {
    raw: Value,
    compiled: JSONSchema,
    checksum: Checksum,
}

impl Shape {
    pub(crate) fn new(raw: Value, compiled: JSONSchema) -> Self {
        let checksum = Checksum::from_json(&raw);
        Self {
            raw,
            compiled,
            checksum,
        }
    }

    /// The shape description as authored
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.compiled.is_valid(instance)
    }

    /// Collect every violation of this shape, in validator order
    pub fn violations(&self, instance: &Value) -> Vec<Violation> {
        match self.compiled.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| {
                    let base = error.instance_path.to_string();
                    let message = error.to_string();
                    match &error.kind {
                        ValidationErrorKind::Required { property } => {
                            let field = property
                                .as_str()
                                .map(str::to_string)
                                .unwrap_or_else(|| property.to_string());
                            Violation {
                                path: format!("{}/{}", base, escape_pointer(&field)),
                                kind: ViolationKind::MissingField,
                                message,
                            }
                        }
                        ValidationErrorKind::Type { .. } => Violation {
                            path: base,
                            kind: ViolationKind::TypeMismatch,
                            message,
                        },
                        _ => Violation {
                            path: base,
                            kind: ViolationKind::Constraint,
                            message,
                        },
                    }
                })
                .collect(),
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// One immutable version of a lineage: an ordinal bound to a shape
#[derive(Debug)]
pub struct SchemaVersion {
    lineage: String,
    ordinal: Ordinal,
    shape: Shape,
    deprecated: bool,
}

impl SchemaVersion {
    pub(crate) fn new(lineage: impl Into<String>, ordinal: Ordinal, shape: Shape, deprecated: bool) -> Self {
        Self {
            lineage: lineage.into(),
            ordinal,
            shape,
            deprecated,
        }
    }

    pub fn ordinal(&self) -> Ordinal {
        self.ordinal
    }

    /// Name of the lineage this version belongs to
    pub fn lineage(&self) -> &str {
        &self.lineage
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn raw(&self) -> &Value {
        self.shape.raw()
    }

    pub fn checksum(&self) -> &Checksum {
        self.shape.checksum()
    }

    /// Deprecated versions stay resolvable so legacy data can be migrated
    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.shape.is_valid(instance)
    }

    /// Validate an instance against this version's shape
    pub fn validate(&self, instance: &Value) -> Result<(), ValidationError> {
        let violations = self.shape.violations(instance);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                lineage: self.lineage.clone(),
                ordinal: self.ordinal,
                violations,
            })
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.lineage, self.ordinal.tag_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::runtime::Runtime;
    use serde_json::json;

    fn version(shape: Value) -> SchemaVersion {
        let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
        let shape = runtime.load_and_check(&shape).unwrap();
        SchemaVersion::new("test", Ordinal::new(1, 0), shape, false)
    }

    #[test]
    fn test_missing_field_names_the_field() {
        let v = version(json!({
            "type": "object",
            "required": ["title"],
            "properties": { "title": { "type": "string" } }
        }));

        let err = v.validate(&json!({ "name": "x" })).unwrap_err();
        assert_eq!(err.ordinal, Ordinal::new(1, 0));
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].kind, ViolationKind::MissingField);
        assert!(err.mentions("/title"));
    }

    #[test]
    fn test_type_and_constraint_violations() {
        let v = version(json!({
            "type": "object",
            "properties": {
                "count": { "type": "integer" },
                "mode": { "enum": ["light", "dark"] }
            }
        }));

        let err = v.validate(&json!({ "count": "three", "mode": "sepia" })).unwrap_err();
        let kinds: Vec<_> = err.violations.iter().map(|v| (v.path.as_str(), v.kind)).collect();
        assert!(kinds.contains(&("/count", ViolationKind::TypeMismatch)));
        assert!(kinds.contains(&("/mode", ViolationKind::Constraint)));
    }

    #[test]
    fn test_validation_does_not_mutate() {
        let v = version(json!({ "type": "object" }));
        let instance = json!({ "a": 1 });
        let before = instance.clone();
        assert!(v.validate(&instance).is_ok());
        assert!(v.is_valid(&instance));
        assert_eq!(instance, before);
    }
}
