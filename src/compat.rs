//! Shape compatibility checking
//!
//! Detects structural changes between two JSON Schema shapes and classifies
//! which of them break instances written against the older shape. Lineages use
//! this to keep minor bumps additive.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A detected change between two shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeChange {
    pub change_type: ChangeType,
    /// Path to the changed element (e.g., "properties.name.type")
    pub path: String,
    pub is_breaking: bool,
    pub description: String,
}

/// Type of shape change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    FieldAdded,
    FieldRemoved,
    TypeChanged,
    /// An existing optional field became required
    OptionalityChanged,
    EnumVariantAdded,
    EnumVariantRemoved,
    /// A new restriction (enum, closed object) on values that were accepted before
    ConstraintAdded,
}

/// Summary of a compatibility check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub changes: Vec<ShapeChange>,
}

impl CompatibilityResult {
    pub fn is_breaking(&self) -> bool {
        self.changes.iter().any(|c| c.is_breaking)
    }

    pub fn breaking_changes(&self) -> impl Iterator<Item = &ShapeChange> {
        self.changes.iter().filter(|c| c.is_breaking)
    }

    /// One-line description of the breaking changes
    pub fn summary(&self) -> String {
        self.breaking_changes()
            .map(|c| c.description.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Compare two shapes
pub fn check(old: &Value, new: &Value) -> CompatibilityResult {
    let mut changes = Vec::new();
    detect_changes(old, new, "", &mut changes);
    CompatibilityResult { changes }
}

fn required_set(schema: &Value) -> HashSet<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// `path.key`, or `key` at the root
fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

/// Declared instance types; `None` when the shape leaves the type open
fn type_set(schema: &Value) -> Option<Vec<&str>> {
    match schema.get("type")? {
        Value::String(t) => Some(vec![t.as_str()]),
        Value::Array(types) => Some(types.iter().filter_map(Value::as_str).collect()),
        _ => None,
    }
}

/// Whether every instance of the old type set is still accepted
fn types_accept(old: Option<&[&str]>, new: Option<&[&str]>) -> bool {
    let Some(new) = new else {
        return true;
    };
    let Some(old) = old else {
        return false;
    };
    old.iter()
        .all(|t| new.contains(t) || (*t == "integer" && new.contains(&"number")))
}

/// Human-readable name of the node at `path`
fn subject(path: &str) -> String {
    if path.is_empty() {
        "Root".to_string()
    } else {
        format!("'{}'", path)
    }
}

fn is_closed(schema: &Value) -> bool {
    schema.get("additionalProperties") == Some(&Value::Bool(false))
}

fn detect_changes(old: &Value, new: &Value, path: &str, changes: &mut Vec<ShapeChange>) {
    let subject = subject(path);

    let old_types = type_set(old);
    let new_types = type_set(new);
    if old_types != new_types {
        let accepted = types_accept(old_types.as_deref(), new_types.as_deref());
        changes.push(ShapeChange {
            change_type: ChangeType::TypeChanged,
            path: child(path, "type"),
            is_breaking: !accepted,
            description: format!("{} type changed", subject),
        });
        if !accepted {
            return;
        }
    }

    if !is_closed(old) && is_closed(new) {
        changes.push(ShapeChange {
            change_type: ChangeType::ConstraintAdded,
            path: child(path, "additionalProperties"),
            is_breaking: true,
            description: format!("{} no longer allows additional properties", subject),
        });
    }

    let old_required = required_set(old);
    let new_required = required_set(new);
    let empty = serde_json::Map::new();
    let old_props = old.get("properties").and_then(Value::as_object).unwrap_or(&empty);
    let new_props = new.get("properties").and_then(Value::as_object).unwrap_or(&empty);
    let properties = child(path, "properties");

    for (name, old_prop) in old_props {
        let prop_path = child(&properties, name);
        match new_props.get(name) {
            Some(new_prop) => detect_changes(old_prop, new_prop, &prop_path, changes),
            None => changes.push(ShapeChange {
                change_type: ChangeType::FieldRemoved,
                path: prop_path,
                is_breaking: true,
                description: format!("Property '{}' was removed", name),
            }),
        }
    }

    for name in new_props.keys().filter(|n| !old_props.contains_key(*n)) {
        let required = new_required.contains(name.as_str());
        changes.push(ShapeChange {
            change_type: ChangeType::FieldAdded,
            path: child(&properties, name),
            is_breaking: required,
            description: if required {
                format!("Required property '{}' was added", name)
            } else {
                format!("Optional property '{}' was added", name)
            },
        });
    }

    // Fields that existed before but only now became mandatory
    let mut tightened: Vec<&&str> = new_required
        .iter()
        .filter(|n| !old_required.contains(**n) && old_props.contains_key(**n))
        .collect();
    tightened.sort();
    for name in tightened {
        changes.push(ShapeChange {
            change_type: ChangeType::OptionalityChanged,
            path: child(&properties, name),
            is_breaking: true,
            description: format!("Property '{}' became required", name),
        });
    }

    detect_enum_changes(old, new, path, changes);
}

fn detect_enum_changes(old: &Value, new: &Value, path: &str, changes: &mut Vec<ShapeChange>) {
    let Some(new_enum) = new.get("enum").and_then(Value::as_array) else {
        return;
    };
    let Some(old_enum) = old.get("enum").and_then(Value::as_array) else {
        changes.push(ShapeChange {
            change_type: ChangeType::ConstraintAdded,
            path: child(path, "enum"),
            is_breaking: true,
            description: format!("{} is now restricted to an enum", subject(path)),
        });
        return;
    };

    for removed in old_enum.iter().filter(|v| !new_enum.contains(v)) {
        changes.push(ShapeChange {
            change_type: ChangeType::EnumVariantRemoved,
            path: child(path, "enum"),
            is_breaking: true,
            description: format!("Enum variant {} was removed", removed),
        });
    }
    for added in new_enum.iter().filter(|v| !old_enum.contains(v)) {
        changes.push(ShapeChange {
            change_type: ChangeType::EnumVariantAdded,
            path: child(path, "enum"),
            is_breaking: false,
            description: format!("Enum variant {} was added", added),
        });
    }
}
