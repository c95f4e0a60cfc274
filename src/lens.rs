//! Lenses: bidirectional translations between adjacent schema versions
//!
//! A lens is authored either from a pair of closures or from a list of
//! declarative [`LensOp`]s. Declarative lenses can derive their backward
//! direction by inverting the forward ops.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::version::Ordinal;

/// A lens function rejected its input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct LensError(pub String);

impl LensError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Which way a lens is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Older version to newer version
    Forward,
    /// Newer version to older version
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Backward => f.write_str("backward"),
        }
    }
}

pub type LensFn = Arc<dyn Fn(&Value) -> Result<Value, LensError> + Send + Sync>;

/// Translation between two adjacent versions, in both directions
#[derive(Clone)]
pub struct Lens {
    from: Ordinal,
    to: Ordinal,
    forward: LensFn,
    backward: LensFn,
}

impl Lens {
    pub fn new<F, B>(from: Ordinal, to: Ordinal, forward: F, backward: B) -> Self
    where
        F: Fn(&Value) -> Result<Value, LensError> + Send + Sync + 'static,
        B: Fn(&Value) -> Result<Value, LensError> + Send + Sync + 'static,
    {
        Self {
            from,
            to,
            forward: Arc::new(forward),
            backward: Arc::new(backward),
        }
    }

    /// A lens that passes instances through unchanged in both directions
    pub fn identity(from: Ordinal, to: Ordinal) -> Self {
        Self::new(from, to, |v| Ok(v.clone()), |v| Ok(v.clone()))
    }

    /// A lens from explicit op lists for each direction
    pub fn from_ops(from: Ordinal, to: Ordinal, forward: Vec<LensOp>, backward: Vec<LensOp>) -> Self {
        Self::new(
            from,
            to,
            move |v| apply_ops(&forward, v),
            move |v| apply_ops(&backward, v),
        )
    }

    /// A lens whose backward direction undoes `ops` in reverse order
    pub fn declarative(from: Ordinal, to: Ordinal, ops: Vec<LensOp>) -> Self {
        let backward = invert_ops(&ops);
        Self::from_ops(from, to, ops, backward)
    }

    pub fn from(&self) -> Ordinal {
        self.from
    }

    pub fn to(&self) -> Ordinal {
        self.to
    }

    /// Translate an instance; the input is never modified
    pub fn apply(&self, direction: Direction, instance: &Value) -> Result<Value, LensError> {
        match direction {
            Direction::Forward => (self.forward)(instance),
            Direction::Backward => (self.backward)(instance),
        }
    }
}

impl fmt::Debug for Lens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

/// A value substitution used by [`LensOp::Map`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePair {
    pub from: Value,
    pub to: Value,
}

/// A declarative, invertible edit applied to an instance.
///
/// Paths are JSON pointers (`/options/theme`) or dotted (`options.theme`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LensOp {
    /// Move a field; no-op when the source is absent
    Rename { from: String, to: String },
    /// Insert a field when it is absent
    Add { path: String, value: Value },
    /// Delete a field; the inverse restores it with `restore`
    Remove {
        path: String,
        #[serde(default)]
        restore: Value,
    },
    /// Substitute values of a field; unmapped values pass through
    Map { path: String, mapping: Vec<ValuePair> },
}

impl LensOp {
    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        LensOp::Rename {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn add(path: impl Into<String>, value: Value) -> Self {
        LensOp::Add {
            path: path.into(),
            value,
        }
    }

    pub fn remove(path: impl Into<String>, restore: Value) -> Self {
        LensOp::Remove {
            path: path.into(),
            restore,
        }
    }

    pub fn map<I>(path: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        LensOp::Map {
            path: path.into(),
            mapping: pairs
                .into_iter()
                .map(|(from, to)| ValuePair { from, to })
                .collect(),
        }
    }

    /// The op that undoes this one
    pub fn invert(&self) -> LensOp {
        match self {
            LensOp::Rename { from, to } => LensOp::Rename {
                from: to.clone(),
                to: from.clone(),
            },
            LensOp::Add { path, value } => LensOp::Remove {
                path: path.clone(),
                restore: value.clone(),
            },
            LensOp::Remove { path, restore } => LensOp::Add {
                path: path.clone(),
                value: restore.clone(),
            },
            LensOp::Map { path, mapping } => LensOp::Map {
                path: path.clone(),
                mapping: mapping
                    .iter()
                    .map(|p| ValuePair {
                        from: p.to.clone(),
                        to: p.from.clone(),
                    })
                    .collect(),
            },
        }
    }

    fn apply(&self, instance: &mut Value) -> Result<(), LensError> {
        match self {
            LensOp::Rename { from, to } => {
                if let Some(value) = take(instance, &parse_path(from)?) {
                    insert(instance, &parse_path(to)?, value)?;
                }
            }
            LensOp::Add { path, value } => {
                let segments = parse_path(path)?;
                if lookup(instance, &segments).is_none() {
                    insert(instance, &segments, value.clone())?;
                }
            }
            LensOp::Remove { path, .. } => {
                take(instance, &parse_path(path)?);
            }
            LensOp::Map { path, mapping } => {
                let segments = parse_path(path)?;
                if let Some(current) = lookup_mut(instance, &segments) {
                    if let Some(pair) = mapping.iter().find(|p| p.from == *current) {
                        *current = pair.to.clone();
                    }
                }
            }
        }
        Ok(())
    }
}

/// Apply ops in order to a copy of the instance
pub fn apply_ops(ops: &[LensOp], instance: &Value) -> Result<Value, LensError> {
    let mut out = instance.clone();
    for op in ops {
        op.apply(&mut out)?;
    }
    Ok(out)
}

/// Invert an op list: each op inverted, in reverse order
pub fn invert_ops(ops: &[LensOp]) -> Vec<LensOp> {
    ops.iter().rev().map(LensOp::invert).collect()
}

fn parse_path(path: &str) -> Result<Vec<String>, LensError> {
    let segments: Vec<String> = if let Some(pointer) = path.strip_prefix('/') {
        pointer
            .split('/')
            .map(|s| s.replace("~1", "/").replace("~0", "~"))
            .collect()
    } else {
        path.split('.').map(str::to_string).collect()
    };

    if segments.iter().any(String::is_empty) {
        return Err(LensError::new(format!("invalid field path '{}'", path)));
    }
    Ok(segments)
}

fn lookup<'v>(value: &'v Value, segments: &[String]) -> Option<&'v Value> {
    segments
        .iter()
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

fn lookup_mut<'v>(value: &'v mut Value, segments: &[String]) -> Option<&'v mut Value> {
    segments
        .iter()
        .try_fold(value, |current, segment| current.as_object_mut()?.get_mut(segment))
}

fn take(value: &mut Value, segments: &[String]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;
    lookup_mut(value, parents)?.as_object_mut()?.remove(last)
}

/// Insert a value, creating intermediate objects as needed
fn insert(value: &mut Value, segments: &[String], new: Value) -> Result<(), LensError> {
    let Some((last, parents)) = segments.split_last() else {
        return Err(LensError::new("empty field path"));
    };

    let mut current = value;
    for segment in parents {
        let map = current
            .as_object_mut()
            .ok_or_else(|| LensError::new(format!("'{}' is not inside an object", segment)))?;
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    current
        .as_object_mut()
        .ok_or_else(|| LensError::new(format!("cannot set '{}' on a non-object", last)))?
        .insert(last.clone(), new);
    Ok(())
}
