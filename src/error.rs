//! Error types for coremodel lineages

use std::fmt;

use thiserror::Error;

use crate::lineage::Hop;
use crate::schema::Violation;
use crate::version::Ordinal;

/// Result type for coremodel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Umbrella error for callers that do not care which stage failed
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

/// A runtime, lineage or registry could not be built.
///
/// Always fatal for the component being built: nothing partially constructed
/// is ever returned alongside one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("Malformed shape for {subject}: {reason}")]
    MalformedShape { subject: String, reason: String },

    #[error("Invalid coremodel name '{name}': must match ^[a-z][a-z0-9_-]*$")]
    InvalidName { name: String },

    #[error("Lineage '{lineage}' declares no versions")]
    EmptyLineage { lineage: String },

    #[error("Lineage '{lineage}' declares version {ordinal} more than once")]
    DuplicateOrdinal { lineage: String, ordinal: Ordinal },

    #[error("Lineage '{lineage}': version {ordinal} follows {previous}, ordinals must strictly increase")]
    OutOfOrder {
        lineage: String,
        previous: Ordinal,
        ordinal: Ordinal,
    },

    #[error("Lineage '{lineage}': version {ordinal} opens a new major after {previous} and must start at minor 0")]
    InvalidSuccessor {
        lineage: String,
        previous: Ordinal,
        ordinal: Ordinal,
    },

    #[error("Lineage '{lineage}' has no lens between {from} and {to}")]
    MissingLens {
        lineage: String,
        from: Ordinal,
        to: Ordinal,
    },

    #[error("Lineage '{lineage}' has more than one lens between {from} and {to}")]
    DuplicateLens {
        lineage: String,
        from: Ordinal,
        to: Ordinal,
    },

    #[error("Lineage '{lineage}' has a lens {from} -> {to} that does not join adjacent versions")]
    OrphanLens {
        lineage: String,
        from: Ordinal,
        to: Ordinal,
    },

    #[error("Lineage '{lineage}': minor bump {from} -> {to} is breaking: {changes}")]
    BreakingMinorChange {
        lineage: String,
        from: Ordinal,
        to: Ordinal,
        changes: String,
    },

    #[error("Coremodel '{name}' is registered more than once")]
    DuplicateCoremodel { name: String },

    #[error("Invalid lineage definition {path}: {reason}")]
    Definition { path: String, reason: String },
}

/// An instance does not conform to the requested schema version
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Instance does not conform to {lineage} v{ordinal}: {}", ViolationSummary(.violations))]
pub struct ValidationError {
    pub lineage: String,
    pub ordinal: Ordinal,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Whether any violation is reported at the given instance path
    pub fn mentions(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

struct ViolationSummary<'a>(&'a [Violation]);

impl fmt::Display for ViolationSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

/// A translation between two versions of a lineage failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    #[error(transparent)]
    UnknownVersion(#[from] NotFoundError),

    #[error("Translation input rejected: {0}")]
    InvalidInput(ValidationError),

    #[error("Hop {index} ({hop}) failed: {reason}")]
    LensFailed {
        index: usize,
        hop: Hop,
        reason: String,
    },

    #[error("Hop {index} ({hop}) produced a non-conformant instance: {error}")]
    HopFailed {
        index: usize,
        hop: Hop,
        error: ValidationError,
    },
}

impl TranslationError {
    /// The hop that failed, if the failure happened mid-walk
    pub fn hop(&self) -> Option<&Hop> {
        match self {
            TranslationError::LensFailed { hop, .. } | TranslationError::HopFailed { hop, .. } => {
                Some(hop)
            }
            _ => None,
        }
    }
}

/// A coremodel name or version ordinal is unknown
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("Coremodel not found: {name}{}", suggestion_hint(.suggestion))]
    Coremodel {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Version {ordinal} not found in lineage '{lineage}'")]
    Version { lineage: String, ordinal: Ordinal },
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{}'?)", name),
        None => String::new(),
    }
}
