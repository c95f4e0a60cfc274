//! The capability contract shared by every coremodel

use std::fmt;

use serde_json::Value;

use crate::error::{ConstructionError, TranslationError, ValidationError};
use crate::lineage::Lineage;
use crate::runtime::Runtime;
use crate::version::Ordinal;

/// A named binding of one lineage to the common capability interface.
///
/// Generic callers (validation middleware, linters, report builders) only
/// ever use these methods, regardless of which coremodel they hold.
pub trait Coremodel: Send + Sync {
    fn lineage(&self) -> &Lineage;

    fn name(&self) -> &str {
        self.lineage().name()
    }

    fn current_version(&self) -> Ordinal {
        self.lineage().current().ordinal()
    }

    fn validate(&self, instance: &Value, ordinal: Ordinal) -> crate::Result<()> {
        self.lineage().validate(instance, ordinal)
    }

    /// The newest version the instance conforms to
    fn validate_any(&self, instance: &Value) -> Result<Ordinal, ValidationError> {
        self.lineage().validate_any(instance)
    }

    fn translate(&self, instance: &Value, from: Ordinal, to: Ordinal) -> Result<Value, TranslationError> {
        self.lineage().translate(instance, from, to)
    }
}

/// The constructor seam: how a coremodel is built against the shared runtime
pub trait NewCoremodel: Coremodel + Sized {
    fn new(runtime: &Runtime) -> Result<Self, ConstructionError>;
}

impl fmt::Debug for dyn Coremodel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coremodel")
            .field("name", &self.name())
            .field("current_version", &self.current_version())
            .finish()
    }
}

/// A coremodel that is nothing more than its lineage
#[derive(Debug)]
pub struct DefinedCoremodel {
    lineage: Lineage,
    description: Option<String>,
}

impl DefinedCoremodel {
    pub fn new(lineage: Lineage) -> Self {
        Self {
            lineage,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl Coremodel for DefinedCoremodel {
    fn lineage(&self) -> &Lineage {
        &self.lineage
    }
}
