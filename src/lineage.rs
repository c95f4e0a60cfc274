//! Lineages
//!
//! A lineage is a named, strictly ordered sequence of schema versions joined
//! by lenses. Translation between any two versions is the unique linear walk
//! through the sequence, composing adjacent lenses one hop at a time.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::checksum::Checksum;
use crate::compat;
use crate::error::{ConstructionError, NotFoundError, TranslationError, ValidationError};
use crate::lens::{Direction, Lens};
use crate::runtime::Runtime;
use crate::schema::SchemaVersion;
use crate::version::Ordinal;

/// One step of a translation walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hop {
    pub from: Ordinal,
    pub to: Ordinal,
    pub direction: Direction,
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} {}", self.from, self.to, self.direction)
    }
}

struct VersionDecl {
    ordinal: Ordinal,
    shape: Value,
    deprecated: bool,
}

/// Collects versions and lenses, then checks them as a whole in [`build`](Self::build)
pub struct LineageBuilder {
    name: String,
    versions: Vec<VersionDecl>,
    lenses: Vec<Lens>,
}

impl LineageBuilder {
    pub fn version(mut self, ordinal: Ordinal, shape: Value) -> Self {
        self.versions.push(VersionDecl {
            ordinal,
            shape,
            deprecated: false,
        });
        self
    }

    pub fn deprecated_version(mut self, ordinal: Ordinal, shape: Value) -> Self {
        self.versions.push(VersionDecl {
            ordinal,
            shape,
            deprecated: true,
        });
        self
    }

    pub fn lens(mut self, lens: Lens) -> Self {
        self.lenses.push(lens);
        self
    }

    /// Load every shape through the runtime and verify the lineage is connected
    pub fn build(self, runtime: &Runtime) -> Result<Lineage, ConstructionError> {
        let LineageBuilder {
            name,
            versions: decls,
            lenses,
        } = self;

        if decls.is_empty() {
            return Err(ConstructionError::EmptyLineage { lineage: name });
        }

        for pair in decls.windows(2) {
            let (previous, ordinal) = (pair[0].ordinal, pair[1].ordinal);
            if ordinal == previous {
                return Err(ConstructionError::DuplicateOrdinal {
                    lineage: name,
                    ordinal,
                });
            }
            if ordinal < previous {
                return Err(ConstructionError::OutOfOrder {
                    lineage: name,
                    previous,
                    ordinal,
                });
            }
            if ordinal.is_breaking_from(&previous) && ordinal.minor != 0 {
                return Err(ConstructionError::InvalidSuccessor {
                    lineage: name,
                    previous,
                    ordinal,
                });
            }
        }

        let mut versions = Vec::with_capacity(decls.len());
        for decl in decls {
            let shape = runtime
                .load_and_check(&decl.shape)
                .map_err(|e| ConstructionError::MalformedShape {
                    subject: format!("{} v{}", name, decl.ordinal),
                    reason: e.reason,
                })?;
            versions.push(SchemaVersion::new(name.clone(), decl.ordinal, shape, decl.deprecated));
        }

        if runtime.config().enforce_minor_compatibility {
            for pair in versions.windows(2) {
                let (old, new) = (&pair[0], &pair[1]);
                if !new.ordinal().is_minor_bump_from(&old.ordinal()) {
                    continue;
                }
                let result = compat::check(old.raw(), new.raw());
                if result.is_breaking() {
                    return Err(ConstructionError::BreakingMinorChange {
                        lineage: name,
                        from: old.ordinal(),
                        to: new.ordinal(),
                        changes: result.summary(),
                    });
                }
            }
        }

        let lenses = order_lenses(&name, &versions, lenses)?;

        debug!(
            lineage = %name,
            versions = versions.len(),
            current = %versions[versions.len() - 1].ordinal(),
            "lineage constructed"
        );

        Ok(Lineage {
            name,
            versions,
            lenses,
        })
    }
}

/// Match each lens to its adjacent pair; slot `i` joins versions `i` and `i + 1`
fn order_lenses(
    name: &str,
    versions: &[SchemaVersion],
    lenses: Vec<Lens>,
) -> Result<Vec<Lens>, ConstructionError> {
    let mut slots: Vec<Option<Lens>> = vec![None; versions.len() - 1];

    for lens in lenses {
        let slot = versions
            .windows(2)
            .position(|pair| pair[0].ordinal() == lens.from() && pair[1].ordinal() == lens.to());
        let Some(slot) = slot else {
            return Err(ConstructionError::OrphanLens {
                lineage: name.to_string(),
                from: lens.from(),
                to: lens.to(),
            });
        };
        if slots[slot].is_some() {
            return Err(ConstructionError::DuplicateLens {
                lineage: name.to_string(),
                from: lens.from(),
                to: lens.to(),
            });
        }
        slots[slot] = Some(lens);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| ConstructionError::MissingLens {
                lineage: name.to_string(),
                from: versions[i].ordinal(),
                to: versions[i + 1].ordinal(),
            })
        })
        .collect()
}

/// An ordered, connected sequence of schema versions.
///
/// Immutable once built; every method takes `&self` and is safe to call
/// from any number of threads at once.
#[derive(Debug)]
pub struct Lineage {
    name: String,
    versions: Vec<SchemaVersion>,
    lenses: Vec<Lens>,
}

impl Lineage {
    pub fn builder(name: impl Into<String>) -> LineageBuilder {
        LineageBuilder {
            name: name.into(),
            versions: Vec::new(),
            lenses: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All versions, oldest first
    pub fn versions(&self) -> &[SchemaVersion] {
        &self.versions
    }

    pub fn ordinals(&self) -> impl Iterator<Item = Ordinal> + '_ {
        self.versions.iter().map(SchemaVersion::ordinal)
    }

    pub fn first(&self) -> &SchemaVersion {
        &self.versions[0]
    }

    /// The latest version: the only one without a successor
    pub fn current(&self) -> &SchemaVersion {
        &self.versions[self.versions.len() - 1]
    }

    pub fn version_at(&self, ordinal: Ordinal) -> Result<&SchemaVersion, NotFoundError> {
        self.index_of(ordinal).map(|i| &self.versions[i])
    }

    pub fn contains(&self, ordinal: Ordinal) -> bool {
        self.index_of(ordinal).is_ok()
    }

    fn index_of(&self, ordinal: Ordinal) -> Result<usize, NotFoundError> {
        self.versions
            .binary_search_by(|v| v.ordinal().cmp(&ordinal))
            .map_err(|_| NotFoundError::Version {
                lineage: self.name.clone(),
                ordinal,
            })
    }

    /// Validate an instance against the given version
    pub fn validate(&self, instance: &Value, ordinal: Ordinal) -> crate::Result<()> {
        let version = self.version_at(ordinal)?;
        if version.is_deprecated() {
            warn!(lineage = %self.name, version = %ordinal, "validating against deprecated version");
        }
        version.validate(instance)?;
        Ok(())
    }

    /// The newest version the instance conforms to.
    ///
    /// On failure the error carries the violations against the current version.
    pub fn validate_any(&self, instance: &Value) -> Result<Ordinal, ValidationError> {
        match self.versions.iter().rev().find(|v| v.is_valid(instance)) {
            Some(version) => Ok(version.ordinal()),
            None => {
                let current = self.current();
                current.validate(instance).map(|()| current.ordinal())
            }
        }
    }

    /// The hops walked to get from one version to another
    pub fn path(&self, from: Ordinal, to: Ordinal) -> Result<Vec<Hop>, NotFoundError> {
        let start = self.index_of(from)?;
        let end = self.index_of(to)?;
        Ok(self.walk(start, end).map(|(_, hop)| hop).collect())
    }

    /// (lens slot, hop) pairs from version index `start` to `end`
    fn walk(&self, start: usize, end: usize) -> Box<dyn Iterator<Item = (usize, Hop)> + '_> {
        let hop = move |slot: usize, direction: Direction| {
            let (lower, upper) = (self.versions[slot].ordinal(), self.versions[slot + 1].ordinal());
            let (from, to) = match direction {
                Direction::Forward => (lower, upper),
                Direction::Backward => (upper, lower),
            };
            (slot, Hop { from, to, direction })
        };

        if start <= end {
            Box::new((start..end).map(move |slot| hop(slot, Direction::Forward)))
        } else {
            Box::new((end..start).rev().map(move |slot| hop(slot, Direction::Backward)))
        }
    }

    /// Translate an instance between two versions of this lineage.
    ///
    /// Translating a version to itself returns the input unchanged. Otherwise
    /// the input must conform to `from`, and every hop's output must conform to
    /// that hop's target; the walk stops at the first hop that fails.
    pub fn translate(&self, instance: &Value, from: Ordinal, to: Ordinal) -> Result<Value, TranslationError> {
        let start = self.index_of(from)?;
        let end = self.index_of(to)?;
        if start == end {
            return Ok(instance.clone());
        }

        self.versions[start]
            .validate(instance)
            .map_err(TranslationError::InvalidInput)?;

        debug!(lineage = %self.name, from = %from, to = %to, "translating instance");

        let mut current = instance.clone();
        for (index, (slot, hop)) in self.walk(start, end).enumerate() {
            let target = self.version_at(hop.to)?;
            current = self.lenses[slot]
                .apply(hop.direction, &current)
                .map_err(|e| TranslationError::LensFailed {
                    index,
                    hop,
                    reason: e.to_string(),
                })?;
            target
                .validate(&current)
                .map_err(|error| TranslationError::HopFailed { index, hop, error })?;
            trace!(lineage = %self.name, hop = %hop, "hop applied");
        }

        Ok(current)
    }

    /// Translate an instance to the current version
    pub fn translate_to_current(&self, instance: &Value, from: Ordinal) -> Result<Value, TranslationError> {
        self.translate(instance, from, self.current().ordinal())
    }

    /// Digest of every version ordinal and shape, in order
    pub fn fingerprint(&self) -> Checksum {
        Checksum::combine(
            self.versions
                .iter()
                .map(|v| (v.ordinal().to_string(), v.checksum())),
        )
    }
}
