//! Coremodels
//!
//! Stable structural contracts for domain objects whose shape changes over
//! time through versioned, breaking schema revisions.
//!
//! ## Features
//!
//! - **Lineages**: Strictly ordered `major.minor` schema versions joined by lenses
//! - **Validation**: Every version validates instances through JSON Schema
//! - **Translation**: Instances move between any two versions by composing
//!   adjacent lenses along the single linear walk
//! - **Registry**: All coremodels built once against a shared runtime, reachable
//!   by name or as one ordered collection
//!
//! ## Architecture
//!
//! ```text
//! Runtime ──▶ Lineage::builder(..).build(&runtime)
//!                 │
//!                 ▼
//!          Coremodel (lineage + capability contract)
//!                 │
//!                 ▼
//!          Registry::builder().with(..).build(&runtime)
//!                 ├── get("dashboard")  typed lookup
//!                 └── all()             ordered, generic
//! ```

pub mod checksum;
pub mod compat;
pub mod config;
pub mod coremodel;
pub mod definition;
pub mod error;
pub mod lens;
pub mod lineage;
pub mod registry;
pub mod runtime;
pub mod schema;
pub mod version;

pub use checksum::Checksum;
pub use config::{CoremodelConfig, RuntimeConfig, SchemaDraft};
pub use coremodel::{Coremodel, DefinedCoremodel, NewCoremodel};
pub use definition::LineageDefinition;
pub use error::{ConstructionError, Error, NotFoundError, Result, TranslationError, ValidationError};
pub use lens::{Direction, Lens, LensError, LensOp};
pub use lineage::{Hop, Lineage, LineageBuilder};
pub use registry::{ModelReport, Registry, RegistryBuilder};
pub use runtime::{Runtime, ShapeError};
pub use schema::{SchemaVersion, Shape, Violation, ViolationKind};
pub use version::Ordinal;
