//! Coremodel Registry
//!
//! Aggregates every known coremodel behind one access surface. A registry is
//! built once against a shared [`Runtime`], is fully checked before it is
//! returned, and is immutable afterwards.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::coremodel::{Coremodel, NewCoremodel};
use crate::definition::{self, LineageDefinition};
use crate::error::{ConstructionError, NotFoundError};
use crate::runtime::Runtime;
use crate::schema::Violation;
use crate::version::Ordinal;

type Constructor = Box<dyn FnOnce(&Runtime) -> Result<Arc<dyn Coremodel>, ConstructionError>>;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("coremodel name pattern is valid"))
}

/// Declares coremodels in order; nothing is constructed until [`build`](Self::build)
#[derive(Default)]
pub struct RegistryBuilder {
    constructors: Vec<Constructor>,
}

impl RegistryBuilder {
    /// Register a coremodel constructor
    pub fn with<C, F>(mut self, constructor: F) -> Self
    where
        C: Coremodel + 'static,
        F: FnOnce(&Runtime) -> Result<C, ConstructionError> + 'static,
    {
        self.constructors.push(Box::new(move |runtime: &Runtime| {
            constructor(runtime).map(|model| Arc::new(model) as Arc<dyn Coremodel>)
        }));
        self
    }

    /// Register a coremodel type by its [`NewCoremodel`] constructor
    pub fn with_new<C: NewCoremodel + 'static>(self) -> Self {
        self.with(C::new)
    }

    /// Register an already constructed coremodel
    pub fn with_model(mut self, model: Arc<dyn Coremodel>) -> Self {
        self.constructors
            .push(Box::new(move |_: &Runtime| -> Result<Arc<dyn Coremodel>, ConstructionError> { Ok(model) }));
        self
    }

    /// Register a coremodel declared by a definition file
    pub fn with_definition(self, definition: LineageDefinition) -> Self {
        self.with(move |runtime: &Runtime| definition.into_coremodel(runtime))
    }

    /// Construct every coremodel in declaration order.
    ///
    /// The first failure is returned and no registry is produced.
    pub fn build(self, runtime: &Runtime) -> Result<Registry, ConstructionError> {
        let mut models: Vec<Arc<dyn Coremodel>> = Vec::with_capacity(self.constructors.len());
        let mut index = HashMap::with_capacity(self.constructors.len());

        for constructor in self.constructors {
            let model = constructor(runtime)?;
            let name = model.name().to_string();

            if !name_pattern().is_match(&name) {
                return Err(ConstructionError::InvalidName { name });
            }
            if index.contains_key(&name) {
                return Err(ConstructionError::DuplicateCoremodel { name });
            }

            info!(
                coremodel = %name,
                versions = model.lineage().versions().len(),
                current = %model.current_version(),
                "registered coremodel"
            );
            index.insert(name, models.len());
            models.push(model);
        }

        info!(coremodels = models.len(), "registry ready");
        Ok(Registry { models, index })
    }
}

/// Outcome of validating one instance against one coremodel
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub coremodel: String,
    pub current_version: Ordinal,
    /// Newest version the instance conforms to, if any
    pub matched_version: Option<Ordinal>,
    /// Violations against the current version when nothing matched
    pub violations: Vec<Violation>,
}

impl ModelReport {
    pub fn is_valid(&self) -> bool {
        self.matched_version.is_some()
    }
}

/// All known coremodels, by name and in declaration order
pub struct Registry {
    models: Vec<Arc<dyn Coremodel>>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Build a registry from lineage definitions, in the given order
    pub fn from_definitions<I>(runtime: &Runtime, definitions: I) -> Result<Self, ConstructionError>
    where
        I: IntoIterator<Item = LineageDefinition>,
    {
        definitions
            .into_iter()
            .fold(Self::builder(), RegistryBuilder::with_definition)
            .build(runtime)
    }

    /// Build a registry from every definition file in a directory
    pub fn load_dir(runtime: &Runtime, dir: impl AsRef<Path>) -> Result<Self, ConstructionError> {
        Self::from_definitions(runtime, definition::load_dir(dir)?)
    }

    /// Look up a coremodel by name
    pub fn get(&self, name: &str) -> Result<&Arc<dyn Coremodel>, NotFoundError> {
        self.index
            .get(name)
            .map(|&i| &self.models[i])
            .ok_or_else(|| NotFoundError::Coremodel {
                name: name.to_string(),
                suggestion: self.suggest(name).map(str::to_string),
            })
    }

    /// Every coremodel, in declaration order
    pub fn all(&self) -> &[Arc<dyn Coremodel>] {
        &self.models
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Closest registered name to a misspelled one
    pub fn suggest(&self, name: &str) -> Option<&str> {
        let matcher = SkimMatcherV2::default();
        self.names()
            .filter_map(|candidate| matcher.fuzzy_match(candidate, name).map(|score| (score, candidate)))
            .max_by_key(|(score, _)| *score)
            .map(|(_, candidate)| candidate)
    }

    /// Validate one instance against every coremodel, in declaration order
    pub fn validate_all(&self, instance: &Value) -> Vec<ModelReport> {
        self.models
            .iter()
            .map(|model| {
                let (matched_version, violations) = match model.validate_any(instance) {
                    Ok(ordinal) => (Some(ordinal), Vec::new()),
                    Err(e) => (None, e.violations),
                };
                ModelReport {
                    coremodel: model.name().to_string(),
                    current_version: model.current_version(),
                    matched_version,
                    violations,
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.models.iter()).finish()
    }
}

/// Declare a registry struct with one typed accessor per coremodel.
///
/// Every field type must implement [`NewCoremodel`], which the compiler
/// checks. The generated `new` constructs each coremodel once; the named
/// accessor and the matching `all()` entry share that instance.
///
/// ```ignore
/// coremodel_registry! {
///     pub struct Coremodels {
///         dashboard: Dashboard,
///         datasource: Datasource,
///     }
/// }
///
/// let models = Coremodels::new(&runtime)?;
/// models.dashboard().current_version();
/// ```
#[macro_export]
macro_rules! coremodel_registry {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($field:ident : $ty:ty),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $($field: ::std::sync::Arc<$ty>,)+
            registry: $crate::Registry,
        }

        impl $name {
            $vis fn new(runtime: &$crate::Runtime) -> ::std::result::Result<Self, $crate::ConstructionError> {
                $(
                    let $field = ::std::sync::Arc::new(<$ty as $crate::NewCoremodel>::new(runtime)?);
                )+
                let registry = $crate::Registry::builder()
                    $(.with_model($field.clone() as ::std::sync::Arc<dyn $crate::Coremodel>))+
                    .build(runtime)?;
                Ok(Self { $($field,)+ registry })
            }

            $(
                $vis fn $field(&self) -> &::std::sync::Arc<$ty> {
                    &self.$field
                }
            )+

            /// Every coremodel, in declaration order
            $vis fn all(&self) -> &[::std::sync::Arc<dyn $crate::Coremodel>] {
                self.registry.all()
            }

            $vis fn registry(&self) -> &$crate::Registry {
                &self.registry
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.registry).finish()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::coremodel::DefinedCoremodel;
    use crate::lens::{Lens, LensOp};
    use crate::lineage::Lineage;
    use serde_json::json;

    fn runtime() -> Runtime {
        Runtime::new(RuntimeConfig::default()).unwrap()
    }

    fn single(name: &str, required: &str) -> impl FnOnce(&Runtime) -> Result<DefinedCoremodel, ConstructionError> {
        let name = name.to_string();
        let required = required.to_string();
        move |runtime: &Runtime| {
            let lineage = Lineage::builder(name)
                .version(Ordinal::new(0, 0), json!({ "type": "object", "required": [required] }))
                .build(runtime)?;
            Ok(DefinedCoremodel::new(lineage))
        }
    }

    #[test]
    fn test_declaration_order_and_lookup() {
        let registry = Registry::builder()
            .with(single("zeta", "z"))
            .with(single("alpha", "a"))
            .build(&runtime())
            .unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("alpha").unwrap().name(), "alpha");
    }

    #[test]
    fn test_unknown_name_suggests() {
        let registry = Registry::builder()
            .with(single("dashboard", "title"))
            .with(single("playlist", "items"))
            .build(&runtime())
            .unwrap();

        match registry.get("dashbord").unwrap_err() {
            NotFoundError::Coremodel { name, suggestion } => {
                assert_eq!(name, "dashbord");
                assert_eq!(suggestion.as_deref(), Some("dashboard"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_construction_failures_abort() {
        let err = Registry::builder()
            .with(single("alpha", "a"))
            .with(single("alpha", "b"))
            .build(&runtime())
            .unwrap_err();
        assert_eq!(err, ConstructionError::DuplicateCoremodel { name: "alpha".into() });

        let err = Registry::builder()
            .with(single("Alpha", "a"))
            .build(&runtime())
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidName { .. }));

        let err = Registry::builder()
            .with(single("alpha", "a"))
            .with(|runtime: &Runtime| {
                Lineage::builder("broken").build(runtime).map(DefinedCoremodel::new)
            })
            .build(&runtime())
            .unwrap_err();
        assert!(matches!(err, ConstructionError::EmptyLineage { .. }));
    }

    #[test]
    fn test_validate_all_report() {
        let rt = runtime();
        let doc = Lineage::builder("doc")
            .version(Ordinal::new(1, 0), json!({ "type": "object", "required": ["title"] }))
            .version(Ordinal::new(2, 0), json!({ "type": "object", "required": ["name"] }))
            .lens(Lens::declarative(
                Ordinal::new(1, 0),
                Ordinal::new(2, 0),
                vec![LensOp::rename("title", "name")],
            ))
            .build(&rt)
            .unwrap();

        let registry = Registry::builder()
            .with_model(Arc::new(DefinedCoremodel::new(doc)))
            .with(single("tag", "label"))
            .build(&rt)
            .unwrap();

        let reports = registry.validate_all(&json!({ "title": "x" }));
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].coremodel, "doc");
        assert_eq!(reports[0].matched_version, Some(Ordinal::new(1, 0)));
        assert!(reports[0].is_valid());
        assert_eq!(reports[1].coremodel, "tag");
        assert!(!reports[1].is_valid());
        assert_eq!(reports[1].violations[0].path, "/label");
    }
}
