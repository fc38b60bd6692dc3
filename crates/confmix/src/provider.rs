//! turning source declarations into sources
//!
//! A [ProviderRegistry] maps declaration tags to [SourceProvider]s. [ConfigBuilder] walks a
//! [Definition] and registers the created sources in a [CombinedView]:
//!
//! - override declarations go into the result, combined by an [OverrideCombiner]
//! - additional declarations go into a nested view combined by a [UnionCombiner], registered in
//!   the result as [ADDITIONAL_NAME]
//!
//! A declaration marked optional that fails to load is replaced by an empty source. A tag without
//! provider is always an error.
use crate::combined::CombinedView;
use crate::combiner::{OverrideCombiner, UnionCombiner};
use crate::definition::Definition;
use crate::error::{Error, Result};
use crate::hierarchical::HierarchicalConfig;
use crate::source::{shared, SharedSource};
use crate::sources::{EnvSource, FileSource, Format, LoadError};
use crate::value::Value;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Registration name of the nested view holding all additional sources
pub const ADDITIONAL_NAME: &str = "confmix.additional";

const CONFIG_NAME: &str = "config_name";
const CONFIG_AT: &str = "config_at";
const CONFIG_OPTIONAL: &str = "config_optional";
const AT: &str = "at";
const OPTIONAL: &str = "optional";

/// A declared source: a tag naming the provider and its attributes
#[derive(derive_new::new, Debug, Clone, PartialEq)]
pub struct SourceDeclaration {
    pub tag: String,
    pub attributes: IndexMap<String, Value>,
    /// Directory relative file names are resolved against
    #[new(default)]
    pub base_dir: Option<PathBuf>,
}

impl SourceDeclaration {
    /// Name the source is registered under
    pub fn name(&self) -> Option<String> {
        self.reserved(CONFIG_NAME, None)
            .and_then(Value::to_scalar_string)
    }

    /// Path the source is mounted at
    pub fn at(&self) -> Option<String> {
        self.reserved(CONFIG_AT, Some(AT))
            .and_then(Value::to_scalar_string)
    }

    pub fn is_optional(&self) -> Result<bool, LoadError> {
        let attribute = if self.attributes.contains_key(CONFIG_OPTIONAL) {
            CONFIG_OPTIONAL
        } else {
            OPTIONAL
        };

        match self.attributes.get(attribute) {
            None => Ok(false),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| LoadError::InvalidBoolean(attribute.to_string())),
        }
    }

    /// Attribute meant for the provider; reserved attributes are not visible here
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        if self.is_reserved(name) {
            return None;
        }
        self.attributes.get(name)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes
            .iter()
            .filter(|(name, _)| !self.is_reserved(name))
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn required_parameter(&self, name: &'static str) -> Result<String, LoadError> {
        self.parameter(name)
            .and_then(Value::to_scalar_string)
            .ok_or_else(|| LoadError::MissingParameter {
                tag: self.tag.clone(),
                parameter: name,
            })
    }

    /// Resolve a path relative to [SourceDeclaration::base_dir]
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match &self.base_dir {
            Some(base_dir) if path.is_relative() => base_dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// `at` and `optional` are only reserved while their prefixed variant is absent
    fn is_reserved(&self, name: &str) -> bool {
        match name {
            CONFIG_NAME | CONFIG_AT | CONFIG_OPTIONAL => true,
            AT => !self.attributes.contains_key(CONFIG_AT),
            OPTIONAL => !self.attributes.contains_key(CONFIG_OPTIONAL),
            _ => false,
        }
    }

    fn reserved(&self, prefixed: &str, plain: Option<&str>) -> Option<&Value> {
        self.attributes
            .get(prefixed)
            .or_else(|| plain.and_then(|plain| self.attributes.get(plain)))
    }
}

/// Factory for the sources of one tag
pub trait SourceProvider {
    fn create(&self, declaration: &SourceDeclaration) -> Result<SharedSource, LoadError>;
}

// blanket impl for Fn
impl<F> SourceProvider for F
where
    F: Fn(&SourceDeclaration) -> Result<SharedSource, LoadError>,
{
    fn create(&self, declaration: &SourceDeclaration) -> Result<SharedSource, LoadError> {
        self(declaration)
    }
}

/// Tag to provider mapping
///
/// [Default] registers `properties`, `json`, `yaml`, `hcl`, `file` and `env`.
pub struct ProviderRegistry {
    providers: IndexMap<String, Rc<dyn SourceProvider>>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            providers: IndexMap::new(),
        }
    }

    /// Register a provider, replacing and returning the previous one of that tag
    pub fn add_provider(
        &mut self,
        tag: &str,
        provider: impl SourceProvider + 'static,
    ) -> Result<Option<Rc<dyn SourceProvider>>> {
        if tag.is_empty() {
            return Err(Error::InvalidArgument("provider tag must not be empty".into()));
        }
        Ok(self.providers.insert(tag.to_string(), Rc::new(provider)))
    }

    pub fn remove_provider(&mut self, tag: &str) -> Option<Rc<dyn SourceProvider>> {
        self.providers.shift_remove(tag)
    }

    pub fn provider_for_tag(&self, tag: &str) -> Option<&Rc<dyn SourceProvider>> {
        self.providers.get(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (tag, format) in [
            ("properties", Format::Properties),
            ("json", Format::Json),
            ("yaml", Format::Yaml),
            ("hcl", Format::Hcl),
        ] {
            registry.providers.insert(
                tag.to_string(),
                Rc::new(move |declaration: &SourceDeclaration| {
                    file_source(declaration, Some(format))
                }),
            );
        }
        registry
            .providers
            .insert("file".to_string(), Rc::new(any_file_source));
        registry
            .providers
            .insert("env".to_string(), Rc::new(env_source));
        registry
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tags()).finish()
    }
}

fn file_source(
    declaration: &SourceDeclaration,
    format: Option<Format>,
) -> Result<SharedSource, LoadError> {
    let path = declaration.resolve_path(declaration.required_parameter("file")?);
    let source: SharedSource = shared(FileSource::load(path, format)?);
    Ok(source)
}

/// `file` with the format taken from a `format` parameter or the file extension
fn any_file_source(declaration: &SourceDeclaration) -> Result<SharedSource, LoadError> {
    let format = match declaration.parameter("format") {
        None => None,
        Some(value) => {
            let name = value.to_scalar_string().unwrap_or_default();
            let format = Format::from_name(&name)
                .ok_or_else(|| LoadError::UnknownFormat(PathBuf::from(name)))?;
            Some(format)
        }
    };
    file_source(declaration, format)
}

fn env_source(declaration: &SourceDeclaration) -> Result<SharedSource, LoadError> {
    let prefix = declaration
        .parameter("prefix")
        .and_then(Value::to_scalar_string);
    let source: SharedSource = shared(EnvSource::from_env(prefix.as_deref()));
    Ok(source)
}

/// Builds combined views from definitions
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    registry: ProviderRegistry,
}

impl ConfigBuilder {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProviderRegistry {
        &mut self.registry
    }

    pub fn load_file(&self, path: &Path) -> Result<CombinedView> {
        let definition = Definition::load_file(path)?;
        self.build(&definition)
    }

    pub fn build(&self, definition: &Definition) -> Result<CombinedView> {
        let mut result = CombinedView::with_combiner(Rc::new(OverrideCombiner::new()));
        result.set_force_reload_check(definition.force_reload_check);
        self.populate(
            &mut result,
            &definition.override_list_nodes,
            &definition.overrides,
        )?;

        if !definition.additional.is_empty() {
            let mut additional = CombinedView::with_combiner(Rc::new(UnionCombiner::new()));
            self.populate(
                &mut additional,
                &definition.additional_list_nodes,
                &definition.additional,
            )?;
            let additional: SharedSource = shared(additional);
            result.add_source(additional, Some(ADDITIONAL_NAME), None)?;
        }

        Ok(result)
    }

    fn populate(
        &self,
        view: &mut CombinedView,
        list_nodes: &[String],
        declarations: &[SourceDeclaration],
    ) -> Result<()> {
        for name in list_nodes {
            view.add_list_node(name);
        }
        for declaration in declarations {
            let source = self.create_source(declaration)?;
            view.add_source(
                source,
                declaration.name().as_deref(),
                declaration.at().as_deref(),
            )?;
        }
        Ok(())
    }

    /// Create the source of one declaration
    pub fn create_source(&self, declaration: &SourceDeclaration) -> Result<SharedSource> {
        let construction_error = |source| Error::SourceConstruction {
            tag: declaration.tag.clone(),
            source,
        };

        let Some(provider) = self.registry.provider_for_tag(&declaration.tag) else {
            return Err(construction_error(LoadError::UnknownTag(
                declaration.tag.clone(),
            )));
        };
        let optional = declaration.is_optional().map_err(construction_error)?;

        match provider.create(declaration) {
            Ok(source) => Ok(source),
            Err(err) if optional => {
                tracing::warn!(
                    tag = %declaration.tag,
                    error = %err,
                    "optional source failed, using an empty one"
                );
                let empty: SharedSource = shared(HierarchicalConfig::new());
                Ok(empty)
            }
            Err(err) => Err(construction_error(err)),
        }
    }
}
