//! concrete sources: files in several formats and the process environment
use crate::error::Result;
use crate::event::{ConfigEvent, EventKind, EventSource};
use crate::node::Node;
use crate::source::{shared, ConfigSource, Configuration, SharedSource};
use std::path::{Path, PathBuf};

mod env;
mod hcl_file;
mod properties;
mod structured;

pub use env::EnvSource;

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse hcl document")]
    HclParseFailed(#[from] hcl::Error),
    #[error("Unable to evaluate hcl expression")]
    HclEvalFailed(#[from] hcl::eval::Error),
    #[error("Unable to parse definition")]
    DefinitionParseFailed(#[from] hcl_edit::parser::Error),
    #[error("Unable to parse json document")]
    JsonParseFailed(#[from] serde_json::Error),
    #[error("Unable to parse yaml document")]
    YamlParseFailed(#[from] serde_yaml::Error),
    #[error("Invalid properties document (line {line}): {message}")]
    Properties { line: usize, message: String },
    #[error("Source {tag:?} requires parameter {parameter:?}")]
    MissingParameter { tag: String, parameter: &'static str },
    #[error("Unknown format of {0:?}")]
    UnknownFormat(PathBuf),
    #[error("Attribute {0:?} is not a boolean")]
    InvalidBoolean(String),
    #[error("No provider for source {0:?}")]
    UnknownTag(String),
}

/// Document formats understood by [FileSource]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Properties,
    Json,
    Yaml,
    Hcl,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Format> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        Format::from_name(&extension)
    }

    /// Format by file extension or tag name
    pub fn from_name(name: &str) -> Option<Format> {
        match name {
            "properties" => Some(Format::Properties),
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "hcl" | "tf" => Some(Format::Hcl),
            _ => None,
        }
    }

    pub fn parse(self, text: &str) -> Result<Node, LoadError> {
        match self {
            Format::Properties => properties::parse(text),
            Format::Json => structured::parse_json(text),
            Format::Yaml => structured::parse_yaml(text),
            Format::Hcl => hcl_file::parse(text),
        }
    }
}

/// A document on disk
///
/// The file is read once on load. [ConfigSource::reload_if_changed] re-reads it and swaps the
/// tree only if the content differs.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    format: Format,
    content: String,
    root: Node,
    events: EventSource,
}

impl FileSource {
    /// Load a file, detecting the format from the extension unless given
    pub fn load(path: impl AsRef<Path>, format: Option<Format>) -> Result<Self, LoadError> {
        let path = path.as_ref().canonicalize()?;
        let format = match format {
            Some(format) => format,
            None => Format::from_path(&path).ok_or_else(|| LoadError::UnknownFormat(path.clone()))?,
        };

        tracing::info!(path = %path.display(), ?format, "load file");
        let content = std::fs::read_to_string(&path)?;
        let root = format.parse(&content)?;

        Ok(Self {
            path,
            format,
            content,
            root,
            events: Default::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

impl Clone for FileSource {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            format: self.format,
            content: self.content.clone(),
            root: self.root.clone(),
            events: Default::default(),
        }
    }
}

impl ConfigSource for FileSource {
    fn root_node(&self) -> Result<Node> {
        Ok(self.root.clone())
    }

    fn events(&self) -> &EventSource {
        &self.events
    }

    fn clone_source(&self) -> SharedSource {
        shared(self.clone())
    }

    fn reload_if_changed(&mut self) -> Result<bool> {
        let content = std::fs::read_to_string(&self.path).map_err(LoadError::from)?;
        if content == self.content {
            return Ok(false);
        }

        tracing::debug!(path = %self.path.display(), "file changed, reload");
        let root = self.format.parse(&content)?;

        self.events
            .fire(ConfigEvent::before(EventKind::Reload, None, None));
        self.root = root;
        self.content = content;
        self.events
            .fire(ConfigEvent::after(EventKind::Reload, None, None));
        Ok(true)
    }
}

impl Configuration for FileSource {
    fn with_root<R>(&self, f: impl FnOnce(&Node) -> R) -> Result<R> {
        Ok(f(&self.root))
    }
}
