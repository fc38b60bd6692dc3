//! environment variables as a source
//!
//! `APP_DB__HOST=alpha` with prefix `APP_` becomes `db.host = alpha`: the prefix is stripped,
//! names are lower-cased and `__` separates levels.
use crate::error::Result;
use crate::event::{ConfigEvent, EventKind, EventSource};
use crate::hierarchical::add_to;
use crate::key::{escape, Key};
use crate::node::Node;
use crate::source::{shared, ConfigSource, Configuration, SharedSource};
use crate::value::Value;

const LEVEL_SEPARATOR: &str = "__";

#[derive(Debug)]
pub struct EnvSource {
    prefix: Option<String>,
    /// Read from the process environment, so it can be re-read
    from_process: bool,
    root: Node,
    events: EventSource,
}

impl EnvSource {
    /// Snapshot of the process environment
    pub fn from_env(prefix: Option<&str>) -> Self {
        let mut source = Self::from_vars(std::env::vars(), prefix);
        source.from_process = true;
        source
    }

    /// Source built from explicit variables; never reloads
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>, prefix: Option<&str>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.map(Into::into),
            from_process: false,
            root: build_tree(vars, prefix),
            events: Default::default(),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

fn build_tree<K, V>(vars: impl IntoIterator<Item = (K, V)>, prefix: Option<&str>) -> Node
where
    K: AsRef<str>,
    V: Into<String>,
{
    let mut root = Node::default();

    for (name, value) in vars {
        let name = name.as_ref();
        let Some(name) = name.strip_prefix(prefix.unwrap_or_default()) else {
            continue;
        };

        let segments: Vec<String> = name
            .to_lowercase()
            .split(LEVEL_SEPARATOR)
            .map(escape)
            .collect();
        if segments.iter().any(String::is_empty) {
            tracing::trace!(name, "skip variable with empty segment");
            continue;
        }

        let value: String = value.into();
        match Key::parse(&segments.join(".")) {
            Ok(key) => add_to(&mut root, &key, Value::from(value)),
            Err(err) => tracing::trace!(name, %err, "skip variable"),
        }
    }

    root
}

impl Clone for EnvSource {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            from_process: self.from_process,
            root: self.root.clone(),
            events: Default::default(),
        }
    }
}

impl ConfigSource for EnvSource {
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
        if !self.from_process {
            return Ok(false);
        }

        let root = build_tree(std::env::vars(), self.prefix.as_deref());
        if root == self.root {
            return Ok(false);
        }

        self.events
            .fire(ConfigEvent::before(EventKind::Reload, None, None));
        self.root = root;
        self.events
            .fire(ConfigEvent::after(EventKind::Reload, None, None));
        Ok(true)
    }
}

impl Configuration for EnvSource {
    fn with_root<R>(&self, f: impl FnOnce(&Node) -> R) -> Result<R> {
        Ok(f(&self.root))
    }
}
