//! contract between the merge engine and the configurations it combines
use crate::error::{Error, Result};
use crate::event::EventSource;
use crate::key::Key;
use crate::node::Node;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// A source configuration as seen by [crate::combined::CombinedView]
pub trait ConfigSource: std::fmt::Debug {
    /// Snapshot of the current tree
    fn root_node(&self) -> Result<Node>;

    fn events(&self) -> &EventSource;

    /// Deep copy without listeners
    fn clone_source(&self) -> SharedSource;

    /// Check the backing data and reload it if it changed
    ///
    /// Returns whether something changed. Sources without backing data never change on their own.
    fn reload_if_changed(&mut self) -> Result<bool> {
        Ok(false)
    }
}

/// Handle to a registered source; identity is the allocation
pub type SharedSource = Rc<RefCell<dyn ConfigSource>>;

/// Wrap a source so it can be registered and still be used by the caller
pub fn shared<S: ConfigSource + 'static>(source: S) -> Rc<RefCell<S>> {
    Rc::new(RefCell::new(source))
}

pub fn same_source(a: &SharedSource, b: &SharedSource) -> bool {
    Rc::ptr_eq(a, b)
}

/// Read access by key
///
/// Implementors only provide access to their tree, lookups are shared.
pub trait Configuration {
    fn with_root<R>(&self, f: impl FnOnce(&Node) -> R) -> Result<R>;

    /// Single value, or an array if the key addresses several values
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut values = self.get_list(key)?;
        Ok(match values.len() {
            0 => None,
            1 => values.pop(),
            _ => Some(Value::Array(values)),
        })
    }

    fn get_list(&self, key: &str) -> Result<Vec<Value>> {
        let key = Key::parse(key)?;
        self.with_root(|root| key.values(root).into_iter().cloned().collect())
    }

    fn contains_key(&self, key: &str) -> Result<bool> {
        let key = Key::parse(key)?;
        self.with_root(|root| !key.values(root).is_empty())
    }

    fn is_empty(&self) -> Result<bool> {
        self.with_root(Node::is_empty)
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.with_root(Node::keys)
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.get_list(key)?
            .first()
            .map(|value| {
                value.to_scalar_string().ok_or_else(|| Error::Conversion {
                    key: key.to_string(),
                    expected: "string",
                })
            })
            .transpose()
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get_list(key)?
            .first()
            .map(|value| {
                value.as_bool().ok_or_else(|| Error::Conversion {
                    key: key.to_string(),
                    expected: "boolean",
                })
            })
            .transpose()
    }

    fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.get_list(key)?
            .first()
            .map(|value| {
                value.as_i64().ok_or_else(|| Error::Conversion {
                    key: key.to_string(),
                    expected: "integer",
                })
            })
            .transpose()
    }
}
