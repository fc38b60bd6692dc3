//! in-memory source configuration
use crate::error::Result;
use crate::event::{ConfigEvent, EventKind, EventSource};
use crate::key::{Key, KeyElement};
use crate::node::Node;
use crate::source::{shared, ConfigSource, Configuration, SharedSource};
use crate::util::list_items;
use crate::value::Value;

/// A tree that is edited through keys
///
/// Every change fires a before-update and an after-update event.
#[derive(Debug, Default)]
pub struct HierarchicalConfig {
    root: Node,
    events: EventSource,
}

impl HierarchicalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_root(root: Node) -> Self {
        Self {
            root,
            events: Default::default(),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Add a value without touching existing ones
    ///
    /// The last element of the key always gets a new node, so adding a key twice creates a list.
    /// Strings containing the list delimiter `,` become one node per item (`\,` escapes).
    pub fn add_property(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let parsed = Key::parse(key)?;
        let value = value.into();

        self.events.fire(ConfigEvent::before(
            EventKind::AddProperty,
            Some(key),
            Some(&value),
        ));
        add_to(&mut self.root, &parsed, value.clone());
        self.events.fire(ConfigEvent::after(
            EventKind::AddProperty,
            Some(key),
            Some(&value),
        ));
        Ok(())
    }

    /// Replace all values of a key
    pub fn set_property(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let parsed = Key::parse(key)?;
        let value = value.into();

        self.events.fire(ConfigEvent::before(
            EventKind::SetProperty,
            Some(key),
            Some(&value),
        ));
        clear_in(&mut self.root, &parsed);
        add_to(&mut self.root, &parsed, value.clone());
        self.events.fire(ConfigEvent::after(
            EventKind::SetProperty,
            Some(key),
            Some(&value),
        ));
        Ok(())
    }

    pub fn clear_property(&mut self, key: &str) -> Result<()> {
        let parsed = Key::parse(key)?;

        self.events
            .fire(ConfigEvent::before(EventKind::ClearProperty, Some(key), None));
        let removed = clear_in(&mut self.root, &parsed);
        tracing::trace!(key, removed, "property cleared");
        self.events
            .fire(ConfigEvent::after(EventKind::ClearProperty, Some(key), None));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.events
            .fire(ConfigEvent::before(EventKind::Clear, None, None));
        let name = self.root.name().to_string();
        self.root = Node::new(name);
        self.events
            .fire(ConfigEvent::after(EventKind::Clear, None, None));
    }
}

impl Clone for HierarchicalConfig {
    fn clone(&self) -> Self {
        Self::from_root(self.root.clone())
    }
}

impl ConfigSource for HierarchicalConfig {
    fn root_node(&self) -> Result<Node> {
        Ok(self.root.clone())
    }

    fn events(&self) -> &EventSource {
        &self.events
    }

    fn clone_source(&self) -> SharedSource {
        shared(self.clone())
    }
}

impl Configuration for HierarchicalConfig {
    fn with_root<R>(&self, f: impl FnOnce(&Node) -> R) -> Result<R> {
        Ok(f(&self.root))
    }
}

/// Add `value` below `root` at `key`, creating missing nodes on the way
pub(crate) fn add_to(root: &mut Node, key: &Key, value: Value) {
    if let Some(attribute) = key.attribute() {
        let owner = ensure_path(root, key.elements());
        owner.set_attribute(attribute, value);
        return;
    }

    let Some((last, parents)) = key.elements().split_last() else {
        // a key has at least one element unless it selects an attribute
        return;
    };

    let parent = ensure_path(root, parents);
    for item in list_items(value) {
        parent.add_child(Node::with_value(last.name.clone(), item));
    }
}

/// Remove everything `key` addresses below `root`
///
/// Returns the number of removed nodes and attributes.
pub(crate) fn clear_in(root: &mut Node, key: &Key) -> usize {
    clear_at(root, key.elements(), key.attribute())
}

fn clear_at(node: &mut Node, elements: &[KeyElement], attribute: Option<&str>) -> usize {
    match elements.split_first() {
        None => attribute
            .and_then(|attribute| node.remove_attribute(attribute))
            .map_or(0, |_| 1),
        Some((first, [])) if attribute.is_none() => node.remove_children(&first.name, first.index),
        Some((first, rest)) => node
            .children_named_mut(&first.name)
            .enumerate()
            .filter(|(position, _)| first.index.map_or(true, |index| index == *position))
            .map(|(_, child)| clear_at(child, rest, attribute))
            .sum(),
    }
}

/// Walk down `elements`, following existing nodes where possible
fn ensure_path<'n>(node: &'n mut Node, elements: &[KeyElement]) -> &'n mut Node {
    let Some((first, rest)) = elements.split_first() else {
        return node;
    };

    let position = node
        .children()
        .iter()
        .enumerate()
        .filter(|(_, child)| child.name() == first.name)
        .map(|(position, _)| position)
        .nth(first.index.unwrap_or(0));

    let child = match position {
        Some(position) => &mut node.children_mut()[position],
        None => node.add_child(Node::new(first.name.clone())),
    };
    ensure_path(child, rest)
}
