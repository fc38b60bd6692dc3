//! hierarchical data model
//!
//! A [Node] has a name, an optional [Value], an ordered list of children and a map of attributes.
//! Sibling names are not unique: repeated names are list items.
//!
//! Ownership is strictly top-down. There is no parent pointer; navigation always starts at a root
//! and walks down (see [crate::key::Key]).
use crate::value::Value;
use indexmap::IndexMap;

/// Where a node of a merged tree came from
///
/// Only trees built by [crate::combined::CombinedView] carry origins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Origin {
    /// Properties added to the combined view itself
    Local,
    /// Index of the registration at the time of the build
    Source(usize),
}

#[derive(Debug, Clone)]
struct Attribute {
    value: Value,
    origin: Option<Origin>,
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    name: String,
    value: Option<Value>,
    children: Vec<Node>,
    attributes: IndexMap<String, Attribute>,
    origin: Option<Origin>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Builder style [Node::add_child]
    pub fn child(mut self, child: Node) -> Self {
        self.add_child(child);
        self
    }

    /// Builder style [Node::set_attribute]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Turn a value into nodes named `name`
    ///
    /// Objects become a node with one child per entry, arrays become one sibling per element
    /// (an empty array yields no node at all) and scalars become a leaf.
    pub fn from_value(name: &str, value: Value) -> Vec<Node> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .flat_map(|item| match item {
                    // a nested array is an opaque value, not another level of siblings
                    nested @ Value::Array(_) => vec![Node::with_value(name, nested)],
                    other => Node::from_value(name, other),
                })
                .collect(),
            Value::Object(entries) => {
                let mut node = Node::new(name);
                for (key, value) in entries {
                    for child in Node::from_value(&key, value) {
                        node.add_child(child);
                    }
                }
                vec![node]
            }
            scalar => vec![Node::with_value(name, scalar)],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: impl Into<Option<Value>>) {
        self.value = value.into();
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [Node] {
        &mut self.children
    }

    pub fn children_named(&self, name: &str) -> impl Iterator<Item = &Node> {
        let name = name.to_string();
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn children_named_mut(&mut self, name: &str) -> impl Iterator<Item = &mut Node> {
        let name = name.to_string();
        self.children.iter_mut().filter(move |child| child.name == name)
    }

    pub fn child_count(&self, name: &str) -> usize {
        self.children_named(name).count()
    }

    pub fn add_child(&mut self, child: Node) -> &mut Node {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Remove children named `name`, or only the `index`-th of them
    ///
    /// Returns the number of removed children.
    pub fn remove_children(&mut self, name: &str, index: Option<usize>) -> usize {
        let before = self.children.len();
        let mut position = 0;
        self.children.retain(|child| {
            if child.name != name {
                return true;
            }
            let keep = index.is_some_and(|index| index != position);
            position += 1;
            keep
        });
        before - self.children.len()
    }

    pub fn attribute_value(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).map(|attr| &attr.value)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes
            .iter()
            .map(|(name, attr)| (name.as_str(), &attr.value))
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(
            name.into(),
            Attribute {
                value: value.into(),
                origin: self.origin,
            },
        );
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.shift_remove(name).map(|attr| attr.value)
    }

    /// A node without value, children and attributes
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty() && self.attributes.is_empty()
    }

    /// Keys of all values and attributes below this node, relative to this node
    ///
    /// Segments are escaped so that every key can be fed back into a lookup.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = indexmap::IndexSet::new();
        self.collect_keys("", &mut keys);
        keys.into_iter().collect()
    }

    fn collect_keys(&self, prefix: &str, keys: &mut indexmap::IndexSet<String>) {
        for (name, _) in &self.attributes {
            keys.insert(format!("{prefix}[@{name}]"));
        }
        for child in &self.children {
            let key = if prefix.is_empty() {
                crate::key::escape(&child.name)
            } else {
                format!("{prefix}.{}", crate::key::escape(&child.name))
            };
            if child.value.is_some() {
                keys.insert(key.clone());
            }
            child.collect_keys(&key, keys);
        }
    }

    /// Output model of this node's content
    ///
    /// Same-named children collapse into an array, attributes appear as `@name` entries and a value
    /// next to children is kept as `@value`. Returns [None] for an empty node.
    pub fn to_value(&self) -> Option<Value> {
        if self.children.is_empty() && self.attributes.is_empty() {
            return self.value.clone();
        }

        let mut object = IndexMap::new();
        if let Some(value) = &self.value {
            object.insert("@value".to_string(), value.clone());
        }
        for (name, attr) in &self.attributes {
            object.insert(format!("@{name}"), attr.value.clone());
        }

        let mut groups: IndexMap<&str, Vec<Value>> = IndexMap::new();
        for child in &self.children {
            let value = child
                .to_value()
                .unwrap_or_else(|| Value::Object(Default::default()));
            groups.entry(child.name.as_str()).or_default().push(value);
        }
        for (name, mut values) in groups {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            };
            object.insert(name.to_string(), value);
        }

        Some(Value::Object(object))
    }

    /// Move all content of this node below a chain of new nodes named by `path`
    ///
    /// The root keeps its name. An empty path returns the node unchanged.
    pub(crate) fn nest_under(self, path: &[String]) -> Node {
        let Some((innermost, outer)) = path.split_last() else {
            return self;
        };

        let origin = self.origin;
        let mut current = self;
        let root_name = std::mem::replace(&mut current.name, innermost.clone());

        for segment in outer.iter().rev() {
            let mut parent = Node::new(segment.clone());
            parent.origin = origin;
            parent.children.push(current);
            current = parent;
        }

        let mut root = Node::new(root_name);
        root.origin = origin;
        root.children.push(current);
        root
    }

    pub(crate) fn origin(&self) -> Option<Origin> {
        self.origin
    }

    pub(crate) fn set_origin(&mut self, origin: Option<Origin>) {
        self.origin = origin;
    }

    pub(crate) fn attribute_origin(&self, name: &str) -> Option<Origin> {
        self.attributes.get(name).and_then(|attr| attr.origin)
    }

    /// Mark this subtree (including attributes) as coming from `origin`
    pub(crate) fn tag(&mut self, origin: Origin) {
        self.origin = Some(origin);
        for attr in self.attributes.values_mut() {
            attr.origin = Some(origin);
        }
        for child in &mut self.children {
            child.tag(origin);
        }
    }

    /// Copy an attribute including its origin
    pub(crate) fn copy_attribute_from(&mut self, other: &Node, name: &str) {
        if let Some(attr) = other.attributes.get(name) {
            self.attributes.insert(name.to_string(), attr.clone());
        }
    }

    pub(crate) fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Origins of everything below and including this node that carries data
    pub(crate) fn collect_origins(&self, origins: &mut indexmap::IndexSet<Origin>) {
        if self.value.is_some() {
            origins.extend(self.origin);
        }
        origins.extend(self.attributes.values().filter_map(|attr| attr.origin));
        for child in &self.children {
            child.collect_origins(origins);
        }
    }
}

/// Structural equality; origins are bookkeeping and do not take part
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.children == other.children
            && self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .iter()
                .all(|(name, attr)| other.attribute_value(name) == Some(&attr.value))
    }
}
