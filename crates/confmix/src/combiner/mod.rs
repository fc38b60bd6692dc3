//! strategies to merge two node trees into one
//!
//! A [NodeCombiner] is a pure function over two read-only trees; it allocates a new tree and never
//! touches its inputs. The first tree has the higher priority.
//!
//! Both strategies only merge a pair of nodes when the pair is unambiguous: one node of that name
//! on each side. Anything else (repeated names, names registered as list nodes) is copied as-is.
mod override_combiner;
mod union_combiner;

pub use override_combiner::OverrideCombiner;
pub use union_combiner::UnionCombiner;

use crate::error::{Error, Result};
use crate::node::Node;
use indexmap::IndexSet;
use std::cell::RefCell;

pub trait NodeCombiner: std::fmt::Debug {
    /// Merge two trees; `first` takes precedence over `second`
    fn combine(&self, first: &Node, second: &Node) -> Result<Node>;

    fn list_nodes(&self) -> &ListNodes;

    /// Returns whether the name was not yet registered
    fn add_list_node(&self, name: &str) -> bool {
        self.list_nodes().add(name)
    }

    fn is_list_node(&self, node: &Node) -> bool {
        self.list_nodes().contains(node.name())
    }
}

/// Names of nodes that are never merged by identity
///
/// Belongs to exactly one combiner. Interior mutability allows a combiner shared by several views
/// to be configured in place.
#[derive(Debug, Default)]
pub struct ListNodes {
    names: RefCell<IndexSet<String>>,
}

impl ListNodes {
    /// Returns whether the name was not yet registered
    pub fn add(&self, name: &str) -> bool {
        self.names.borrow_mut().insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.borrow().contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.names.borrow().iter().cloned().collect()
    }
}

/// New node named after `first` holding the value of `first`, or else the value of `second`
fn combined_node(first: &Node, second: &Node) -> Node {
    let mut result = Node::new(first.name());
    let (value, origin) = match (first.value(), second.value()) {
        (Some(value), _) => (Some(value.clone()), first.origin()),
        (None, Some(value)) => (Some(value.clone()), second.origin()),
        (None, None) => (None, first.origin().or(second.origin())),
    };
    result.set_value(value);
    result.set_origin(origin);
    result
}

/// Attributes of `first`, plus those of `second` not present in `first`
fn combine_attributes(result: &mut Node, first: &Node, second: &Node) {
    for name in first.attribute_names() {
        result.copy_attribute_from(first, name);
    }
    for name in second.attribute_names() {
        if !first.has_attribute(name) {
            result.copy_attribute_from(second, name);
        }
    }
}

/// Reject trees a combiner cannot work with
fn check_children(node: &Node) -> Result<()> {
    if node.children().iter().any(|child| child.name().is_empty()) {
        return Err(Error::MergeFailure {
            path: node.name().to_string(),
            reason: "child node without name",
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn list_nodes_are_a_set() {
        let combiner = OverrideCombiner::default();
        assert!(combiner.add_list_node("table"));
        assert!(!combiner.add_list_node("table"));
        assert_eq!(combiner.list_nodes().names(), vec!["table"]);
    }

    #[test]
    fn list_nodes_are_per_combiner() {
        let override_combiner = OverrideCombiner::default();
        let union_combiner = UnionCombiner::default();
        override_combiner.add_list_node("server");

        assert!(override_combiner.is_list_node(&Node::new("server")));
        assert!(!union_combiner.is_list_node(&Node::new("server")));
    }

    #[test]
    fn unnamed_child_is_a_merge_failure() {
        let broken = Node::new("root").child(Node::with_value("", 1));
        let fine = Node::new("root");

        assert!(matches!(
            OverrideCombiner::default().combine(&broken, &fine),
            Err(Error::MergeFailure { .. })
        ));
        assert!(matches!(
            UnionCombiner::default().combine(&fine, &broken),
            Err(Error::MergeFailure { .. })
        ));
    }
}
