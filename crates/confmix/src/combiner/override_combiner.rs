use super::{check_children, combine_attributes, combined_node, ListNodes, NodeCombiner};
use crate::error::Result;
use crate::node::Node;

/// Properties of the first tree hide same-path properties of the second
///
/// Children of the second tree only show up under names the first tree does not use at all.
#[derive(Debug, Default)]
pub struct OverrideCombiner {
    list_nodes: ListNodes,
}

impl OverrideCombiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single same-named node in `second` that `child` of `first` merges with
    fn partner<'n>(&self, first: &Node, second: &'n Node, child: &Node) -> Option<&'n Node> {
        if self.is_list_node(child) || first.child_count(child.name()) != 1 {
            return None;
        }

        let mut candidates = second.children_named(child.name());
        match (candidates.next(), candidates.next()) {
            (Some(partner), None) => Some(partner),
            _ => None,
        }
    }
}

impl NodeCombiner for OverrideCombiner {
    #[tracing::instrument(level = "trace", skip_all, fields(node = first.name()))]
    fn combine(&self, first: &Node, second: &Node) -> Result<Node> {
        check_children(first)?;
        check_children(second)?;

        let mut result = combined_node(first, second);

        for child in first.children() {
            match self.partner(first, second, child) {
                Some(partner) => {
                    let combined = self.combine(child, partner)?;
                    result.add_child(combined);
                }
                None => {
                    result.add_child(child.clone());
                }
            }
        }

        // lower priority only fills gaps
        for child in second.children() {
            if first.child_count(child.name()) == 0 {
                result.add_child(child.clone());
            }
        }

        combine_attributes(&mut result, first, second);
        Ok(result)
    }

    fn list_nodes(&self) -> &ListNodes {
        &self.list_nodes
    }
}
