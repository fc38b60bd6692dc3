use super::{check_children, combine_attributes, combined_node, ListNodes, NodeCombiner};
use crate::error::Result;
use crate::node::Node;

/// All properties of both trees end up in the result
///
/// Structural nodes (no value) that occur once on each side are merged recursively; everything
/// else from the second tree is appended as additional siblings. Values are never merged, so no
/// leaf of either input gets lost.
#[derive(Debug, Default)]
pub struct UnionCombiner {
    list_nodes: ListNodes,
}

impl UnionCombiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position in `first` of the single node that `child` of `second` merges with
    fn partner_position(&self, first: &Node, second: &Node, child: &Node) -> Option<usize> {
        if self.is_list_node(child)
            || child.value().is_some()
            || second.child_count(child.name()) != 1
        {
            return None;
        }

        let mut candidates = first
            .children()
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.name() == child.name());
        match (candidates.next(), candidates.next()) {
            (Some((position, partner)), None) if partner.value().is_none() => Some(position),
            _ => None,
        }
    }
}

impl NodeCombiner for UnionCombiner {
    #[tracing::instrument(level = "trace", skip_all, fields(node = first.name()))]
    fn combine(&self, first: &Node, second: &Node) -> Result<Node> {
        check_children(first)?;
        check_children(second)?;

        let mut result = combined_node(first, second);
        for child in first.children() {
            result.add_child(child.clone());
        }

        for child in second.children() {
            match self.partner_position(first, second, child) {
                Some(position) => {
                    let combined = self.combine(&first.children()[position], child)?;
                    result.children_mut()[position] = combined;
                }
                None => {
                    result.add_child(child.clone());
                }
            }
        }

        combine_attributes(&mut result, first, second);
        Ok(result)
    }

    fn list_nodes(&self) -> &ListNodes {
        &self.list_nodes
    }
}
