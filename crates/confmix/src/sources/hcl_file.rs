//! HCL documents
//!
//! Attributes become leaves (objects become subtrees, arrays become siblings), blocks become
//! nodes named by their identifier with one nested level per label:
//!
//! ```hcl
//! server "alpha" {
//!   port = 8080
//! }
//! ```
//!
//! is addressable as `server.alpha.port`. Repeated blocks are repeated siblings.
use super::LoadError;
use crate::node::Node;
use crate::value::Value;
use hcl::eval::Evaluate;

pub fn parse(text: &str) -> Result<Node, LoadError> {
    let body = hcl::parse(text)?;
    let context = hcl::eval::Context::new();

    let mut root = Node::default();
    append_body(&mut root, &body, &context)?;
    Ok(root)
}

fn append_body(
    node: &mut Node,
    body: &hcl::Body,
    context: &hcl::eval::Context,
) -> Result<(), LoadError> {
    for structure in body.iter() {
        match structure {
            hcl::Structure::Attribute(attribute) => {
                let value = attribute.expr.evaluate(context)?;
                let Some(value) = Value::from_hcl(value) else {
                    tracing::trace!(key = %attribute.key, "skip null attribute");
                    continue;
                };
                for child in Node::from_value(attribute.key.as_str(), value) {
                    node.add_child(child);
                }
            }
            hcl::Structure::Block(block) => {
                let mut block_node = Node::new(block.identifier.as_str());
                append_body(&mut block_node, &block.body, context)?;

                let labels: Vec<String> = block
                    .labels
                    .iter()
                    .map(|label| label.as_str().to_string())
                    .collect();
                node.add_child(block_node.nest_under(&labels));
            }
        }
    }
    Ok(())
}
