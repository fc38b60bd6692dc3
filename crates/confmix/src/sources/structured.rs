//! JSON and YAML documents
//!
//! Objects become subtrees, arrays become repeated siblings, `null` becomes a node without value.
use super::LoadError;
use crate::node::Node;
use crate::value::Value;

pub fn parse_json(text: &str) -> Result<Node, LoadError> {
    let document: serde_json::Value = serde_json::from_str(text)?;
    Ok(document_root(Value::from_json(document)))
}

pub fn parse_yaml(text: &str) -> Result<Node, LoadError> {
    let document: serde_yaml::Value = serde_yaml::from_str(text)?;
    Ok(document_root(Value::from_yaml(document)))
}

fn document_root(document: Option<Value>) -> Node {
    match document {
        Some(object @ Value::Object(_)) => Node::from_value("", object).pop().unwrap_or_default(),
        Some(other) => {
            let mut root = Node::default();
            root.set_value(other);
            root
        }
        None => Node::default(),
    }
}
