//! hierarchical keys
//!
//! | key                   | meaning                                              |
//! |-----------------------|------------------------------------------------------|
//! | `db.host`             | children `host` of all children `db` of the root     |
//! | `This..is.a.complex`  | segments `This.is`, `a`, `complex`                   |
//! | `server(1).port`      | `port` of the second `server`                        |
//! | `server[@id]`         | attribute `id` of all `server` nodes                 |
//! | `server.[@id]`        | same as above                                        |
use crate::error::{Error, Result};
use crate::node::Node;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyElement {
    pub name: String,
    /// Selects the n-th same-named child of each parent
    pub index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    elements: Vec<KeyElement>,
    attribute: Option<String>,
}

impl Key {
    pub fn parse(key: &str) -> Result<Key> {
        if key.is_empty() {
            return Err(Error::invalid_key(key, "key is empty"));
        }

        let chars: Vec<char> = key.chars().collect();
        let mut elements = vec![];
        let mut attribute = None;
        let mut segment = String::new();
        let mut pos = 0;

        while pos < chars.len() {
            match chars[pos] {
                '.' if chars.get(pos + 1) == Some(&'.') => {
                    segment.push('.');
                    pos += 2;
                }
                '.' => {
                    elements.push(parse_element(key, std::mem::take(&mut segment))?);
                    pos += 1;
                }
                '[' if chars.get(pos + 1) == Some(&'@') => {
                    let Some(end) = chars[pos..].iter().position(|c| *c == ']') else {
                        return Err(Error::invalid_key(key, "unterminated attribute selector"));
                    };
                    let name: String = chars[pos + 2..pos + end].iter().collect();
                    if name.is_empty() {
                        return Err(Error::invalid_key(key, "attribute name is empty"));
                    }
                    if pos + end + 1 != chars.len() {
                        return Err(Error::invalid_key(
                            key,
                            "attribute selector must end the key",
                        ));
                    }
                    attribute = Some(name);
                    pos = chars.len();
                }
                c => {
                    segment.push(c);
                    pos += 1;
                }
            }
        }

        // `server.[@id]` and `[@id]` end with an empty segment in front of the attribute
        if !segment.is_empty() || attribute.is_none() {
            elements.push(parse_element(key, segment)?);
        }

        Ok(Key {
            elements,
            attribute,
        })
    }

    pub fn elements(&self) -> &[KeyElement] {
        &self.elements
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// All nodes addressed by the elements of this key (ignoring the attribute selector)
    ///
    /// A key without elements addresses `root` itself.
    pub fn nodes<'n>(&self, root: &'n Node) -> Vec<&'n Node> {
        let mut current = vec![root];
        for element in &self.elements {
            current = current
                .into_iter()
                .flat_map(|node| {
                    let named = node.children_named(&element.name);
                    match element.index {
                        Some(index) => named.skip(index).take(1).collect::<Vec<_>>(),
                        None => named.collect(),
                    }
                })
                .collect();
        }
        current
    }

    /// All values addressed by this key, in document order
    pub fn values<'n>(&self, root: &'n Node) -> Vec<&'n Value> {
        let nodes = self.nodes(root);
        match &self.attribute {
            Some(attribute) => nodes
                .into_iter()
                .filter_map(|node| node.attribute_value(attribute))
                .collect(),
            None => nodes.into_iter().filter_map(Node::value).collect(),
        }
    }

    /// Whether this key addresses any data below `root`
    ///
    /// Values and attributes count, and so do structural nodes that are not empty.
    pub fn matches(&self, root: &Node) -> bool {
        let nodes = self.nodes(root);
        match &self.attribute {
            Some(attribute) => nodes.iter().any(|node| node.has_attribute(attribute)),
            None => nodes.iter().any(|node| !node.is_empty()),
        }
    }

    /// The remainder of this key below `prefix`
    ///
    /// Used to translate a key of a combined view into the key space of a source registered
    /// with an `at` prefix. Returns [None] if this key does not lie below the prefix.
    pub fn strip_prefix(&self, prefix: &[String]) -> Option<Key> {
        if self.elements.len() < prefix.len() {
            return None;
        }

        let is_below = self
            .elements
            .iter()
            .zip(prefix)
            .all(|(element, segment)| &element.name == segment && element.index.unwrap_or(0) == 0);
        if !is_below {
            return None;
        }

        Some(Key {
            elements: self.elements[prefix.len()..].to_vec(),
            attribute: self.attribute.clone(),
        })
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (position, element) in self.elements.iter().enumerate() {
            if position > 0 {
                f.write_str(".")?;
            }
            f.write_str(&escape(&element.name))?;
            if let Some(index) = element.index {
                write!(f, "({index})")?;
            }
        }
        if let Some(attribute) = &self.attribute {
            write!(f, "[@{attribute}]")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Key::parse(s)
    }
}

/// Parse a dot-delimited path without indices or attributes (such as an `at` prefix)
pub fn parse_path(path: &str) -> Result<Vec<String>> {
    let key = Key::parse(path)?;
    if key.attribute.is_some() || key.elements.iter().any(|e| e.index.is_some()) {
        return Err(Error::invalid_key(
            path,
            "a path must not contain indices or attributes",
        ));
    }
    Ok(key.elements.into_iter().map(|e| e.name).collect())
}

/// Escape a single segment so that it can be used in a key
pub fn escape(segment: &str) -> String {
    segment.replace('.', "..")
}

fn parse_element(key: &str, segment: String) -> Result<KeyElement> {
    if segment.is_empty() {
        return Err(Error::invalid_key(key, "empty segment"));
    }

    if let Some(stripped) = segment.strip_suffix(')') {
        if let Some((name, index)) = stripped.rsplit_once('(') {
            let index = index
                .parse()
                .map_err(|_| Error::invalid_key(key, "index is not a number"))?;
            if name.is_empty() {
                return Err(Error::invalid_key(key, "empty segment"));
            }
            return Ok(KeyElement {
                name: name.to_string(),
                index: Some(index),
            });
        }
    }

    Ok(KeyElement {
        name: segment,
        index: None,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(key: &Key) -> Vec<&str> {
        key.elements().iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn escaped_dots() {
        let key = Key::parse("This..is.a.complex").unwrap();
        assert_eq!(names(&key), vec!["This.is", "a", "complex"]);
        assert_eq!(key.to_string(), "This..is.a.complex");
    }

    #[test]
    fn index_and_attribute() {
        let key = Key::parse("server(1)[@id]").unwrap();
        assert_eq!(
            key.elements(),
            &[KeyElement {
                name: "server".into(),
                index: Some(1)
            }]
        );
        assert_eq!(key.attribute(), Some("id"));

        let detached = Key::parse("server.[@id]").unwrap();
        assert_eq!(names(&detached), vec!["server"]);
        assert_eq!(detached.attribute(), Some("id"));
    }

    #[test]
    fn invalid_keys() {
        for key in ["", "a.", ".a", "a..b.", "a[@x].b", "a(x)", "a[@]"] {
            assert!(Key::parse(key).is_err(), "{key:?} must not parse");
        }
    }

    #[test]
    fn lookup() {
        let root = Node::new("root").child(
            Node::new("db")
                .child(Node::with_value("host", "alpha").attribute("id", 1))
                .child(Node::with_value("host", "beta")),
        );

        let values = Key::parse("db.host").unwrap().values(&root);
        assert_eq!(values, vec![&Value::from("alpha"), &Value::from("beta")]);

        let second = Key::parse("db.host(1)").unwrap().values(&root);
        assert_eq!(second, vec![&Value::from("beta")]);

        let attribute = Key::parse("db.host[@id]").unwrap().values(&root);
        assert_eq!(attribute, vec![&Value::Integer(1)]);

        assert!(Key::parse("db").unwrap().matches(&root));
        assert!(!Key::parse("db.port").unwrap().matches(&root));
    }

    #[test]
    fn strip_prefix() {
        let key = Key::parse("my.prefix.test.value").unwrap();
        let prefix = parse_path("my.prefix").unwrap();

        let stripped = key.strip_prefix(&prefix).unwrap();
        assert_eq!(stripped.to_string(), "test.value");

        assert!(Key::parse("other.test")
            .unwrap()
            .strip_prefix(&prefix)
            .is_none());
    }
}
