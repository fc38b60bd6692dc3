//! `.properties` documents
//!
//! - `key = value`, `key: value` or `key value`
//! - `#` and `!` start comment lines
//! - a line ending in an odd number of backslashes continues on the next line
//! - dots in keys build the hierarchy, `..` is a literal dot
//! - values are split at unescaped `,` into list items
use super::LoadError;
use crate::hierarchical::add_to;
use crate::key::Key;
use crate::node::Node;

pub fn parse(text: &str) -> Result<Node, LoadError> {
    let mut root = Node::default();

    for (line_number, line) in logical_lines(text) {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let (key, value) = split_entry(line);
        let key = Key::parse(&key).map_err(|err| LoadError::Properties {
            line: line_number,
            message: err.to_string(),
        })?;

        add_to(&mut root, &key, value.into());
    }

    Ok(root)
}

/// Join continuation lines; yields the 1-based number of the first physical line
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = vec![];
    let mut current: Option<(usize, String)> = None;

    for (index, physical) in text.lines().enumerate() {
        let (number, mut buffer) = match current.take() {
            Some((number, buffer)) => (number, buffer),
            None => (index + 1, String::new()),
        };
        let part = if buffer.is_empty() {
            physical
        } else {
            physical.trim_start()
        };

        let trailing = part.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            buffer.push_str(&part[..part.len() - 1]);
            current = Some((number, buffer));
        } else {
            buffer.push_str(part);
            lines.push((number, buffer));
        }
    }

    if let Some(unfinished) = current {
        lines.push(unfinished);
    }
    lines
}

/// Split at the first unescaped separator and unescape the key
///
/// Backslashes in the value are kept, list splitting handles `\,` later.
fn split_entry(line: &str) -> (String, String) {
    let mut key = String::new();
    let mut chars = line.char_indices().peekable();
    let mut value_start = line.len();
    let mut whitespace_separated = false;

    while let Some((position, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    key.push(escaped);
                }
            }
            '=' | ':' => {
                value_start = position + 1;
                break;
            }
            c if c.is_whitespace() => {
                value_start = position;
                whitespace_separated = true;
                break;
            }
            c => key.push(c),
        }
    }

    let mut value = line[value_start..].trim_start();
    // `key  =  value`: whitespace followed by a separator
    if whitespace_separated {
        if let Some(stripped) = value.strip_prefix(['=', ':']) {
            value = stripped.trim_start();
        }
    }

    (key, value.trim_end().to_string())
}
