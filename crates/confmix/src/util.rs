/// Separator of list items in string values
pub(crate) const LIST_DELIMITER: char = ',';

/// Split a string at unescaped `delimiter`s
///
/// `\<delimiter>` yields a literal delimiter, a backslash in front of anything else is kept.
/// Items are trimmed. A string without delimiter yields exactly one item.
pub(crate) fn split_list(input: &str, delimiter: char) -> Vec<String> {
    let mut items = vec![];
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&delimiter) {
            current.push(delimiter);
            chars.next();
        } else if c == delimiter {
            items.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }

    items.push(current.trim().to_string());
    items
}

/// Expand a value into list items
///
/// Only strings are split; every other value is a single item.
pub(crate) fn list_items(value: crate::value::Value) -> Vec<crate::value::Value> {
    match value {
        crate::value::Value::String(s) if s.contains(LIST_DELIMITER) => {
            let items = split_list(&s, LIST_DELIMITER);
            items.into_iter().map(Into::into).collect()
        }
        other => vec![other],
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn split() {
        assert_eq!(split_list("1, 2,3", ','), vec!["1", "2", "3"]);
        assert_eq!(split_list("single", ','), vec!["single"]);
    }

    #[test]
    fn escaped_delimiter() {
        assert_eq!(split_list("3\\,1415", ','), vec!["3,1415"]);
        assert_eq!(split_list("a\\b,c", ','), vec!["a\\b", "c"]);
    }

    #[test]
    fn escaped_delimiter_is_unescaped_without_split() {
        assert_eq!(list_items(Value::from("3\\,1415")), vec![Value::from("3,1415")]);
        assert_eq!(list_items(Value::Integer(3)), vec![Value::Integer(3)]);
    }
}
