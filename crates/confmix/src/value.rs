//! value representation
//!
//! Node values are type-erased for the merge engine; it never looks inside them.
//! The model contains the following data types
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! Additionally:
//! - there is no `null`. A `null` in a source document means "no value" and the
//!   conversions below return [None] for it.
//! - strings convert to booleans and integers on request, since most formats
//!   (properties, environment) only know strings
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(indexmap::IndexMap<String, Value>),
}

impl Value {
    /// Interpret as boolean
    ///
    /// Strings `true`, `yes`, `on` and `false`, `no`, `off` are accepted (ignoring case).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" => Some(true),
                "false" | "no" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Interpret as integer, parsing strings if necessary
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// String representation of scalar values
    ///
    /// Arrays and objects have no scalar representation.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Value::Boolean(b) => Some(b.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn from_hcl(value: hcl::Value) -> Option<Value> {
        match value {
            hcl::Value::Null => None,
            hcl::Value::Bool(b) => Some(b.into()),
            hcl::Value::Number(n) => Some(n.into()),
            hcl::Value::String(s) => Some(s.into()),
            hcl::Value::Array(a) => Some(Value::Array(
                a.into_iter().filter_map(Value::from_hcl).collect(),
            )),
            hcl::Value::Object(o) => Some(Value::Object(
                o.into_iter()
                    .filter_map(|(k, v)| Value::from_hcl(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }

    pub fn from_json(value: serde_json::Value) -> Option<Value> {
        use serde_json::Value as Json;

        match value {
            Json::Null => None,
            Json::Bool(b) => Some(b.into()),
            Json::Number(n) => match n.as_i64() {
                Some(int) => Some(Value::Integer(int)),
                None => n.as_f64().map(Value::Decimal),
            },
            Json::String(s) => Some(s.into()),
            Json::Array(a) => Some(Value::Array(
                a.into_iter().filter_map(Value::from_json).collect(),
            )),
            Json::Object(o) => Some(Value::Object(
                o.into_iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }

    pub fn from_yaml(value: serde_yaml::Value) -> Option<Value> {
        use serde_yaml::Value as Yaml;

        match value {
            Yaml::Null => None,
            Yaml::Bool(b) => Some(b.into()),
            Yaml::Number(n) => match n.as_i64() {
                Some(int) => Some(Value::Integer(int)),
                None => n.as_f64().map(Value::Decimal),
            },
            Yaml::String(s) => Some(s.into()),
            Yaml::Sequence(seq) => Some(Value::Array(
                seq.into_iter().filter_map(Value::from_yaml).collect(),
            )),
            Yaml::Mapping(mapping) => Some(Value::Object(
                mapping
                    .into_iter()
                    .filter_map(|(k, v)| {
                        let key = Value::from_yaml(k)?.to_scalar_string()?;
                        Value::from_yaml(v).map(|v| (key, v))
                    })
                    .collect(),
            )),
            Yaml::Tagged(tagged) => Value::from_yaml(tagged.value),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::Array(_) | Value::Object(_) => {
                let json = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<hcl::Number> for Value {
    fn from(value: hcl::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return Value::Integer(int);
        }

        // a number that is not an integer is always representable as float
        Value::Decimal(value.as_f64().unwrap_or(f64::NAN))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}
