use crate::error::{Error, Result};
use contextgraph_api::{Node, Properties, PropertyValue, Relationship};
use serde::ser::{SerializeMap, SerializeSeq};
use std::collections::BTreeMap;
use std::fmt;

/// A runtime value: everything a property can hold plus graph entities.
///
/// Entities are snapshots taken when the value was produced, so a result
/// stays readable after the graph changes.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Node(Node),
    Relationship(Relationship),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Node(_) => "node",
            Value::Relationship(_) => "relationship",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Value::Relationship(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Null, false, zero, and empty strings or collections are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Node(_) | Value::Relationship(_) => true,
        }
    }

    /// Converts to a storable property. Graph entities cannot be stored.
    pub fn into_property(self) -> Result<PropertyValue> {
        Ok(match self {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Bool(b),
            Value::Int(i) => PropertyValue::Int(i),
            Value::Float(f) => PropertyValue::Float(f),
            Value::String(s) => PropertyValue::String(s),
            Value::List(items) => PropertyValue::List(
                items
                    .into_iter()
                    .map(Value::into_property)
                    .collect::<Result<_>>()?,
            ),
            Value::Map(map) => PropertyValue::Map(
                map.into_iter()
                    .map(|(k, v)| Ok((k, v.into_property()?)))
                    .collect::<Result<_>>()?,
            ),
            Value::Node(_) | Value::Relationship(_) => {
                return Err(Error::database(format!(
                    "cannot store a {} as a property value",
                    self.type_name()
                )));
            }
        })
    }
}

impl From<PropertyValue> for Value {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(b),
            PropertyValue::Int(i) => Value::Int(i),
            PropertyValue::Float(f) => Value::Float(f),
            PropertyValue::String(s) => Value::String(s),
            PropertyValue::List(items) => Value::List(items.into_iter().map(Value::from).collect()),
            PropertyValue::Map(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&PropertyValue> for Value {
    fn from(value: &PropertyValue) -> Self {
        Value::from(value.clone())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<Relationship> for Value {
    fn from(rel: Relationship) -> Self {
        Value::Relationship(rel)
    }
}

// Top-level strings print bare; nested ones are quoted so lists stay readable.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            other => write_nested(f, other),
        }
    }
}

fn write_nested(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => write!(f, "null"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Int(i) => write!(f, "{i}"),
        Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
        Value::Float(x) => write!(f, "{x}"),
        Value::String(s) => write!(f, "'{s}'"),
        Value::List(items) => {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_nested(f, item)?;
            }
            write!(f, "]")
        }
        Value::Map(map) => {
            write!(f, "{{")?;
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{k}: ")?;
                write_nested(f, v)?;
            }
            write!(f, "}}")
        }
        Value::Node(node) => {
            write!(f, "(#{}", node.id)?;
            for label in &node.labels {
                write!(f, ":{label}")?;
            }
            if !node.properties.is_empty() {
                write!(f, " {}", PropertyValue::Map(node.properties.clone()))?;
            }
            write!(f, ")")
        }
        Value::Relationship(rel) => {
            write!(f, "(#{})-[#{}:{}", rel.source, rel.id, rel.rel_type)?;
            if !rel.properties.is_empty() {
                write!(f, " {}", PropertyValue::Map(rel.properties.clone()))?;
            }
            write!(f, "]->(#{})", rel.target)
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for item in list {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut ser = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    ser.serialize_entry(k, v)?;
                }
                ser.end()
            }
            Value::Node(n) => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("type", "node")?;
                map.serialize_entry("id", &n.id)?;
                map.serialize_entry("labels", &n.labels)?;
                map.serialize_entry("properties", &plain_properties(&n.properties))?;
                map.end()
            }
            Value::Relationship(r) => {
                let mut map = serializer.serialize_map(Some(6))?;
                map.serialize_entry("type", "relationship")?;
                map.serialize_entry("id", &r.id)?;
                map.serialize_entry("rel_type", &r.rel_type)?;
                map.serialize_entry("source", &r.source)?;
                map.serialize_entry("target", &r.target)?;
                map.serialize_entry("properties", &plain_properties(&r.properties))?;
                map.end()
            }
        }
    }
}

fn plain_properties(properties: &Properties) -> BTreeMap<&str, Value> {
    properties
        .iter()
        .map(|(k, v)| (k.as_str(), Value::from(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        for falsy in [
            Value::Null,
            Value::Bool(false),
            Value::Int(0),
            Value::Float(0.0),
            Value::from(""),
            Value::List(vec![]),
            Value::Map(BTreeMap::new()),
        ] {
            assert!(!falsy.is_truthy(), "{falsy:?}");
        }
        assert!(Value::from("x").is_truthy());
        assert!(Value::Node(Node::new(0, ["A"], Properties::new())).is_truthy());
    }

    #[test]
    fn test_into_property_rejects_entities() {
        assert_eq!(
            Value::from(vec![1i64, 2]).into_property().unwrap(),
            PropertyValue::List(vec![PropertyValue::Int(1), PropertyValue::Int(2)])
        );
        let node = Value::Node(Node::new(3, ["A"], Properties::new()));
        assert!(node.into_property().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("plain").to_string(), "plain");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(
            Value::List(vec![Value::from("a"), Value::Int(1)]).to_string(),
            "['a', 1]"
        );
        let node = Node::new(
            7,
            ["Person"],
            Properties::from([("name".to_string(), PropertyValue::from("Ann"))]),
        );
        assert_eq!(Value::Node(node).to_string(), "(#7:Person {name: 'Ann'})");
    }

    #[test]
    fn test_serialize_node_as_tagged_map() {
        let node = Node::new(1, ["A"], Properties::new());
        let json = serde_json::to_value(Value::Node(node)).unwrap();
        assert_eq!(json["type"], "node");
        assert_eq!(json["id"], 1);
        assert_eq!(json["labels"][0], "A");
    }
}
