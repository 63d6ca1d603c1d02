use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a node.
///
/// Assigned by the store (or supplied explicitly on creation) and stable for the
/// whole lifetime of the node.
pub type NodeId = u64;

/// Identifier of a relationship, drawn from a counter independent of node ids.
pub type RelationshipId = u64;

/// Property map attached to nodes and relationships.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Property value types for nodes and relationships.
///
/// The same type is used for expression results inside the query engine:
/// - Null: missing / NULL values
/// - Bool: true/false
/// - Int: 64-bit signed integers
/// - Float: 64-bit floating point
/// - String: UTF-8 strings
/// - List: Ordered list of PropertyValues
/// - Map: String-keyed map of PropertyValues
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum PropertyValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "boolean",
            PropertyValue::Int(_) => "integer",
            PropertyValue::Float(_) => "float",
            PropertyValue::String(_) => "string",
            PropertyValue::List(_) => "list",
            PropertyValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Truthiness used when a non-boolean value appears in a boolean position.
    ///
    /// Null, `false`, zero, the empty string and empty collections are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            PropertyValue::Null => false,
            PropertyValue::Bool(b) => *b,
            PropertyValue::Int(i) => *i != 0,
            PropertyValue::Float(f) => *f != 0.0,
            PropertyValue::String(s) => !s.is_empty(),
            PropertyValue::List(l) => !l.is_empty(),
            PropertyValue::Map(m) => !m.is_empty(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "null"),
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Int(i) => write!(f, "{i}"),
            PropertyValue::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            PropertyValue::String(s) => write!(f, "{s}"),
            PropertyValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_nested(f, item)?;
                }
                write!(f, "]")
            }
            PropertyValue::Map(map) => {
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
        }
    }
}

// Strings nested inside collections are quoted so `['a, b']` and `['a', 'b']` differ.
fn write_nested(f: &mut fmt::Formatter<'_>, value: &PropertyValue) -> fmt::Result {
    match value {
        PropertyValue::String(s) => write!(f, "'{s}'"),
        other => write!(f, "{other}"),
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(i64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(values: Vec<T>) -> Self {
        PropertyValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PropertyValue::Null, Into::into)
    }
}

/// A node: a set of labels plus properties.
///
/// Labels keep their first-seen order for display, but two nodes compare equal
/// regardless of label order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: Properties,
}

impl Node {
    pub fn new<I, S>(id: NodeId, labels: I, properties: Properties) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut node = Self {
            id,
            labels: Vec::new(),
            properties,
        };
        for label in labels {
            node.add_label(label);
        }
        node
    }

    /// Adds a label unless already present. Returns whether it was added.
    pub fn add_label(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if self.has_label(&label) {
            return false;
        }
        self.labels.push(label);
        true
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// True when every label in `labels` is carried by this node.
    pub fn has_labels<S: AsRef<str>>(&self, labels: &[S]) -> bool {
        labels.iter().all(|l| self.has_label(l.as_ref()))
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.labels.len() == other.labels.len()
            && self.has_labels(&other.labels)
            && self.properties == other.properties
    }
}

/// A typed, directed relationship between two nodes.
///
/// Endpoints are referenced by id; the relationship never owns the nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub rel_type: String,
    pub properties: Properties,
    pub source: NodeId,
    pub target: NodeId,
}

impl Relationship {
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// The endpoint opposite to `node`, or `None` if `node` is not an endpoint.
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if self.source == node {
            Some(self.target)
        } else if self.target == node {
            Some(self.source)
        } else {
            None
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Read access to a graph.
///
/// The query engine matches patterns and evaluates expressions through this
/// trait; only the write path needs the concrete store.
pub trait GraphView {
    /// Whether relationship direction is meaningful for traversal.
    fn is_directed(&self) -> bool;

    fn node(&self, id: NodeId) -> Option<&Node>;

    fn relationship(&self, id: RelationshipId) -> Option<&Relationship>;

    /// All live node ids in storage order.
    fn node_ids(&self) -> Box<dyn Iterator<Item = NodeId> + '_>;

    /// Ids of relationships whose source is `id`.
    fn outgoing(&self, id: NodeId) -> &[RelationshipId];

    /// Ids of relationships whose target is `id`.
    fn incoming(&self, id: NodeId) -> &[RelationshipId];

    fn node_count(&self) -> usize;

    fn relationship_count(&self) -> usize;

    fn contains_node(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    fn node_property(&self, id: NodeId, key: &str) -> Option<&PropertyValue> {
        self.node(id).and_then(|n| n.property(key))
    }

    fn relationship_property(&self, id: RelationshipId, key: &str) -> Option<&PropertyValue> {
        self.relationship(id).and_then(|r| r.property(key))
    }
}
