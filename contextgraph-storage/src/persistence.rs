//! Saving and loading whole graphs.
//!
//! Two fidelity tiers are provided:
//!
//! - **portable**: a JSON document readable by other tools. Nulls, booleans,
//!   integers, floats and strings round-trip exactly (floats keep their `.0`);
//!   collections become JSON arrays and objects.
//! - **lossless**: a `bincode` encoding of [`GraphImage`] that keeps every value
//!   tag exactly as stored.

use crate::error::{Error, Result};
use crate::image::GraphImage;
use crate::store::GraphStore;
use contextgraph_api::{Node, NodeId, Properties, PropertyValue, Relationship, RelationshipId};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const BINARY_MAGIC: [u8; 8] = *b"CTXGRAPH";
const BINARY_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PortableGraph {
    #[serde(default = "default_directed")]
    directed: bool,
    #[serde(default)]
    node_id_counter: NodeId,
    #[serde(default)]
    relationship_id_counter: RelationshipId,
    nodes: Vec<PortableNode>,
    relationships: Vec<PortableRelationship>,
}

fn default_directed() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct PortableNode {
    id: NodeId,
    labels: Vec<String>,
    #[serde(default)]
    properties: Map<String, JsonValue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PortableRelationship {
    id: RelationshipId,
    #[serde(rename = "type")]
    rel_type: String,
    #[serde(default)]
    properties: Map<String, JsonValue>,
    source: NodeId,
    target: NodeId,
}

/// Converts a property value to JSON. Non-finite floats have no JSON form and
/// become `null`.
pub fn property_to_json(value: &PropertyValue) -> JsonValue {
    match value {
        PropertyValue::Null => JsonValue::Null,
        PropertyValue::Bool(b) => JsonValue::Bool(*b),
        PropertyValue::Int(i) => JsonValue::Number(Number::from(*i)),
        PropertyValue::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        PropertyValue::String(s) => JsonValue::String(s.clone()),
        PropertyValue::List(items) => JsonValue::Array(items.iter().map(property_to_json).collect()),
        PropertyValue::Map(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), property_to_json(v)))
                .collect(),
        ),
    }
}

/// Converts JSON back into a property value. Numbers that fit `i64` become
/// integers; every other number becomes a float.
pub fn json_to_property(value: &JsonValue) -> PropertyValue {
    match value {
        JsonValue::Null => PropertyValue::Null,
        JsonValue::Bool(b) => PropertyValue::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => PropertyValue::Int(i),
            None => PropertyValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => PropertyValue::String(s.clone()),
        JsonValue::Array(items) => PropertyValue::List(items.iter().map(json_to_property).collect()),
        JsonValue::Object(map) => PropertyValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_property(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

fn properties_to_json(properties: &Properties) -> Map<String, JsonValue> {
    properties
        .iter()
        .map(|(k, v)| (k.clone(), property_to_json(v)))
        .collect()
}

fn properties_from_json(map: &Map<String, JsonValue>) -> Properties {
    map.iter()
        .map(|(k, v)| (k.clone(), json_to_property(v)))
        .collect()
}

impl From<&GraphImage> for PortableGraph {
    fn from(image: &GraphImage) -> Self {
        PortableGraph {
            directed: image.directed,
            node_id_counter: image.next_node_id,
            relationship_id_counter: image.next_relationship_id,
            nodes: image
                .nodes
                .iter()
                .map(|n| PortableNode {
                    id: n.id,
                    labels: n.labels.clone(),
                    properties: properties_to_json(&n.properties),
                })
                .collect(),
            relationships: image
                .relationships
                .iter()
                .map(|r| PortableRelationship {
                    id: r.id,
                    rel_type: r.rel_type.clone(),
                    properties: properties_to_json(&r.properties),
                    source: r.source,
                    target: r.target,
                })
                .collect(),
        }
    }
}

impl From<PortableGraph> for GraphImage {
    fn from(doc: PortableGraph) -> Self {
        GraphImage {
            directed: doc.directed,
            next_node_id: doc.node_id_counter,
            next_relationship_id: doc.relationship_id_counter,
            nodes: doc
                .nodes
                .into_iter()
                .map(|n| Node::new(n.id, n.labels, properties_from_json(&n.properties)))
                .collect(),
            relationships: doc
                .relationships
                .into_iter()
                .map(|r| Relationship {
                    id: r.id,
                    properties: properties_from_json(&r.properties),
                    rel_type: r.rel_type,
                    source: r.source,
                    target: r.target,
                })
                .collect(),
        }
    }
}

pub fn to_json_string(store: &GraphStore) -> Result<String> {
    let doc = PortableGraph::from(&store.to_image());
    Ok(serde_json::to_string_pretty(&doc)?)
}

pub fn from_json_str(text: &str) -> Result<GraphStore> {
    let doc: PortableGraph = serde_json::from_str(text)?;
    GraphStore::from_image(doc.into())
}

/// Writes the portable JSON tier.
pub fn save_json(store: &GraphStore, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let doc = PortableGraph::from(&store.to_image());
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &doc)?;
    writer.flush()?;
    info!(
        "saved {} nodes and {} relationships to {} (json)",
        store.node_count(),
        store.relationship_count(),
        path.display()
    );
    Ok(())
}

/// Reads a graph written by [`save_json`].
pub fn load_json(path: impl AsRef<Path>) -> Result<GraphStore> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let doc: PortableGraph = serde_json::from_reader(reader)?;
    let store = GraphStore::from_image(doc.into())?;
    info!(
        "loaded {} nodes and {} relationships from {} (json)",
        store.node_count(),
        store.relationship_count(),
        path.display()
    );
    Ok(store)
}

/// Writes the lossless binary tier.
pub fn save_binary(store: &GraphStore, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&BINARY_MAGIC)?;
    writer.write_all(&BINARY_VERSION.to_le_bytes())?;
    bincode::serialize_into(&mut writer, &store.to_image())?;
    writer.flush()?;
    info!(
        "saved {} nodes and {} relationships to {} (binary)",
        store.node_count(),
        store.relationship_count(),
        path.display()
    );
    Ok(())
}

/// Reads a graph written by [`save_binary`].
pub fn load_binary(path: impl AsRef<Path>) -> Result<GraphStore> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if magic != BINARY_MAGIC {
        return Err(Error::Corrupt(format!(
            "{} is not a contextgraph binary file",
            path.display()
        )));
    }
    let mut version = [0u8; 4];
    reader.read_exact(&mut version)?;
    let version = u32::from_le_bytes(version);
    if version != BINARY_VERSION {
        return Err(Error::Corrupt(format!(
            "unsupported binary format version {version}"
        )));
    }

    let image: GraphImage = bincode::deserialize_from(reader)?;
    let store = GraphStore::from_image(image)?;
    info!(
        "loaded {} nodes and {} relationships from {} (binary)",
        store.node_count(),
        store.relationship_count(),
        path.display()
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_numbers_keep_int_float_distinction() {
        let values = [
            PropertyValue::Int(1),
            PropertyValue::Float(1.0),
            PropertyValue::Float(-2.5),
            PropertyValue::Int(i64::MIN),
        ];
        for value in values {
            let text = serde_json::to_string(&property_to_json(&value)).unwrap();
            let back = json_to_property(&serde_json::from_str(&text).unwrap());
            assert_eq!(back, value, "{text}");
        }
    }

    #[test]
    fn test_portable_document_shape() {
        let mut store = GraphStore::default();
        let a = store
            .create_node(["Person"], [("name".to_string(), "Ann".into())].into(), None)
            .unwrap();
        store.create_relationship(a, a, "SELF", Properties::new()).unwrap();

        let doc: JsonValue = serde_json::from_str(&to_json_string(&store).unwrap()).unwrap();
        assert_eq!(doc["node_id_counter"], 1);
        assert_eq!(doc["relationship_id_counter"], 1);
        assert_eq!(doc["nodes"][0]["labels"][0], "Person");
        assert_eq!(doc["nodes"][0]["properties"]["name"], "Ann");
        assert_eq!(doc["relationships"][0]["type"], "SELF");
    }

    #[test]
    fn test_portable_defaults_for_missing_counters() {
        let text = r#"{"nodes":[{"id":4,"labels":["A"]}],"relationships":[]}"#;
        let store = from_json_str(text).unwrap();
        assert!(store.directed());
        assert_eq!(store.next_node_id(), 5);
    }
}
