use crate::error::{Error, Result};
use crate::store::GraphStore;
use contextgraph_api::{Node, NodeId, Relationship, RelationshipId};
use serde::{Deserialize, Serialize};

/// Plain enumerated copy of a [`GraphStore`].
///
/// Holds every node and relationship in storage order together with both id
/// counters, which is everything needed to rebuild an equivalent store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphImage {
    pub directed: bool,
    pub next_node_id: NodeId,
    pub next_relationship_id: RelationshipId,
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl GraphStore {
    /// Enumerates the store into an image.
    pub fn to_image(&self) -> GraphImage {
        GraphImage {
            directed: self.directed(),
            next_node_id: self.next_node_id(),
            next_relationship_id: self.next_relationship_id(),
            nodes: self.nodes().cloned().collect(),
            relationships: self.relationships().cloned().collect(),
        }
    }

    /// Rebuilds a store from an image.
    ///
    /// Duplicate ids and relationships pointing at missing nodes are rejected as
    /// [`Error::Corrupt`]; counters never end up below an id already in use.
    pub fn from_image(image: GraphImage) -> Result<GraphStore> {
        let mut store = GraphStore::new(image.directed);
        for node in image.nodes {
            let id = node.id;
            store
                .create_node(node.labels, node.properties, Some(id))
                .map_err(|_| Error::Corrupt(format!("duplicate node id {id}")))?;
        }
        for rel in image.relationships {
            let (id, source, target) = (rel.id, rel.source, rel.target);
            store.insert_loaded_relationship(rel).map_err(|err| match err {
                Error::NodeNotFound(missing) => Error::Corrupt(format!(
                    "relationship {id} ({source} -> {target}) references missing node {missing}"
                )),
                other => other,
            })?;
        }
        store.restore_counters(image.next_node_id, image.next_relationship_id);
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contextgraph_api::{GraphView, Properties, PropertyValue};

    #[test]
    fn test_image_rebuild_preserves_ids_and_counters() {
        let mut store = GraphStore::default();
        let a = store.create_node(["A"], Properties::new(), None).unwrap();
        let b = store.create_node(["B"], Properties::new(), None).unwrap();
        let c = store.create_node(["C"], Properties::new(), None).unwrap();
        store.create_relationship(a, c, "R", Properties::new()).unwrap();
        store.delete_node(b);

        let rebuilt = GraphStore::from_image(store.to_image()).unwrap();
        assert_eq!(rebuilt.to_image(), store.to_image());
        assert_eq!(rebuilt.next_node_id(), 3);
        assert_eq!(rebuilt.outgoing(a), &[0]);
        assert_eq!(rebuilt.incoming(c), &[0]);
    }

    #[test]
    fn test_dangling_relationship_is_corrupt() {
        let image = GraphImage {
            directed: true,
            next_node_id: 1,
            next_relationship_id: 1,
            nodes: vec![Node::new(0, ["A"], Properties::new())],
            relationships: vec![Relationship {
                id: 0,
                rel_type: "R".into(),
                properties: Properties::new(),
                source: 0,
                target: 5,
            }],
        };
        assert!(matches!(GraphStore::from_image(image), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_duplicate_node_is_corrupt() {
        let node = Node::new(0, ["A"], [("x".to_string(), PropertyValue::Int(1))].into());
        let image = GraphImage {
            directed: true,
            next_node_id: 1,
            next_relationship_id: 0,
            nodes: vec![node.clone(), node],
            relationships: Vec::new(),
        };
        assert!(matches!(GraphStore::from_image(image), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_max_ids_saturate_counters() {
        let image = GraphImage {
            directed: true,
            next_node_id: 0,
            next_relationship_id: 0,
            nodes: vec![Node::new(u64::MAX, ["A"], Properties::new())],
            relationships: vec![Relationship {
                id: u64::MAX,
                rel_type: "R".into(),
                properties: Properties::new(),
                source: u64::MAX,
                target: u64::MAX,
            }],
        };
        let store = GraphStore::from_image(image).unwrap();
        assert_eq!(store.next_node_id(), u64::MAX);
        assert_eq!(store.next_relationship_id(), u64::MAX);
        assert_eq!(store.relationship_count(), 1);
    }
}
