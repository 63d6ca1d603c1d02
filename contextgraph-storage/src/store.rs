use crate::error::{Error, Result};
use contextgraph_api::{GraphView, Node, NodeId, Properties, PropertyValue, Relationship, RelationshipId};
use indexmap::IndexMap;
use log::{debug, trace, warn};
use std::collections::HashMap;

/// Description of a relationship to be created in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipSpec {
    pub source: NodeId,
    pub target: NodeId,
    pub rel_type: String,
    pub properties: Properties,
}

impl RelationshipSpec {
    pub fn new(source: NodeId, target: NodeId, rel_type: impl Into<String>) -> Self {
        Self {
            source,
            target,
            rel_type: rel_type.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }
}

/// Result of a lenient batch insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub created: Vec<RelationshipId>,
    pub skipped: usize,
}

/// The in-memory property graph.
///
/// Nodes and relationships live in insertion-ordered maps keyed by id, so lookups
/// are O(1) and removal (`shift_remove`) compacts the slots behind the removed
/// entry while keeping the id index consistent. Adjacency lists are maintained
/// for both directions on every mutation.
#[derive(Debug, Clone)]
pub struct GraphStore {
    directed: bool,
    nodes: IndexMap<NodeId, Node>,
    relationships: IndexMap<RelationshipId, Relationship>,
    outgoing: HashMap<NodeId, Vec<RelationshipId>>,
    incoming: HashMap<NodeId, Vec<RelationshipId>>,
    next_node_id: NodeId,
    next_relationship_id: RelationshipId,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl GraphStore {
    /// Creates an empty store. Undirected stores traverse every relationship
    /// in both directions.
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            nodes: IndexMap::new(),
            relationships: IndexMap::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            next_node_id: 0,
            next_relationship_id: 0,
        }
    }

    pub fn directed(&self) -> bool {
        self.directed
    }

    pub fn next_node_id(&self) -> NodeId {
        self.next_node_id
    }

    pub fn next_relationship_id(&self) -> RelationshipId {
        self.next_relationship_id
    }

    /// Creates a node and returns its id.
    ///
    /// With `explicit_id`, the id must be unused; the auto-increment counter is
    /// then moved past it so later nodes never collide.
    pub fn create_node<I, S>(
        &mut self,
        labels: I,
        properties: Properties,
        explicit_id: Option<NodeId>,
    ) -> Result<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = match explicit_id {
            Some(id) => {
                if self.nodes.contains_key(&id) {
                    return Err(Error::DuplicateId(id));
                }
                self.next_node_id = self.next_node_id.max(id.saturating_add(1));
                id
            }
            None => {
                let id = self.next_node_id;
                self.next_node_id += 1;
                id
            }
        };
        self.nodes.insert(id, Node::new(id, labels, properties));
        trace!("created node {id}");
        Ok(id)
    }

    /// Creates a relationship between two existing nodes.
    pub fn create_relationship(
        &mut self,
        source: NodeId,
        target: NodeId,
        rel_type: impl Into<String>,
        properties: Properties,
    ) -> Result<RelationshipId> {
        self.ensure_node(source)?;
        self.ensure_node(target)?;
        Ok(self.insert_relationship(source, target, rel_type.into(), properties))
    }

    /// Creates every relationship in `specs`, or none of them.
    ///
    /// All endpoints are checked before the first relationship is inserted.
    pub fn create_relationships_batch(
        &mut self,
        specs: Vec<RelationshipSpec>,
    ) -> Result<Vec<RelationshipId>> {
        for spec in &specs {
            self.ensure_node(spec.source)?;
            self.ensure_node(spec.target)?;
        }
        let ids: Vec<_> = specs
            .into_iter()
            .map(|spec| {
                self.insert_relationship(spec.source, spec.target, spec.rel_type, spec.properties)
            })
            .collect();
        debug!("batch created {} relationships", ids.len());
        Ok(ids)
    }

    /// Creates the relationships whose endpoints resolve and skips the rest.
    ///
    /// Used by importers that resolve external keys to node ids and must not fail
    /// a whole file because of a few dangling rows.
    pub fn create_relationships_lenient(&mut self, specs: Vec<RelationshipSpec>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for spec in specs {
            if !self.nodes.contains_key(&spec.source) || !self.nodes.contains_key(&spec.target) {
                outcome.skipped += 1;
                continue;
            }
            outcome.created.push(self.insert_relationship(
                spec.source,
                spec.target,
                spec.rel_type,
                spec.properties,
            ));
        }
        if outcome.skipped > 0 {
            warn!(
                "skipped {} relationships with unresolved endpoints",
                outcome.skipped
            );
        }
        outcome
    }

    fn insert_relationship(
        &mut self,
        source: NodeId,
        target: NodeId,
        rel_type: String,
        properties: Properties,
    ) -> RelationshipId {
        let id = self.next_relationship_id;
        self.next_relationship_id += 1;
        self.relationships.insert(
            id,
            Relationship {
                id,
                rel_type,
                properties,
                source,
                target,
            },
        );
        self.outgoing.entry(source).or_default().push(id);
        self.incoming.entry(target).or_default().push(id);
        trace!("created relationship {id} ({source} -> {target})");
        id
    }

    fn ensure_node(&self, id: NodeId) -> Result<()> {
        if self.nodes.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::NodeNotFound(id))
        }
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_relationship(&self, id: RelationshipId) -> Option<&Relationship> {
        self.relationships.get(&id)
    }

    /// Deletes a node and every relationship touching it.
    pub fn delete_node(&mut self, id: NodeId) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        let mut incident: Vec<RelationshipId> = self.outgoing.get(&id).cloned().unwrap_or_default();
        for rel in self.incoming.get(&id).into_iter().flatten() {
            if !incident.contains(rel) {
                incident.push(*rel);
            }
        }
        for rel in &incident {
            self.delete_relationship(*rel);
        }
        self.outgoing.remove(&id);
        self.incoming.remove(&id);
        self.nodes.shift_remove(&id);
        debug!("deleted node {id} and {} incident relationships", incident.len());
        true
    }

    pub fn delete_relationship(&mut self, id: RelationshipId) -> bool {
        let Some(rel) = self.relationships.shift_remove(&id) else {
            return false;
        };
        if let Some(list) = self.outgoing.get_mut(&rel.source) {
            list.retain(|r| *r != id);
        }
        if let Some(list) = self.incoming.get_mut(&rel.target) {
            list.retain(|r| *r != id);
        }
        true
    }

    pub fn set_node_property(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: PropertyValue,
    ) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        node.properties.insert(key.into(), value);
        Ok(())
    }

    /// Removes a property, returning its previous value.
    pub fn remove_node_property(&mut self, id: NodeId, key: &str) -> Result<Option<PropertyValue>> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        Ok(node.properties.remove(key))
    }

    pub fn set_relationship_property(
        &mut self,
        id: RelationshipId,
        key: impl Into<String>,
        value: PropertyValue,
    ) -> Result<()> {
        let rel = self
            .relationships
            .get_mut(&id)
            .ok_or(Error::RelationshipNotFound(id))?;
        rel.properties.insert(key.into(), value);
        Ok(())
    }

    pub fn remove_relationship_property(
        &mut self,
        id: RelationshipId,
        key: &str,
    ) -> Result<Option<PropertyValue>> {
        let rel = self
            .relationships
            .get_mut(&id)
            .ok_or(Error::RelationshipNotFound(id))?;
        Ok(rel.properties.remove(key))
    }

    /// Adds labels to an existing node, returning how many were new.
    pub fn add_labels<I, S>(&mut self, id: NodeId, labels: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        let mut added = 0;
        for label in labels {
            if node.add_label(label) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Nodes carrying all `labels` whose properties equal every entry in `properties`.
    pub fn find_nodes<S: AsRef<str>>(&self, labels: &[S], properties: &Properties) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|node| node.has_labels(labels) && matches_properties(&node.properties, properties))
            .collect()
    }

    /// Relationships of `rel_type` (any type when `None`) matching every property.
    pub fn find_relationships(
        &self,
        rel_type: Option<&str>,
        properties: &Properties,
    ) -> Vec<&Relationship> {
        self.relationships
            .values()
            .filter(|rel| rel_type.is_none_or(|t| rel.rel_type == t))
            .filter(|rel| matches_properties(&rel.properties, properties))
            .collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    /// Removes everything and resets both id counters.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.relationships.clear();
        self.outgoing.clear();
        self.incoming.clear();
        self.next_node_id = 0;
        self.next_relationship_id = 0;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub(crate) fn restore_counters(&mut self, next_node_id: NodeId, next_relationship_id: RelationshipId) {
        self.next_node_id = self.next_node_id.max(next_node_id);
        self.next_relationship_id = self.next_relationship_id.max(next_relationship_id);
    }

    pub(crate) fn insert_loaded_relationship(&mut self, rel: Relationship) -> Result<()> {
        self.ensure_node(rel.source)?;
        self.ensure_node(rel.target)?;
        if self.relationships.contains_key(&rel.id) {
            return Err(Error::Corrupt(format!("duplicate relationship id {}", rel.id)));
        }
        self.next_relationship_id = self.next_relationship_id.max(rel.id.saturating_add(1));
        self.outgoing.entry(rel.source).or_default().push(rel.id);
        self.incoming.entry(rel.target).or_default().push(rel.id);
        self.relationships.insert(rel.id, rel);
        Ok(())
    }
}

fn matches_properties(actual: &Properties, expected: &Properties) -> bool {
    expected
        .iter()
        .all(|(key, value)| actual.get(key) == Some(value))
}

impl GraphView for GraphStore {
    fn is_directed(&self) -> bool {
        self.directed
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn relationship(&self, id: RelationshipId) -> Option<&Relationship> {
        self.relationships.get(&id)
    }

    fn node_ids(&self) -> Box<dyn Iterator<Item = NodeId> + '_> {
        Box::new(self.nodes.keys().copied())
    }

    fn outgoing(&self, id: NodeId) -> &[RelationshipId] {
        self.outgoing.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn incoming(&self, id: NodeId) -> &[RelationshipId] {
        self.incoming.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn relationship_count(&self) -> usize {
        self.relationships.len()
    }
}
