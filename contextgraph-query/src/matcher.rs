//! Pattern matching over a [`GraphView`].
//!
//! A pattern is walked left to right: candidate start nodes first, then one
//! relationship hop at a time with depth-first backtracking. Variable-length
//! hops run a bounded DFS that keeps a per-path visited set, so every walk
//! terminates and its depth never exceeds the hop ceiling.

use crate::ast::{
    NodePattern, PathElement, Pattern, PropertyMap, RelationshipDirection, RelationshipPattern,
};
use crate::error::{Error, Result};
use crate::evaluator::{Evaluator, values_equal};
use crate::executor::{Binding, Row};
use crate::value::Value;
use contextgraph_api::{GraphView, NodeId, RelationshipId};
use log::trace;
use std::collections::HashSet;

/// Splits a pattern into its node and relationship parts, rejecting anything
/// that does not alternate node, relationship, node.
pub(crate) fn pattern_parts(
    pattern: &Pattern,
) -> Result<(Vec<&NodePattern>, Vec<&RelationshipPattern>)> {
    let mut nodes = Vec::new();
    let mut rels = Vec::new();
    for (i, element) in pattern.elements.iter().enumerate() {
        match (i % 2, element) {
            (0, PathElement::Node(n)) => nodes.push(n),
            (1, PathElement::Relationship(r)) => rels.push(r),
            _ => {
                return Err(Error::database(
                    "pattern must alternate nodes and relationships",
                ));
            }
        }
    }
    if nodes.is_empty() || nodes.len() != rels.len() + 1 {
        return Err(Error::database("pattern must start and end with a node"));
    }
    Ok((nodes, rels))
}

/// Hop bounds after defaults: `min` falls back to 1, `max` to the ceiling (but
/// never below `min`).
pub(crate) fn hop_bounds(rel: &RelationshipPattern, ceiling: u32) -> Option<(u32, u32)> {
    rel.variable_length.map(|len| {
        let min = len.min.unwrap_or(1);
        let max = len.max.unwrap_or(ceiling.max(min));
        (min, max)
    })
}

pub(crate) struct Matcher<'a> {
    graph: &'a dyn GraphView,
    evaluator: &'a Evaluator<'a>,
    max_hops: u32,
}

/// Property constraints evaluated against the row that is being extended.
type Constraints = Vec<(String, Value)>;

impl<'a> Matcher<'a> {
    pub fn new(graph: &'a dyn GraphView, evaluator: &'a Evaluator<'a>, max_hops: u32) -> Self {
        Self {
            graph,
            evaluator,
            max_hops,
        }
    }

    /// Every extension of `row` that matches `pattern`.
    pub fn match_pattern(&self, pattern: &Pattern, row: &Row) -> Result<Vec<Row>> {
        let (nodes, rels) = pattern_parts(pattern)?;
        let mut out = Vec::new();

        let start = nodes[0];
        let constraints = self.constraints(start.properties.as_ref(), row)?;
        for id in self.candidates(start, row) {
            if !self.node_matches(id, start, &constraints, row) {
                continue;
            }
            let row = bind(row, start.variable.as_deref(), Binding::Node(id));
            let mut used = Vec::new();
            self.extend(&nodes, &rels, 0, id, row, &mut used, &mut out)?;
        }
        Ok(out)
    }

    fn candidates(&self, pattern: &NodePattern, row: &Row) -> Vec<NodeId> {
        match pattern.variable.as_deref().and_then(|v| row.get(v)) {
            Some(Binding::Node(id)) => vec![*id],
            // Bound to something that is not a node: nothing can match.
            Some(_) => Vec::new(),
            None => self.graph.node_ids().collect(),
        }
    }

    fn constraints(&self, map: Option<&PropertyMap>, row: &Row) -> Result<Constraints> {
        let Some(map) = map else {
            return Ok(Vec::new());
        };
        map.properties
            .iter()
            .map(|pair| Ok((pair.key.clone(), self.evaluator.evaluate(&pair.value, row)?)))
            .collect()
    }

    fn node_matches(
        &self,
        id: NodeId,
        pattern: &NodePattern,
        constraints: &Constraints,
        row: &Row,
    ) -> bool {
        if let Some(bound) = pattern.variable.as_deref().and_then(|v| row.get(v))
            && *bound != Binding::Node(id)
        {
            return false;
        }
        let Some(node) = self.graph.node(id) else {
            return false;
        };
        node.has_labels(&pattern.labels)
            && constraints.iter().all(|(key, expected)| {
                let actual = node.property(key).map(Value::from).unwrap_or_default();
                values_equal(&actual, expected)
            })
    }

    fn relationship_matches(
        &self,
        id: RelationshipId,
        pattern: &RelationshipPattern,
        constraints: &Constraints,
    ) -> bool {
        let Some(rel) = self.graph.relationship(id) else {
            return false;
        };
        (pattern.types.is_empty() || pattern.types.iter().any(|t| *t == rel.rel_type))
            && constraints.iter().all(|(key, expected)| {
                let actual = rel.property(key).map(Value::from).unwrap_or_default();
                values_equal(&actual, expected)
            })
    }

    /// Relationships leaving `node` in the pattern's direction, paired with the
    /// node at the other end. Undirected stores ignore the arrow.
    fn edges(&self, node: NodeId, direction: RelationshipDirection) -> Vec<(RelationshipId, NodeId)> {
        let forward = |rel_id: &RelationshipId| {
            self.graph
                .relationship(*rel_id)
                .map(|r| (*rel_id, r.target))
        };
        let backward = |rel_id: &RelationshipId| {
            self.graph
                .relationship(*rel_id)
                .map(|r| (*rel_id, r.source))
        };

        let direction = if self.graph.is_directed() {
            direction
        } else {
            RelationshipDirection::Undirected
        };
        match direction {
            RelationshipDirection::LeftToRight => {
                self.graph.outgoing(node).iter().filter_map(forward).collect()
            }
            RelationshipDirection::RightToLeft => {
                self.graph.incoming(node).iter().filter_map(backward).collect()
            }
            RelationshipDirection::Undirected => {
                let mut edges: Vec<_> = self.graph.outgoing(node).iter().filter_map(forward).collect();
                // A self-loop already appeared among the outgoing relationships.
                edges.extend(
                    self.graph
                        .incoming(node)
                        .iter()
                        .filter_map(backward)
                        .filter(|(_, other)| *other != node),
                );
                edges
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn extend(
        &self,
        nodes: &[&NodePattern],
        rels: &[&RelationshipPattern],
        index: usize,
        current: NodeId,
        row: Row,
        used: &mut Vec<RelationshipId>,
        out: &mut Vec<Row>,
    ) -> Result<()> {
        let Some(rel) = rels.get(index) else {
            out.push(row);
            return Ok(());
        };
        let target = nodes[index + 1];
        let rel_constraints = self.constraints(rel.properties.as_ref(), &row)?;
        let target_constraints = self.constraints(target.properties.as_ref(), &row)?;
        let bound_rel = rel.variable.as_deref().and_then(|v| row.get(v));

        if let Some((min, max)) = hop_bounds(rel, self.max_hops) {
            let mut paths = Vec::new();
            self.expand(
                current,
                min,
                max,
                &HashSet::new(),
                rel,
                &rel_constraints,
                &mut Vec::new(),
                &mut paths,
            );
            trace!("variable-length hop from {current}: {} candidate paths", paths.len());
            for (end, path) in paths {
                if !self.node_matches(end, target, &target_constraints, &row) {
                    continue;
                }
                let binding = Binding::Path(path);
                if bound_rel.is_some_and(|b| *b != binding) {
                    continue;
                }
                let next = bind(&row, rel.variable.as_deref(), binding);
                let next = bind(&next, target.variable.as_deref(), Binding::Node(end));
                self.extend(nodes, rels, index + 1, end, next, used, out)?;
            }
            return Ok(());
        }

        for (rel_id, other) in self.edges(current, rel.direction) {
            if used.contains(&rel_id)
                || !self.relationship_matches(rel_id, rel, &rel_constraints)
                || bound_rel.is_some_and(|b| *b != Binding::Relationship(rel_id))
                || !self.node_matches(other, target, &target_constraints, &row)
            {
                continue;
            }
            let next = bind(&row, rel.variable.as_deref(), Binding::Relationship(rel_id));
            let next = bind(&next, target.variable.as_deref(), Binding::Node(other));
            used.push(rel_id);
            self.extend(nodes, rels, index + 1, other, next, used, out)?;
            used.pop();
        }
        Ok(())
    }

    /// Bounded DFS collecting `(end node, relationships walked)` for every walk
    /// of `min..=max` hops that does not revisit a node. Following a self-loop
    /// is allowed while at most one more hop is required.
    #[allow(clippy::too_many_arguments)]
    fn expand(
        &self,
        node: NodeId,
        min: u32,
        max: u32,
        visited: &HashSet<NodeId>,
        rel: &RelationshipPattern,
        constraints: &Constraints,
        path: &mut Vec<RelationshipId>,
        out: &mut Vec<(NodeId, Vec<RelationshipId>)>,
    ) {
        if visited.contains(&node) {
            return;
        }
        if min == 0 {
            out.push((node, path.clone()));
        }
        if max == 0 {
            return;
        }

        let mut seen = visited.clone();
        seen.insert(node);
        for (rel_id, next) in self.edges(node, rel.direction) {
            if !self.relationship_matches(rel_id, rel, constraints) {
                continue;
            }
            path.push(rel_id);
            if next == node && min <= 1 {
                let mut relaxed = seen.clone();
                relaxed.remove(&node);
                self.expand(next, min.saturating_sub(1), max - 1, &relaxed, rel, constraints, path, out);
            } else if !seen.contains(&next) {
                self.expand(next, min.saturating_sub(1), max - 1, &seen, rel, constraints, path, out);
            }
            path.pop();
        }
    }
}

/// Returns `row` extended with `variable`, unless it is anonymous or already bound.
fn bind(row: &Row, variable: Option<&str>, binding: Binding) -> Row {
    match variable {
        Some(name) if row.get(name).is_none() => row.clone().with(name, binding),
        _ => row.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::RegexCache;
    use crate::parser::Parser;
    use crate::query_api::Params;
    use contextgraph_api::Properties;
    use contextgraph_storage::GraphStore;

    fn run(store: &GraphStore, text: &str) -> Vec<Row> {
        let query = Parser::parse(text).unwrap();
        let pattern = &query.match_clause.unwrap().patterns[0];
        let params = Params::new();
        let regexes = RegexCache::default();
        let evaluator = Evaluator::new(store, &params, &regexes);
        Matcher::new(store, &evaluator, 10)
            .match_pattern(pattern, &Row::default())
            .unwrap()
    }

    fn node_of(row: &Row, var: &str) -> NodeId {
        match row.get(var) {
            Some(Binding::Node(id)) => *id,
            other => panic!("{var} bound to {other:?}"),
        }
    }

    fn chain(store: &mut GraphStore, n: usize) -> Vec<NodeId> {
        let ids: Vec<_> = (0..n)
            .map(|_| store.create_node(["N"], Properties::new(), None).unwrap())
            .collect();
        for pair in ids.windows(2) {
            store
                .create_relationship(pair[0], pair[1], "NEXT", Properties::new())
                .unwrap();
        }
        ids
    }

    #[test]
    fn test_directions() {
        let mut store = GraphStore::default();
        let ids = chain(&mut store, 2);

        let out = run(&store, "MATCH (a)-[:NEXT]->(b) RETURN a");
        assert_eq!(out.len(), 1);
        assert_eq!((node_of(&out[0], "a"), node_of(&out[0], "b")), (ids[0], ids[1]));

        let back = run(&store, "MATCH (a)<-[:NEXT]-(b) RETURN a");
        assert_eq!((node_of(&back[0], "a"), node_of(&back[0], "b")), (ids[1], ids[0]));

        assert_eq!(run(&store, "MATCH (a)-[:NEXT]-(b) RETURN a").len(), 2);
    }

    #[test]
    fn test_undirected_store_ignores_arrows() {
        let mut store = GraphStore::new(false);
        chain(&mut store, 2);
        assert_eq!(run(&store, "MATCH (a)-[:NEXT]->(b) RETURN a").len(), 2);
    }

    #[test]
    fn test_fixed_length_chain() {
        let mut store = GraphStore::default();
        let ids = chain(&mut store, 5);
        for k in 1..=4usize {
            let rows = run(&store, &format!("MATCH (a)-[:NEXT*{k}]->(b) RETURN a"));
            let pairs: Vec<_> = rows
                .iter()
                .map(|r| (node_of(r, "a"), node_of(r, "b")))
                .collect();
            let expected: Vec<_> = (0..5 - k).map(|i| (ids[i], ids[i + k])).collect();
            assert_eq!(pairs, expected, "k = {k}");
        }
        assert!(run(&store, "MATCH (a)-[:NEXT*5]->(b) RETURN a").is_empty());
    }

    #[test]
    fn test_variable_length_binds_path() {
        let mut store = GraphStore::default();
        chain(&mut store, 3);
        let rows = run(&store, "MATCH (a)-[r:NEXT*2]->(b) RETURN r");
        assert_eq!(rows.len(), 1);
        assert!(matches!(rows[0].get("r"), Some(Binding::Path(p)) if p.len() == 2));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut store = GraphStore::default();
        let ids = chain(&mut store, 3);
        store
            .create_relationship(ids[2], ids[0], "NEXT", Properties::new())
            .unwrap();
        let rows = run(&store, "MATCH (a)-[:NEXT*]->(b) RETURN a");
        // From each node: 1 hop and 2 hops; the third hop would revisit the start.
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn test_self_loop_relaxation() {
        let mut store = GraphStore::default();
        let a = store.create_node(["N"], Properties::new(), None).unwrap();
        store.create_relationship(a, a, "LOOP", Properties::new()).unwrap();

        assert_eq!(run(&store, "MATCH (x)-[:LOOP*1..1]->(y) RETURN x").len(), 1);
        // Once no more hops are required, the loop may be taken again.
        assert_eq!(run(&store, "MATCH (x)-[:LOOP*1..3]->(y) RETURN x").len(), 3);
        assert!(run(&store, "MATCH (x)-[:LOOP*2..2]->(y) RETURN x").is_empty());
    }

    #[test]
    fn test_fixed_hops_do_not_reuse_relationship() {
        let mut store = GraphStore::default();
        chain(&mut store, 2);
        let rows = run(&store, "MATCH (a)-[:NEXT]-(b)-[:NEXT]-(c) RETURN a");
        assert!(rows.is_empty());
    }

    #[test]
    fn test_zero_length_includes_start() {
        let mut store = GraphStore::default();
        chain(&mut store, 2);
        let rows = run(&store, "MATCH (a)-[:NEXT*0..1]->(b) RETURN a");
        // Two zero-length matches plus one hop.
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_pattern_properties_and_labels() {
        let mut store = GraphStore::default();
        store
            .create_node(
                ["Person", "Admin"],
                Properties::from([("name".to_string(), "Ann".into())]),
                None,
            )
            .unwrap();
        store
            .create_node(["Person"], Properties::from([("name".to_string(), "Bob".into())]), None)
            .unwrap();
        assert_eq!(run(&store, "MATCH (p:Person) RETURN p").len(), 2);
        assert_eq!(run(&store, "MATCH (p:Person:Admin) RETURN p").len(), 1);
        assert_eq!(run(&store, "MATCH (p {name: 'Bob'}) RETURN p").len(), 1);
        assert!(run(&store, "MATCH (p:Robot) RETURN p").is_empty());
    }

    #[test]
    fn test_hop_bounds_defaults() {
        let q = Parser::parse("MATCH (a)-[*3..]->(b) RETURN a").unwrap();
        let (_, rels) = pattern_parts(&q.match_clause.as_ref().unwrap().patterns[0]).unwrap();
        assert_eq!(hop_bounds(rels[0], 10), Some((3, 10)));
        assert_eq!(hop_bounds(rels[0], 2), Some((3, 3)));
    }
}
