//! Clause-by-clause interpreter.
//!
//! A query runs over a list of binding rows. The list starts with one empty
//! row, so a query without MATCH still runs its CREATE or RETURN exactly once.
//! Each clause maps the list to the next one in the fixed order MATCH, WHERE,
//! CREATE, SET, DELETE, RETURN, ORDER BY, SKIP, LIMIT.

use crate::ast::{
    CreateClause, DeleteClause, Direction, Expression, MatchClause, NodePattern, PropertyMap,
    Query, RelationshipDirection, ReturnClause, SetClause, SetItem,
};
use crate::error::{Error, Result};
use crate::evaluator::{Evaluator, RegexCache, sort_order};
use crate::matcher::{Matcher, pattern_parts};
use crate::query_api::{Params, QueryOptions};
use crate::result::{QueryResult, QueryStats};
use crate::value::Value;
use contextgraph_api::{NodeId, Properties, RelationshipId};
use contextgraph_storage::GraphStore;
use log::debug;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Relationship type used when CREATE names none.
pub const DEFAULT_RELATIONSHIP_TYPE: &str = "RELATED";

/// What a variable is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Node(NodeId),
    Relationship(RelationshipId),
    /// Relationships walked by a variable-length hop, in order.
    Path(Vec<RelationshipId>),
    Value(Value),
}

impl Binding {
    fn kind(&self) -> &'static str {
        match self {
            Binding::Node(_) => "node",
            Binding::Relationship(_) => "relationship",
            Binding::Path(_) => "relationship list",
            Binding::Value(v) => v.type_name(),
        }
    }
}

/// One binding environment: variable name to binding, in binding order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    // Small row: linear search is fine.
    cols: Vec<(String, Binding)>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.cols.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn with(mut self, name: impl Into<String>, binding: Binding) -> Self {
        let name = name.into();
        if let Some((_k, v)) = self.cols.iter_mut().find(|(k, _)| *k == name) {
            *v = binding;
        } else {
            self.cols.push((name, binding));
        }
        self
    }

    pub fn columns(&self) -> &[(String, Binding)] {
        &self.cols
    }
}

#[derive(Debug, Clone, Copy)]
enum NodeRef {
    Existing(NodeId),
    /// Index into [`CreatePlan::nodes`].
    New(usize),
}

#[derive(Debug)]
struct NewNode {
    variable: Option<String>,
    labels: Vec<String>,
    properties: Properties,
}

#[derive(Debug)]
struct NewRelationship {
    variable: Option<String>,
    rel_type: String,
    properties: Properties,
    source: NodeRef,
    target: NodeRef,
}

/// Everything CREATE will add for one row, fully evaluated.
#[derive(Debug, Default)]
struct CreatePlan {
    nodes: Vec<NewNode>,
    relationships: Vec<NewRelationship>,
}

pub(crate) struct Executor<'a> {
    store: &'a mut GraphStore,
    params: &'a Params,
    options: &'a QueryOptions,
    regexes: RegexCache,
    stats: QueryStats,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a mut GraphStore, params: &'a Params, options: &'a QueryOptions) -> Self {
        Self {
            store,
            params,
            options,
            regexes: RegexCache::default(),
            stats: QueryStats::default(),
        }
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&*self.store, self.params, &self.regexes)
    }

    pub fn run(mut self, query: &Query) -> Result<QueryResult> {
        let mut rows = vec![Row::default()];

        if let Some(clause) = &query.match_clause {
            rows = self.execute_match(clause, rows)?;
            debug!("MATCH produced {} bindings", rows.len());
        }
        if let Some(condition) = &query.where_clause {
            rows = self.execute_where(condition, rows)?;
            debug!("WHERE kept {} bindings", rows.len());
        }
        if let Some(clause) = &query.create_clause {
            rows = self.execute_create(clause, rows)?;
        }
        if let Some(clause) = &query.set_clause {
            self.execute_set(clause, &rows)?;
        }
        if let Some(clause) = &query.delete_clause {
            self.execute_delete(clause, &rows)?;
        }

        let result = match &query.return_clause {
            Some(clause) => self.execute_return(clause, query, rows)?,
            None => QueryResult::default(),
        };
        debug!("query finished: {} rows, {:?}", result.len(), self.stats);
        Ok(result.with_stats(self.stats))
    }

    fn execute_match(&self, clause: &MatchClause, mut rows: Vec<Row>) -> Result<Vec<Row>> {
        let evaluator = self.evaluator();
        let matcher = Matcher::new(&*self.store, &evaluator, self.options.max_var_length_hops);
        for pattern in &clause.patterns {
            let mut next = Vec::new();
            for row in &rows {
                next.extend(matcher.match_pattern(pattern, row)?);
            }
            rows = next;
        }
        Ok(rows)
    }

    fn execute_where(&self, condition: &Expression, rows: Vec<Row>) -> Result<Vec<Row>> {
        let evaluator = self.evaluator();
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if evaluator.evaluate_bool(condition, &row)? {
                kept.push(row);
            }
        }
        Ok(kept)
    }

    fn execute_create(&mut self, clause: &CreateClause, rows: Vec<Row>) -> Result<Vec<Row>> {
        validate_create(clause)?;

        // Evaluate everything first so a bad row leaves the graph untouched.
        let plans = {
            let evaluator = self.evaluator();
            rows.iter()
                .map(|row| plan_create(clause, row, &evaluator))
                .collect::<Result<Vec<_>>>()?
        };

        let mut out = Vec::with_capacity(rows.len());
        for (mut row, plan) in rows.into_iter().zip(plans) {
            let mut created = Vec::with_capacity(plan.nodes.len());
            for node in plan.nodes {
                self.stats.properties_set += node.properties.len();
                let id = self
                    .store
                    .create_node(node.labels, node.properties, None)
                    .map_err(|e| Error::storage("CREATE node", e))?;
                self.stats.nodes_created += 1;
                if let Some(var) = node.variable {
                    row = row.with(var, Binding::Node(id));
                }
                created.push(id);
            }

            let resolve = |r: NodeRef| match r {
                NodeRef::Existing(id) => id,
                NodeRef::New(i) => created[i],
            };
            for rel in plan.relationships {
                self.stats.properties_set += rel.properties.len();
                let id = self
                    .store
                    .create_relationship(
                        resolve(rel.source),
                        resolve(rel.target),
                        rel.rel_type,
                        rel.properties,
                    )
                    .map_err(|e| Error::storage("CREATE relationship", e))?;
                self.stats.relationships_created += 1;
                if let Some(var) = rel.variable {
                    row = row.with(var, Binding::Relationship(id));
                }
            }
            out.push(row);
        }
        debug!(
            "CREATE added {} nodes and {} relationships",
            self.stats.nodes_created, self.stats.relationships_created
        );
        Ok(out)
    }

    fn execute_set(&mut self, clause: &SetClause, rows: &[Row]) -> Result<()> {
        for row in rows {
            for item in &clause.items {
                match item {
                    SetItem::Property {
                        variable,
                        property,
                        value,
                    } => {
                        let value = self.evaluator().evaluate(value, row)?.into_property()?;
                        self.set_property(row, variable, property, value)?;
                    }
                    SetItem::Labels { variable, labels } => match row.get(variable) {
                        Some(Binding::Node(id)) => {
                            self.store
                                .add_labels(*id, labels.iter().cloned())
                                .map_err(|e| Error::storage("SET", e))?;
                        }
                        other => return Err(not_settable(variable, other)),
                    },
                }
            }
        }
        Ok(())
    }

    fn set_property(
        &mut self,
        row: &Row,
        variable: &str,
        key: &str,
        value: contextgraph_api::PropertyValue,
    ) -> Result<()> {
        let remove = value.is_null();
        let outcome = match row.get(variable) {
            Some(Binding::Node(id)) if remove => {
                self.store.remove_node_property(*id, key).map(drop)
            }
            Some(Binding::Node(id)) => self.store.set_node_property(*id, key, value),
            Some(Binding::Relationship(id)) if remove => {
                self.store.remove_relationship_property(*id, key).map(drop)
            }
            Some(Binding::Relationship(id)) => {
                self.store.set_relationship_property(*id, key, value)
            }
            other => return Err(not_settable(variable, other)),
        };
        outcome.map_err(|e| Error::storage("SET", e))?;
        self.stats.properties_set += 1;
        Ok(())
    }

    fn execute_delete(&mut self, clause: &DeleteClause, rows: &[Row]) -> Result<()> {
        // Reject bad bindings before anything is removed.
        for row in rows {
            for variable in &clause.variables {
                match row.get(variable) {
                    Some(
                        Binding::Node(_)
                        | Binding::Relationship(_)
                        | Binding::Path(_)
                        | Binding::Value(Value::Null),
                    ) => {}
                    Some(other) => {
                        return Err(Error::database(format!(
                            "DELETE: `{variable}` is a {}, not a node or relationship",
                            other.kind()
                        )));
                    }
                    None => {
                        return Err(Error::database(format!(
                            "DELETE: variable `{variable}` is not defined"
                        )));
                    }
                }
            }
        }

        for row in rows {
            for variable in &clause.variables {
                match row.get(variable) {
                    Some(Binding::Node(id)) => self.delete_node(*id),
                    Some(Binding::Relationship(id)) => self.delete_relationship(*id),
                    Some(Binding::Path(ids)) => {
                        for id in ids {
                            self.delete_relationship(*id);
                        }
                    }
                    _ => {}
                }
            }
        }
        debug!(
            "DELETE removed {} nodes and {} relationships",
            self.stats.nodes_deleted, self.stats.relationships_deleted
        );
        Ok(())
    }

    // Nodes always go with their relationships; a node removed by an earlier
    // row is skipped.
    fn delete_node(&mut self, id: NodeId) {
        let before = self.store.relationship_count();
        if self.store.delete_node(id) {
            self.stats.nodes_deleted += 1;
            self.stats.relationships_deleted += before - self.store.relationship_count();
        }
    }

    fn delete_relationship(&mut self, id: RelationshipId) {
        if self.store.delete_relationship(id) {
            self.stats.relationships_deleted += 1;
        }
    }

    fn execute_return(
        &self,
        clause: &ReturnClause,
        query: &Query,
        rows: Vec<Row>,
    ) -> Result<QueryResult> {
        let columns: Vec<String> = clause.items.iter().map(|i| i.column_name()).collect();
        {
            let mut seen = HashSet::new();
            if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
                return Err(Error::database(format!(
                    "RETURN: duplicate column name '{dup}'"
                )));
            }
        }

        let evaluator = self.evaluator();
        let aggregating = clause
            .items
            .iter()
            .any(|item| item.expression.contains_aggregate());

        let mut projected = if aggregating {
            let row = clause
                .items
                .iter()
                .map(|item| evaluator.evaluate_aggregate(&item.expression, &rows))
                .collect::<Result<Vec<_>>>()?;
            vec![row]
        } else {
            rows.iter()
                .map(|row| {
                    clause
                        .items
                        .iter()
                        .map(|item| evaluator.evaluate(&item.expression, row))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?
        };

        if clause.distinct {
            let mut keys = HashSet::new();
            projected.retain(|row| {
                let key: Vec<String> = row
                    .iter()
                    .map(|v| format!("{}:{v}", v.type_name()))
                    .collect();
                keys.insert(key)
            });
        }

        if let Some(order_by) = &query.order_by {
            let mut keys = Vec::with_capacity(order_by.items.len());
            for item in &order_by.items {
                let text = item.expression.to_string();
                let index = columns
                    .iter()
                    .position(|c| *c == text)
                    .or_else(|| {
                        clause
                            .items
                            .iter()
                            .position(|r| r.expression == item.expression)
                    })
                    .ok_or_else(|| {
                        Error::database(format!(
                            "ORDER BY: '{text}' is not a returned column"
                        ))
                    })?;
                keys.push((index, item.direction));
            }
            // `sort_by` is stable, so ties keep their match order.
            projected.sort_by(|a, b| {
                keys.iter()
                    .map(|&(i, direction)| compare_for_sort(&a[i], &b[i], direction))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }

        let skip = query.skip.map_or(0, to_usize);
        let limit = query.limit.map_or(usize::MAX, to_usize);
        let projected: Vec<Vec<Value>> = projected.into_iter().skip(skip).take(limit).collect();

        QueryResult::new(columns, projected)
    }
}

/// Shape checks that do not depend on bindings.
fn validate_create(clause: &CreateClause) -> Result<()> {
    let mut rel_vars = HashSet::new();
    for pattern in &clause.patterns {
        let (_, rels) = pattern_parts(pattern)?;
        for rel in rels {
            if rel.variable_length.is_some() {
                return Err(Error::database(
                    "CREATE: variable-length relationships cannot be created",
                ));
            }
            if rel.types.len() > 1 {
                return Err(Error::database(format!(
                    "CREATE: a relationship needs exactly one type, got {}",
                    rel.types.join("|")
                )));
            }
            if let Some(var) = &rel.variable
                && !rel_vars.insert(var.as_str())
            {
                return Err(Error::database(format!(
                    "CREATE: relationship variable `{var}` is used twice"
                )));
            }
        }
    }
    Ok(())
}

fn plan_create(clause: &CreateClause, row: &Row, evaluator: &Evaluator<'_>) -> Result<CreatePlan> {
    let mut plan = CreatePlan::default();
    let mut refs: HashMap<&str, NodeRef> = HashMap::new();

    for pattern in &clause.patterns {
        let (nodes, rels) = pattern_parts(pattern)?;
        let mut node_refs = Vec::with_capacity(nodes.len());
        for node in nodes {
            node_refs.push(plan_node(node, row, evaluator, &mut refs, &mut plan)?);
        }

        for (i, rel) in rels.into_iter().enumerate() {
            if let Some(var) = &rel.variable
                && (row.get(var).is_some() || refs.contains_key(var.as_str()))
            {
                return Err(Error::database(format!(
                    "CREATE: variable `{var}` is already bound"
                )));
            }
            let (source, target) = match rel.direction {
                RelationshipDirection::RightToLeft => (node_refs[i + 1], node_refs[i]),
                _ => (node_refs[i], node_refs[i + 1]),
            };
            plan.relationships.push(NewRelationship {
                variable: rel.variable.clone(),
                rel_type: rel
                    .types
                    .first()
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_RELATIONSHIP_TYPE.to_string()),
                properties: evaluate_properties(rel.properties.as_ref(), row, evaluator)?,
                source,
                target,
            });
        }
    }
    Ok(plan)
}

fn plan_node<'q>(
    node: &'q NodePattern,
    row: &Row,
    evaluator: &Evaluator<'_>,
    refs: &mut HashMap<&'q str, NodeRef>,
    plan: &mut CreatePlan,
) -> Result<NodeRef> {
    if let Some(var) = node.variable.as_deref() {
        if let Some(existing) = refs.get(var) {
            return Ok(*existing);
        }
        match row.get(var) {
            Some(Binding::Node(id)) => {
                refs.insert(var, NodeRef::Existing(*id));
                return Ok(NodeRef::Existing(*id));
            }
            Some(other) => {
                return Err(Error::database(format!(
                    "CREATE: `{var}` is bound to a {}, not a node",
                    other.kind()
                )));
            }
            None => {}
        }
    }

    let reference = NodeRef::New(plan.nodes.len());
    plan.nodes.push(NewNode {
        variable: node.variable.clone(),
        labels: node.labels.clone(),
        properties: evaluate_properties(node.properties.as_ref(), row, evaluator)?,
    });
    if let Some(var) = node.variable.as_deref() {
        refs.insert(var, reference);
    }
    Ok(reference)
}

/// Evaluates a pattern's property map into storable values; null entries are
/// left out.
fn evaluate_properties(
    map: Option<&PropertyMap>,
    row: &Row,
    evaluator: &Evaluator<'_>,
) -> Result<Properties> {
    let mut properties = Properties::new();
    for pair in map.map(|m| m.properties.as_slice()).unwrap_or_default() {
        let value = evaluator.evaluate(&pair.value, row)?.into_property()?;
        if !value.is_null() {
            properties.insert(pair.key.clone(), value);
        }
    }
    Ok(properties)
}

fn not_settable(variable: &str, binding: Option<&Binding>) -> Error {
    match binding {
        Some(b) => Error::database(format!(
            "SET: `{variable}` is a {}, not a node or relationship",
            b.kind()
        )),
        None => Error::database(format!("SET: variable `{variable}` is not defined")),
    }
}

/// Nulls sort last in both directions.
fn compare_for_sort(a: &Value, b: &Value, direction: Direction) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = sort_order(a, b);
            match direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        }
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}
