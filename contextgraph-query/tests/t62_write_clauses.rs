//! T62: CREATE, SET and DELETE
//!
//! Counters reflect what actually changed, and a failing write leaves the graph
//! as it was.

use contextgraph_api::{GraphView, PropertyValue};
use contextgraph_query::{Error, Params, QueryOptions, QueryResult, Value, execute, prepare};
use contextgraph_storage::GraphStore;

fn run(store: &mut GraphStore, text: &str) -> contextgraph_query::Result<QueryResult> {
    execute(store, text, &Params::new(), &QueryOptions::default())
}

#[test]
fn test_create_then_match() {
    let mut store = GraphStore::default();
    let result = run(
        &mut store,
        "CREATE (a:Person {name: 'Alice', age: 30})-[:KNOWS {since: 2020}]->(b:Person {name: 'Bob', age: 25})",
    )
    .unwrap();
    let stats = result.stats();
    assert_eq!(stats.nodes_created, 2);
    assert_eq!(stats.relationships_created, 1);
    assert_eq!(stats.properties_set, 5);
    assert!(stats.contains_updates());
    assert!(result.columns().is_empty());

    let result = run(&mut store, "MATCH (p:Person) WHERE p.age > 26 RETURN p.name").unwrap();
    assert_eq!(result.rows(), [vec![Value::from("Alice")]]);
    assert!(!result.stats().contains_updates());

    let result = run(
        &mut store,
        "MATCH (:Person {name: 'Alice'})-[k:KNOWS]->(b) RETURN k.since, b.name",
    )
    .unwrap();
    assert_eq!(
        result.rows(),
        [vec![Value::Int(2020), Value::from("Bob")]]
    );
}

#[test]
fn test_create_per_matched_row() {
    let mut store = GraphStore::default();
    run(&mut store, "CREATE (:City {name: 'Oslo'}), (:City {name: 'Rome'})").unwrap();
    let result = run(
        &mut store,
        "MATCH (c:City) CREATE (c)<-[:LIVES_IN]-(p:Person {home: c.name}) RETURN p.home ORDER BY p.home",
    )
    .unwrap();
    assert_eq!(result.stats().nodes_created, 2);
    assert_eq!(result.stats().relationships_created, 2);
    let homes: Vec<_> = result.records().map(|r| r["p.home"].to_string()).collect();
    assert_eq!(homes, vec!["Oslo", "Rome"]);

    for rel in store.relationships() {
        assert_eq!(rel.rel_type, "LIVES_IN");
        assert!(store.node(rel.source).unwrap().has_label("Person"));
        assert!(store.node(rel.target).unwrap().has_label("City"));
    }
}

#[test]
fn test_create_with_parameters_skips_nulls() {
    let mut store = GraphStore::default();
    let params = Params::new()
        .with("name", "Zed")
        .with("tags", vec!["a", "b"])
        .with("nothing", Value::Null);
    let result = execute(
        &mut store,
        "CREATE (n:Tagged {name: $name, tags: $tags, gone: $nothing}) RETURN n.name, n.tags",
        &params,
        &QueryOptions::default(),
    )
    .unwrap();
    assert_eq!(result.stats().properties_set, 2);
    let node = store.nodes().next().unwrap();
    assert!(node.property("gone").is_none());
    assert_eq!(
        node.property("tags"),
        Some(&PropertyValue::List(vec![
            PropertyValue::from("a"),
            PropertyValue::from("b")
        ]))
    );
}

#[test]
fn test_cannot_store_entities_as_properties() {
    let mut store = GraphStore::default();
    run(&mut store, "CREATE (:A), (:B)").unwrap();
    let before = store.to_image();
    let err = run(&mut store, "MATCH (a:A), (b:B) SET a.friend = b").unwrap_err();
    assert!(matches!(err, Error::Database(_)));
    assert_eq!(store.to_image(), before);
}

#[test]
fn test_set_relationship_property() {
    let mut store = GraphStore::default();
    run(&mut store, "CREATE (:A)-[:R {w: 1}]->(:B)").unwrap();
    let result = run(&mut store, "MATCH ()-[r:R]->() SET r.w = r.w * 10, r.tag = 'x'").unwrap();
    assert_eq!(result.stats().properties_set, 2);
    let rel = store.relationships().next().unwrap();
    assert_eq!(rel.property("w"), Some(&PropertyValue::Int(10)));
    assert_eq!(rel.property("tag"), Some(&PropertyValue::from("x")));
}

#[test]
fn test_delete_node_cascades() {
    let mut store = GraphStore::default();
    run(
        &mut store,
        "CREATE (hub:Hub)-[:L]->(:Leaf), (hub)-[:L]->(:Leaf), (:Leaf)-[:L]->(hub)",
    )
    .unwrap();
    assert_eq!(store.relationship_count(), 3);

    let result = run(&mut store, "MATCH (h:Hub) DELETE h").unwrap();
    assert_eq!(result.stats().nodes_deleted, 1);
    assert_eq!(result.stats().relationships_deleted, 3);
    assert_eq!(store.node_count(), 3);
    assert_eq!(store.relationship_count(), 0);
}

#[test]
fn test_deleted_entities_read_as_null() {
    let mut store = GraphStore::default();
    run(&mut store, "CREATE (:Gone {name: 'x'})").unwrap();
    let result = run(&mut store, "MATCH (g:Gone) DELETE g RETURN g, g.name").unwrap();
    assert_eq!(result.rows(), [vec![Value::Null, Value::Null]]);
}

#[test]
fn test_prepared_query_reuse() {
    let mut store = GraphStore::default();
    let insert = prepare("CREATE (:N {i: $i})").unwrap();
    assert!(insert.is_write());
    for i in 0..4i64 {
        insert
            .execute(&mut store, &Params::new().with("i", i), &QueryOptions::default())
            .unwrap();
    }
    let total = prepare("MATCH (n:N) RETURN SUM(n.i)").unwrap();
    assert!(!total.is_write());
    let result = total
        .execute(&mut store, &Params::new(), &QueryOptions::default())
        .unwrap();
    assert_eq!(result.value(None).unwrap(), &Value::Int(6));
}
