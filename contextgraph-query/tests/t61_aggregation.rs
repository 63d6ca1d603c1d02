//! T61: Aggregating RETURN
//!
//! Aggregates collapse all bindings into one row, skip nulls and keep working
//! over an empty match.

use contextgraph_query::{Error, Params, QueryOptions, QueryResult, Value, execute};
use contextgraph_storage::GraphStore;

fn run(store: &mut GraphStore, text: &str) -> contextgraph_query::Result<QueryResult> {
    execute(store, text, &Params::new(), &QueryOptions::default())
}

fn team() -> GraphStore {
    let mut store = GraphStore::default();
    run(
        &mut store,
        "CREATE (:Person {name: 'A', age: 20}), (:Person {name: 'B', age: 30}), \
         (:Person {name: 'C', age: 20}), (:Person {name: 'D', score: 1.5}), (:Robot {name: 'R2'})",
    )
    .unwrap();
    store
}

#[test]
fn test_count_star_over_nothing() {
    let mut store = team();
    let result = run(&mut store, "MATCH (n:Alien) RETURN COUNT(*)").unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.value(None).unwrap(), &Value::Int(0));

    let result = run(&mut store, "MATCH (n:Alien) RETURN SUM(n.age), COLLECT(n.name)").unwrap();
    assert_eq!(result.rows(), [vec![Value::Null, Value::List(vec![])]]);
}

#[test]
fn test_numeric_aggregates() {
    let mut store = team();
    let result = run(
        &mut store,
        "MATCH (p:Person) RETURN COUNT(p.age) AS n, SUM(p.age) AS total, AVG(p.age) AS mean, \
         MIN(p.age) AS low, MAX(p.age) AS high",
    )
    .unwrap();
    let record = result.single().unwrap().unwrap();
    assert_eq!(record["n"], Value::Int(3));
    assert_eq!(record["total"], Value::Int(70));
    assert_eq!(record["low"], Value::Int(20));
    assert_eq!(record["high"], Value::Int(30));
    let mean = record["mean"].as_f64().unwrap();
    assert!((mean - 70.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_sum_mixing_floats() {
    let mut store = team();
    let result = run(
        &mut store,
        "MATCH (p:Person) RETURN SUM(p.score) + SUM(p.age) AS mixed",
    )
    .unwrap();
    assert_eq!(result.value(None).unwrap(), &Value::Float(71.5));
}

#[test]
fn test_non_numeric_values_skipped() {
    let mut store = team();
    let result = run(&mut store, "MATCH (p:Person) RETURN MAX(p.name), COUNT(p.name)").unwrap();
    assert_eq!(result.rows(), [vec![Value::Null, Value::Int(4)]]);
}

#[test]
fn test_distinct_aggregates() {
    let mut store = team();
    let result = run(
        &mut store,
        "MATCH (p:Person) RETURN COUNT(DISTINCT p.age) AS ages, COLLECT(DISTINCT p.age) AS values",
    )
    .unwrap();
    let record = result.single().unwrap().unwrap();
    assert_eq!(record["ages"], Value::Int(2));
    assert_eq!(
        record["values"],
        Value::List(vec![Value::Int(20), Value::Int(30)])
    );
}

#[test]
fn test_aggregate_outside_return_rejected() {
    let mut store = team();
    let err = run(&mut store, "MATCH (p:Person) WHERE COUNT(*) > 1 RETURN p").unwrap_err();
    assert!(matches!(err, Error::Database(msg) if msg.contains("COUNT")));
}

#[test]
fn test_count_star_json_row() {
    let mut store = team();
    let result = run(&mut store, "MATCH (r:Robot) RETURN COUNT(*) AS robots").unwrap();
    let json = serde_json::to_value(result.to_maps()).unwrap();
    assert_eq!(json, serde_json::json!([{"robots": 1}]));
}
