//! T60: Variable-length relationship matching
//!
//! `*k` over a chain binds exactly the pairs k hops apart; open ranges stop at
//! the configured ceiling.

use contextgraph_api::{NodeId, Properties, PropertyValue};
use contextgraph_query::{Params, QueryOptions, Value, execute};
use contextgraph_storage::GraphStore;

fn chain(n: usize) -> (GraphStore, Vec<NodeId>) {
    let mut store = GraphStore::default();
    let ids: Vec<NodeId> = (0..=n)
        .map(|i| {
            store
                .create_node(
                    ["Step"],
                    Properties::from([("i".to_string(), PropertyValue::Int(i as i64))]),
                    None,
                )
                .unwrap()
        })
        .collect();
    for pair in ids.windows(2) {
        store
            .create_relationship(pair[0], pair[1], "T", Properties::new())
            .unwrap();
    }
    (store, ids)
}

fn pairs(store: &mut GraphStore, text: &str, options: &QueryOptions) -> Vec<(i64, i64)> {
    let result = execute(store, text, &Params::new(), options).unwrap();
    result
        .records()
        .map(|r| (r["a.i"].as_i64().unwrap(), r["b.i"].as_i64().unwrap()))
        .collect()
}

#[test]
fn test_exact_hop_count_on_chain() {
    let n = 5;
    let (mut store, _) = chain(n);
    for k in 1..=n + 1 {
        let mut got = pairs(
            &mut store,
            &format!("MATCH (a)-[:T*{k}]->(b) RETURN a.i, b.i"),
            &QueryOptions::default(),
        );
        got.sort();
        let expected: Vec<(i64, i64)> = (0..=n)
            .filter(|i| i + k <= n)
            .map(|i| (i as i64, (i + k) as i64))
            .collect();
        assert_eq!(got, expected, "k = {k}");
    }
}

#[test]
fn test_range_over_people() {
    let mut store = GraphStore::default();
    execute(
        &mut store,
        "CREATE (a:Person {name: 'Alice'})-[:KNOWS]->(b:Person {name: 'Bob'})-[:KNOWS]->(c:Person {name: 'Charlie'})",
        &Params::new(),
        &QueryOptions::default(),
    )
    .unwrap();

    let result = execute(
        &mut store,
        "MATCH (a:Person)-[:KNOWS*1..2]->(b:Person) RETURN a.name, b.name ORDER BY a.name, b.name",
        &Params::new(),
        &QueryOptions::default(),
    )
    .unwrap();
    let got: Vec<(String, String)> = result
        .records()
        .map(|r| (r["a.name"].to_string(), r["b.name"].to_string()))
        .collect();
    assert_eq!(
        got,
        vec![
            ("Alice".to_string(), "Bob".to_string()),
            ("Alice".to_string(), "Charlie".to_string()),
            ("Bob".to_string(), "Charlie".to_string()),
        ]
    );
}

#[test]
fn test_open_range_respects_ceiling() {
    let (mut store, _) = chain(6);
    let options = QueryOptions {
        max_var_length_hops: 3,
    };
    let got = pairs(
        &mut store,
        "MATCH (a {i: 0})-[:T*]->(b) RETURN a.i, b.i",
        &options,
    );
    assert_eq!(got, vec![(0, 1), (0, 2), (0, 3)]);

    let got = pairs(
        &mut store,
        "MATCH (a {i: 0})-[:T*2..]->(b) RETURN a.i, b.i",
        &QueryOptions::default(),
    );
    assert_eq!(got, vec![(0, 2), (0, 3), (0, 4), (0, 5), (0, 6)]);
}

#[test]
fn test_path_variable_and_incoming() {
    let (mut store, _) = chain(3);
    let result = execute(
        &mut store,
        "MATCH (b {i: 3})<-[r:T*3]-(a) RETURN a.i, SIZE(r) AS hops",
        &Params::new(),
        &QueryOptions::default(),
    )
    .unwrap();
    let record = result.single().unwrap().unwrap();
    assert_eq!(record["a.i"], Value::Int(0));
    assert_eq!(record["hops"], Value::Int(3));
}

#[test]
fn test_wrong_type_never_matches() {
    let (mut store, _) = chain(3);
    let got = pairs(
        &mut store,
        "MATCH (a)-[:OTHER*1..3]->(b) RETURN a.i, b.i",
        &QueryOptions::default(),
    );
    assert!(got.is_empty());
}
