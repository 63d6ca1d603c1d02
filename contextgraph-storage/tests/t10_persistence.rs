//! T10: Persistence round-trips
//!
//! Both tiers must rebuild a store with the same ids, labels order, properties,
//! endpoints and counters.

use contextgraph_api::{GraphView, Properties, PropertyValue};
use contextgraph_storage::persistence::{load_binary, load_json, save_binary, save_json};
use contextgraph_storage::{Error, GraphStore};
use std::collections::BTreeMap;
use tempfile::tempdir;

fn sample_store() -> GraphStore {
    let mut store = GraphStore::default();
    let mut nested = BTreeMap::new();
    nested.insert("city".to_string(), PropertyValue::from("Paris"));
    nested.insert(
        "scores".to_string(),
        PropertyValue::List(vec![PropertyValue::Int(1), PropertyValue::Float(2.5)]),
    );

    let alice = store
        .create_node(
            ["Person", "Employee"],
            Properties::from([
                ("name".to_string(), PropertyValue::from("Alice")),
                ("age".to_string(), PropertyValue::Int(30)),
                ("height".to_string(), PropertyValue::Float(1.0)),
                ("active".to_string(), PropertyValue::Bool(true)),
                ("nickname".to_string(), PropertyValue::Null),
                ("meta".to_string(), PropertyValue::Map(nested)),
            ]),
            None,
        )
        .unwrap();
    let bob = store
        .create_node(["Person"], Properties::new(), Some(40))
        .unwrap();
    let gone = store.create_node(["Temp"], Properties::new(), None).unwrap();
    store
        .create_relationship(
            alice,
            bob,
            "KNOWS",
            Properties::from([("since".to_string(), PropertyValue::Int(2019))]),
        )
        .unwrap();
    store
        .create_relationship(bob, gone, "LIKES", Properties::new())
        .unwrap();
    store.create_relationship(bob, bob, "SELF", Properties::new()).unwrap();
    store.delete_node(gone);
    store
}

fn assert_same_graph(left: &GraphStore, right: &GraphStore) {
    assert_eq!(left.node_count(), right.node_count());
    assert_eq!(left.relationship_count(), right.relationship_count());
    for node in left.nodes() {
        let other = right.get_node(node.id).expect("node survives round-trip");
        assert_eq!(other.labels, node.labels);
        assert_eq!(other.properties, node.properties);
    }
    for rel in left.relationships() {
        let other = right.get_relationship(rel.id).expect("relationship survives");
        assert_eq!(other, rel);
    }
    assert_eq!(left.next_node_id(), right.next_node_id());
    assert_eq!(left.next_relationship_id(), right.next_relationship_id());
}

#[test]
fn test_binary_round_trip_is_lossless() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graph.bin");
    let store = sample_store();

    save_binary(&store, &path).unwrap();
    let loaded = load_binary(&path).unwrap();

    assert_same_graph(&store, &loaded);
    assert_eq!(loaded.to_image(), store.to_image());
}

#[test]
fn test_json_round_trip_keeps_scalars() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graph.json");
    let store = sample_store();

    save_json(&store, &path).unwrap();
    let loaded = load_json(&path).unwrap();

    assert_same_graph(&store, &loaded);
    let alice = loaded.get_node(0).unwrap();
    assert_eq!(alice.property("height"), Some(&PropertyValue::Float(1.0)));
    assert_eq!(alice.property("nickname"), Some(&PropertyValue::Null));
}

#[test]
fn test_loaded_store_continues_counters() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graph.bin");
    save_binary(&sample_store(), &path).unwrap();

    let mut loaded = load_binary(&path).unwrap();
    // 40 was an explicit id, and node 41 was created then deleted.
    assert_eq!(
        loaded.create_node(["New"], Properties::new(), None).unwrap(),
        42
    );
    assert_eq!(loaded.outgoing(40).len(), 1);
}

#[test]
fn test_binary_rejects_foreign_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graph.bin");
    std::fs::write(&path, b"definitely not a graph").unwrap();
    assert!(matches!(load_binary(&path), Err(Error::Corrupt(_))));
}

#[test]
fn test_undirected_flag_survives() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graph.json");
    let store = GraphStore::new(false);
    save_json(&store, &path).unwrap();
    assert!(!load_json(&path).unwrap().is_directed());
}
