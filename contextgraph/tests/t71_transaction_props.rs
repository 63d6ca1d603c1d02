//! T71: Rollback undoes any sequence of writes

use contextgraph::{Db, GraphView, Params};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    CreateNode(i64),
    Link(i64, i64),
    SetAge(i64, i64),
    DeleteNode(i64),
    DeleteLinks(i64),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..20i64).prop_map(Op::CreateNode),
        (0..20i64, 0..20i64).prop_map(|(a, b)| Op::Link(a, b)),
        (0..20i64, -5..5i64).prop_map(|(k, age)| Op::SetAge(k, age)),
        (0..20i64).prop_map(Op::DeleteNode),
        (0..20i64).prop_map(Op::DeleteLinks),
        Just(Op::Clear),
    ]
}

fn apply(db: &mut Db, op: &Op) {
    let params = Params::new();
    let text = match op {
        Op::CreateNode(k) => format!("CREATE (:N {{k: {k}}})"),
        Op::Link(a, b) => format!("MATCH (a:N {{k: {a}}}), (b:N {{k: {b}}}) CREATE (a)-[:L]->(b)"),
        Op::SetAge(k, age) => format!("MATCH (n:N {{k: {k}}}) SET n.age = {age}"),
        Op::DeleteNode(k) => format!("MATCH (n:N {{k: {k}}}) DELETE n"),
        Op::DeleteLinks(k) => format!("MATCH (:N {{k: {k}}})-[r]-() DELETE r"),
        Op::Clear => {
            db.store_mut().clear();
            return;
        }
    };
    db.execute(&text, &params).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn rollback_restores_counts_and_ids(
        setup in prop::collection::vec(op(), 0..15),
        inside in prop::collection::vec(op(), 0..15),
    ) {
        let mut db = Db::new();
        for op in &setup {
            apply(&mut db, op);
        }
        let before = db.store().to_image();
        let node_ids: Vec<_> = db.store().node_ids().collect();

        db.begin().unwrap();
        for op in &inside {
            apply(&mut db, op);
        }
        db.rollback().unwrap();

        prop_assert_eq!(db.store().node_count(), before.nodes.len());
        prop_assert_eq!(db.store().relationship_count(), before.relationships.len());
        prop_assert_eq!(db.store().node_ids().collect::<Vec<_>>(), node_ids);
        prop_assert_eq!(db.store().to_image(), before);
    }
}
