//! Unit tests for the dependency graph

use keel_core::{Entity, FeatureTable, SourceConfig, SourceKind, TableSource};
use keel_runtime::Dag;

fn entity() -> Entity {
    Entity::new("user", vec!["user_id"]).unwrap()
}

fn root(name: &str) -> FeatureTable {
    FeatureTable::new(
        name,
        TableSource::External(SourceKind::batch(
            format!("{}_src", name),
            SourceConfig::Table {
                name: "raw_events".to_string(),
            },
        )),
        entity(),
    )
}

fn derived(name: &str, upstream: &str) -> FeatureTable {
    FeatureTable::derived_from(name, upstream, entity())
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_chain_orders_parents_first() {
    let dag = Dag::from_tables(&[root("a"), derived("b", "a"), derived("c", "b")]);

    assert_eq!(dag.topological_sort().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(dag.get_upstream("c", true).unwrap(), vec!["a", "b", "c"]);
    assert_eq!(dag.get_upstream("c", false).unwrap(), vec!["a", "b"]);
    assert_eq!(dag.get_downstream("a", false).unwrap(), vec!["b", "c"]);
}

#[test]
fn test_order_independent_of_insertion_order() {
    let forward = Dag::from_tables(&[root("a"), derived("b", "a"), derived("c", "b")]);
    let reversed = Dag::from_tables(&[derived("c", "b"), derived("b", "a"), root("a")]);

    assert_eq!(
        forward.topological_sort().unwrap(),
        reversed.topological_sort().unwrap()
    );
}

#[test]
fn test_independent_tables_break_ties_by_name() {
    let dag = Dag::from_tables(&[
        root("zeta"),
        root("alpha"),
        derived("mid", "zeta"),
        derived("beta", "alpha"),
    ]);

    // ready set is {alpha, zeta}; after alpha, beta joins and sorts first
    assert_eq!(
        dag.topological_sort().unwrap(),
        vec!["alpha", "beta", "zeta", "mid"]
    );
}

#[test]
fn test_every_table_appears_once() {
    let dag = Dag::from_tables(&[
        root("a"),
        derived("b", "a"),
        derived("c", "a"),
        derived("d", "b"),
        derived("e", "c"),
    ]);
    let order = dag.topological_sort().unwrap();
    assert_eq!(order.len(), 5);

    let position = |n: &str| order.iter().position(|o| o == n).unwrap();
    for name in ["b", "c", "d", "e"] {
        for up in dag.get_upstream(name, false).unwrap() {
            assert!(position(&up) < position(name));
        }
    }
}

#[test]
fn test_downstream_siblings_in_name_order() {
    let dag = Dag::from_tables(&[
        root("a"),
        derived("c", "a"),
        derived("b", "a"),
        derived("d", "b"),
    ]);
    assert_eq!(
        dag.get_downstream("a", true).unwrap(),
        vec!["a", "b", "d", "c"]
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_cycle_names_the_tables() {
    let dag = Dag::from_tables(&[root("ok"), derived("x", "y"), derived("y", "x")]);

    let err = dag.topological_sort().unwrap_err();
    let structured = err.structured().expect("structured error");
    assert_eq!(structured.cause, "Cycle detected involving tables: x, y");
    assert!(!structured.fix.is_empty());
}

#[test]
fn test_unknown_table_lookups() {
    let dag = Dag::from_tables(&[root("a")]);

    for err in [
        dag.get_upstream("missing", true).unwrap_err(),
        dag.get_downstream("missing", true).unwrap_err(),
    ] {
        let structured = err.structured().expect("structured error");
        assert!(structured.context.contains("missing"));
        assert_eq!(structured.cause, "Table not found in DAG");
        assert!(structured.fix.contains("'missing'"));
    }
    assert!(dag.get_table("missing").is_err());
}

#[test]
fn test_empty_dag() {
    let dag = Dag::new();
    assert!(dag.is_empty());
    assert!(dag.topological_sort().unwrap().is_empty());
}
