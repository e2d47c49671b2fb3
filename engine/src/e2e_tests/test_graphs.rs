//! Named graph scoping.

use crate::e2e_tests::helpers::{TestEngine, pattern};
use crate::query::{Algebra, PatternItem, QueryOptions};
use crate::storage::ActiveGraph;
use crate::testing::{ex, graph_store};

fn subjects(rows: &[crate::query::Solution]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get("s").map(|term| term.lexical_form().to_owned()))
        .collect()
}

#[test]
fn test_default_graph_only_by_default() {
    let engine = TestEngine::new(graph_store());
    let rows = engine.assert_equivalent(&Algebra::triples([pattern("s", "p", "o")]));
    assert_eq!(subjects(&rows), vec!["http://example.org/s0"]);
}

#[test]
fn test_union_graph_sees_everything() {
    let engine = TestEngine::with_options(
        graph_store(),
        QueryOptions::default().with_active_graph(ActiveGraph::Union),
    );
    let rows = engine.assert_equivalent(&Algebra::triples([pattern("s", "p", "o")]));
    assert_eq!(rows.len(), 4);
}

#[test]
fn test_graph_with_fixed_name() {
    let engine = TestEngine::new(graph_store());
    let query = Algebra::graph(
        Algebra::triples([pattern("s", "p", "o")]),
        PatternItem::Term(ex("g2")),
    );
    let rows = engine.assert_equivalent(&query);
    assert_eq!(
        subjects(&rows),
        vec!["http://example.org/s2", "http://example.org/s3"]
    );
}

#[test]
fn test_graph_variable_binds_each_named_graph() {
    let engine = TestEngine::new(graph_store());
    let query = Algebra::graph(
        Algebra::triples([pattern("s", "p", "o")]),
        PatternItem::var("g"),
    );
    let rows = engine.assert_equivalent(&query);
    assert_eq!(rows.len(), 3);
    for row in &rows {
        let graph = row.get("g").expect("graph variable should be bound");
        assert_ne!(graph, &ex("g0"));
    }
    assert_eq!(rows.iter().filter(|row| row.get("g") == Some(&ex("g2"))).count(), 2);
}

#[test]
fn test_graph_variable_respects_named_scope() {
    let engine = TestEngine::with_options(
        graph_store(),
        QueryOptions::default().with_active_graph(ActiveGraph::named(ex("g1"))),
    );
    let query = Algebra::graph(
        Algebra::triples([pattern("s", "p", "o")]),
        PatternItem::var("g"),
    );
    let rows = engine.assert_equivalent(&query);
    assert_eq!(subjects(&rows), vec!["http://example.org/s1"]);
}
