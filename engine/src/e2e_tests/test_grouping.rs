//! Grouping and aggregation scenarios.

use crate::e2e_tests::helpers::{TestEngine, pattern};
use crate::query::{Algebra, BuiltinAggregate, Expr, GroupingClause, Solution};
use crate::storage::TripleStore;
use crate::testing::{ex, people_store};
use crate::types::{Quad, Term};

fn three_facts() -> TripleStore {
    (1..=3)
        .map(|i| Quad::new(ex(&format!("s{i}")), ex("p"), Term::integer(i)))
        .collect()
}

#[test]
fn test_implicit_group_counts_all_rows() {
    let engine = TestEngine::new(three_facts());
    let query = Algebra::group_by(
        Algebra::triples([pattern("s", "p", "o")]),
        None,
        vec![BuiltinAggregate::count_all("count").shared()],
    );
    assert_eq!(
        engine.assert_equivalent(&query),
        vec![Solution::from_pairs([("count", Term::integer(3))])]
    );
}

#[test]
fn test_implicit_group_over_empty_input() {
    let engine = TestEngine::new(TripleStore::new());
    let query = Algebra::group_by(
        Algebra::triples([pattern("s", "p", "o")]),
        None,
        vec![
            BuiltinAggregate::count_all("count").shared(),
            BuiltinAggregate::sum("total", Expr::var("o")).shared(),
        ],
    );
    let rows = engine.assert_equivalent(&query);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("count"), Some(&Term::integer(0)));
}

#[test]
fn test_sum_of_integers() {
    let engine = TestEngine::new(three_facts());
    let query = Algebra::group_by(
        Algebra::triples([pattern("s", "p", "o")]),
        None,
        vec![BuiltinAggregate::sum("total", Expr::var("o")).shared()],
    );
    assert_eq!(
        engine.assert_equivalent(&query),
        vec![Solution::from_pairs([("total", Term::integer(6))])]
    );
}

#[test]
fn test_group_by_key_with_optional_values() {
    let engine = TestEngine::new(people_store());
    // Group people by whether they have an age.
    let query = Algebra::group_by(
        Algebra::left_join(
            Algebra::triples([pattern("person", "name", "name")]),
            Algebra::triples([pattern("person", "age", "age")]),
            None,
        ),
        Some(GroupingClause::by_variable("age")),
        vec![BuiltinAggregate::count_all("n").shared()],
    );
    let rows = engine.assert_equivalent(&query);
    assert_eq!(rows.len(), 4);
    let unbound_group = rows
        .iter()
        .find(|row| !row.is_bound("age"))
        .expect("people without an age form one group");
    assert_eq!(unbound_group.get("n"), Some(&Term::integer(2)));
}

#[test]
fn test_min_max_over_people() {
    let engine = TestEngine::new(people_store());
    let query = Algebra::group_by(
        Algebra::triples([pattern("person", "age", "age")]),
        None,
        vec![
            BuiltinAggregate::min("youngest", Expr::var("age")).shared(),
            BuiltinAggregate::max("oldest", Expr::var("age")).shared(),
        ],
    );
    assert_eq!(
        engine.assert_equivalent(&query),
        vec![Solution::from_pairs([
            ("oldest", Term::integer(41)),
            ("youngest", Term::integer(25)),
        ])]
    );
}
