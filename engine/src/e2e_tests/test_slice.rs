//! Slice over an ordered result.

use crate::e2e_tests::helpers::{TestEngine, pattern};
use crate::query::{Algebra, Expr, OrderCondition};
use crate::storage::TripleStore;
use crate::testing::ex;
use crate::types::{Quad, Term};

fn five_rows() -> TripleStore {
    (1..=5)
        .map(|i| Quad::new(ex(&format!("s{i}")), ex("rank"), Term::integer(i)))
        .collect()
}

fn ordered() -> Algebra {
    Algebra::order_by(
        Algebra::triples([pattern("s", "rank", "r")]),
        vec![OrderCondition::ascending(Expr::var("r"))],
    )
}

fn ranks(engine: &TestEngine, query: &Algebra) -> Vec<Term> {
    engine
        .assert_equivalent(query)
        .iter()
        .filter_map(|row| row.get("r").cloned())
        .collect()
}

#[test]
fn test_offset_one_limit_two() {
    let engine = TestEngine::new(five_rows());
    let query = Algebra::slice(ordered(), 1, Some(2));
    assert_eq!(ranks(&engine, &query), vec![Term::integer(2), Term::integer(3)]);
}

#[test]
fn test_offset_past_end_is_empty() {
    let engine = TestEngine::new(five_rows());
    let query = Algebra::slice(ordered(), 10, None);
    assert!(engine.assert_equivalent(&query).is_empty());
}

#[test]
fn test_limit_zero_is_empty() {
    let engine = TestEngine::new(five_rows());
    let query = Algebra::slice(ordered(), 0, Some(0));
    assert!(engine.assert_equivalent(&query).is_empty());
}

#[test]
fn test_unlimited_offset_keeps_tail() {
    let engine = TestEngine::new(five_rows());
    let query = Algebra::slice(ordered(), 3, None);
    assert_eq!(ranks(&engine, &query), vec![Term::integer(4), Term::integer(5)]);
}

#[test]
fn test_descending_order_then_slice() {
    let engine = TestEngine::new(five_rows());
    let query = Algebra::slice(
        Algebra::order_by(
            Algebra::triples([pattern("s", "rank", "r")]),
            vec![OrderCondition::descending(Expr::var("r"))],
        ),
        0,
        Some(2),
    );
    assert_eq!(ranks(&engine, &query), vec![Term::integer(4), Term::integer(5)]);
}
