//! Left join keeps every left row.

use crate::e2e_tests::helpers::{TestEngine, pattern, sorted};
use crate::query::{Algebra, Expr, Multiset, Solution};
use crate::simulation::DataGenerator;
use crate::testing::{ex, people_store};
use crate::types::Term;

#[test]
fn test_optional_age() {
    let engine = TestEngine::new(people_store());
    let query = Algebra::left_join(
        Algebra::triples([pattern("person", "name", "name")]),
        Algebra::triples([pattern("person", "age", "age")]),
        None,
    );
    let rows = engine.assert_equivalent(&query);
    assert_eq!(rows.len(), 5);
    let carol = rows
        .iter()
        .find(|row| row.get("person") == Some(&ex("carol")))
        .expect("carol should be kept");
    assert!(!carol.is_bound("age"));
    let alice = rows
        .iter()
        .find(|row| row.get("person") == Some(&ex("alice")))
        .expect("alice should be kept");
    assert_eq!(alice.get("age"), Some(&Term::integer(30)));
}

#[test]
fn test_filter_rejects_match_but_keeps_left_row() {
    let engine = TestEngine::new(people_store());
    let query = Algebra::left_join(
        Algebra::triples([pattern("person", "name", "name")]),
        Algebra::triples([pattern("person", "age", "age")]),
        Some(Expr::greater(Expr::var("age"), Expr::constant(Term::integer(28)))),
    );
    let rows = engine.assert_equivalent(&query);
    assert_eq!(rows.len(), 5);
    let with_age: Vec<&Solution> = rows.iter().filter(|row| row.is_bound("age")).collect();
    assert_eq!(with_age.len(), 2);
}

#[test]
fn test_left_join_totality_on_random_multisets() {
    for seed in 0..30 {
        let mut generator = DataGenerator::new(seed);
        let left = generator.multiset(6);
        let right = generator.multiset(6);
        let joined = left.left_join(&right, |_| true);
        assert!(joined.len() >= left.len(), "seed {seed}");
        for row in left.solutions() {
            assert!(
                joined
                    .solutions()
                    .iter()
                    .any(|out| row.iter().all(|(name, term)| out.get(name) == Some(term))),
                "seed {seed}: left row {row:?} lost"
            );
        }
    }
}

#[test]
fn test_left_join_with_null_right_is_left() {
    let left = DataGenerator::new(8).multiset(5);
    assert_eq!(
        sorted(left.left_join(&Multiset::Null, |_| true).into_solutions()),
        sorted(left.solutions().to_vec())
    );
}
