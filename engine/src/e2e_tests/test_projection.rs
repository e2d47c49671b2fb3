//! Projection and trimming are idempotent.

use crate::e2e_tests::helpers::{TestEngine, pattern, sorted};
use crate::query::{Algebra, PatternItem, TriplePattern};
use crate::simulation::DataGenerator;
use crate::testing::{ex, people_store};

#[test]
fn test_project_twice_equals_once() {
    for seed in 0..20 {
        let bag = DataGenerator::new(seed).multiset(8);
        for row in bag.solutions() {
            let once = row.project(&["a", "c"]);
            assert_eq!(once.project(&["a", "c"]), once);
            assert!(once.variables().all(|name| name == "a" || name == "c"));
        }
    }
}

#[test]
fn test_trim_twice_equals_once() {
    let engine = TestEngine::new(people_store());
    let query = Algebra::triples([TriplePattern::new(
        PatternItem::var("person"),
        PatternItem::Term(ex("name")),
        PatternItem::blank("n"),
    )]);
    let rows = engine.assert_equivalent(&query);
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|row| row.variables().eq(["person"])));

    for seed in 0..10 {
        let mut bag = DataGenerator::new(seed).multiset(6);
        bag.trim_variable("b");
        let once = sorted(bag.solutions().to_vec());
        bag.trim_variable("b");
        assert_eq!(sorted(bag.solutions().to_vec()), once);
        assert!(!bag.contains_variable("b"));
    }
}

#[test]
fn test_select_over_select() {
    let engine = TestEngine::new(people_store());
    let inner = Algebra::select(
        Algebra::triples([pattern("person", "name", "name")]),
        ["person", "name"],
    );
    let once = engine.assert_equivalent(&Algebra::select(inner.clone(), ["name"]));
    let twice = engine.assert_equivalent(&Algebra::select(
        Algebra::select(inner, ["name"]),
        ["name"],
    ));
    assert_eq!(once, twice);
    assert!(once.iter().all(|row| row.len() == 1));
}

#[test]
fn test_select_all_keeps_every_variable() {
    let engine = TestEngine::new(people_store());
    let rows = engine.assert_equivalent(&Algebra::select_all(Algebra::triples([pattern(
        "person", "age", "age",
    )])));
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.len() == 2));
}
