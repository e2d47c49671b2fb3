//! Two-step path: `?x knows ?y . ?y knows ?z`.

use crate::e2e_tests::helpers::{TestEngine, knows};
use crate::query::{Algebra, BgpItem, Solution};
use crate::testing::{ex, knows_store};

fn expected() -> Vec<Solution> {
    vec![Solution::from_pairs([
        ("x", ex("a")),
        ("y", ex("b")),
        ("z", ex("c")),
    ])]
}

#[test]
fn test_two_step_join_as_join_operator() {
    let engine = TestEngine::new(knows_store());
    let query = Algebra::join(
        Algebra::triples([knows("x", "y")]),
        Algebra::triples([knows("y", "z")]),
    );
    assert_eq!(engine.assert_equivalent(&query), expected());
}

#[test]
fn test_two_step_join_inside_one_bgp() {
    let engine = TestEngine::new(knows_store());
    let query = Algebra::triples([knows("x", "y"), knows("y", "z")]);
    assert_eq!(engine.assert_equivalent(&query), expected());
}

#[test]
fn test_two_step_join_with_bound_start() {
    let engine = TestEngine::new(knows_store());
    let query = Algebra::bgp(vec![
        BgpItem::Triple(knows("x", "y")),
        BgpItem::Triple(knows("y", "z")),
    ]);
    let (rows, _) = engine
        .batched(
            &query,
            vec![
                Solution::from_pairs([("x", ex("a"))]),
                Solution::from_pairs([("x", ex("b"))]),
            ],
            8,
        )
        .expect("batch evaluation should succeed");
    assert_eq!(rows, expected());
}

#[test]
fn test_three_steps_find_nothing() {
    let engine = TestEngine::new(knows_store());
    let query = Algebra::triples([knows("x", "y"), knows("y", "z"), knows("z", "w")]);
    assert!(engine.assert_equivalent(&query).is_empty());
}
