//! Identity and Null behave as units and absorbing elements.

use crate::e2e_tests::helpers::{TestEngine, knows, sorted};
use crate::query::{Algebra, Multiset};
use crate::simulation::DataGenerator;
use crate::testing::knows_store;

#[test]
fn test_identity_is_join_unit() {
    for seed in 0..20 {
        let bag = DataGenerator::new(seed).multiset(8);
        let expected = sorted(bag.solutions().to_vec());
        assert_eq!(sorted(Multiset::Identity.join(&bag).into_solutions()), expected);
        assert_eq!(sorted(bag.join(&Multiset::Identity).into_solutions()), expected);
    }
}

#[test]
fn test_null_absorbs_join() {
    let bag = DataGenerator::new(3).multiset(5);
    assert!(Multiset::Null.join(&bag).is_empty());
    assert!(bag.join(&Multiset::Null).is_empty());
}

#[test]
fn test_null_is_union_unit() {
    let bag = DataGenerator::new(4).multiset(5);
    let expected = sorted(bag.solutions().to_vec());
    assert_eq!(sorted(bag.union(&Multiset::Null).into_solutions()), expected);
    assert_eq!(sorted(Multiset::Null.union(&bag).into_solutions()), expected);
}

#[test]
fn test_identity_algebra_is_join_unit() {
    let engine = TestEngine::new(knows_store());
    let pattern = Algebra::triples([knows("x", "y")]);
    let expected = engine.assert_equivalent(&pattern);
    assert_eq!(expected.len(), 2);
    assert_eq!(
        engine.assert_equivalent(&Algebra::join(Algebra::identity(), pattern.clone())),
        expected
    );
    assert_eq!(
        engine.assert_equivalent(&Algebra::join(pattern, Algebra::identity())),
        expected
    );
}

#[test]
fn test_identity_evaluates_to_one_empty_row() {
    let engine = TestEngine::new(knows_store());
    let rows = engine.assert_equivalent(&Algebra::identity());
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_empty());
}
