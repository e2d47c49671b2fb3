//! Join is commutative and associative as a multiset operation.

use crate::e2e_tests::helpers::{TestEngine, pattern, sorted};
use crate::query::{Algebra, Multiset, Solution};
use crate::simulation::{DataGenConfig, DataGenerator};
use crate::storage::tree::TreeKind;

fn rows(bag: &Multiset) -> Vec<Solution> {
    sorted(bag.solutions().to_vec())
}

#[test]
fn test_join_commutative() {
    for seed in 0..30 {
        let mut generator = DataGenerator::new(seed);
        let left = generator.multiset(6);
        let right = generator.multiset(6);
        assert_eq!(rows(&left.join(&right)), rows(&right.join(&left)), "seed {seed}");
    }
}

#[test]
fn test_join_associative() {
    for seed in 0..30 {
        let mut generator = DataGenerator::new(seed);
        let a = generator.multiset(4);
        let b = generator.multiset(4);
        let c = generator.multiset(4);
        assert_eq!(
            rows(&a.join(&b).join(&c)),
            rows(&a.join(&b.join(&c))),
            "seed {seed}"
        );
    }
}

#[test]
fn test_join_of_disjoint_schemas_is_product() {
    let config = DataGenConfig {
        variables: vec!["x".to_owned()],
        unbound_rate: 0.0,
        ..DataGenConfig::default()
    };
    let left = DataGenerator::with_config(1, config.clone()).multiset(3);
    let right = DataGenerator::with_config(
        2,
        DataGenConfig {
            variables: vec!["y".to_owned()],
            ..config
        },
    )
    .multiset(4);
    assert!(left.is_disjoint_with(&right));
    assert_eq!(left.join(&right).len(), 12);
    assert_eq!(rows(&left.join(&right)), rows(&left.product(&right)));
}

#[test]
fn test_algebra_join_commutes_over_random_stores() {
    for seed in 0..10 {
        let store = DataGenerator::new(seed).store(40, TreeKind::Scapegoat);
        let engine = TestEngine::new(store);
        let left = Algebra::triples([pattern("a", "p0", "b")]);
        let right = Algebra::triples([pattern("b", "p1", "c")]);
        assert_eq!(
            engine.assert_equivalent(&Algebra::join(left.clone(), right.clone())),
            engine.assert_equivalent(&Algebra::join(right, left)),
            "seed {seed}"
        );
    }
}
