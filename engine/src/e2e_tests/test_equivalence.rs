//! Eager, streaming and batch evaluation produce the same multisets.

use crate::e2e_tests::helpers::{TestEngine, pattern};
use crate::query::{
    Algebra, BgpItem, BuiltinAggregate, Expr, GroupingClause, OrderCondition, PatternItem,
    Solution,
};
use crate::simulation::DataGenerator;
use crate::storage::tree::TreeKind;
use crate::testing::ex;
use crate::types::Term;

fn shapes() -> Vec<Algebra> {
    let ab = Algebra::triples([pattern("a", "p0", "b")]);
    let bc = Algebra::triples([pattern("b", "p1", "c")]);
    let ac = Algebra::triples([pattern("a", "p2", "c")]);
    vec![
        ab.clone(),
        Algebra::join(ab.clone(), bc.clone()),
        Algebra::left_join(ab.clone(), bc.clone(), None),
        Algebra::left_join(
            ab.clone(),
            ac.clone(),
            Some(Expr::negate(Expr::equal(Expr::var("b"), Expr::var("c")))),
        ),
        Algebra::union(ab.clone(), ac.clone()),
        Algebra::minus(ab.clone(), ac.clone()),
        Algebra::filter(
            ab.clone(),
            Expr::equal(Expr::var("a"), Expr::constant(ex("r1"))),
        ),
        Algebra::extend(ab.clone(), "copy", Expr::str(Expr::var("b"))),
        Algebra::distinct(Algebra::select(Algebra::join(ab.clone(), bc.clone()), ["a"])),
        Algebra::group_by(
            ab.clone(),
            Some(GroupingClause::by_variable("a")),
            vec![
                BuiltinAggregate::count_all("n").shared(),
                BuiltinAggregate::count("bs", Expr::var("b")).distinct().shared(),
            ],
        ),
        Algebra::ask(Algebra::join(ab.clone(), bc.clone())),
        Algebra::slice(
            Algebra::order_by(ab.clone(), vec![OrderCondition::ascending(Expr::var("a"))]),
            1,
            Some(3),
        ),
        Algebra::graph(ab.clone(), PatternItem::var("g")),
        Algebra::bgp(vec![
            BgpItem::Triple(pattern("a", "p0", "b")),
            BgpItem::Bind {
                variable: "label".to_owned(),
                expression: Expr::str(Expr::var("a")),
            },
            BgpItem::Filter(Expr::negate(Expr::equal(
                Expr::var("b"),
                Expr::constant(Term::integer(3)),
            ))),
            BgpItem::Triple(pattern("b", "p1", "c")),
        ]),
    ]
}

#[test]
fn test_eager_and_streaming_agree_on_random_stores() {
    for seed in 0..8 {
        let kind = [TreeKind::Avl, TreeKind::Scapegoat, TreeKind::Unbalanced][(seed % 3) as usize];
        let store = DataGenerator::new(seed).store(60, kind);
        let engine = TestEngine::new(store);
        for shape in shapes() {
            engine.assert_equivalent(&shape);
        }
    }
}

#[test]
fn test_batch_over_many_inputs_matches_single_runs() {
    let store = DataGenerator::new(21).store(60, TreeKind::Avl);
    let engine = TestEngine::new(store);
    let query = Algebra::join(
        Algebra::triples([pattern("a", "p0", "b")]),
        Algebra::triples([pattern("b", "p1", "c")]),
    );
    let inputs: Vec<Solution> = (0..6)
        .map(|n| Solution::from_pairs([("a", DataGenerator::resource(n))]))
        .collect();

    let mut expected = Vec::new();
    for input in &inputs {
        let (rows, _) = engine
            .batched(&query, vec![input.clone()], 1024)
            .expect("single input evaluation should succeed");
        expected.extend(rows);
    }
    expected.sort();

    for batch_size in [1, 2, 5, 1024] {
        let (rows, lengths) = engine
            .batched(&query, inputs.clone(), batch_size)
            .expect("batch evaluation should succeed");
        assert_eq!(rows, expected, "batch size {batch_size}");
        assert!(lengths.iter().all(|len| *len <= batch_size));
    }
}
