//! Built-in text search property function.

use crate::e2e_tests::helpers::{TestEngine, pattern};
use crate::query::{
    Algebra, EvaluationError, PatternItem, PropertyFunctionCall, PropertyFunctionRegistry,
    QueryOptions, TEXT_QUERY,
};
use crate::testing::{ex, people_store};
use crate::types::Term;

fn search(inner: Algebra, text: &str) -> Algebra {
    Algebra::property_function(
        inner,
        PropertyFunctionCall::new(
            TEXT_QUERY,
            vec![PatternItem::var("person"), PatternItem::var("label")],
            vec![PatternItem::Term(Term::literal(text))],
        ),
    )
}

#[test]
fn test_text_match_from_identity() {
    let engine = TestEngine::new(people_store());
    let rows = engine.assert_equivalent(&search(Algebra::identity(), "AR"));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("person"), Some(&ex("carol")));
    assert_eq!(rows[0].get("label"), Some(&Term::literal("Carol")));
}

#[test]
fn test_text_match_joins_inner_rows() {
    let engine = TestEngine::new(people_store());
    let inner = Algebra::triples([pattern("person", "age", "age")]);
    let rows = engine.assert_equivalent(&search(inner, "e"));
    // Alice and Dave have ages and an "e" in their names; Erin has no age.
    let people: Vec<_> = rows.iter().filter_map(|row| row.get("person")).collect();
    assert_eq!(people, vec![&ex("alice"), &ex("dave")]);
    assert!(rows.iter().all(|row| row.is_bound("age")));
}

#[test]
fn test_unregistered_function_fails() {
    let engine = TestEngine::with_options(
        people_store(),
        QueryOptions::default().with_property_functions(PropertyFunctionRegistry::new()),
    );
    let query = search(Algebra::identity(), "a");
    assert!(matches!(
        engine.eager(&query),
        Err(EvaluationError::UnknownPropertyFunction(_))
    ));
    assert!(matches!(
        engine.streaming(&query),
        Err(EvaluationError::UnknownPropertyFunction(_))
    ));
}
