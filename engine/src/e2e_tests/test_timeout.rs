//! Query deadlines with and without partial results.

use std::time::Duration;

use futures::StreamExt;

use crate::e2e_tests::helpers::pattern;
use crate::query::{Algebra, BuiltinAggregate, EvaluationError, QueryEngine, QueryOptions};
use crate::simulation::SimulatedTimeSource;
use crate::stream::StreamEngine;
use crate::testing::{init_tracing, people_store};
use crate::types::Term;

fn names_then_ages() -> Algebra {
    Algebra::triples([pattern("person", "name", "name"), pattern("person", "age", "age")])
}

#[test]
fn test_eager_timeout_between_patterns() {
    init_tracing();
    let store = people_store();
    let clock = SimulatedTimeSource::shared(0);
    let options = QueryOptions::default()
        .with_timeout(Some(Duration::from_millis(5)))
        .with_time_source(clock.clone());
    // Deadline start, then one check per pattern: 0, 3, 6.
    clock.set_auto_advance(3);

    let error = QueryEngine::new(&store, options.clone())
        .evaluate(&names_then_ages())
        .expect_err("query should time out");
    assert!(matches!(error, EvaluationError::Timeout { limit_ms: 5, .. }));

    clock.set(0);
    let partial = QueryEngine::new(&store, options.with_partial_results_on_timeout(true))
        .evaluate(&names_then_ages())
        .expect("partial results should be returned");
    assert_eq!(partial.len(), 5);
    assert!(partial.solutions().iter().all(|row| !row.is_bound("age")));
}

#[test]
fn test_eager_partial_rows_flow_through_outer_operators() {
    init_tracing();
    let store = people_store();
    let clock = SimulatedTimeSource::shared(0);
    let options = QueryOptions::default()
        .with_timeout(Some(Duration::from_millis(5)))
        .with_time_source(clock.clone())
        .with_partial_results_on_timeout(true);
    clock.set_auto_advance(3);
    let query = Algebra::slice(Algebra::select(names_then_ages(), ["name"]), 0, Some(1));

    let rows = QueryEngine::new(&store, options)
        .evaluate(&query)
        .expect("partial results should be returned");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.variables(), ["name".to_string()]);
    assert!(rows.solutions()[0].is_bound("name"));
    assert!(!rows.solutions()[0].is_bound("person"));
}

#[test]
fn test_eager_partial_rows_are_grouped() {
    init_tracing();
    let store = people_store();
    let clock = SimulatedTimeSource::shared(0);
    let options = QueryOptions::default()
        .with_timeout(Some(Duration::from_millis(5)))
        .with_time_source(clock.clone())
        .with_partial_results_on_timeout(true);
    clock.set_auto_advance(3);
    let query = Algebra::group_by(
        names_then_ages(),
        None,
        vec![BuiltinAggregate::count_all("n").shared()],
    );

    let rows = QueryEngine::new(&store, options)
        .evaluate(&query)
        .expect("partial results should be returned");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.solutions()[0].get("n"), Some(&Term::integer(5)));
}

#[test]
fn test_eager_no_timeout_with_generous_limit() {
    init_tracing();
    let store = people_store();
    let clock = SimulatedTimeSource::shared(0);
    let options = QueryOptions::default()
        .with_timeout(Some(Duration::from_secs(60)))
        .with_time_source(clock);
    let rows = QueryEngine::new(&store, options)
        .evaluate(&names_then_ages())
        .expect("query should finish");
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_streaming_timeout_keeps_rows_already_pulled() {
    init_tracing();
    let store = people_store();
    let clock = SimulatedTimeSource::shared(0);
    let options = QueryOptions::default()
        .with_timeout(Some(Duration::from_millis(10)))
        .with_time_source(clock.clone())
        .with_partial_results_on_timeout(true);
    let query = names_then_ages();
    let engine = StreamEngine::new(&store, options);

    let mut stream = engine.evaluate(&query, None);
    let mut pulled = Vec::new();
    for _ in 0..2 {
        match stream.next().await {
            Some(Ok(row)) => pulled.push(row),
            other => panic!("expected a row, got {other:?}"),
        }
    }
    clock.advance(11);
    assert!(stream.next().await.is_none());
    assert_eq!(pulled.len(), 2);
}

#[tokio::test]
async fn test_streaming_timeout_error_is_reported_once() {
    init_tracing();
    let store = people_store();
    let clock = SimulatedTimeSource::shared(0);
    let options = QueryOptions::default()
        .with_timeout(Some(Duration::from_millis(10)))
        .with_time_source(clock.clone());
    let query = names_then_ages();
    let engine = StreamEngine::new(&store, options);

    let mut stream = engine.evaluate(&query, None);
    clock.advance(50);
    assert!(matches!(
        stream.next().await,
        Some(Err(EvaluationError::Timeout { elapsed_ms: 50, limit_ms: 10 }))
    ));
    assert!(stream.next().await.is_none());
}

// Partial results are best effort: the eager evaluator aggregates whatever
// its interrupted BGP gathered, while every streaming producer stops at its
// next deadline check, so an aggregate may see fewer rows or emit nothing.
#[tokio::test]
async fn test_partial_aggregates_differ_between_evaluators() {
    init_tracing();
    let store = people_store();
    let query = Algebra::group_by(
        names_then_ages(),
        None,
        vec![BuiltinAggregate::count_all("n").shared()],
    );

    let clock = SimulatedTimeSource::shared(0);
    let options = QueryOptions::default()
        .with_timeout(Some(Duration::from_millis(10)))
        .with_time_source(clock.clone())
        .with_partial_results_on_timeout(true);
    let engine = StreamEngine::new(&store, options.clone());
    let mut stream = engine.evaluate(&query, None);
    clock.advance(11);
    assert!(stream.next().await.is_none());

    clock.set(0);
    clock.set_auto_advance(6);
    let eager = QueryEngine::new(&store, options)
        .evaluate(&query)
        .expect("partial results should be returned");
    assert_eq!(eager.solutions()[0].get("n"), Some(&Term::integer(5)));
}
