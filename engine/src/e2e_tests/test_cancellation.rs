//! Cancelling a streaming query.

use futures::StreamExt;
use futures::stream::{self, BoxStream};

use crate::e2e_tests::helpers::{knows, pattern};
use crate::query::{Algebra, EvaluationError, QueryOptions, Solution};
use crate::stream::join::{InnerJoin, drive};
use crate::stream::{CancellationSignal, StreamEngine};
use crate::testing::{init_tracing, knows_store, people_store};

#[tokio::test]
async fn test_cancel_before_first_pull() {
    init_tracing();
    let store = knows_store();
    let signal = CancellationSignal::new();
    let engine = StreamEngine::new(&store, QueryOptions::default()).with_cancellation(signal.clone());
    let query = Algebra::triples([knows("x", "y")]);

    signal.cancel();
    let result = StreamEngine::collect(engine.evaluate(&query, None)).await;
    assert!(matches!(result, Err(EvaluationError::Cancelled)));
}

#[tokio::test]
async fn test_cancel_mid_stream_ends_after_error() {
    init_tracing();
    let store = people_store();
    let engine = StreamEngine::new(&store, QueryOptions::default());
    let query = Algebra::join(
        Algebra::triples([pattern("person", "name", "name")]),
        Algebra::triples([pattern("person", "age", "age")]),
    );

    let mut stream = engine.evaluate(&query, None);
    assert!(matches!(stream.next().await, Some(Ok(_))));
    engine.cancellation().cancel();
    assert!(matches!(stream.next().await, Some(Err(EvaluationError::Cancelled))));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_cancel_wakes_a_waiting_join() {
    init_tracing();
    let signal = CancellationSignal::new();
    let lhs: BoxStream<'static, Result<Solution, EvaluationError>> =
        stream::iter(vec![Ok(Solution::new())]).boxed();
    let rhs: BoxStream<'static, Result<Solution, EvaluationError>> = stream::pending().boxed();
    let joined = drive(lhs, rhs, InnerJoin::new(Vec::new()), signal.clone());

    let (result, ()) = tokio::join!(StreamEngine::collect(joined), async {
        tokio::task::yield_now().await;
        signal.cancel();
    });
    assert!(matches!(result, Err(EvaluationError::Cancelled)));
}

#[tokio::test]
async fn test_signals_are_independent() {
    init_tracing();
    let store = knows_store();
    let query = Algebra::triples([knows("x", "y")]);
    let cancelled = StreamEngine::new(&store, QueryOptions::default());
    let running = StreamEngine::new(&store, QueryOptions::default());
    cancelled.cancellation().cancel();

    let rows = StreamEngine::collect(running.evaluate(&query, None))
        .await
        .expect("uncancelled query should succeed");
    assert_eq!(rows.len(), 2);
    assert!(cancelled.cancellation().is_cancelled());
    assert!(!running.cancellation().is_cancelled());
}
