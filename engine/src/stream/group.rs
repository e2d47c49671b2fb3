//! Incremental grouping for the streaming evaluator.
//!
//! Aggregates accept each solution as it arrives; groups are finalized only
//! once the child producer is exhausted.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use super::SolutionStream;
use crate::query::{AggregateFactory, ExpressionContext, Grouper, GroupingClause};
use crate::storage::ActiveGraph;

/// Group `input` and emit one solution per group.
pub fn group<'a>(
    mut input: SolutionStream<'a>,
    clause: Option<&'a GroupingClause>,
    aggregates: &'a [Arc<dyn AggregateFactory>],
    graph: ActiveGraph,
) -> SolutionStream<'a> {
    stream::once(async move {
        let context = ExpressionContext::new(&graph);
        let mut grouper = Grouper::new(clause, aggregates);
        while let Some(solution) = input.next().await {
            grouper.accept(&solution?, &context);
        }
        debug!(groups = grouper.group_count(), "streamed grouping finished");
        grouper.finish()
    })
    .map_ok(|rows| stream::iter(rows.into_iter().map(Ok)))
    .try_flatten()
    .boxed()
}
