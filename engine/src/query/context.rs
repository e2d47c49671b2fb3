//! Evaluation state shared by the operators of one query.

use std::time::Duration;

use super::error::EvaluationError;
use super::expression::ExpressionContext;
use super::options::QueryOptions;
use crate::storage::time::SharedTimeSource;
use crate::storage::{ActiveGraph, FactPool};

/// A query deadline checked cooperatively.
#[derive(Debug, Clone)]
pub struct Deadline {
    time: SharedTimeSource,
    started_ms: u64,
    limit_ms: Option<u64>,
}

impl Deadline {
    /// Start the clock now.
    #[must_use]
    pub fn start(time: SharedTimeSource, timeout: Option<Duration>) -> Self {
        let started_ms = time.now_ms();
        Self {
            time,
            started_ms,
            limit_ms: timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.time.now_ms().saturating_sub(self.started_ms)
    }

    /// Time left, or `None` when there is no limit.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.limit_ms
            .map(|limit| Duration::from_millis(limit.saturating_sub(self.elapsed_ms())))
    }

    /// Fails with [`EvaluationError::Timeout`] once the limit is exceeded.
    pub fn check(&self) -> Result<(), EvaluationError> {
        match self.limit_ms {
            Some(limit_ms) => {
                let elapsed_ms = self.elapsed_ms();
                if elapsed_ms > limit_ms {
                    Err(EvaluationError::Timeout {
                        elapsed_ms,
                        limit_ms,
                    })
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }
}

/// Per-query state threaded through the eager evaluator.
pub struct EvaluationContext<'a> {
    pool: &'a dyn FactPool,
    options: &'a QueryOptions,
    deadline: Deadline,
    active_graph: ActiveGraph,
}

impl<'a> EvaluationContext<'a> {
    #[must_use]
    pub fn new(pool: &'a dyn FactPool, options: &'a QueryOptions) -> Self {
        Self {
            pool,
            options,
            deadline: Deadline::start(options.time_source.clone(), options.timeout),
            active_graph: options.active_graph.clone(),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &'a dyn FactPool {
        self.pool
    }

    #[must_use]
    pub const fn options(&self) -> &'a QueryOptions {
        self.options
    }

    #[must_use]
    pub const fn active_graph(&self) -> &ActiveGraph {
        &self.active_graph
    }

    /// Switch the active graph, returning the previous one.
    pub fn replace_active_graph(&mut self, graph: ActiveGraph) -> ActiveGraph {
        std::mem::replace(&mut self.active_graph, graph)
    }

    #[must_use]
    pub const fn expression_context(&self) -> ExpressionContext<'_> {
        ExpressionContext::new(&self.active_graph)
    }

    #[must_use]
    pub const fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    pub fn check_timeout(&self) -> Result<(), EvaluationError> {
        self.deadline.check()
    }
}
