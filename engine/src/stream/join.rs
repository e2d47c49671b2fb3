//! The join drive loop and its strategies.
//!
//! [`drive`] races the two child producers: whichever side yields first is
//! handed to the strategy's `process_lhs`/`process_rhs` hook, which combines it
//! with everything seen so far from the other side. When a side is exhausted
//! the matching `on_*_done` hook may emit residual rows. The loop ends when
//! both sides are exhausted or the strategy reports it cannot produce more.
//!
//! Output order depends on which side wins each race and is not
//! deterministic; the multiset of outputs is.

use std::collections::{HashMap, VecDeque};

use futures::StreamExt;
use futures::stream;
use tracing::trace;

use super::{CancellationSignal, SolutionStream};
use crate::query::engine::filter_accepts;
use crate::query::multiset::excluded_by;
use crate::query::{EvaluationError, Expr, ExpressionContext, Solution};
use crate::storage::ActiveGraph;
use crate::types::Term;

/// Operator-specific behavior of a streaming binary operator.
pub trait JoinStrategy: Send {
    fn process_lhs(&mut self, solution: Solution, out: &mut VecDeque<Solution>);

    fn process_rhs(&mut self, solution: Solution, out: &mut VecDeque<Solution>);

    fn on_lhs_done(&mut self, out: &mut VecDeque<Solution>);

    fn on_rhs_done(&mut self, out: &mut VecDeque<Solution>);

    /// `true` once no further input can change the output.
    fn is_finished(&self) -> bool;
}

/// Rows seen from one side, hashed by the join variables.
///
/// A row leaving any join variable unbound is compatible with many keys and
/// is kept in `partial` instead.
#[derive(Debug, Default)]
struct SideTable {
    join_variables: Vec<String>,
    rows: Vec<Solution>,
    keyed: HashMap<Vec<Term>, Vec<usize>>,
    partial: Vec<usize>,
}

impl SideTable {
    fn new(join_variables: Vec<String>) -> Self {
        Self {
            join_variables,
            ..Self::default()
        }
    }

    fn key(&self, solution: &Solution) -> Option<Vec<Term>> {
        self.join_variables
            .iter()
            .map(|name| solution.get(name).cloned())
            .collect()
    }

    fn insert(&mut self, solution: Solution) -> usize {
        let position = self.rows.len();
        match self.key(&solution) {
            Some(key) => self.keyed.entry(key).or_default().push(position),
            None => self.partial.push(position),
        }
        self.rows.push(solution);
        position
    }

    /// Positions of rows that may be compatible with `probe`.
    fn candidates(&self, probe: &Solution) -> Vec<usize> {
        match self.key(probe) {
            Some(key) => {
                let mut positions = self.keyed.get(&key).cloned().unwrap_or_default();
                positions.extend_from_slice(&self.partial);
                positions
            }
            None => (0..self.rows.len()).collect(),
        }
    }

    /// Rows compatible with `probe`, joined with it.
    fn joined_with(&self, probe: &Solution) -> Vec<(usize, Solution)> {
        self.candidates(probe)
            .into_iter()
            .filter_map(|position| {
                self.rows
                    .get(position)
                    .and_then(|row| row.join(probe))
                    .map(|joined| (position, joined))
            })
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn take_rows(&mut self) -> Vec<Solution> {
        self.keyed.clear();
        self.partial.clear();
        std::mem::take(&mut self.rows)
    }
}

/// Variables declared by both children.
#[must_use]
pub fn shared_variables(left: &[String], right: &[String]) -> Vec<String> {
    left.iter().filter(|name| right.contains(name)).cloned().collect()
}

/// Symmetric hash join.
#[derive(Debug)]
pub struct InnerJoin {
    lhs: SideTable,
    rhs: SideTable,
    lhs_done: bool,
    rhs_done: bool,
}

impl InnerJoin {
    #[must_use]
    pub fn new(join_variables: Vec<String>) -> Self {
        Self {
            lhs: SideTable::new(join_variables.clone()),
            rhs: SideTable::new(join_variables),
            lhs_done: false,
            rhs_done: false,
        }
    }
}

impl JoinStrategy for InnerJoin {
    fn process_lhs(&mut self, solution: Solution, out: &mut VecDeque<Solution>) {
        out.extend(self.rhs.joined_with(&solution).into_iter().map(|(_, row)| row));
        if !self.rhs_done {
            self.lhs.insert(solution);
        }
    }

    fn process_rhs(&mut self, solution: Solution, out: &mut VecDeque<Solution>) {
        out.extend(self.lhs.joined_with(&solution).into_iter().map(|(_, row)| row));
        if !self.lhs_done {
            self.rhs.insert(solution);
        }
    }

    fn on_lhs_done(&mut self, _out: &mut VecDeque<Solution>) {
        self.lhs_done = true;
        self.rhs.take_rows();
    }

    fn on_rhs_done(&mut self, _out: &mut VecDeque<Solution>) {
        self.rhs_done = true;
        self.lhs.take_rows();
    }

    fn is_finished(&self) -> bool {
        (self.lhs_done && self.rhs_done)
            || (self.lhs_done && self.lhs.is_empty())
            || (self.rhs_done && self.rhs.is_empty())
    }
}

/// Optional join. Unmatched left rows are emitted once the right side is
/// exhausted, or immediately for left rows arriving after that.
#[derive(Debug)]
pub struct LeftJoin<'a> {
    lhs: SideTable,
    matched: Vec<bool>,
    rhs: SideTable,
    filter: Option<&'a Expr>,
    graph: ActiveGraph,
    lhs_done: bool,
    rhs_done: bool,
}

impl<'a> LeftJoin<'a> {
    #[must_use]
    pub fn new(join_variables: Vec<String>, filter: Option<&'a Expr>, graph: ActiveGraph) -> Self {
        Self {
            lhs: SideTable::new(join_variables.clone()),
            matched: Vec::new(),
            rhs: SideTable::new(join_variables),
            filter,
            graph,
            lhs_done: false,
            rhs_done: false,
        }
    }

    fn accepts(&self, joined: &Solution) -> bool {
        let context = ExpressionContext::new(&self.graph);
        self.filter
            .is_none_or(|filter| filter_accepts(filter, joined, &context, true).unwrap_or(false))
    }
}

impl JoinStrategy for LeftJoin<'_> {
    fn process_lhs(&mut self, solution: Solution, out: &mut VecDeque<Solution>) {
        let mut hit = false;
        for (_, joined) in self.rhs.joined_with(&solution) {
            if self.accepts(&joined) {
                out.push_back(joined);
                hit = true;
            }
        }
        if self.rhs_done {
            if !hit {
                out.push_back(solution);
            }
        } else {
            self.lhs.insert(solution);
            self.matched.push(hit);
        }
    }

    fn process_rhs(&mut self, solution: Solution, out: &mut VecDeque<Solution>) {
        for (position, joined) in self.lhs.joined_with(&solution) {
            if self.accepts(&joined) {
                out.push_back(joined);
                if let Some(flag) = self.matched.get_mut(position) {
                    *flag = true;
                }
            }
        }
        if !self.lhs_done {
            self.rhs.insert(solution);
        }
    }

    fn on_lhs_done(&mut self, _out: &mut VecDeque<Solution>) {
        self.lhs_done = true;
        self.rhs.take_rows();
    }

    fn on_rhs_done(&mut self, out: &mut VecDeque<Solution>) {
        self.rhs_done = true;
        self.rhs.take_rows();
        let matched = std::mem::take(&mut self.matched);
        for (row, hit) in self.lhs.take_rows().into_iter().zip(matched) {
            if !hit {
                out.push_back(row);
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.lhs_done && (self.rhs_done || self.lhs.is_empty())
    }
}

/// MINUS. Left rows wait until the right side is complete.
#[derive(Debug, Default)]
pub struct Minus {
    lhs: Vec<Solution>,
    rhs: Vec<Solution>,
    lhs_done: bool,
    rhs_done: bool,
}

impl Minus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl JoinStrategy for Minus {
    fn process_lhs(&mut self, solution: Solution, out: &mut VecDeque<Solution>) {
        if self.rhs_done {
            if !excluded_by(&solution, &self.rhs) {
                out.push_back(solution);
            }
        } else {
            self.lhs.push(solution);
        }
    }

    fn process_rhs(&mut self, solution: Solution, _out: &mut VecDeque<Solution>) {
        self.rhs.push(solution);
    }

    fn on_lhs_done(&mut self, _out: &mut VecDeque<Solution>) {
        self.lhs_done = true;
    }

    fn on_rhs_done(&mut self, out: &mut VecDeque<Solution>) {
        self.rhs_done = true;
        for row in std::mem::take(&mut self.lhs) {
            if !excluded_by(&row, &self.rhs) {
                out.push_back(row);
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.lhs_done && (self.rhs_done || self.lhs.is_empty())
    }
}

enum Event {
    Lhs(Option<Result<Solution, EvaluationError>>),
    Rhs(Option<Result<Solution, EvaluationError>>),
    Cancelled,
    Exhausted,
}

struct Drive<'a, S> {
    lhs: Option<SolutionStream<'a>>,
    rhs: Option<SolutionStream<'a>>,
    strategy: S,
    pending: VecDeque<Solution>,
    cancel: CancellationSignal,
    done: bool,
}

impl<S: JoinStrategy> Drive<'_, S> {
    async fn next_event(&mut self) -> Event {
        let cancel = &self.cancel;
        match (self.lhs.as_mut(), self.rhs.as_mut()) {
            (Some(lhs), Some(rhs)) => tokio::select! {
                () = cancel.cancelled() => Event::Cancelled,
                item = lhs.next() => Event::Lhs(item),
                item = rhs.next() => Event::Rhs(item),
            },
            (Some(lhs), None) => tokio::select! {
                () = cancel.cancelled() => Event::Cancelled,
                item = lhs.next() => Event::Lhs(item),
            },
            (None, Some(rhs)) => tokio::select! {
                () = cancel.cancelled() => Event::Cancelled,
                item = rhs.next() => Event::Rhs(item),
            },
            (None, None) => Event::Exhausted,
        }
    }

    fn fail(mut self, error: EvaluationError) -> Option<(Result<Solution, EvaluationError>, Self)> {
        self.done = true;
        self.pending.clear();
        self.lhs = None;
        self.rhs = None;
        Some((Err(error), self))
    }
}

/// Run `strategy` over two producers.
pub fn drive<'a, S>(
    lhs: SolutionStream<'a>,
    rhs: SolutionStream<'a>,
    strategy: S,
    cancel: CancellationSignal,
) -> SolutionStream<'a>
where
    S: JoinStrategy + 'a,
{
    let state = Drive {
        lhs: Some(lhs),
        rhs: Some(rhs),
        strategy,
        pending: VecDeque::new(),
        cancel,
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(solution) = state.pending.pop_front() {
                return Some((Ok(solution), state));
            }
            if state.done {
                return None;
            }
            if state.cancel.is_cancelled() {
                return state.fail(EvaluationError::Cancelled);
            }
            if state.strategy.is_finished() {
                state.done = true;
                continue;
            }
            match state.next_event().await {
                Event::Lhs(Some(Ok(solution))) => {
                    state.strategy.process_lhs(solution, &mut state.pending);
                    trace!(side = "lhs", pending = state.pending.len(), "join step");
                }
                Event::Rhs(Some(Ok(solution))) => {
                    state.strategy.process_rhs(solution, &mut state.pending);
                    trace!(side = "rhs", pending = state.pending.len(), "join step");
                }
                Event::Lhs(Some(Err(error))) | Event::Rhs(Some(Err(error))) => {
                    return state.fail(error);
                }
                Event::Lhs(None) => {
                    state.lhs = None;
                    state.strategy.on_lhs_done(&mut state.pending);
                }
                Event::Rhs(None) => {
                    state.rhs = None;
                    state.strategy.on_rhs_done(&mut state.pending);
                }
                Event::Cancelled => return state.fail(EvaluationError::Cancelled),
                Event::Exhausted => state.done = true,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;

    fn rows(pairs: &[&[(&str, &str)]]) -> Vec<Solution> {
        pairs
            .iter()
            .map(|row| Solution::from_pairs(row.iter().map(|(k, v)| (*k, Term::iri(*v)))))
            .collect()
    }

    fn source<'a>(solutions: Vec<Solution>) -> SolutionStream<'a> {
        stream::iter(solutions.into_iter().map(Ok)).boxed()
    }

    async fn run<'a, S: JoinStrategy + 'a>(lhs: Vec<Solution>, rhs: Vec<Solution>, strategy: S) -> Vec<Solution> {
        let mut out: Vec<Solution> = drive(source(lhs), source(rhs), strategy, CancellationSignal::new())
            .try_collect()
            .await
            .expect("join should succeed");
        out.sort();
        out
    }

    #[tokio::test]
    async fn test_inner_join_matches_on_shared_variable() {
        let lhs = rows(&[&[("x", "a"), ("y", "b")], &[("x", "b"), ("y", "c")]]);
        let rhs = rows(&[&[("y", "c"), ("z", "d")]]);
        let out = run(lhs, rhs, InnerJoin::new(vec!["y".to_string()])).await;
        assert_eq!(out, rows(&[&[("x", "b"), ("y", "c"), ("z", "d")]]));
    }

    #[tokio::test]
    async fn test_inner_join_with_unbound_join_variable() {
        let lhs = rows(&[&[("x", "a")]]);
        let rhs = rows(&[&[("x", "a"), ("z", "1")], &[("z", "2")]]);
        let out = run(lhs, rhs, InnerJoin::new(vec!["x".to_string()])).await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_inner_join_empty_side() {
        let lhs = rows(&[&[("x", "a")]]);
        let out = run(lhs, Vec::new(), InnerJoin::new(vec!["x".to_string()])).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_left_join_emits_unmatched_once() {
        let lhs = rows(&[&[("x", "a")], &[("x", "b")]]);
        let rhs = rows(&[&[("x", "a"), ("y", "1")], &[("x", "a"), ("y", "2")]]);
        let out = run(lhs, rhs, LeftJoin::new(vec!["x".to_string()], None, ActiveGraph::Default)).await;
        assert_eq!(
            out,
            rows(&[&[("x", "a"), ("y", "1")], &[("x", "a"), ("y", "2")], &[("x", "b")]])
        );
    }

    #[tokio::test]
    async fn test_left_join_filter_sends_rejected_to_unmatched() {
        let filter = Expr::equal(Expr::var("y"), Expr::constant(Term::iri("2")));
        let lhs = rows(&[&[("x", "a")]]);
        let rhs = rows(&[&[("x", "a"), ("y", "1")]]);
        let out = run(
            lhs,
            rhs,
            LeftJoin::new(vec!["x".to_string()], Some(&filter), ActiveGraph::Default),
        )
        .await;
        assert_eq!(out, rows(&[&[("x", "a")]]));
    }

    #[tokio::test]
    async fn test_minus() {
        let lhs = rows(&[&[("x", "a")], &[("x", "b")], &[("y", "c")]]);
        let rhs = rows(&[&[("x", "a")]]);
        let out = run(lhs, rhs, Minus::new()).await;
        assert_eq!(out, rows(&[&[("x", "b")], &[("y", "c")]]));
    }

    #[tokio::test]
    async fn test_error_ends_the_join() {
        let lhs = stream::iter(vec![Err(EvaluationError::Malformed("bad".to_string()))]).boxed();
        let rhs = source(rows(&[&[("x", "a")]]));
        let result: Result<Vec<Solution>, _> =
            drive(lhs, rhs, InnerJoin::new(Vec::new()), CancellationSignal::new())
                .try_collect()
                .await;
        assert!(matches!(result, Err(EvaluationError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_cancelled_join_yields_cancelled() {
        let cancel = CancellationSignal::new();
        cancel.cancel();
        let lhs = source(rows(&[&[("x", "a")]]));
        let rhs = source(rows(&[&[("x", "a")]]));
        let result: Result<Vec<Solution>, _> =
            drive(lhs, rhs, InnerJoin::new(vec!["x".to_string()]), cancel).try_collect().await;
        assert!(matches!(result, Err(EvaluationError::Cancelled)));
    }
}
