//! End-to-end tests at the algebra level.
//!
//! Each test file covers one scenario and, where it makes sense, runs it
//! through both evaluators (eager and streaming, single and batch) against
//! deterministic stores.

#![cfg(test)]

mod helpers;

mod test_cancellation;
mod test_equivalence;
mod test_graphs;
mod test_grouping;
mod test_identity_laws;
mod test_join_laws;
mod test_left_join;
mod test_projection;
mod test_slice;
mod test_text_match;
mod test_timeout;
mod test_two_step_join;
