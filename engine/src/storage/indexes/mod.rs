//! Term indexes over the fact table.
//!
//! Each index maps a term to the sorted ids of the facts that carry it in one
//! position (subject, predicate, object or graph name). The mapping lives in
//! one of the [`crate::storage::tree`] implementations, chosen per store.

mod term_index;

pub use term_index::{FactId, TermIndex};
