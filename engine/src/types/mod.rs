//! Core data types shared by storage and query evaluation.
//!
//! - `Term` - an IRI, literal, blank node or variable
//! - `Literal` - lexical form plus datatype or language tag
//! - `Quad` - a stored fact, optionally in a named graph

mod quad;
mod term;

pub use quad::Quad;
pub use term::{Literal, Term, compare_for_ordering, xsd};
