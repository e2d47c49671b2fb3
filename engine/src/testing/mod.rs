//! Shared fixtures for unit and end-to-end tests.

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::storage::TripleStore;
use crate::types::{Quad, Term};

static TRACING: Once = Once::new();

/// Install a test-writer `fmt` subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `engine=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("engine=debug"));
        // Another harness may already own the global subscriber.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

/// `http://example.org/{name}`.
#[must_use]
pub fn ex(name: &str) -> Term {
    Term::iri(format!("http://example.org/{name}"))
}

/// `a knows b`, `b knows c`.
#[must_use]
pub fn knows_store() -> TripleStore {
    [
        Quad::new(ex("a"), ex("knows"), ex("b")),
        Quad::new(ex("b"), ex("knows"), ex("c")),
    ]
    .into_iter()
    .collect()
}

/// Five people with names and ages; `carol` and `erin` have no age.
#[must_use]
pub fn people_store() -> TripleStore {
    let people = [
        ("alice", "Alice", Some(30)),
        ("bob", "Bob", Some(25)),
        ("carol", "Carol", None),
        ("dave", "Dave", Some(41)),
        ("erin", "Erin", None),
    ];
    let mut store = TripleStore::new();
    for (id, name, age) in people {
        store.insert(Quad::new(ex(id), ex("name"), Term::literal(name)));
        if let Some(age) = age {
            store.insert(Quad::new(ex(id), ex("age"), Term::integer(age)));
        }
    }
    store
}

/// `s p o` facts spread over the default graph and two named graphs.
#[must_use]
pub fn graph_store() -> TripleStore {
    [
        Quad::new(ex("s0"), ex("p"), ex("o0")),
        Quad::in_graph(ex("s1"), ex("p"), ex("o1"), ex("g1")),
        Quad::in_graph(ex("s2"), ex("p"), ex("o2"), ex("g2")),
        Quad::in_graph(ex("s3"), ex("p"), ex("o3"), ex("g2")),
    ]
    .into_iter()
    .collect()
}
