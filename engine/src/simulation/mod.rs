//! Deterministic Simulation Testing (DST) infrastructure.
//!
//! - Controlled time for query deadlines ([`SimulatedTimeSource`])
//! - Reproducible index-tree operation sequences ([`OpGenerator`])
//! - Random fact pools and multisets ([`DataGenerator`])
//! - Invariant checking after each operation ([`InvariantChecker`])
//!
//! Given the same seed, every run is identical.
//!
//! # Usage
//!
//! ```
//! use engine::simulation::{Simulator, SimulatorConfig};
//! use engine::storage::tree::TreeKind;
//!
//! let mut sim = Simulator::new(SimulatorConfig::new(12345, TreeKind::Scapegoat));
//! let result = sim.run(500);
//!
//! assert!(result.invariant_violations.is_empty());
//! ```

mod data_gen;
mod invariants;
mod op_gen;
mod simulator;
mod time;

pub use data_gen::{DataGenConfig, DataGenerator};
pub use invariants::{InvariantChecker, InvariantViolation};
pub use op_gen::{OpGenConfig, OpGenerator, TreeOp};
pub use simulator::{SimulationResult, Simulator, SimulatorConfig};
pub use time::SimulatedTimeSource;
