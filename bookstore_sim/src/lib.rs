//! Bookstore scenario harness
//!
//! Runs named scenarios on top of `bookstore_core` and judges each finished
//! run twice: once with scenario-specific expectations and once with the
//! [`Oracle`], which replays the event log against every snapshot.
//!
//! # Architecture
//!
//! ```text
//!  ScenarioRunner ──builds──► BookstoreModel ──run──► events + snapshots
//!        │                                                  │
//!        │                    ┌─────────────────────────────┤
//!        ▼                    ▼                             ▼
//!  ScenarioResult ◄──── Oracle::audit                  SimExport (JSON)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use bookstore_sim::{ScenarioId, ScenarioRunner};
//!
//! let runner = ScenarioRunner::new(42).with_steps(40);
//! for scenario in ScenarioId::all() {
//!     let result = runner.run(scenario);
//!     assert!(result.passed, "{:?}", result.failure_reason);
//! }
//! ```

pub mod exporter;
pub mod oracle;
pub mod runner;
pub mod scenarios;

pub use exporter::SimExport;
pub use oracle::{Oracle, Violation};
pub use runner::{ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
