//! Bookstore Environment Layer
//!
//! Shared vocabulary for the bookstore simulation crates:
//! - **Identifiers**: ordered, string-keyed entity ids (plus UUID order ids)
//! - **Errors**: the setup-defect taxonomy every crate reports through
//! - **Randomness**: a seeded ChaCha context threaded explicitly through agents
//!
//! Every source of non-determinism in a run is derived from the single seed
//! held by [`SimContext`], so any surprising run is reproducible from its seed.
//!
//! # Example
//!
//! ```ignore
//! use bookstore_env::{SimContext, BookId};
//!
//! let mut ctx = SimContext::new(42);
//! let book = BookId::new("Book_HP1");
//! let pick = ctx.gen_range(0..3);
//! ```

mod context;
mod error;
mod types;

pub use context::SimContext;
pub use error::{SimError, SimResult};
pub use types::{BookId, CustomerId, EmployeeId, InventoryId, OrderId};
