//! Error types for the bookstore simulation.
//!
//! Only setup defects and harness I/O are errors. A purchase rejected for lack
//! of stock is a normal outcome and never shows up here.

use crate::types::{BookId, CustomerId, InventoryId};
use thiserror::Error;

/// Errors that abort a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// A request or seed record names a book the store does not know
    #[error("Unknown book: {0}")]
    UnknownBook(BookId),

    /// A known book has no inventory holding it
    #[error("Book {0} is not stored in any inventory")]
    UnstockedBook(BookId),

    /// A second inventory tried to store an already-stocked book
    #[error("Book {book} is already stored in {existing}")]
    DuplicateStock { book: BookId, existing: InventoryId },

    /// Two books were assigned the same inventory key
    #[error("Inventory {inventory} already stores {existing}, cannot also store {book}")]
    DuplicateInventory {
        inventory: InventoryId,
        existing: BookId,
        book: BookId,
    },

    /// Customer id could not be resolved to a seeded customer
    #[error("Unknown customer: {0}")]
    UnknownCustomer(CustomerId),

    /// Configuration failed validation
    #[error("Invalid config `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Export or config file I/O failed
    #[error("Export error: {0}")]
    Export(String),
}

impl SimError {
    /// Creates a config validation error.
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    /// Creates an export error.
    pub fn export(msg: impl std::fmt::Display) -> Self {
        Self::Export(msg.to_string())
    }
}

pub type SimResult<T> = Result<T, SimError>;
