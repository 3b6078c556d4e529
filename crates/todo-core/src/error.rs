//! # Error Types
//!
//! Domain-specific error types for todo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  todo-core errors (this file)                                          │
//! │  └── ValidationError  - Item rejected before any network call          │
//! │                                                                         │
//! │  todo-docdb errors (separate crate)                                    │
//! │  └── DocDbError       - Configuration, connection, store, conflict     │
//! │                                                                         │
//! │  Flow: ValidationError → DocDbError::Validation → caller               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by [`crate::validation`] before an item is written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., reserved characters in an id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}
