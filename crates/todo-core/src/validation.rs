//! # Validation Module
//!
//! Checks run on an [`Item`] before it is written to the document database.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web front-end                                                │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: ItemRepository (Rust)                                        │
//! │  └── THIS MODULE: id rules (the id is part of the document link)       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Document database                                            │
//! │  └── Unique id per collection, request size limits                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::Item;
use crate::MAX_ID_LENGTH;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Characters the store reserves in resource ids (they break link routing).
const RESERVED_ID_CHARS: [char; 4] = ['/', '\\', '?', '#'];

/// Validates a document id.
///
/// ## Rules
/// - Must not be empty
/// - At most 255 characters
/// - Must not contain `/`, `\`, `?` or `#`
///
/// ## Example
/// ```rust
/// use todo_core::validation::validate_item_id;
///
/// assert!(validate_item_id("task-1").is_ok());
/// assert!(validate_item_id("a/b").is_err());
/// ```
pub fn validate_item_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    if id.chars().count() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: "id".to_string(),
            max: MAX_ID_LENGTH,
        });
    }

    if id.contains(RESERVED_ID_CHARS) {
        return Err(ValidationError::InvalidFormat {
            field: "id".to_string(),
            reason: "must not contain '/', '\\', '?' or '#'".to_string(),
        });
    }

    Ok(())
}

/// Validates a whole item.
///
/// Only the id is constrained, since it becomes part of the document link.
/// Any description is accepted, including an empty one.
pub fn validate_item(item: &Item) -> ValidationResult<()> {
    validate_item_id(&item.id)
}
