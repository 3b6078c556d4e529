//! # Document Database Error Types
//!
//! Error types for the to-do repository facade.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Settings lookup ──────────────► Configuration { key }                 │
//! │  Endpoint parse / client build ► Connection(..)                        │
//! │  REST response (non-2xx) ──────► Store { status, code, message }       │
//! │       │                                                                 │
//! │       └── 412 on If-Match replace ─► Conflict { id }                   │
//! │  Lookup before update/delete ──► NotFound { entity, id }               │
//! │                                                                         │
//! │  Callers treat Conflict as recoverable (re-read and retry);            │
//! │  everything else fails the operation.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use todo_core::ValidationError;

/// HTTP status the store returns when a resource does not exist.
pub const STATUS_NOT_FOUND: u16 = 404;

/// HTTP status the store returns when a resource id is already taken.
pub const STATUS_CONFLICT: u16 = 409;

/// HTTP status the store returns when an If-Match precondition fails.
pub const STATUS_PRECONDITION_FAILED: u16 = 412;

/// Errors raised by the repository facade.
#[derive(Debug, Error)]
pub enum DocDbError {
    /// A required setting is missing or empty.
    ///
    /// ## When This Occurs
    /// - `database` / `collection` not configured
    /// - `endpoint` / `authKey` not configured
    #[error("Missing required setting: {key}")]
    Configuration { key: String },

    /// The settings file could not be read or parsed.
    #[error("Failed to load settings: {0}")]
    SettingsLoad(String),

    /// The client could not be built.
    ///
    /// ## When This Occurs
    /// - Endpoint is not a valid absolute URI
    /// - Auth key is not valid base64
    /// - HTTP client construction failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The remote store rejected or failed a request.
    ///
    /// `status` is `None` when the request never got a response
    /// (DNS, TLS, socket errors).
    #[error("Store request failed ({}): {message}", describe_status(.status))]
    Store {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    /// The configured collection exists but is partitioned on a path other
    /// than `/id`, so documents cannot be addressed by their id.
    #[error("Collection {id} is partitioned on {partition_key}, expected /id")]
    IncompatibleCollection { id: String, partition_key: String },

    /// The requested document does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// An If-Match precondition failed: the item changed since its etag was read.
    #[error("Updating entity with {id} resulted in a conflict")]
    Conflict { id: String },

    /// The item was rejected before any network call.
    #[error("Invalid item: {0}")]
    Validation(#[from] ValidationError),

    /// A document body could not be serialized or read back.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl DocDbError {
    /// Creates a Configuration error for a setting key.
    pub fn missing_setting(key: impl Into<String>) -> Self {
        DocDbError::Configuration { key: key.into() }
    }

    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DocDbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Store error carrying the response status.
    pub fn store(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        DocDbError::Store {
            status: Some(status),
            code,
            message: message.into(),
        }
    }

    /// Returns the HTTP status reported by the store, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            DocDbError::Store { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns true if the store reported a failed If-Match precondition.
    pub fn is_precondition_failed(&self) -> bool {
        self.status() == Some(STATUS_PRECONDITION_FAILED)
    }

    /// Returns true if the store reported that the resource id is taken.
    pub fn is_already_exists(&self) -> bool {
        self.status() == Some(STATUS_CONFLICT)
    }

    /// Returns true if the store reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocDbError::NotFound { .. }) || self.status() == Some(STATUS_NOT_FOUND)
    }

    /// Returns true if the caller can recover by re-reading the item and retrying.
    ///
    /// ## Recoverable
    /// - Conflict (someone else updated the item first)
    ///
    /// ## Fatal to the operation
    /// - Everything else
    pub fn is_conflict(&self) -> bool {
        matches!(self, DocDbError::Conflict { .. })
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            DocDbError::Configuration { .. }
                | DocDbError::SettingsLoad(_)
                | DocDbError::Connection(_)
                | DocDbError::IncompatibleCollection { .. }
        )
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

/// Transport failures carry no status; HTTP status failures keep theirs.
impl From<reqwest::Error> for DocDbError {
    fn from(err: reqwest::Error) -> Self {
        DocDbError::Store {
            status: err.status().map(|s| s.as_u16()),
            code: None,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DocDbError {
    fn from(err: serde_json::Error) -> Self {
        DocDbError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for DocDbError {
    fn from(err: url::ParseError) -> Self {
        DocDbError::Connection(format!("Invalid endpoint: {}", err))
    }
}

impl From<base64::DecodeError> for DocDbError {
    fn from(err: base64::DecodeError) -> Self {
        DocDbError::Connection(format!("Invalid auth key: {}", err))
    }
}

impl From<std::io::Error> for DocDbError {
    fn from(err: std::io::Error) -> Self {
        DocDbError::SettingsLoad(err.to_string())
    }
}

impl From<toml::de::Error> for DocDbError {
    fn from(err: toml::de::Error) -> Self {
        DocDbError::SettingsLoad(err.to_string())
    }
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "no response".to_string(),
    }
}

/// Result type for repository operations.
pub type DocDbResult<T> = Result<T, DocDbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helpers() {
        let err = DocDbError::store(412, Some("PreconditionFailed".into()), "etag mismatch");
        assert!(err.is_precondition_failed());
        assert!(!err.is_already_exists());
        assert!(!err.is_conflict());

        assert!(DocDbError::store(409, None, "exists").is_already_exists());
        assert!(DocDbError::store(404, None, "gone").is_not_found());
        assert!(DocDbError::not_found("Item", "1").is_not_found());
        assert_eq!(DocDbError::Conflict { id: "1".into() }.status(), None);
    }

    #[test]
    fn test_error_display() {
        let err = DocDbError::Conflict { id: "abc-123".into() };
        assert!(err.to_string().contains("abc-123"));

        let err = DocDbError::store(503, None, "busy");
        assert_eq!(err.to_string(), "Store request failed (503): busy");

        let err = DocDbError::Store {
            status: None,
            code: None,
            message: "dns".into(),
        };
        assert_eq!(err.to_string(), "Store request failed (no response): dns");

        assert_eq!(
            DocDbError::missing_setting("database").to_string(),
            "Missing required setting: database"
        );
    }

    #[test]
    fn test_categories() {
        assert!(DocDbError::missing_setting("endpoint").is_config_error());
        assert!(DocDbError::Connection("bad".into()).is_config_error());
        assert!(DocDbError::IncompatibleCollection {
            id: "Items".into(),
            partition_key: "/category".into(),
        }
        .is_config_error());
        assert!(DocDbError::Conflict { id: "1".into() }.is_conflict());
        assert!(!DocDbError::store(500, None, "x").is_conflict());
    }

    #[test]
    fn test_validation_converts() {
        let err: DocDbError = ValidationError::Required {
            field: "id".into(),
        }
        .into();
        assert!(matches!(err, DocDbError::Validation(_)));
    }
}
