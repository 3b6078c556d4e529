//! # Domain Types
//!
//! The to-do [`Item`] as it is stored in the document database.
//!
//! ## Stored Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Rust field    JSON property   Notes                                    │
//! │  ──────────    ─────────────   ──────────────────────────────────────   │
//! │  id            id              unique, caller or UUID v4                │
//! │  description   description     user text                                │
//! │  completed     isComplete      completion flag                          │
//! │  etag          _etag           version token, read-only, never content  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use uuid::Uuid;

/// JSON property the store uses for a document's entity tag.
pub const ETAG_PROPERTY: &str = "_etag";

// =============================================================================
// Item
// =============================================================================

/// A to-do entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Item {
    /// Unique identifier. Empty means "let the repository assign one".
    #[serde(default)]
    pub id: String,

    /// What needs doing. A stored `null` reads as empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    /// Whether the entry is done. A stored `null` reads as false.
    #[serde(rename = "isComplete", default, deserialize_with = "null_as_default")]
    pub completed: bool,

    /// Entity tag of the document this item was read from.
    ///
    /// Set by the repository on reads and successful writes, and used as the
    /// If-Match value for optimistic-concurrency updates.
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub etag: Option<String>,
}

impl Item {
    /// Creates an incomplete item with a freshly generated id.
    pub fn new(description: impl Into<String>) -> Self {
        Item {
            id: generate_item_id(),
            description: description.into(),
            completed: false,
            etag: None,
        }
    }

    /// Creates an incomplete item with a caller-chosen id.
    pub fn with_id(id: impl Into<String>, description: impl Into<String>) -> Self {
        Item {
            id: id.into(),
            description: description.into(),
            completed: false,
            etag: None,
        }
    }

    /// Returns the item marked as done.
    pub fn mark_complete(mut self) -> Self {
        self.completed = true;
        self
    }

    /// Assigns a generated id if the item has none. Returns the id.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.trim().is_empty() {
            self.id = generate_item_id();
        }
        &self.id
    }

    /// Serializes the item into the JSON object written to the store.
    ///
    /// The entity tag is metadata owned by the store and is left out.
    pub fn to_content(&self) -> Map<String, Value> {
        let mut content = Map::new();
        content.insert("id".to_string(), Value::String(self.id.clone()));
        content.insert(
            "description".to_string(),
            Value::String(self.description.clone()),
        );
        content.insert("isComplete".to_string(), Value::Bool(self.completed));
        content
    }

    /// Returns true if both items carry the same user-visible content.
    ///
    /// Store metadata (the entity tag) is ignored.
    pub fn same_content(&self, other: &Item) -> bool {
        self.id == other.id
            && self.description == other.description
            && self.completed == other.completed
    }
}

/// Reads an explicit JSON `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Generates a new item id.
pub fn generate_item_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_is_incomplete_with_id() {
        let item = Item::new("Write report");
        assert!(!item.id.is_empty());
        assert!(!item.completed);
        assert!(item.etag.is_none());
    }

    #[test]
    fn test_ensure_id_keeps_existing() {
        let mut item = Item::with_id("abc", "x");
        assert_eq!(item.ensure_id(), "abc");

        let mut blank = Item::with_id("  ", "x");
        let id = blank.ensure_id().to_string();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_json_property_names() {
        let mut item = Item::with_id("1", "Buy milk").mark_complete();
        item.etag = Some("\"v1\"".to_string());

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["isComplete"], Value::Bool(true));
        assert_eq!(json["_etag"], Value::String("\"v1\"".to_string()));

        let parsed: Item = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn test_content_excludes_etag() {
        let mut item = Item::with_id("1", "Buy milk");
        item.etag = Some("\"v1\"".to_string());

        let content = item.to_content();
        assert!(!content.contains_key(ETAG_PROPERTY));
        assert_eq!(content["id"], Value::String("1".to_string()));
        assert_eq!(content["isComplete"], Value::Bool(false));
    }

    #[test]
    fn test_missing_fields_default() {
        let item: Item = serde_json::from_str(r#"{"id":"7"}"#).unwrap();
        assert_eq!(item.id, "7");
        assert_eq!(item.description, "");
        assert!(!item.completed);
    }

    #[test]
    fn test_null_fields_read_as_defaults() {
        let item: Item =
            serde_json::from_str(r#"{"id":"2","description":null,"isComplete":null}"#).unwrap();
        assert_eq!(item.id, "2");
        assert_eq!(item.description, "");
        assert!(!item.completed);
    }

    #[test]
    fn test_same_content_ignores_etag() {
        let a = Item::with_id("1", "x");
        let mut b = a.clone();
        b.etag = Some("\"v2\"".to_string());
        assert!(a.same_content(&b));
        assert_ne!(a, b);
    }
}
