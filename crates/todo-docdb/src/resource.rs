//! # Store Resources
//!
//! Types describing what the document database stores and how requests
//! address it.
//!
//! ## Resource Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Account (endpoint)                                                     │
//! │   └── dbs/{database}                    DatabaseResource                │
//! │        └── colls/{collection}           CollectionResource              │
//! │             └── docs/{id}               Document                        │
//! │                                                                         │
//! │  Links are name-based ("dbs/ToDoList/colls/Items/docs/42"), so a        │
//! │  document can be addressed from its id alone.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## System Properties
//! Every resource carries store-assigned metadata:
//! - `_rid`  - internal resource id
//! - `_self` - internal (rid-based) link
//! - `_etag` - entity tag, changes on every write
//! - `_ts`   - last write time (epoch seconds)

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::DocDbResult;
use todo_core::Item;

/// Path every collection created by this crate is partitioned on.
pub const PARTITION_KEY_PATH: &str = "/id";

// =============================================================================
// Links
// =============================================================================

/// Name-based link of a database.
pub fn database_link(database_id: &str) -> String {
    format!("dbs/{}", database_id)
}

/// Name-based link of a collection.
pub fn collection_link(database_id: &str, collection_id: &str) -> String {
    format!("dbs/{}/colls/{}", database_id, collection_id)
}

/// Name-based link of a document.
pub fn document_link(database_id: &str, collection_id: &str, document_id: &str) -> String {
    format!(
        "dbs/{}/colls/{}/docs/{}",
        database_id, collection_id, document_id
    )
}

// =============================================================================
// Database / Collection
// =============================================================================

/// A resolved database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseResource {
    pub id: String,

    #[serde(rename = "_rid", default)]
    pub resource_id: String,

    #[serde(rename = "_self", default)]
    pub self_link: String,

    #[serde(rename = "_etag", default)]
    pub etag: String,
}

/// Partitioning scheme of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKeyDefinition {
    pub paths: Vec<String>,
    pub kind: String,
}

impl Default for PartitionKeyDefinition {
    fn default() -> Self {
        PartitionKeyDefinition {
            paths: vec![PARTITION_KEY_PATH.to_string()],
            kind: "Hash".to_string(),
        }
    }
}

/// A resolved collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionResource {
    pub id: String,

    #[serde(rename = "_rid", default)]
    pub resource_id: String,

    #[serde(rename = "_self", default)]
    pub self_link: String,

    #[serde(rename = "_etag", default)]
    pub etag: String,

    #[serde(rename = "partitionKey", default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<PartitionKeyDefinition>,
}

// =============================================================================
// Document
// =============================================================================

/// A persisted record, as returned by the store.
///
/// `properties` holds everything that is not one of the named system
/// properties, so no user data is lost when a document passes through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,

    #[serde(rename = "_rid", default)]
    pub resource_id: String,

    #[serde(rename = "_self", default)]
    pub self_link: String,

    #[serde(rename = "_etag", default)]
    pub etag: String,

    #[serde(rename = "_ts", default)]
    pub timestamp: i64,

    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Document {
    /// Returns a user property.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Projects the document into an [`Item`].
    ///
    /// The document's etag is carried in [`Item::etag`].
    pub fn to_item(&self) -> DocDbResult<Item> {
        let mut content = self.properties.clone();
        content.insert("id".to_string(), Value::String(self.id.clone()));

        let mut item: Item = serde_json::from_value(Value::Object(content))?;
        item.etag = (!self.etag.is_empty()).then(|| self.etag.clone());
        Ok(item)
    }
}

// =============================================================================
// Queries
// =============================================================================

/// An equality-filter query over resources.
///
/// Rendered to the store's SQL dialect by the REST client and evaluated
/// directly by the in-memory store, so both agree on what matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceQuery {
    filters: Vec<(String, Value)>,
}

/// A parameterized SQL query as sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlQuerySpec {
    pub query: String,
    pub parameters: Vec<SqlParameter>,
}

/// A named query parameter (`@p0`, `@p1`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlParameter {
    pub name: String,
    pub value: Value,
}

impl ResourceQuery {
    /// Matches every resource.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches the resource with the given id.
    pub fn by_id(id: &str) -> Self {
        Self::all().field_eq("id", id)
    }

    /// Adds an equality filter on a top-level property.
    pub fn field_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    /// Returns true if `resource` satisfies every filter.
    ///
    /// A missing property never matches.
    pub fn matches(&self, resource: &Map<String, Value>) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| resource.get(field) == Some(expected))
    }

    /// Renders the query as parameterized SQL.
    ///
    /// ## Example
    /// ```rust
    /// use todo_docdb::ResourceQuery;
    ///
    /// let spec = ResourceQuery::by_id("42").to_sql();
    /// assert_eq!(spec.query, r#"SELECT * FROM root r WHERE r["id"] = @p0"#);
    /// ```
    pub fn to_sql(&self) -> SqlQuerySpec {
        let mut query = String::from("SELECT * FROM root r");
        let mut parameters = Vec::with_capacity(self.filters.len());

        for (index, (field, value)) in self.filters.iter().enumerate() {
            let name = format!("@p{}", index);
            query.push_str(if index == 0 { " WHERE " } else { " AND " });
            query.push_str(&format!("r[{}] = {}", json!(field), name));
            parameters.push(SqlParameter {
                name,
                value: value.clone(),
            });
        }

        SqlQuerySpec { query, parameters }
    }
}

// =============================================================================
// Preconditions
// =============================================================================

/// An If-Match precondition: the write succeeds only while the store's
/// current etag equals `etag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCondition {
    pub etag: String,
}

impl AccessCondition {
    /// Precondition requiring the store's etag to equal `etag`.
    pub fn if_match(etag: impl Into<String>) -> Self {
        AccessCondition { etag: etag.into() }
    }

    /// Returns true if a resource whose etag is `current` satisfies the condition.
    pub fn is_satisfied_by(&self, current: &str) -> bool {
        self.etag == current
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub access_condition: Option<AccessCondition>,
}

impl RequestOptions {
    /// Options carrying a precondition.
    pub fn with_condition(condition: AccessCondition) -> Self {
        RequestOptions {
            access_condition: Some(condition),
        }
    }
}
