//! # In-Memory Store
//!
//! A [`DocumentStore`] that keeps everything in process memory while
//! following the service's observable rules:
//!
//! | Situation                          | Result            |
//! |------------------------------------|-------------------|
//! | create with an id already taken    | 409 Conflict      |
//! | read/replace/delete missing target | 404 NotFound      |
//! | precondition not satisfied         | 412 PreconditionFailed |
//! | body without an id / id mismatch   | 400 BadRequest    |
//!
//! Every write assigns a fresh etag. Query results come back in insertion
//! order.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::DocumentStore;
use crate::error::{DocDbError, DocDbResult};
use crate::resource::{
    CollectionResource, DatabaseResource, Document, PartitionKeyDefinition, RequestOptions,
    ResourceQuery,
};

/// System properties the store owns; incoming values are discarded.
const SYSTEM_PROPERTIES: [&str; 5] = ["_rid", "_self", "_etag", "_ts", "_attachments"];

#[derive(Debug)]
struct CollectionEntry {
    resource: CollectionResource,
    documents: Vec<Map<String, Value>>,
}

#[derive(Debug)]
struct DatabaseEntry {
    resource: DatabaseResource,
    collections: Vec<CollectionEntry>,
}

/// Process-local document store.
///
/// ## Usage
/// ```rust,ignore
/// let store = Arc::new(InMemoryStore::new());
/// let context = ConnectionContext::with_connector(settings, store.clone());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    databases: Mutex<Vec<DatabaseEntry>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// Link Parsing
// =============================================================================

/// Splits a name-based link into `(database, collection, document)` ids.
fn parse_link(link: &str) -> DocDbResult<(&str, Option<&str>, Option<&str>)> {
    let segments: Vec<&str> = link.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["dbs", db] => Ok((db, None, None)),
        ["dbs", db, "colls", coll] => Ok((db, Some(coll), None)),
        ["dbs", db, "colls", coll, "docs", doc] => Ok((db, Some(coll), Some(doc))),
        _ => Err(bad_request(format!("Unrecognized resource link: {}", link))),
    }
}

fn bad_request(message: impl Into<String>) -> DocDbError {
    DocDbError::store(400, Some("BadRequest".to_string()), message)
}

fn not_found(message: impl Into<String>) -> DocDbError {
    DocDbError::store(404, Some("NotFound".to_string()), message)
}

fn conflict(message: impl Into<String>) -> DocDbError {
    DocDbError::store(409, Some("Conflict".to_string()), message)
}

fn precondition_failed(message: impl Into<String>) -> DocDbError {
    DocDbError::store(412, Some("PreconditionFailed".to_string()), message)
}

fn new_rid() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn new_etag() -> String {
    format!("\"{}\"", Uuid::new_v4())
}

fn rid_of(self_link: &str) -> &str {
    self_link.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

fn find_database<'a>(
    databases: &'a mut [DatabaseEntry],
    id: &str,
) -> DocDbResult<&'a mut DatabaseEntry> {
    databases
        .iter_mut()
        .find(|db| db.resource.id == id)
        .ok_or_else(|| not_found(format!("Database {} does not exist", id)))
}

fn find_collection<'a>(
    databases: &'a mut [DatabaseEntry],
    database_id: &str,
    collection_id: &str,
) -> DocDbResult<&'a mut CollectionEntry> {
    find_database(databases, database_id)?
        .collections
        .iter_mut()
        .find(|coll| coll.resource.id == collection_id)
        .ok_or_else(|| not_found(format!("Collection {} does not exist", collection_id)))
}

fn document_id(document: &Map<String, Value>) -> Option<&str> {
    document.get("id").and_then(Value::as_str)
}

/// Copies user properties from `body` and stamps fresh system properties.
fn stamp(body: &Map<String, Value>, rid: &str, self_link: &str) -> Map<String, Value> {
    let mut document: Map<String, Value> = body
        .iter()
        .filter(|(key, _)| !SYSTEM_PROPERTIES.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    document.insert("_rid".to_string(), Value::String(rid.to_string()));
    document.insert("_self".to_string(), Value::String(self_link.to_string()));
    document.insert("_etag".to_string(), Value::String(new_etag()));
    document.insert("_ts".to_string(), Value::from(Utc::now().timestamp()));
    document
}

fn to_document(document: &Map<String, Value>) -> DocDbResult<Document> {
    Ok(serde_json::from_value(Value::Object(document.clone()))?)
}

// =============================================================================
// DocumentStore
// =============================================================================

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn query_databases(&self, query: &ResourceQuery) -> DocDbResult<Vec<DatabaseResource>> {
        let databases = self.databases.lock().await;

        let mut matching = Vec::new();
        for database in databases.iter() {
            if let Value::Object(map) = serde_json::to_value(&database.resource)? {
                if query.matches(&map) {
                    matching.push(database.resource.clone());
                }
            }
        }
        Ok(matching)
    }

    async fn create_database(&self, id: &str) -> DocDbResult<DatabaseResource> {
        let mut databases = self.databases.lock().await;
        if databases.iter().any(|db| db.resource.id == id) {
            return Err(conflict(format!("Database {} already exists", id)));
        }

        let rid = new_rid();
        let resource = DatabaseResource {
            id: id.to_string(),
            self_link: format!("dbs/{}/", rid),
            resource_id: rid,
            etag: new_etag(),
        };
        debug!(database = %id, "In-memory database created");

        databases.push(DatabaseEntry {
            resource: resource.clone(),
            collections: Vec::new(),
        });
        Ok(resource)
    }

    async fn query_collections(
        &self,
        database_link: &str,
        query: &ResourceQuery,
    ) -> DocDbResult<Vec<CollectionResource>> {
        let (database_id, _, _) = parse_link(database_link)?;
        let mut databases = self.databases.lock().await;
        let database = find_database(&mut databases, database_id)?;

        let mut matching = Vec::new();
        for collection in &database.collections {
            if let Value::Object(map) = serde_json::to_value(&collection.resource)? {
                if query.matches(&map) {
                    matching.push(collection.resource.clone());
                }
            }
        }
        Ok(matching)
    }

    async fn create_collection(
        &self,
        database_link: &str,
        id: &str,
    ) -> DocDbResult<CollectionResource> {
        let (database_id, _, _) = parse_link(database_link)?;
        let mut databases = self.databases.lock().await;
        let database = find_database(&mut databases, database_id)?;

        if database.collections.iter().any(|c| c.resource.id == id) {
            return Err(conflict(format!("Collection {} already exists", id)));
        }

        let rid = new_rid();
        let resource = CollectionResource {
            id: id.to_string(),
            self_link: format!("{}colls/{}/", database.resource.self_link, rid),
            resource_id: rid,
            etag: new_etag(),
            partition_key: Some(PartitionKeyDefinition::default()),
        };
        debug!(database = %database_id, collection = %id, "In-memory collection created");

        database.collections.push(CollectionEntry {
            resource: resource.clone(),
            documents: Vec::new(),
        });
        Ok(resource)
    }

    async fn query_documents(
        &self,
        collection_link: &str,
        query: &ResourceQuery,
    ) -> DocDbResult<Vec<Document>> {
        let (database_id, collection_id, _) = parse_link(collection_link)?;
        let collection_id =
            collection_id.ok_or_else(|| bad_request("Expected a collection link"))?;

        let mut databases = self.databases.lock().await;
        let collection = find_collection(&mut databases, database_id, collection_id)?;

        collection
            .documents
            .iter()
            .filter(|doc| query.matches(doc))
            .map(to_document)
            .collect()
    }

    async fn create_document(
        &self,
        collection_link: &str,
        body: &Map<String, Value>,
    ) -> DocDbResult<Document> {
        let (database_id, collection_id, _) = parse_link(collection_link)?;
        let collection_id =
            collection_id.ok_or_else(|| bad_request("Expected a collection link"))?;

        let id = match document_id(body) {
            Some(id) if !id.is_empty() => id,
            _ => return Err(bad_request("Document body must carry a string id")),
        };

        let mut databases = self.databases.lock().await;
        let collection = find_collection(&mut databases, database_id, collection_id)?;

        if collection.documents.iter().any(|d| document_id(d) == Some(id)) {
            return Err(conflict(format!("Document {} already exists", id)));
        }

        let rid = new_rid();
        let self_link = format!("{}docs/{}/", collection.resource.self_link, rid);
        let document = stamp(body, &rid, &self_link);
        let created = to_document(&document)?;
        collection.documents.push(document);

        Ok(created)
    }

    async fn replace_document(
        &self,
        document_link: &str,
        body: &Map<String, Value>,
        options: &RequestOptions,
    ) -> DocDbResult<Document> {
        let (database_id, collection_id, document) = parse_link(document_link)?;
        let (collection_id, target) = collection_id
            .zip(document)
            .ok_or_else(|| bad_request("Expected a document link"))?;

        if document_id(body) != Some(target) {
            return Err(bad_request("Document id in body does not match the link"));
        }

        let mut databases = self.databases.lock().await;
        let collection = find_collection(&mut databases, database_id, collection_id)?;
        let current = collection
            .documents
            .iter_mut()
            .find(|d| document_id(d) == Some(target))
            .ok_or_else(|| not_found(format!("Document {} does not exist", target)))?;

        if let Some(condition) = &options.access_condition {
            let etag = current.get("_etag").and_then(Value::as_str).unwrap_or_default();
            if !condition.is_satisfied_by(etag) {
                return Err(precondition_failed(
                    "The operation specified an etag that is different from the version available",
                ));
            }
        }

        let self_link = current
            .get("_self")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let replaced = stamp(body, rid_of(&self_link), &self_link);
        *current = replaced;

        to_document(current)
    }

    async fn delete_document(&self, document_link: &str) -> DocDbResult<()> {
        let (database_id, collection_id, document) = parse_link(document_link)?;
        let (collection_id, target) = collection_id
            .zip(document)
            .ok_or_else(|| bad_request("Expected a document link"))?;

        let mut databases = self.databases.lock().await;
        let collection = find_collection(&mut databases, database_id, collection_id)?;

        let before = collection.documents.len();
        collection.documents.retain(|d| document_id(d) != Some(target));
        if collection.documents.len() == before {
            return Err(not_found(format!("Document {} does not exist", target)));
        }
        Ok(())
    }
}
