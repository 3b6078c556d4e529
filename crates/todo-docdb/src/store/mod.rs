//! # Document Store Port
//!
//! The operations the repository needs from the remote document database.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      DocumentStore                                      │
//! │                                                                         │
//! │   ┌──────────────────────┐          ┌──────────────────────┐           │
//! │   │ CosmosClient (http)  │          │ InMemoryStore        │           │
//! │   │ REST + master-key    │          │ same rules, no I/O   │           │
//! │   │ signing              │          │ tests / seed --memory│           │
//! │   └──────────────────────┘          └──────────────────────┘           │
//! │                                                                         │
//! │  Both report failures as DocDbError::Store with the HTTP status the    │
//! │  real service would return (404, 409, 412, ...).                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use url::Url;

use crate::error::DocDbResult;
use crate::resource::{
    CollectionResource, DatabaseResource, Document, RequestOptions, ResourceQuery,
};

pub use http::CosmosClient;
pub use memory::InMemoryStore;

/// Remote document database operations.
///
/// Links are name-based (see [`crate::resource`]).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Lists databases matching `query`.
    async fn query_databases(&self, query: &ResourceQuery) -> DocDbResult<Vec<DatabaseResource>>;

    /// Creates a database. Fails with status 409 if the id is taken.
    async fn create_database(&self, id: &str) -> DocDbResult<DatabaseResource>;

    /// Lists collections of a database matching `query`.
    async fn query_collections(
        &self,
        database_link: &str,
        query: &ResourceQuery,
    ) -> DocDbResult<Vec<CollectionResource>>;

    /// Creates a collection partitioned on `/id`. Fails with status 409 if the id is taken.
    async fn create_collection(
        &self,
        database_link: &str,
        id: &str,
    ) -> DocDbResult<CollectionResource>;

    /// Lists documents of a collection matching `query`, in store order.
    async fn query_documents(
        &self,
        collection_link: &str,
        query: &ResourceQuery,
    ) -> DocDbResult<Vec<Document>>;

    /// Creates a document. `body` must carry an `id`.
    async fn create_document(
        &self,
        collection_link: &str,
        body: &Map<String, Value>,
    ) -> DocDbResult<Document>;

    /// Replaces a document wholesale, honoring any precondition in `options`.
    async fn replace_document(
        &self,
        document_link: &str,
        body: &Map<String, Value>,
        options: &RequestOptions,
    ) -> DocDbResult<Document>;

    /// Deletes a document.
    async fn delete_document(&self, document_link: &str) -> DocDbResult<()>;
}

/// Builds the long-lived store client from the configured endpoint and key.
pub trait StoreConnector: Send + Sync {
    fn connect(&self, endpoint: &Url, auth_key: &str) -> DocDbResult<Arc<dyn DocumentStore>>;
}

/// Connects to the real service over HTTPS.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl StoreConnector for HttpConnector {
    fn connect(&self, endpoint: &Url, auth_key: &str) -> DocDbResult<Arc<dyn DocumentStore>> {
        Ok(Arc::new(CosmosClient::new(endpoint.clone(), auth_key)?))
    }
}

/// An already-built store ignores the endpoint and is shared as is.
impl<S: DocumentStore + 'static> StoreConnector for Arc<S> {
    fn connect(&self, _endpoint: &Url, _auth_key: &str) -> DocDbResult<Arc<dyn DocumentStore>> {
        Ok(self.clone())
    }
}
