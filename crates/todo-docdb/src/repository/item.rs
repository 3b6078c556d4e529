//! # Item Repository
//!
//! Document operations for to-do items.
//!
//! ## Optimistic Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    update_item_concurrency                              │
//! │                                                                         │
//! │  Start ──► Serialized ──► PreconditionBuilt ──► Submitted              │
//! │                                                    │                    │
//! │                      ┌─────────────────────────────┼──────────────┐     │
//! │                      ▼                             ▼              ▼     │
//! │                  Succeeded                 ConflictDetected    Failed   │
//! │              (Item, new etag)              (412 → Conflict)  (as is)   │
//! │                                                                         │
//! │  The If-Match value is the item's own etag, or the document's          │
//! │  current etag when the item carries none.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::ConnectionContext;
use crate::error::{DocDbError, DocDbResult};
use crate::resource::{AccessCondition, Document, RequestOptions, ResourceQuery};
use crate::store::DocumentStore;
use todo_core::validation::validate_item;
use todo_core::Item;

const ITEM_ENTITY: &str = "Item";

/// Repository for to-do items.
///
/// ## Usage
/// ```rust,ignore
/// let context = Arc::new(ConnectionContext::new(AppSettings::load(None)?));
/// let repo = ItemRepository::new(context);
///
/// let created = repo.create_item(&Item::new("Buy milk")).await?;
/// let open = repo.get_incomplete_items().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ItemRepository {
    context: Arc<ConnectionContext>,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(context: Arc<ConnectionContext>) -> Self {
        ItemRepository { context }
    }

    /// Returns the shared connection context.
    pub fn context(&self) -> &Arc<ConnectionContext> {
        &self.context
    }

    /// Resolves the collection and returns the client with the collection link.
    async fn target(&self) -> DocDbResult<(Arc<dyn DocumentStore>, String)> {
        self.context.collection().await?;
        Ok((self.context.client()?, self.context.collection_link()?))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns every item whose `isComplete` flag is false, in store order.
    pub async fn get_incomplete_items(&self) -> DocDbResult<Vec<Item>> {
        let (client, link) = self.target().await?;
        let query = ResourceQuery::all().field_eq("isComplete", false);

        let items = client
            .query_documents(&link, &query)
            .await?
            .iter()
            .map(Document::to_item)
            .collect::<DocDbResult<Vec<_>>>()?;

        debug!(count = items.len(), "Incomplete items fetched");
        Ok(items)
    }

    /// Returns the item with `id`, or `None`.
    pub async fn get_item(&self, id: &str) -> DocDbResult<Option<Item>> {
        self.get_document(id)
            .await?
            .map(|doc| doc.to_item())
            .transpose()
    }

    /// Returns the raw document with `id`, or `None`.
    pub async fn get_document(&self, id: &str) -> DocDbResult<Option<Document>> {
        let (client, link) = self.target().await?;
        let document = client
            .query_documents(&link, &ResourceQuery::by_id(id))
            .await?
            .into_iter()
            .next();

        debug!(id = %id, found = document.is_some(), "Document lookup");
        Ok(document)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Creates a document from `item`.
    ///
    /// An empty id is replaced with a generated one. The item is validated
    /// before anything is sent.
    ///
    /// ## Errors
    /// - `Validation` for an id that cannot be used in a document link
    /// - `Store` (409) if the id is taken
    pub async fn create_item(&self, item: &Item) -> DocDbResult<Document> {
        let mut item = item.clone();
        item.ensure_id();
        validate_item(&item)?;

        let (client, link) = self.target().await?;
        let document = client.create_document(&link, &item.to_content()).await?;

        info!(id = %document.id, "Item created");
        Ok(document)
    }

    /// Replaces the stored item wholesale, without a precondition.
    ///
    /// ## Errors
    /// - `NotFound` if no document has the item's id
    pub async fn update_item(&self, item: &Item) -> DocDbResult<Document> {
        validate_item(item)?;
        self.require_document(&item.id).await?;

        let (client, _) = self.target().await?;
        let link = self.context.document_link(&item.id)?;
        let document = client
            .replace_document(&link, &item.to_content(), &RequestOptions::default())
            .await?;

        info!(id = %item.id, "Item updated");
        Ok(document)
    }

    /// Deletes the item with `id`.
    ///
    /// ## Errors
    /// - `NotFound` if no document has that id
    pub async fn delete_item(&self, id: &str) -> DocDbResult<()> {
        self.require_document(id).await?;

        let (client, _) = self.target().await?;
        client
            .delete_document(&self.context.document_link(id)?)
            .await?;

        info!(id = %id, "Item deleted");
        Ok(())
    }

    /// Replaces the stored item only if it has not changed since its etag
    /// was read.
    ///
    /// Returns the updated item carrying the new etag.
    ///
    /// ## Errors
    /// - `Conflict` if the stored document's etag no longer matches
    /// - `NotFound` if the item has no etag and no document has its id
    pub async fn update_item_concurrency(&self, item: &Item) -> DocDbResult<Item> {
        debug!(id = %item.id, state = "start", "Concurrency update");
        validate_item(item)?;

        let body: Map<String, Value> = item.to_content();
        debug!(id = %item.id, state = "serialized", "Concurrency update");

        let etag = match item.etag.as_deref().filter(|e| !e.is_empty()) {
            Some(etag) => etag.to_string(),
            None => self.require_document(&item.id).await?.etag,
        };
        let options = RequestOptions::with_condition(AccessCondition::if_match(etag));
        debug!(id = %item.id, state = "precondition_built", "Concurrency update");

        let (client, _) = self.target().await?;
        let link = self.context.document_link(&item.id)?;
        debug!(id = %item.id, state = "submitted", "Concurrency update");

        match client.replace_document(&link, &body, &options).await {
            Ok(document) => {
                debug!(id = %item.id, state = "succeeded", etag = %document.etag, "Concurrency update");
                document.to_item()
            }
            Err(e) if e.is_precondition_failed() => {
                debug!(id = %item.id, state = "conflict_detected", "Concurrency update");
                Err(DocDbError::Conflict {
                    id: item.id.clone(),
                })
            }
            Err(e) => {
                debug!(id = %item.id, state = "failed", error = %e, "Concurrency update");
                Err(e)
            }
        }
    }

    async fn require_document(&self, id: &str) -> DocDbResult<Document> {
        self.get_document(id)
            .await?
            .ok_or_else(|| DocDbError::not_found(ITEM_ENTITY, id))
    }
}
