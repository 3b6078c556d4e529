//! # Connection Context
//!
//! Everything the repository needs to reach its collection, resolved once
//! on first use and cached for the life of the context.
//!
//! ## Initialization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Lazy Resolution                                      │
//! │                                                                         │
//! │  database_id()   ── settings["database"]   ──► OnceLock<String>        │
//! │  collection_id() ── settings["collection"] ──► OnceLock<String>        │
//! │  client()        ── endpoint + authKey ──► connector ──► OnceLock<Arc>  │
//! │                                                                         │
//! │  database()   ── query by id ──┬── found ──────────────► OnceCell       │
//! │                                └── absent ── create ──┬► OnceCell       │
//! │                                                       └ 409 ── re-read  │
//! │  collection() ── same, under the database link, partitioned on /id;    │
//! │                  an existing collection on another path is rejected    │
//! │                                                                         │
//! │  Concurrent first callers of database()/collection() share a single    │
//! │  initialization. A failed initialization leaves the cell empty, so     │
//! │  the next call tries again.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dropping the context releases the client and every cached handle.

use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{DocDbError, DocDbResult};
use crate::resource::{
    collection_link, database_link, document_link, CollectionResource, DatabaseResource,
    ResourceQuery, PARTITION_KEY_PATH,
};
use crate::settings::{AppSettings, AUTH_KEY_KEY, COLLECTION_KEY, DATABASE_KEY, ENDPOINT_KEY};
use crate::store::{DocumentStore, HttpConnector, StoreConnector};

/// Lazily resolved connection state shared by repositories.
pub struct ConnectionContext {
    settings: AppSettings,
    connector: Arc<dyn StoreConnector>,
    database_id: OnceLock<String>,
    collection_id: OnceLock<String>,
    client: OnceLock<Arc<dyn DocumentStore>>,
    database: OnceCell<DatabaseResource>,
    collection: OnceCell<CollectionResource>,
}

impl std::fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("database_id", &self.database_id.get())
            .field("collection_id", &self.collection_id.get())
            .field("connected", &self.client.get().is_some())
            .field("database", &self.database.get())
            .field("collection", &self.collection.get())
            .finish()
    }
}

impl ConnectionContext {
    /// Creates a context that connects to the real service over HTTPS.
    pub fn new(settings: AppSettings) -> Self {
        Self::with_connector(settings, Arc::new(HttpConnector))
    }

    /// Creates a context that builds its client through `connector`.
    pub fn with_connector(settings: AppSettings, connector: Arc<dyn StoreConnector>) -> Self {
        ConnectionContext {
            settings,
            connector,
            database_id: OnceLock::new(),
            collection_id: OnceLock::new(),
            client: OnceLock::new(),
            database: OnceCell::new(),
            collection: OnceCell::new(),
        }
    }

    /// Returns the settings this context reads from.
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    // =========================================================================
    // Identifiers
    // =========================================================================

    /// Returns the configured database id.
    pub fn database_id(&self) -> DocDbResult<&str> {
        cached_setting(&self.database_id, &self.settings, DATABASE_KEY)
    }

    /// Returns the configured collection id.
    pub fn collection_id(&self) -> DocDbResult<&str> {
        cached_setting(&self.collection_id, &self.settings, COLLECTION_KEY)
    }

    /// Name-based link of the configured collection.
    pub fn collection_link(&self) -> DocDbResult<String> {
        Ok(collection_link(self.database_id()?, self.collection_id()?))
    }

    /// Name-based link of a document in the configured collection.
    pub fn document_link(&self, id: &str) -> DocDbResult<String> {
        Ok(document_link(self.database_id()?, self.collection_id()?, id))
    }

    // =========================================================================
    // Client
    // =========================================================================

    /// Returns the long-lived store client, building it on first call.
    ///
    /// ## Errors
    /// - `Connection` if `endpoint` is not a valid URI
    /// - `Configuration` if `endpoint` or `authKey` is missing
    pub fn client(&self) -> DocDbResult<Arc<dyn DocumentStore>> {
        if let Some(client) = self.client.get() {
            return Ok(client.clone());
        }

        let endpoint = Url::parse(self.settings.require(ENDPOINT_KEY)?)?;
        let auth_key = self.settings.require(AUTH_KEY_KEY)?;

        debug!(endpoint = %endpoint, "Building document store client");
        let client = self.connector.connect(&endpoint, auth_key)?;

        // A concurrent caller may have won; everyone uses the stored client.
        Ok(self.client.get_or_init(|| client).clone())
    }

    // =========================================================================
    // Database / Collection
    // =========================================================================

    /// Returns the database handle, creating the database if it does not exist.
    pub async fn database(&self) -> DocDbResult<&DatabaseResource> {
        self.database
            .get_or_try_init(|| self.resolve_database())
            .await
    }

    /// Returns the collection handle, creating the collection if it does not exist.
    pub async fn collection(&self) -> DocDbResult<&CollectionResource> {
        self.collection
            .get_or_try_init(|| self.resolve_collection())
            .await
    }

    async fn resolve_database(&self) -> DocDbResult<DatabaseResource> {
        let id = self.database_id()?;
        let client = self.client()?;
        let query = ResourceQuery::by_id(id);

        if let Some(database) = client.query_databases(&query).await?.into_iter().next() {
            debug!(database = %id, "Database found");
            return Ok(database);
        }

        info!(database = %id, "Creating database");
        match client.create_database(id).await {
            Ok(database) => Ok(database),
            Err(e) if e.is_already_exists() => {
                warn!(database = %id, "Database created concurrently, re-reading");
                client
                    .query_databases(&query)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| DocDbError::not_found("Database", id))
            }
            Err(e) => Err(e),
        }
    }

    async fn resolve_collection(&self) -> DocDbResult<CollectionResource> {
        let collection = self.find_or_create_collection().await?;
        ensure_partitioned_on_id(collection)
    }

    async fn find_or_create_collection(&self) -> DocDbResult<CollectionResource> {
        self.database().await?;

        let database_id = self.database_id()?;
        let id = self.collection_id()?;
        let parent = database_link(database_id);
        let client = self.client()?;
        let query = ResourceQuery::by_id(id);

        if let Some(collection) = client
            .query_collections(&parent, &query)
            .await?
            .into_iter()
            .next()
        {
            debug!(database = %database_id, collection = %id, "Collection found");
            return Ok(collection);
        }

        info!(database = %database_id, collection = %id, "Creating collection");
        match client.create_collection(&parent, id).await {
            Ok(collection) => Ok(collection),
            Err(e) if e.is_already_exists() => {
                warn!(collection = %id, "Collection created concurrently, re-reading");
                client
                    .query_collections(&parent, &query)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| DocDbError::not_found("Collection", id))
            }
            Err(e) => Err(e),
        }
    }
}

/// Documents are addressed with an `["<id>"]` partition key, so a collection
/// partitioned on any other path cannot be used. Collections reporting no
/// partition key are accepted as is.
fn ensure_partitioned_on_id(collection: CollectionResource) -> DocDbResult<CollectionResource> {
    let mismatched = collection
        .partition_key
        .as_ref()
        .filter(|definition| definition.paths != [PARTITION_KEY_PATH])
        .map(|definition| definition.paths.join(","));

    match mismatched {
        Some(partition_key) => Err(DocDbError::IncompatibleCollection {
            id: collection.id,
            partition_key,
        }),
        None => Ok(collection),
    }
}

/// Reads `key` once and caches it in `cell`. Missing keys are not cached.
fn cached_setting<'a>(
    cell: &'a OnceLock<String>,
    settings: &AppSettings,
    key: &str,
) -> DocDbResult<&'a str> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = settings.require(key)?.to_string();
    Ok(cell.get_or_init(|| value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::PartitionKeyDefinition;
    use crate::store::MockDocumentStore;
    use mockall::Sequence;

    fn settings() -> AppSettings {
        AppSettings::from_pairs([
            (DATABASE_KEY, "ToDoList"),
            (COLLECTION_KEY, "Items"),
            (ENDPOINT_KEY, "https://localhost:8081/"),
            (AUTH_KEY_KEY, "dGVzdGtleQ=="),
        ])
    }

    fn database(id: &str) -> DatabaseResource {
        DatabaseResource {
            id: id.to_string(),
            resource_id: "rid".to_string(),
            self_link: "dbs/rid/".to_string(),
            etag: "\"1\"".to_string(),
        }
    }

    fn collection(id: &str) -> CollectionResource {
        CollectionResource {
            id: id.to_string(),
            resource_id: "crid".to_string(),
            self_link: "dbs/rid/colls/crid/".to_string(),
            etag: "\"2\"".to_string(),
            partition_key: Some(PartitionKeyDefinition::default()),
        }
    }

    fn context(store: MockDocumentStore, settings: AppSettings) -> ConnectionContext {
        ConnectionContext::with_connector(settings, Arc::new(Arc::new(store)))
    }

    #[test]
    fn test_ids_are_read_from_settings() {
        let ctx = context(MockDocumentStore::new(), settings());
        assert_eq!(ctx.database_id().unwrap(), "ToDoList");
        assert_eq!(ctx.collection_id().unwrap(), "Items");
        assert_eq!(ctx.collection_link().unwrap(), "dbs/ToDoList/colls/Items");
        assert_eq!(
            ctx.document_link("42").unwrap(),
            "dbs/ToDoList/colls/Items/docs/42"
        );
    }

    #[tokio::test]
    async fn test_missing_database_setting_fails_before_connecting() {
        // No expectations: any store call would panic.
        let settings = AppSettings::from_pairs([(COLLECTION_KEY, "Items")]);
        let ctx = context(MockDocumentStore::new(), settings);

        match ctx.database().await {
            Err(DocDbError::Configuration { key }) => assert_eq!(key, DATABASE_KEY),
            other => panic!("expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_endpoint_is_connection_error() {
        let settings = settings().with(ENDPOINT_KEY, "not a uri");
        let ctx = context(MockDocumentStore::new(), settings);

        assert!(matches!(ctx.client(), Err(DocDbError::Connection(_))));
    }

    #[test]
    fn test_missing_auth_key_is_configuration_error() {
        let settings = settings().with(AUTH_KEY_KEY, "");
        let ctx = context(MockDocumentStore::new(), settings);

        match ctx.client() {
            Err(DocDbError::Configuration { key }) => assert_eq!(key, AUTH_KEY_KEY),
            Err(other) => panic!("expected Configuration error, got {:?}", other),
            Ok(_) => panic!("expected Configuration error"),
        }
    }

    #[tokio::test]
    async fn test_database_is_created_once() {
        let mut store = MockDocumentStore::new();
        store
            .expect_query_databases()
            .times(1)
            .returning(|_| Ok(vec![]));
        store
            .expect_create_database()
            .times(1)
            .returning(|id| Ok(database(id)));

        let ctx = context(store, settings());

        let first = ctx.database().await.unwrap().clone();
        let second = ctx.database().await.unwrap().clone();
        assert_eq!(first.id, "ToDoList");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_initialization() {
        let mut store = MockDocumentStore::new();
        store
            .expect_query_databases()
            .times(1)
            .returning(|_| Ok(vec![database("ToDoList")]));
        store.expect_create_database().never();

        let ctx = context(store, settings());
        let (a, b) = tokio::join!(ctx.database(), ctx.database());
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn test_create_conflict_is_resolved_by_reread() {
        let mut seq = Sequence::new();
        let mut store = MockDocumentStore::new();
        store
            .expect_query_databases()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![]));
        store
            .expect_create_database()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DocDbError::store(409, Some("Conflict".into()), "exists")));
        store
            .expect_query_databases()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![database("ToDoList")]));

        let ctx = context(store, settings());
        assert_eq!(ctx.database().await.unwrap().id, "ToDoList");
    }

    #[tokio::test]
    async fn test_failed_resolution_is_retried() {
        let mut seq = Sequence::new();
        let mut store = MockDocumentStore::new();
        store
            .expect_query_databases()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DocDbError::store(503, None, "unavailable")));
        store
            .expect_query_databases()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![database("ToDoList")]));

        let ctx = context(store, settings());
        assert_eq!(ctx.database().await.unwrap_err().status(), Some(503));
        assert!(ctx.database().await.is_ok());
    }

    #[tokio::test]
    async fn test_collection_on_other_partition_key_is_rejected() {
        let mut store = MockDocumentStore::new();
        store
            .expect_query_databases()
            .returning(|_| Ok(vec![database("ToDoList")]));
        store.expect_query_collections().returning(|_, _| {
            let mut existing = collection("Items");
            existing.partition_key = Some(PartitionKeyDefinition {
                paths: vec!["/category".to_string()],
                kind: "Hash".to_string(),
            });
            Ok(vec![existing])
        });
        store.expect_create_collection().never();

        let ctx = context(store, settings());
        match ctx.collection().await {
            Err(DocDbError::IncompatibleCollection { id, partition_key }) => {
                assert_eq!(id, "Items");
                assert_eq!(partition_key, "/category");
            }
            other => panic!("expected IncompatibleCollection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_collection_resolves_database_first() {
        let mut store = MockDocumentStore::new();
        store
            .expect_query_databases()
            .times(1)
            .returning(|_| Ok(vec![database("ToDoList")]));
        store
            .expect_query_collections()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        store
            .expect_create_collection()
            .times(1)
            .returning(|link, id| {
                assert_eq!(link, "dbs/ToDoList");
                Ok(collection(id))
            });

        let ctx = context(store, settings());
        ctx.collection().await.unwrap();
        let resolved = ctx.collection().await.unwrap();

        assert_eq!(resolved.id, "Items");
        assert_eq!(resolved.partition_key, Some(PartitionKeyDefinition::default()));
    }
}
