//! # todo-docdb: Document Database Facade for To-Do Items
//!
//! This crate stores to-do items in a remote document database. It resolves
//! its database and collection lazily, creates them when missing, and
//! exposes CRUD plus an optimistic-concurrency update.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Todo DocDB Data Flow                             │
//! │                                                                         │
//! │  Controller (create / edit / complete an item)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   todo-docdb (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  Repository   │    │   Context     │    │    Store     │  │   │
//! │  │   │  (item.rs)    │───►│ (context.rs)  │───►│  (store/)    │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ CRUD          │    │ ids, client,  │    │ CosmosClient │  │   │
//! │  │   │ If-Match      │    │ db + coll     │    │ InMemoryStore│  │   │
//! │  │   │ update        │    │ (once)        │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                Document Database (REST, HTTPS)                  │   │
//! │  │   dbs/{database}/colls/{collection}/docs/{id}                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`settings`] - String-keyed settings (file + environment)
//! - [`context`] - One-time resolution of ids, client, database, collection
//! - [`repository`] - Item CRUD and concurrency-checked update
//! - [`store`] - Document store port, REST client, in-memory store
//! - [`resource`] - Resource types, links, queries, preconditions
//! - [`error`] - Error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use todo_core::Item;
//! use todo_docdb::{AppSettings, ConnectionContext, ItemRepository};
//!
//! let context = Arc::new(ConnectionContext::new(AppSettings::load(None)?));
//! let repo = ItemRepository::new(context);
//!
//! let created = repo.create_item(&Item::new("Buy milk")).await?;
//! if let Some(mut item) = repo.get_item(&created.id).await? {
//!     item.completed = true;
//!     repo.update_item_concurrency(&item).await?;
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod context;
pub mod error;
pub mod repository;
pub mod resource;
pub mod settings;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use context::ConnectionContext;
pub use error::{DocDbError, DocDbResult};
pub use resource::{AccessCondition, Document, RequestOptions, ResourceQuery};
pub use settings::AppSettings;
pub use store::{CosmosClient, DocumentStore, HttpConnector, InMemoryStore, StoreConnector};

pub use repository::item::ItemRepository;
