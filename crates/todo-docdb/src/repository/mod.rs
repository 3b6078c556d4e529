//! # Repository Module
//!
//! The CRUD facade over the document store.
//!
//! ## Call Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    From Caller to Store                                 │
//! │                                                                         │
//! │  Caller                                                                 │
//! │       │  repo.update_item_concurrency(&item)                           │
//! │       ▼                                                                 │
//! │  ItemRepository                                                        │
//! │  ├── get_incomplete_items / get_item / get_document                    │
//! │  ├── create_item / update_item / delete_item                           │
//! │  └── update_item_concurrency (If-Match on the item's etag)             │
//! │       │                                                                 │
//! │       │  context.collection().await   (resolved once)                  │
//! │       ▼                                                                 │
//! │  ConnectionContext ──► Arc<dyn DocumentStore>                          │
//! │                         ├── CosmosClient (REST)                        │
//! │                         └── InMemoryStore                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod item;

pub use item::ItemRepository;
