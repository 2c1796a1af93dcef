//! # storekeep - An Embedded Entity Store
//!
//! storekeep keeps schemaless entities grouped into named classes. Each
//! entity gets a short, stable identifier (`a`, `b`, ..., `z`, `aa`, ...)
//! on first save and is always written as a whole-field snapshot.
//!
//! ## Core Concepts
//!
//! - **Store**: a storage backend plus the registry of entity classes
//! - **EntityClass**: a named category of entities with its own identifier sequence
//! - **Entity**: a class name, an optional identifier and a field map
//! - **Relation**: a reference field declared on one class, exposed on the
//!   target class as a back-reference
//!
//! ## Usage
//!
//! ```rust
//! use storekeep::{ClassOptions, Store};
//!
//! let store = Store::in_memory();
//! let authors = store.create_class("author", ClassOptions::new())?;
//! let articles = store.create_class(
//!     "article",
//!     ClassOptions::new().relation("author", "author"),
//! )?;
//!
//! let mut author = authors.new_entity();
//! author.set("name", "manveru")?;
//! authors.save(&mut author)?;
//!
//! let mut article = articles.new_entity();
//! article.set("title", "Hello")?;
//! articles.assign(&mut article, "author", &author)?;
//! articles.save(&mut article)?;
//!
//! let written = authors.related(&author, "article")?.expect("linked above");
//! assert_eq!(written.get("title").and_then(|v| v.as_str()), Some("Hello"));
//! # Ok::<(), storekeep::StoreError>(())
//! ```
//!
//! ## Persistence
//!
//! With the default `persistent` feature, [`Store::open`] accepts a
//! [`StoreConfig`] pointing at a directory. Every class is kept in its own
//! checksummed append-only log there, replayed on open.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod eid;
pub mod entity;
pub mod error;
pub mod schema;
pub mod value;

// Storage and the store
pub mod storage;
pub mod store;

// Ambient
pub mod config;
pub mod logging;
pub mod mail;

// Re-export primary types at crate root for convenience
pub use config::{BackendConfig, PersistentConfig, StoreConfig};
pub use eid::Eid;
pub use entity::{Entity, Fields};
pub use error::{MailError, StoreError, StoreResult, ValidationError};
pub use logging::RunMode;
pub use mail::{MailOptions, MailTransport, Mailer, OutgoingMail};
pub use schema::{ClassOptions, ClassSchema, Relation};
pub use storage::{Backend, ClassStore, MemoryBackend, Record, StorageError};
pub use store::{EntityClass, Store};
pub use value::{EntityRef, FieldValue};
