//! Storage backends for storekeep.
//!
//! The [`Backend`] and [`ClassStore`] traits define what the entity store
//! needs from storage. Two implementations are provided:
//! - [`MemoryBackend`] for tests and embedded use
//! - `PersistentBackend` (feature `persistent`) for durable storage

mod memory;
#[cfg(feature = "persistent")]
pub mod persistent;
mod traits;

pub use memory::{ClassTable, MemoryBackend, MemoryClassStore};
pub use traits::{Backend, ClassStore, Record, StorageError};

#[cfg(feature = "persistent")]
pub use persistent::{open_backend, PersistentBackend, PersistentClassStore};
