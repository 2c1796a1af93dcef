//! Abstract storage traits for storekeep.
//!
//! These traits define the contract that storage backends must implement.
//! A backend hands out one [`ClassStore`] per entity class; the store layer
//! above never sees files or formats.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eid::Eid;
use crate::entity::Fields;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A new record collided with an existing key.
    #[error("Duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    /// Backend read/write failure.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// An overwrite targeted a key that holds no record.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend could not be opened or initialized.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A stored entity snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Key of the record within its class.
    pub eid: Eid,
    /// Full field snapshot.
    pub fields: Fields,
}

impl Record {
    /// Creates a record.
    #[must_use]
    pub const fn new(eid: Eid, fields: Fields) -> Self {
        Self { eid, fields }
    }
}

/// Storage for the records of a single entity class.
///
/// Keys keep their first-insertion order; overwriting a key does not move it.
///
/// # Safety Considerations
/// - Each call is atomic with respect to other calls on the same store
/// - No grouping across calls or across classes
pub trait ClassStore: Send + Sync {
    /// Name of the class this store holds.
    fn name(&self) -> &str;

    /// Insert a new record. Returns `DuplicateIdentifier` if the key exists.
    fn insert(&self, record: Record) -> Result<(), StorageError>;

    /// Insert or overwrite a record.
    fn upsert(&self, record: Record) -> Result<(), StorageError>;

    /// Overwrite an existing record. Returns `NotFound` if the key is absent;
    /// nothing is written in that case.
    fn replace(&self, record: Record) -> Result<(), StorageError>;

    /// Get a record by key.
    fn get(&self, eid: &Eid) -> Result<Option<Record>, StorageError>;

    /// Remove a record. Returns whether it existed.
    fn remove(&self, eid: &Eid) -> Result<bool, StorageError>;

    /// Returns true if the key is present.
    fn contains(&self, eid: &Eid) -> Result<bool, StorageError>;

    /// All keys in insertion order.
    fn keys(&self) -> Result<Vec<Eid>, StorageError>;

    /// All records in insertion order.
    fn records(&self) -> Result<Vec<Record>, StorageError>;

    /// Number of stored records.
    fn len(&self) -> Result<usize, StorageError>;

    /// Remove every record. The identifier sequence is kept.
    fn clear(&self) -> Result<(), StorageError>;

    /// Last allocated sequence number (0 if none).
    fn sequence(&self) -> Result<u64, StorageError>;

    /// Advance the sequence by one and return the new value.
    ///
    /// The advance is durable before it is returned, so a number handed out
    /// once is never handed out again.
    fn advance_sequence(&self) -> Result<u64, StorageError>;
}

/// A source of class stores.
pub trait Backend: Send + Sync {
    /// Short backend name for logs.
    fn kind(&self) -> &'static str;

    /// Open (or create) the store for `class`.
    ///
    /// With `destroy`, any previously persisted records and sequence for the
    /// class are discarded first. Opening the same class twice without
    /// `destroy` returns the same underlying store.
    fn open_class(&self, class: &str, destroy: bool) -> Result<Arc<dyn ClassStore>, StorageError>;

    /// Rewrite persisted state in its most compact form. Returns the number
    /// of classes compacted.
    fn compact(&self) -> Result<usize, StorageError>;
}
