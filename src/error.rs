//! Error types for storekeep.
//!
//! All errors are strongly typed using thiserror so callers can match
//! on specific conditions. A lookup miss is never an error: it is
//! reported as `Ok(None)`.

use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors raised before anything touches a backend.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A class name is not a lowercase identifier.
    #[error("Invalid class name '{name}': must match [a-z][a-z0-9_]*")]
    InvalidClassName {
        /// The rejected name.
        name: String,
    },

    /// A field name is not a lowercase identifier.
    #[error("Invalid field name '{name}': must match [a-z_][a-z0-9_]*")]
    InvalidFieldName {
        /// The rejected name.
        name: String,
    },

    /// A reference was stored in a field with no declared relation.
    #[error("Class '{class}' has no relation named '{name}'")]
    UnknownRelation {
        /// Class being written.
        class: String,
        /// Field holding the reference.
        name: String,
    },

    /// A reference points at a class other than the relation's target.
    #[error("Relation '{class}.{field}' targets '{expected}', got an entity of '{found}'")]
    RelationTargetMismatch {
        /// Class being written.
        class: String,
        /// Relation field.
        field: String,
        /// Declared target class.
        expected: String,
        /// Class of the referenced entity.
        found: String,
    },

    /// A reference was taken to an entity that has no identifier yet.
    #[error("Cannot reference an unsaved '{class}' entity; save it first")]
    UnsavedReference {
        /// Class of the unsaved entity.
        class: String,
    },

    /// An entity was handed to a class it does not belong to.
    #[error("Entity of class '{found}' cannot be stored in class '{expected}'")]
    ClassMismatch {
        /// Class asked to store the entity.
        expected: String,
        /// Class the entity was created by.
        found: String,
    },

    /// A configuration value is malformed or out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },
}

/// Mail delivery errors.
///
/// These never reach the caller of [`crate::mail::Mailer::send`]; they are
/// only reported through the log.
#[derive(Debug, Error)]
pub enum MailError {
    /// The transport could not deliver the message.
    #[error("Mail transport failed: {message}")]
    Transport {
        /// Transport-specific description.
        message: String,
    },

    /// A setting needed to compose the message is missing.
    #[error("Mail option '{option}' is not configured")]
    MissingOption {
        /// Name of the missing `MailOptions` field.
        option: &'static str,
    },
}

/// Top-level error type for storekeep.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input was rejected before reaching storage.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The backend failed or refused the operation.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A bug or broken invariant, such as a poisoned lock.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if the backend could not be opened at all.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Unavailable(_)))
    }

    /// Returns true if an overwrite targeted a deleted or missing record.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound(_)))
    }

    /// Returns true if retrying the same call could succeed.
    ///
    /// The store never retries on its own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Internal { .. } => false,
            Self::Storage(e) => matches!(e, StorageError::Unavailable(_) | StorageError::Backend(_)),
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
