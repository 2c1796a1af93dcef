//! Persistent storage backend for storekeep.
//!
//! This module provides durable storage with:
//! - One append-only log per class, replayed on open
//! - CRC32 checksums for corruption detection
//! - Snapshot compaction with write-then-rename
//! - A directory lock for single-process access
//!
//! # Layout
//!
//! ```text
//! <dir>/
//! ├── .lock           exclusive lock (flock / LockFileEx)
//! ├── article.log     [header][entry][entry]...
//! └── author.log
//! ```

mod codec;
mod file_lock;
mod log;
mod stores;

pub use file_lock::DirLock;
pub use log::{ClassLog, LogEntry, LogEntryKind, Replay};
pub use stores::{PersistentBackend, PersistentClassStore};

use std::path::Path;

use crate::config::PersistentConfig;
use crate::error::StoreResult;
use crate::logging::RunMode;

/// Open or create a persistent backend at the given directory.
///
/// # Arguments
/// * `path` - Directory holding the class logs
/// * `config` - Optional configuration (uses defaults if None)
///
/// # Errors
/// - `InvalidConfig` if the configuration fails validation
/// - `Unavailable` if the directory cannot be created or another process holds the lock
///
/// # Example
/// ```rust,ignore
/// use storekeep::storage::open_backend;
///
/// let backend = open_backend("./data/store", None)?;
/// ```
pub fn open_backend(
    path: impl AsRef<Path>,
    config: Option<PersistentConfig>,
) -> StoreResult<PersistentBackend> {
    let config = config.unwrap_or_default().validate()?;
    Ok(PersistentBackend::open(path.as_ref(), config, RunMode::default())?)
}
