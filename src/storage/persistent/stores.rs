//! Persistent class stores.
//!
//! Each class store wraps:
//! - an in-memory [`ClassTable`] for reads
//! - a [`ClassLog`] that every mutation is appended to before it is applied

use std::collections::HashMap;
use std::fs;
use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::config::PersistentConfig;
use crate::eid::Eid;
use crate::logging::{inform, RunMode};
use crate::schema;
use crate::storage::memory::{lock_err, ClassTable};
use crate::storage::traits::{Backend, ClassStore, Record, StorageError};

use super::file_lock::DirLock;
use super::log::{ClassLog, LogEntryKind};

fn write_err(context: &'static str, e: &IoError) -> StorageError {
    if e.kind() == ErrorKind::InvalidData {
        StorageError::Serialization(format!("{context}: {e}"))
    } else {
        StorageError::Backend(format!("{context}: {e}"))
    }
}

fn open_err(context: String, e: &IoError) -> StorageError {
    if e.kind() == ErrorKind::InvalidData {
        StorageError::Serialization(format!("{context}: {e}"))
    } else {
        StorageError::Unavailable(format!("{context}: {e}"))
    }
}

/// Durable store for one class.
#[derive(Debug)]
pub struct PersistentClassStore {
    name: String,
    log: ClassLog,
    table: RwLock<ClassTable>,
    max_log_size: u64,
    /// Log size right after the last compaction (0 until one has run).
    snapshot_size: AtomicU64,
    run_mode: RunMode,
}

impl PersistentClassStore {
    fn open(
        path: &Path,
        name: &str,
        config: &PersistentConfig,
        run_mode: RunMode,
    ) -> Result<Self, StorageError> {
        let (log, replay) = ClassLog::open(path, config.sync_on_write)
            .map_err(|e| open_err(format!("failed to open log for class '{name}'"), &e))?;

        if replay.truncated_bytes > 0 {
            inform!(
                run_mode,
                WARN,
                class = %name,
                bytes = replay.truncated_bytes,
                "discarded torn entry at end of class log"
            );
        }
        inform!(
            run_mode,
            DEBUG,
            class = %name,
            entries = replay.entries,
            records = replay.table.len(),
            "class log replayed"
        );

        Ok(Self {
            name: name.to_string(),
            log,
            table: RwLock::new(replay.table),
            max_log_size: config.max_log_size,
            snapshot_size: AtomicU64::new(0),
            run_mode,
        })
    }

    /// Appends `kind` to the log, then applies it to `table`.
    ///
    /// The write has happened once the entry is appended. Compaction after
    /// it never fails the write; a failed compaction is logged and retried
    /// on a later write.
    fn commit(&self, table: &mut ClassTable, kind: LogEntryKind) -> Result<(), StorageError> {
        self.log
            .append(kind.clone())
            .map_err(|e| write_err("failed to append to class log", &e))?;
        kind.apply(table);
        self.compact_if_grown(table);
        Ok(())
    }

    /// Compacts once the log has grown `max_log_size` bytes past its last
    /// snapshot.
    fn compact_if_grown(&self, table: &ClassTable) {
        let size = match self.log.size_bytes() {
            Ok(size) => size,
            Err(e) => {
                inform!(self.run_mode, WARN, class = %self.name, error = %e, "failed to stat class log");
                return;
            }
        };
        let limit = self
            .snapshot_size
            .load(Ordering::Relaxed)
            .saturating_add(self.max_log_size);
        if size <= limit {
            return;
        }
        if let Err(e) = self.compact_locked(table) {
            inform!(
                self.run_mode,
                WARN,
                class = %self.name,
                error = %e,
                "class log compaction failed, keeping the full log"
            );
        }
    }

    fn compact_locked(&self, table: &ClassTable) -> Result<(), StorageError> {
        let before = self.log.position().unwrap_or(0);
        self.log
            .rewrite(LogEntryKind::Snapshot {
                records: table.records(),
                sequence: table.sequence(),
            })
            .map_err(|e| write_err("failed to compact class log", &e))?;
        if let Ok(size) = self.log.size_bytes() {
            self.snapshot_size.store(size, Ordering::Relaxed);
        }
        inform!(
            self.run_mode,
            DEBUG,
            class = %self.name,
            entries_before = before,
            records = table.len(),
            "class log compacted"
        );
        Ok(())
    }

    /// Rewrites the log as a single snapshot entry.
    ///
    /// # Errors
    /// `Backend` if the snapshot cannot be written.
    pub fn compact(&self) -> Result<(), StorageError> {
        let table = self
            .table
            .write()
            .map_err(|_| lock_err("persistent.compact"))?;
        self.compact_locked(&table)
    }

    /// Drops every record and the sequence.
    fn reset(&self) -> Result<(), StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| lock_err("persistent.reset"))?;
        self.log
            .reset()
            .map_err(|e| write_err("failed to reset class log", &e))?;
        *table = ClassTable::default();
        self.snapshot_size.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Path of the backing log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        self.log.path()
    }
}

impl ClassStore for PersistentClassStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, record: Record) -> Result<(), StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| lock_err("persistent.insert"))?;
        if table.contains(&record.eid) {
            return Err(StorageError::DuplicateIdentifier(format!(
                "{}:{}",
                self.name, record.eid
            )));
        }
        self.commit(&mut table, LogEntryKind::Put { record })
    }

    fn upsert(&self, record: Record) -> Result<(), StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| lock_err("persistent.upsert"))?;
        self.commit(&mut table, LogEntryKind::Put { record })
    }

    fn replace(&self, record: Record) -> Result<(), StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| lock_err("persistent.replace"))?;
        if !table.contains(&record.eid) {
            return Err(StorageError::NotFound(format!(
                "{}:{}",
                self.name, record.eid
            )));
        }
        self.commit(&mut table, LogEntryKind::Put { record })
    }

    fn get(&self, eid: &Eid) -> Result<Option<Record>, StorageError> {
        Ok(self
            .table
            .read()
            .map_err(|_| lock_err("persistent.get"))?
            .get(eid))
    }

    fn remove(&self, eid: &Eid) -> Result<bool, StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| lock_err("persistent.remove"))?;
        if !table.contains(eid) {
            return Ok(false);
        }
        self.commit(&mut table, LogEntryKind::Remove { eid: eid.clone() })?;
        Ok(true)
    }

    fn contains(&self, eid: &Eid) -> Result<bool, StorageError> {
        Ok(self
            .table
            .read()
            .map_err(|_| lock_err("persistent.contains"))?
            .contains(eid))
    }

    fn keys(&self) -> Result<Vec<Eid>, StorageError> {
        Ok(self
            .table
            .read()
            .map_err(|_| lock_err("persistent.keys"))?
            .keys())
    }

    fn records(&self) -> Result<Vec<Record>, StorageError> {
        Ok(self
            .table
            .read()
            .map_err(|_| lock_err("persistent.records"))?
            .records())
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self
            .table
            .read()
            .map_err(|_| lock_err("persistent.len"))?
            .len())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| lock_err("persistent.clear"))?;
        self.commit(&mut table, LogEntryKind::Clear)
    }

    fn sequence(&self) -> Result<u64, StorageError> {
        Ok(self
            .table
            .read()
            .map_err(|_| lock_err("persistent.sequence"))?
            .sequence())
    }

    fn advance_sequence(&self) -> Result<u64, StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| lock_err("persistent.advance_sequence"))?;
        let next = table.sequence() + 1;
        self.commit(&mut table, LogEntryKind::Sequence { value: next })?;
        Ok(next)
    }
}

/// Backend keeping one log file per class in a locked directory.
#[derive(Debug)]
pub struct PersistentBackend {
    dir: PathBuf,
    _lock: DirLock,
    config: PersistentConfig,
    run_mode: RunMode,
    classes: RwLock<HashMap<String, Arc<PersistentClassStore>>>,
}

impl PersistentBackend {
    /// Opens (or creates) a store directory and takes its lock.
    ///
    /// Class logs are opened lazily by [`Backend::open_class`].
    ///
    /// # Errors
    /// `Unavailable` if the directory cannot be created or is locked.
    pub fn open(dir: &Path, config: PersistentConfig, run_mode: RunMode) -> Result<Self, StorageError> {
        fs::create_dir_all(dir).map_err(|e| {
            StorageError::Unavailable(format!(
                "failed to create store directory {}: {e}",
                dir.display()
            ))
        })?;

        let lock = DirLock::acquire(dir).map_err(|e| {
            StorageError::Unavailable(format!("failed to lock {}: {e}", dir.display()))
        })?;

        inform!(run_mode, INFO, dir = %dir.display(), "persistent store opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            _lock: lock,
            config,
            run_mode,
            classes: RwLock::new(HashMap::new()),
        })
    }

    /// The store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn log_path(&self, class: &str) -> PathBuf {
        self.dir.join(format!("{class}.log"))
    }
}

impl Backend for PersistentBackend {
    fn kind(&self) -> &'static str {
        "persistent"
    }

    fn open_class(&self, class: &str, destroy: bool) -> Result<Arc<dyn ClassStore>, StorageError> {
        schema::validate_class_name(class)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let mut classes = self
            .classes
            .write()
            .map_err(|_| lock_err("persistent.open_class"))?;

        if let Some(existing) = classes.get(class) {
            if destroy {
                existing.reset()?;
            }
            let store: Arc<dyn ClassStore> = existing.clone();
            return Ok(store);
        }

        let path = self.log_path(class);
        if destroy {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StorageError::Unavailable(format!(
                        "failed to destroy class '{class}': {e}"
                    )))
                }
            }
        }

        let store = Arc::new(PersistentClassStore::open(
            &path,
            class,
            &self.config,
            self.run_mode,
        )?);
        classes.insert(class.to_string(), store.clone());
        let handle: Arc<dyn ClassStore> = store;
        Ok(handle)
    }

    fn compact(&self) -> Result<usize, StorageError> {
        let classes = self
            .classes
            .read()
            .map_err(|_| lock_err("persistent.compact"))?;
        for store in classes.values() {
            store.compact()?;
        }
        Ok(classes.len())
    }
}
