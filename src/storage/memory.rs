//! In-memory storage backend.
//!
//! This module provides thread-safe in-memory implementations of the storage traits.
//! It is intended for embedded usage, tests, and as a reference implementation.
//! The [`ClassTable`] defined here is also the read index of the persistent backend.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::eid::Eid;
use crate::entity::Fields;
use crate::storage::traits::{Backend, ClassStore, Record, StorageError};

pub(crate) fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

/// Ordered records of one class plus its identifier sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassTable {
    order: Vec<Eid>,
    by_eid: HashMap<Eid, Fields>,
    sequence: u64,
}

impl ClassTable {
    /// Builds a table from records in insertion order.
    #[must_use]
    pub fn from_records(records: Vec<Record>, sequence: u64) -> Self {
        let mut table = Self {
            sequence,
            ..Self::default()
        };
        for record in records {
            table.upsert(record);
        }
        table
    }

    pub fn contains(&self, eid: &Eid) -> bool {
        self.by_eid.contains_key(eid)
    }

    pub fn get(&self, eid: &Eid) -> Option<Record> {
        self.by_eid
            .get(eid)
            .map(|fields| Record::new(eid.clone(), fields.clone()))
    }

    pub fn upsert(&mut self, record: Record) {
        if !self.by_eid.contains_key(&record.eid) {
            self.order.push(record.eid.clone());
        }
        self.by_eid.insert(record.eid, record.fields);
    }

    pub fn remove(&mut self, eid: &Eid) -> bool {
        if self.by_eid.remove(eid).is_some() {
            self.order.retain(|k| k != eid);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.by_eid.clear();
    }

    pub fn keys(&self) -> Vec<Eid> {
        self.order.clone()
    }

    pub fn records(&self) -> Vec<Record> {
        self.order
            .iter()
            .filter_map(|eid| self.get(eid))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Raises the sequence to at least `value`; it never moves backwards.
    pub fn observe_sequence(&mut self, value: u64) {
        self.sequence = self.sequence.max(value);
    }
}

/// Thread-safe in-memory store for one class.
#[derive(Debug)]
pub struct MemoryClassStore {
    name: String,
    table: RwLock<ClassTable>,
}

impl MemoryClassStore {
    /// Creates an empty store for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: RwLock::new(ClassTable::default()),
        }
    }

    /// Drops every record and the sequence.
    fn reset(&self) -> Result<(), StorageError> {
        *self.table.write().map_err(|_| lock_err("memory.reset"))? = ClassTable::default();
        Ok(())
    }
}

impl ClassStore for MemoryClassStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, record: Record) -> Result<(), StorageError> {
        let mut table = self.table.write().map_err(|_| lock_err("memory.insert"))?;
        if table.contains(&record.eid) {
            return Err(StorageError::DuplicateIdentifier(format!(
                "{}:{}",
                self.name, record.eid
            )));
        }
        table.upsert(record);
        Ok(())
    }

    fn upsert(&self, record: Record) -> Result<(), StorageError> {
        self.table
            .write()
            .map_err(|_| lock_err("memory.upsert"))?
            .upsert(record);
        Ok(())
    }

    fn replace(&self, record: Record) -> Result<(), StorageError> {
        let mut table = self.table.write().map_err(|_| lock_err("memory.replace"))?;
        if !table.contains(&record.eid) {
            return Err(StorageError::NotFound(format!(
                "{}:{}",
                self.name, record.eid
            )));
        }
        table.upsert(record);
        Ok(())
    }

    fn get(&self, eid: &Eid) -> Result<Option<Record>, StorageError> {
        Ok(self.table.read().map_err(|_| lock_err("memory.get"))?.get(eid))
    }

    fn remove(&self, eid: &Eid) -> Result<bool, StorageError> {
        Ok(self
            .table
            .write()
            .map_err(|_| lock_err("memory.remove"))?
            .remove(eid))
    }

    fn contains(&self, eid: &Eid) -> Result<bool, StorageError> {
        Ok(self
            .table
            .read()
            .map_err(|_| lock_err("memory.contains"))?
            .contains(eid))
    }

    fn keys(&self) -> Result<Vec<Eid>, StorageError> {
        Ok(self.table.read().map_err(|_| lock_err("memory.keys"))?.keys())
    }

    fn records(&self) -> Result<Vec<Record>, StorageError> {
        Ok(self
            .table
            .read()
            .map_err(|_| lock_err("memory.records"))?
            .records())
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.table.read().map_err(|_| lock_err("memory.len"))?.len())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.table
            .write()
            .map_err(|_| lock_err("memory.clear"))?
            .clear();
        Ok(())
    }

    fn sequence(&self) -> Result<u64, StorageError> {
        Ok(self
            .table
            .read()
            .map_err(|_| lock_err("memory.sequence"))?
            .sequence())
    }

    fn advance_sequence(&self) -> Result<u64, StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| lock_err("memory.advance_sequence"))?;
        let next = table.sequence() + 1;
        table.observe_sequence(next);
        Ok(next)
    }
}

/// Backend keeping every class in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    classes: RwLock<HashMap<String, Arc<MemoryClassStore>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn open_class(&self, class: &str, destroy: bool) -> Result<Arc<dyn ClassStore>, StorageError> {
        let mut classes = self
            .classes
            .write()
            .map_err(|_| lock_err("memory.open_class"))?;
        if destroy {
            if let Some(existing) = classes.get(class) {
                existing.reset()?;
            }
        }
        let store: Arc<dyn ClassStore> = classes
            .entry(class.to_string())
            .or_insert_with(|| Arc::new(MemoryClassStore::new(class)))
            .clone();
        Ok(store)
    }

    fn compact(&self) -> Result<usize, StorageError> {
        Ok(0)
    }
}
