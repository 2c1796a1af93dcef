//! The entity store.
//!
//! A [`Store`] owns a storage backend and a registry of entity classes.
//! Each [`EntityClass`] handle allocates identifiers, writes whole-entity
//! snapshots, and resolves declared relations in both directions.
//!
//! Back-references are never stored. The store keeps a reverse index of
//! relation fields, built when a class is registered and updated on every
//! write, and resolves back-references through it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::config::{BackendConfig, StoreConfig};
use crate::eid::Eid;
use crate::entity::{Entity, Fields};
use crate::error::{StoreError, StoreResult, ValidationError};
use crate::logging::{inform, RunMode};
use crate::schema::{self, ClassOptions, ClassSchema};
use crate::storage::{Backend, ClassStore, MemoryBackend, Record};
use crate::value::{EntityRef, FieldValue};

fn poisoned(context: &'static str) -> StoreError {
    StoreError::internal(format!("poisoned lock: {context}"))
}

/// Relation fields of one source entity, as `(field, target)` pairs.
type Links = Vec<(String, EntityRef)>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Backlink {
    source: EntityRef,
    field: String,
}

/// Reverse index of relation fields: target entity → sources pointing at it.
#[derive(Debug, Default)]
struct LinkIndex {
    by_target: HashMap<EntityRef, Vec<Backlink>>,
    by_source: HashMap<EntityRef, Links>,
}

impl LinkIndex {
    /// Replaces the indexed links of `source`. Links that did not change
    /// keep their position.
    fn relink(&mut self, source: &EntityRef, links: Links) {
        let old = self.by_source.remove(source).unwrap_or_default();

        for (field, target) in &old {
            if links.iter().any(|(f, t)| f == field && t == target) {
                continue;
            }
            if let Some(backlinks) = self.by_target.get_mut(target) {
                backlinks.retain(|b| !(b.source == *source && b.field == *field));
                if backlinks.is_empty() {
                    self.by_target.remove(target);
                }
            }
        }

        for (field, target) in &links {
            if old.iter().any(|(f, t)| f == field && t == target) {
                continue;
            }
            self.by_target
                .entry(target.clone())
                .or_default()
                .push(Backlink {
                    source: source.clone(),
                    field: field.clone(),
                });
        }

        if !links.is_empty() {
            self.by_source.insert(source.clone(), links);
        }
    }

    fn unlink(&mut self, source: &EntityRef) {
        self.relink(source, Vec::new());
    }

    fn unlink_class(&mut self, class: &str) {
        let sources: Vec<EntityRef> = self
            .by_source
            .keys()
            .filter(|s| s.class == class)
            .cloned()
            .collect();
        for source in &sources {
            self.unlink(source);
        }
    }

    fn backlinks(&self, target: &EntityRef) -> &[Backlink] {
        self.by_target
            .get(target)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Relation fields of `fields` that `schema` declares, in declaration order.
fn relation_links(schema: &ClassSchema, fields: &Fields) -> Links {
    schema
        .relations()
        .iter()
        .filter_map(|rel| match fields.get(&rel.field) {
            Some(FieldValue::Reference(r)) if r.class == rel.target => {
                Some((rel.field.clone(), r.clone()))
            }
            _ => None,
        })
        .collect()
}

#[derive(Clone)]
struct Registered {
    schema: Arc<ClassSchema>,
    records: Arc<dyn ClassStore>,
}

struct StoreInner {
    backend: Arc<dyn Backend>,
    run_mode: RunMode,
    classes: RwLock<HashMap<String, Registered>>,
    links: RwLock<LinkIndex>,
}

impl StoreInner {
    fn register(&self, schema: Arc<ClassSchema>, records: Arc<dyn ClassStore>) -> StoreResult<()> {
        let snapshot = records.records()?;
        {
            let mut links = self.links.write().map_err(|_| poisoned("store.links"))?;
            links.unlink_class(schema.name());
            for record in &snapshot {
                let source = EntityRef::new(schema.name(), record.eid.clone());
                links.relink(&source, relation_links(&schema, &record.fields));
            }
        }
        self.classes
            .write()
            .map_err(|_| poisoned("store.classes"))?
            .insert(schema.name().to_string(), Registered { schema, records });
        Ok(())
    }

    fn registered(&self, class: &str) -> StoreResult<Option<Registered>> {
        Ok(self
            .classes
            .read()
            .map_err(|_| poisoned("store.classes"))?
            .get(class)
            .cloned())
    }

    /// Records of `class`, opening it without relations if nobody has
    /// registered it yet.
    fn records_of(&self, class: &str) -> StoreResult<Arc<dyn ClassStore>> {
        if let Some(registered) = self.registered(class)? {
            return Ok(registered.records);
        }
        let schema = Arc::new(ClassSchema::new(class, &[])?);
        let records = self.backend.open_class(class, false)?;
        self.register(schema, records.clone())?;
        Ok(records)
    }
}

/// An entity store: a backend plus the classes registered on it.
///
/// Cloning is cheap; clones share the same registry and backend.
///
/// # Examples
///
/// ```
/// use storekeep::{ClassOptions, Store};
///
/// let store = Store::in_memory();
/// let articles = store.create_class("article", ClassOptions::new().destroy(true))?;
///
/// let mut article = articles.new_entity();
/// article.set("title", "t")?;
/// article.set("text", "x")?;
/// assert!(article.eid().is_none());
///
/// articles.save(&mut article)?;
/// assert_eq!(article.eid().map(|e| e.as_str()), Some("a"));
///
/// let loaded = articles.get("a")?.expect("saved above");
/// assert_eq!(loaded.get("title").and_then(|v| v.as_str()), Some("t"));
/// # Ok::<(), storekeep::StoreError>(())
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Opens a store as described by `config`.
    ///
    /// # Errors
    /// - `InvalidConfig` if the configuration fails validation
    /// - `Unavailable` if a persistent backend cannot be opened, or the
    ///   crate was built without the `persistent` feature
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let config = config.validate()?;
        let run_mode = config.run_mode;
        let backend: Arc<dyn Backend> = match config.backend {
            BackendConfig::Memory => Arc::new(MemoryBackend::new()),
            #[cfg(feature = "persistent")]
            BackendConfig::Persistent { path, options } => Arc::new(
                crate::storage::PersistentBackend::open(&path, options, run_mode)?,
            ),
            #[cfg(not(feature = "persistent"))]
            BackendConfig::Persistent { .. } => {
                return Err(crate::storage::StorageError::Unavailable(
                    "persistent backend requires the `persistent` feature".to_string(),
                )
                .into())
            }
        };
        Ok(Self::with_backend(backend, run_mode))
    }

    /// An empty in-memory store with the default run mode.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()), RunMode::default())
    }

    /// A store over an existing backend.
    #[must_use]
    pub fn with_backend(backend: Arc<dyn Backend>, run_mode: RunMode) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                run_mode,
                classes: RwLock::new(HashMap::new()),
                links: RwLock::new(LinkIndex::default()),
            }),
        }
    }

    /// Creates (or reattaches to) an entity class.
    ///
    /// With `options.destroy`, previously persisted records and the
    /// identifier sequence of the class are discarded.
    ///
    /// # Errors
    /// - `InvalidClassName` / `InvalidFieldName` for malformed names
    /// - `Unavailable` if the backend cannot open the class
    pub fn create_class(&self, name: &str, options: ClassOptions) -> StoreResult<EntityClass> {
        let schema = Arc::new(ClassSchema::new(name, options.relations())?);
        let records = self
            .inner
            .backend
            .open_class(name, options.destroy)
            .map_err(|e| {
                inform!(self.inner.run_mode, ERROR, class = %name, error = %e, "failed to open entity class");
                StoreError::from(e)
            })?;
        self.inner.register(schema.clone(), records.clone())?;

        inform!(
            self.inner.run_mode,
            INFO,
            class = %name,
            backend = self.inner.backend.kind(),
            destroy = options.destroy,
            relations = schema.relations().len(),
            "entity class ready"
        );

        Ok(EntityClass {
            store: self.inner.clone(),
            schema,
            records,
        })
    }

    /// Handle for a class registered earlier.
    ///
    /// # Errors
    /// Only on a poisoned registry lock.
    pub fn class(&self, name: &str) -> StoreResult<Option<EntityClass>> {
        Ok(self.inner.registered(name)?.map(|r| EntityClass {
            store: self.inner.clone(),
            schema: r.schema,
            records: r.records,
        }))
    }

    /// Names of all registered classes, sorted.
    ///
    /// # Errors
    /// Only on a poisoned registry lock.
    pub fn class_names(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self
            .inner
            .classes
            .read()
            .map_err(|_| poisoned("store.classes"))?
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    /// Rewrites persisted state compactly. Returns the number of classes
    /// compacted (always 0 in memory).
    ///
    /// # Errors
    /// `Backend` if a snapshot cannot be written.
    pub fn compact(&self) -> StoreResult<usize> {
        let compacted = self.inner.backend.compact()?;
        inform!(self.inner.run_mode, INFO, classes = compacted, "store compacted");
        Ok(compacted)
    }

    /// Run mode this store logs with.
    #[must_use]
    pub fn run_mode(&self) -> RunMode {
        self.inner.run_mode
    }

    /// Name of the backend in use.
    #[must_use]
    pub fn backend_kind(&self) -> &'static str {
        self.inner.backend.kind()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.inner.backend.kind())
            .field("run_mode", &self.inner.run_mode)
            .finish_non_exhaustive()
    }
}

/// Handle for one entity class.
///
/// Handles are cheap to clone and share the class's storage.
#[derive(Clone)]
pub struct EntityClass {
    store: Arc<StoreInner>,
    schema: Arc<ClassSchema>,
    records: Arc<dyn ClassStore>,
}

impl EntityClass {
    /// Class name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Class definition.
    #[must_use]
    pub fn schema(&self) -> &ClassSchema {
        &self.schema
    }

    /// A new unsaved entity of this class. Touches no storage.
    #[must_use]
    pub fn new_entity(&self) -> Entity {
        Entity::new(self.name())
    }

    /// Points the relation `field` of `entity` at `target`.
    ///
    /// # Errors
    /// - `ClassMismatch` if `entity` is not of this class
    /// - `UnknownRelation` if `field` is not a declared relation
    /// - `RelationTargetMismatch` if `target` is of the wrong class
    /// - `UnsavedReference` if `target` has no identifier yet
    pub fn assign(&self, entity: &mut Entity, field: &str, target: &Entity) -> StoreResult<()> {
        self.check_class(entity)?;
        let rel = self
            .schema
            .relation(field)
            .ok_or_else(|| ValidationError::UnknownRelation {
                class: self.name().to_string(),
                name: field.to_string(),
            })?;
        if target.class() != rel.target {
            return Err(ValidationError::RelationTargetMismatch {
                class: self.name().to_string(),
                field: field.to_string(),
                expected: rel.target.clone(),
                found: target.class().to_string(),
            }
            .into());
        }
        let reference = target.reference().ok_or_else(|| ValidationError::UnsavedReference {
            class: target.class().to_string(),
        })?;
        entity.set_unchecked(field.to_string(), FieldValue::Reference(reference));
        Ok(())
    }

    /// Writes the full field snapshot of `entity`.
    ///
    /// An unsaved entity gets the next identifier of the class first; codes
    /// already taken by direct writes are skipped. A saved entity overwrites
    /// its record, which must still exist: saving an entity whose record was
    /// deleted fails and writes nothing.
    ///
    /// Returns the identifier; `entity` itself carries it afterwards.
    ///
    /// # Errors
    /// - validation errors for a foreign entity or bad relation values
    /// - `DuplicateIdentifier` if the allocated key is unexpectedly taken
    /// - `NotFound` if a saved entity's record has been deleted
    /// - `Backend` / `Serialization` on write failure
    pub fn save(&self, entity: &mut Entity) -> StoreResult<Eid> {
        let result = self.save_inner(entity);
        self.report("save", result)
    }

    fn save_inner(&self, entity: &mut Entity) -> StoreResult<Eid> {
        self.check_class(entity)?;
        self.validate_fields(entity.fields())?;

        let eid = if let Some(eid) = entity.eid() {
            let eid = eid.clone();
            self.records
                .replace(Record::new(eid.clone(), entity.fields().clone()))?;
            eid
        } else {
            let eid = self.allocate()?;
            self.records
                .insert(Record::new(eid.clone(), entity.fields().clone()))?;
            entity.assign_eid(eid.clone());
            eid
        };

        self.relink(&eid, entity.fields())?;
        inform!(self.store.run_mode, DEBUG, class = %self.name(), eid = %eid, "entity saved");
        Ok(eid)
    }

    fn allocate(&self) -> StoreResult<Eid> {
        loop {
            let eid = Eid::from_sequence(self.records.advance_sequence()?);
            if !self.records.contains(&eid)? {
                return Ok(eid);
            }
            inform!(
                self.store.run_mode,
                DEBUG,
                class = %self.name(),
                eid = %eid,
                "identifier taken by a direct write, skipping"
            );
        }
    }

    /// Loads the entity stored under `eid`.
    ///
    /// Relation fields come back as references; use
    /// [`related`](Self::related) to follow them.
    ///
    /// # Errors
    /// Backend read failure. A missing key is `Ok(None)`.
    pub fn get(&self, eid: impl AsRef<str>) -> StoreResult<Option<Entity>> {
        let result = self
            .records
            .get(&Eid::new(eid.as_ref()))
            .map(|r| r.map(|r| Entity::from_record(self.name(), r.eid, r.fields)))
            .map_err(StoreError::from);
        self.report("get", result)
    }

    /// Stores `fields` under `eid` directly, bypassing identifier allocation.
    ///
    /// # Errors
    /// - `InvalidFieldName` / relation validation errors
    /// - `Backend` / `Serialization` on write failure
    pub fn put(&self, eid: impl Into<Eid>, fields: Fields) -> StoreResult<Entity> {
        let eid = eid.into();
        let result = self.put_inner(eid, fields);
        self.report("put", result)
    }

    fn put_inner(&self, eid: Eid, fields: Fields) -> StoreResult<Entity> {
        self.validate_fields(&fields)?;
        self.records.upsert(Record::new(eid.clone(), fields.clone()))?;
        self.relink(&eid, &fields)?;
        inform!(self.store.run_mode, DEBUG, class = %self.name(), eid = %eid, "entity stored");
        Ok(Entity::from_record(self.name(), eid, fields))
    }

    /// Removes the record under `eid`. Returns whether one existed;
    /// deleting a missing key is not an error.
    ///
    /// # Errors
    /// Backend write failure.
    pub fn delete(&self, eid: impl AsRef<str>) -> StoreResult<bool> {
        let eid = Eid::new(eid.as_ref());
        let result = self.delete_inner(&eid);
        self.report("delete", result)
    }

    fn delete_inner(&self, eid: &Eid) -> StoreResult<bool> {
        if !self.records.remove(eid)? {
            return Ok(false);
        }
        self.store
            .links
            .write()
            .map_err(|_| poisoned("store.links"))?
            .unlink(&EntityRef::new(self.name(), eid.clone()));
        inform!(self.store.run_mode, DEBUG, class = %self.name(), eid = %eid, "entity deleted");
        Ok(true)
    }

    /// All identifiers, in insertion order.
    ///
    /// # Errors
    /// Backend read failure.
    pub fn keys(&self) -> StoreResult<Vec<Eid>> {
        Ok(self.records.keys()?)
    }

    /// All entities, in insertion order.
    ///
    /// # Errors
    /// Backend read failure.
    pub fn all(&self) -> StoreResult<Vec<Entity>> {
        Ok(self
            .records
            .records()?
            .into_iter()
            .map(|r| Entity::from_record(self.name(), r.eid, r.fields))
            .collect())
    }

    /// Number of stored entities.
    ///
    /// # Errors
    /// Backend read failure.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.records.len()?)
    }

    /// Returns true if the class holds no entities.
    ///
    /// # Errors
    /// Backend read failure.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns true if a record exists under `eid`.
    ///
    /// # Errors
    /// Backend read failure.
    pub fn contains(&self, eid: impl AsRef<str>) -> StoreResult<bool> {
        Ok(self.records.contains(&Eid::new(eid.as_ref()))?)
    }

    /// Deletes every entity. The identifier sequence continues where it was.
    ///
    /// # Errors
    /// Backend write failure.
    pub fn clear(&self) -> StoreResult<()> {
        let result = self.clear_inner();
        self.report("clear", result)
    }

    fn clear_inner(&self) -> StoreResult<()> {
        self.records.clear()?;
        self.store
            .links
            .write()
            .map_err(|_| poisoned("store.links"))?
            .unlink_class(self.name());
        inform!(self.store.run_mode, DEBUG, class = %self.name(), "entity class cleared");
        Ok(())
    }

    /// Follows the relation `name` from `entity`.
    ///
    /// `name` is either a relation declared on this class (yielding the
    /// referenced entity) or a back-reference exposed by another class's
    /// relation (yielding the first entity, in link order, pointing here).
    /// A reference to a deleted entity yields `None`.
    ///
    /// # Errors
    /// `UnknownRelation` if `name` is neither; backend read failure.
    pub fn related(&self, entity: &Entity, name: &str) -> StoreResult<Option<Entity>> {
        self.check_class(entity)?;
        if let Some(rel) = self.schema.relation(name) {
            let Some(FieldValue::Reference(target)) = entity.get(&rel.field) else {
                return Ok(None);
            };
            let records = self.store.records_of(&target.class)?;
            return Ok(records
                .get(&target.eid)?
                .map(|r| Entity::from_record(target.class.clone(), r.eid, r.fields)));
        }
        Ok(self.back_references(entity, name)?.into_iter().next())
    }

    /// All entities whose relations expose `name` on this class and point
    /// at `entity`, in link order. An unsaved entity has none.
    ///
    /// # Errors
    /// `UnknownRelation` if no registered class exposes `name` here.
    pub fn back_references(&self, entity: &Entity, name: &str) -> StoreResult<Vec<Entity>> {
        self.check_class(entity)?;

        // (source class, relation field) → that class's records
        let mut sources: Vec<(String, String, Arc<dyn ClassStore>)> = Vec::new();
        {
            let classes = self
                .store
                .classes
                .read()
                .map_err(|_| poisoned("store.classes"))?;
            for registered in classes.values() {
                for rel in registered.schema.back_relations(self.name(), name) {
                    sources.push((
                        registered.schema.name().to_string(),
                        rel.field.clone(),
                        registered.records.clone(),
                    ));
                }
            }
        }
        if sources.is_empty() {
            return Err(ValidationError::UnknownRelation {
                class: self.name().to_string(),
                name: name.to_string(),
            }
            .into());
        }

        let Some(target) = entity.reference() else {
            return Ok(Vec::new());
        };

        let hits: Vec<(EntityRef, Arc<dyn ClassStore>)> = {
            let links = self.store.links.read().map_err(|_| poisoned("store.links"))?;
            links
                .backlinks(&target)
                .iter()
                .filter_map(|b| {
                    sources
                        .iter()
                        .find(|(class, field, _)| *class == b.source.class && *field == b.field)
                        .map(|(_, _, records)| (b.source.clone(), records.clone()))
                })
                .collect()
        };

        let mut out = Vec::with_capacity(hits.len());
        for (source, records) in hits {
            if let Some(r) = records.get(&source.eid)? {
                out.push(Entity::from_record(source.class, r.eid, r.fields));
            }
        }
        Ok(out)
    }

    fn check_class(&self, entity: &Entity) -> StoreResult<()> {
        if entity.class() == self.name() {
            Ok(())
        } else {
            Err(ValidationError::ClassMismatch {
                expected: self.name().to_string(),
                found: entity.class().to_string(),
            }
            .into())
        }
    }

    /// Field names must be valid and references may only sit in declared
    /// relation fields pointing at the declared class.
    fn validate_fields(&self, fields: &Fields) -> StoreResult<()> {
        for (name, value) in fields {
            schema::validate_field_name(name)?;
            let FieldValue::Reference(r) = value else {
                continue;
            };
            let Some(rel) = self.schema.relation(name) else {
                return Err(ValidationError::UnknownRelation {
                    class: self.name().to_string(),
                    name: name.clone(),
                }
                .into());
            };
            if r.class != rel.target {
                return Err(ValidationError::RelationTargetMismatch {
                    class: self.name().to_string(),
                    field: name.clone(),
                    expected: rel.target.clone(),
                    found: r.class.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn relink(&self, eid: &Eid, fields: &Fields) -> StoreResult<()> {
        let source = EntityRef::new(self.name(), eid.clone());
        self.store
            .links
            .write()
            .map_err(|_| poisoned("store.links"))?
            .relink(&source, relation_links(&self.schema, fields));
        Ok(())
    }

    /// Logs a failed operation before handing the error back.
    fn report<T>(&self, op: &'static str, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(e) = &result {
            if e.is_storage() {
                inform!(self.store.run_mode, ERROR, class = %self.name(), op = op, error = %e, "store operation failed");
            } else {
                inform!(self.store.run_mode, DEBUG, class = %self.name(), op = op, error = %e, "store operation rejected");
            }
        }
        result
    }
}

impl fmt::Debug for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityClass")
            .field("name", &self.name())
            .field("relations", &self.schema.relations())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, FieldValue)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_link_index_relink_keeps_position() {
        let mut index = LinkIndex::default();
        let author = EntityRef::new("author", Eid::new("a"));
        let first = EntityRef::new("article", Eid::new("a"));
        let second = EntityRef::new("article", Eid::new("b"));

        index.relink(&first, vec![("author".to_string(), author.clone())]);
        index.relink(&second, vec![("author".to_string(), author.clone())]);
        index.relink(&first, vec![("author".to_string(), author.clone())]);

        let sources: Vec<&str> = index
            .backlinks(&author)
            .iter()
            .map(|b| b.source.eid.as_str())
            .collect();
        assert_eq!(sources, ["a", "b"]);
    }

    #[test]
    fn test_link_index_unlink() {
        let mut index = LinkIndex::default();
        let author = EntityRef::new("author", Eid::new("a"));
        let article = EntityRef::new("article", Eid::new("a"));
        index.relink(&article, vec![("author".to_string(), author.clone())]);
        index.unlink(&article);
        assert!(index.backlinks(&author).is_empty());
        assert!(index.by_source.is_empty());
        assert!(index.by_target.is_empty());
    }

    #[test]
    fn test_link_index_retarget() {
        let mut index = LinkIndex::default();
        let one = EntityRef::new("author", Eid::new("a"));
        let two = EntityRef::new("author", Eid::new("b"));
        let article = EntityRef::new("article", Eid::new("a"));
        index.relink(&article, vec![("author".to_string(), one.clone())]);
        index.relink(&article, vec![("author".to_string(), two.clone())]);
        assert!(index.backlinks(&one).is_empty());
        assert_eq!(index.backlinks(&two).len(), 1);
    }

    #[test]
    fn test_relation_links_ignore_undeclared_and_mismatched() {
        let options = ClassOptions::new().relation("author", "author");
        let schema = ClassSchema::new("article", options.relations()).unwrap();
        let f = fields(&[
            ("author", FieldValue::from(EntityRef::new("editor", Eid::new("a")))),
            ("title", FieldValue::from("t")),
        ]);
        assert!(relation_links(&schema, &f).is_empty());

        let f = fields(&[("author", FieldValue::from(EntityRef::new("author", Eid::new("c"))))]);
        assert_eq!(relation_links(&schema, &f).len(), 1);
    }

    #[test]
    fn test_store_debug() {
        let store = Store::in_memory();
        let shown = format!("{store:?}");
        assert!(shown.contains("memory"));
        let class = store.create_class("article", ClassOptions::new()).unwrap();
        assert!(format!("{class:?}").contains("article"));
    }

    #[test]
    fn test_debug_mode_logs_each_write() {
        use crate::logging::capture::{capture, messages_at};
        use tracing::Level;

        let events = capture(|| {
            let store = Store::with_backend(Arc::new(MemoryBackend::new()), RunMode::Debug);
            let notes = store.create_class("note", ClassOptions::new()).unwrap();
            let mut note = notes.new_entity();
            let eid = notes.save(&mut note).unwrap();
            notes.put("custom", Fields::new()).unwrap();
            notes.delete(&eid).unwrap();
            assert!(notes.save(&mut note).is_err());
        });

        assert_eq!(messages_at(&events, Level::INFO), ["entity class ready"]);
        assert_eq!(
            messages_at(&events, Level::DEBUG),
            ["entity saved", "entity stored", "entity deleted"]
        );
        assert_eq!(messages_at(&events, Level::ERROR), ["store operation failed"]);
    }

    #[test]
    fn test_silent_and_live_modes_stay_quiet() {
        use crate::logging::capture::capture;

        for mode in [RunMode::Silent, RunMode::Live] {
            let events = capture(|| {
                let store = Store::with_backend(Arc::new(MemoryBackend::new()), mode);
                let notes = store.create_class("note", ClassOptions::new()).unwrap();
                let eid = notes.save(&mut notes.new_entity()).unwrap();
                notes.delete(&eid).unwrap();
            });
            assert!(events.is_empty(), "{mode} emitted {events:?}");
        }
    }

    #[test]
    fn test_class_lookup() {
        let store = Store::in_memory();
        assert!(store.class("article").unwrap().is_none());
        store.create_class("author", ClassOptions::new()).unwrap();
        store.create_class("article", ClassOptions::new()).unwrap();
        assert!(store.class("article").unwrap().is_some());
        assert_eq!(store.class_names().unwrap(), ["article", "author"]);
    }
}
