//! End-to-end tests for the entity store over the in-memory backend.

use storekeep::{
    ClassOptions, Eid, EntityRef, FieldValue, Fields, RunMode, StorageError, Store, StoreConfig,
    StoreError, ValidationError,
};

fn store() -> Store {
    Store::open(StoreConfig::in_memory().with_run_mode(RunMode::Silent)).unwrap()
}

fn fields(pairs: &[(&str, FieldValue)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

#[test]
fn test_article_scenario() {
    let store = store();
    let articles = store
        .create_class("article", ClassOptions::new().destroy(true))
        .unwrap();

    let mut article = articles.new_entity();
    article.set("title", "t").unwrap();
    article.set("text", "x").unwrap();
    assert!(article.eid().is_none());

    let eid = articles.save(&mut article).unwrap();
    assert_eq!(eid.as_str(), "a");
    assert_eq!(article.eid(), Some(&eid));

    let reloaded = articles.get("a").unwrap().unwrap();
    assert_eq!(reloaded.get("title").and_then(FieldValue::as_str), Some("t"));
    assert_eq!(reloaded.get("text").and_then(FieldValue::as_str), Some("x"));
}

#[test]
fn test_eid_stable_under_repeated_saves() {
    let store = store();
    let notes = store.create_class("note", ClassOptions::new()).unwrap();

    let mut note = notes.new_entity();
    let first = notes.save(&mut note).unwrap();
    note.set("body", "edited").unwrap();
    let second = notes.save(&mut note).unwrap();

    assert_eq!(first, second);
    assert_eq!(notes.len().unwrap(), 1);
    let stored = notes.get(&first).unwrap().unwrap();
    assert_eq!(stored.get("body").and_then(FieldValue::as_str), Some("edited"));
}

#[test]
fn test_allocation_follows_sequence() {
    let store = store();
    let notes = store.create_class("note", ClassOptions::new()).unwrap();

    let mut eids = Vec::new();
    for _ in 0..28 {
        eids.push(notes.save(&mut notes.new_entity()).unwrap());
    }
    assert_eq!(eids[0].as_str(), "a");
    assert_eq!(eids[1].as_str(), "b");
    assert_eq!(eids[25].as_str(), "z");
    assert_eq!(eids[26].as_str(), "aa");
    assert_eq!(eids[27].as_str(), "ab");
}

#[test]
fn test_round_trip_field_values() {
    let store = store();
    let things = store.create_class("thing", ClassOptions::new()).unwrap();

    let mut thing = things.new_entity();
    thing.set("flag", true).unwrap();
    thing.set("count", 42).unwrap();
    thing.set("ratio", 0.5).unwrap();
    thing.set("name", "widget").unwrap();
    thing.set("meta", serde_json::json!({"tags": ["a", "b"]})).unwrap();
    thing.set("nothing", FieldValue::Null).unwrap();
    let eid = things.save(&mut thing).unwrap();

    let loaded = things.get(&eid).unwrap().unwrap();
    assert_eq!(loaded.fields(), thing.fields());
    assert_eq!(loaded, thing);
}

#[test]
fn test_delete() {
    let store = store();
    let notes = store.create_class("note", ClassOptions::new()).unwrap();
    let eid = notes.save(&mut notes.new_entity()).unwrap();

    assert!(notes.delete(&eid).unwrap());
    assert!(notes.get(&eid).unwrap().is_none());
    assert!(!notes.delete("foo").unwrap());
    assert!(!notes.delete(&eid).unwrap());

    // Deleted codes are not reused
    assert_eq!(notes.save(&mut notes.new_entity()).unwrap().as_str(), "b");
}

#[test]
fn test_save_after_delete_does_not_resurrect() {
    let store = store();
    let notes = store.create_class("note", ClassOptions::new()).unwrap();

    let mut note = notes.new_entity();
    note.set("title", "t").unwrap();
    let eid = notes.save(&mut note).unwrap();
    assert!(notes.delete(&eid).unwrap());

    note.set("title", "again").unwrap();
    let err = notes.save(&mut note).unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, StoreError::Storage(StorageError::NotFound(_))));
    assert!(notes.get(&eid).unwrap().is_none());
    assert!(notes.is_empty().unwrap());

    // The stale handle keeps its identifier; fresh entities move on
    assert_eq!(note.eid(), Some(&eid));
    assert_eq!(notes.save(&mut notes.new_entity()).unwrap().as_str(), "b");
}

#[test]
fn test_emptiness_and_order() {
    let store = store();
    let notes = store
        .create_class("note", ClassOptions::new().destroy(true))
        .unwrap();
    assert!(notes.keys().unwrap().is_empty());
    assert!(notes.all().unwrap().is_empty());
    assert!(notes.is_empty().unwrap());

    for i in 0..5 {
        let mut note = notes.new_entity();
        note.set("n", i).unwrap();
        notes.save(&mut note).unwrap();
    }
    assert_eq!(notes.keys().unwrap().len(), 5);
    let numbers: Vec<i64> = notes
        .all()
        .unwrap()
        .iter()
        .filter_map(|e| e.get("n").and_then(FieldValue::as_int))
        .collect();
    assert_eq!(numbers, [0, 1, 2, 3, 4]);

    // Recreating with destroy empties the class and restarts the sequence
    let notes = store
        .create_class("note", ClassOptions::new().destroy(true))
        .unwrap();
    assert!(notes.keys().unwrap().is_empty());
    assert_eq!(notes.save(&mut notes.new_entity()).unwrap().as_str(), "a");
}

#[test]
fn test_recreate_without_destroy_reattaches() {
    let store = store();
    let notes = store.create_class("note", ClassOptions::new()).unwrap();
    notes.save(&mut notes.new_entity()).unwrap();

    let again = store.create_class("note", ClassOptions::new()).unwrap();
    assert_eq!(again.len().unwrap(), 1);
    assert_eq!(again.save(&mut again.new_entity()).unwrap().as_str(), "b");
}

#[test]
fn test_clear_keeps_sequence() {
    let store = store();
    let notes = store.create_class("note", ClassOptions::new()).unwrap();
    notes.save(&mut notes.new_entity()).unwrap();
    notes.save(&mut notes.new_entity()).unwrap();

    notes.clear().unwrap();
    assert!(notes.is_empty().unwrap());
    assert_eq!(notes.save(&mut notes.new_entity()).unwrap().as_str(), "c");
}

#[test]
fn test_put_direct_write_and_allocation_skip() {
    let store = store();
    let notes = store.create_class("note", ClassOptions::new()).unwrap();

    let stored = notes
        .put("a", fields(&[("body", FieldValue::from("direct"))]))
        .unwrap();
    assert_eq!(stored.eid().map(Eid::as_str), Some("a"));
    notes
        .put("custom_key", fields(&[("body", FieldValue::from("x"))]))
        .unwrap();

    // "a" is taken, so allocation moves on
    let eid = notes.save(&mut notes.new_entity()).unwrap();
    assert_eq!(eid.as_str(), "b");
    let keys: Vec<String> = notes.keys().unwrap().iter().map(ToString::to_string).collect();
    assert_eq!(keys, ["a", "custom_key", "b"]);

    // put overwrites in place
    notes
        .put("a", fields(&[("body", FieldValue::from("again"))]))
        .unwrap();
    let again = notes.get("a").unwrap().unwrap();
    assert_eq!(again.get("body").and_then(FieldValue::as_str), Some("again"));
    assert_eq!(notes.keys().unwrap()[0].as_str(), "a");
}

#[test]
fn test_put_rejects_bad_fields() {
    let store = store();
    let notes = store.create_class("note", ClassOptions::new()).unwrap();

    let err = notes
        .put("a", fields(&[("Bad Name", FieldValue::from(1))]))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::InvalidFieldName { .. })
    ));

    let reference = FieldValue::from(EntityRef::new("author", Eid::new("a")));
    let err = notes
        .put("a", fields(&[("author", reference)]))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::UnknownRelation { .. })
    ));
    assert!(notes.is_empty().unwrap());
}

#[test]
fn test_relation_symmetry() {
    let store = store();
    let authors = store.create_class("author", ClassOptions::new()).unwrap();
    let articles = store
        .create_class("article", ClassOptions::new().relation("author", "author"))
        .unwrap();

    let mut author = authors.new_entity();
    author.set("name", "manveru").unwrap();
    authors.save(&mut author).unwrap();

    let mut article = articles.new_entity();
    article.set("title", "Hello").unwrap();
    articles.assign(&mut article, "author", &author).unwrap();
    let article_eid = articles.save(&mut article).unwrap();

    // Independent reload of both sides
    let author = authors.get(author.eid().unwrap()).unwrap().unwrap();
    let article = articles.get(&article_eid).unwrap().unwrap();

    let forward = articles.related(&article, "author").unwrap().unwrap();
    assert_eq!(forward.eid(), author.eid());

    let back = authors.related(&author, "article").unwrap().unwrap();
    assert_eq!(back.eid(), Some(&article_eid));
    assert_eq!(back.class(), "article");
}

#[test]
fn test_back_references_in_order_and_after_delete() {
    let store = store();
    let authors = store.create_class("author", ClassOptions::new()).unwrap();
    let articles = store
        .create_class(
            "article",
            ClassOptions::new().relation_as("writer", "author", "work"),
        )
        .unwrap();

    let mut author = authors.new_entity();
    authors.save(&mut author).unwrap();

    for title in ["one", "two", "three"] {
        let mut article = articles.new_entity();
        article.set("title", title).unwrap();
        articles.assign(&mut article, "writer", &author).unwrap();
        articles.save(&mut article).unwrap();
    }

    let titles = |store_author: &storekeep::Entity| -> Vec<String> {
        authors
            .back_references(store_author, "work")
            .unwrap()
            .iter()
            .filter_map(|e| e.get("title").and_then(FieldValue::as_str).map(str::to_string))
            .collect()
    };
    assert_eq!(titles(&author), ["one", "two", "three"]);

    articles.delete("a").unwrap();
    assert_eq!(titles(&author), ["two", "three"]);

    // Unlinking a source removes it from the back-references
    let mut second = articles.get("b").unwrap().unwrap();
    second.remove("writer");
    articles.save(&mut second).unwrap();
    assert_eq!(titles(&author), ["three"]);

    // The default back-reference name is not exposed when overridden
    let err = authors.related(&author, "article").unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::UnknownRelation { .. })
    ));
}

#[test]
fn test_dangling_reference_is_absent() {
    let store = store();
    let authors = store.create_class("author", ClassOptions::new()).unwrap();
    let articles = store
        .create_class("article", ClassOptions::new().relation("author", "author"))
        .unwrap();

    let mut author = authors.new_entity();
    authors.save(&mut author).unwrap();
    let mut article = articles.new_entity();
    articles.assign(&mut article, "author", &author).unwrap();
    articles.save(&mut article).unwrap();

    authors.delete(author.eid().unwrap()).unwrap();
    assert!(articles.related(&article, "author").unwrap().is_none());
}

#[test]
fn test_unset_relation_and_unsaved_entity() {
    let store = store();
    let authors = store.create_class("author", ClassOptions::new()).unwrap();
    let articles = store
        .create_class("article", ClassOptions::new().relation("author", "author"))
        .unwrap();

    let article = articles.new_entity();
    assert!(articles.related(&article, "author").unwrap().is_none());

    let author = authors.new_entity();
    assert!(authors.back_references(&author, "article").unwrap().is_empty());
}

#[test]
fn test_assign_validation() {
    let store = store();
    let authors = store.create_class("author", ClassOptions::new()).unwrap();
    let editors = store.create_class("editor", ClassOptions::new()).unwrap();
    let articles = store
        .create_class("article", ClassOptions::new().relation("author", "author"))
        .unwrap();

    let mut article = articles.new_entity();

    let unsaved = authors.new_entity();
    let err = articles.assign(&mut article, "author", &unsaved).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::UnsavedReference { .. })
    ));

    let mut editor = editors.new_entity();
    editors.save(&mut editor).unwrap();
    let err = articles.assign(&mut article, "author", &editor).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::RelationTargetMismatch { .. })
    ));

    let err = articles.assign(&mut article, "editor", &editor).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::UnknownRelation { .. })
    ));

    let mut foreign = authors.new_entity();
    let err = articles.save(&mut foreign).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::ClassMismatch { .. })
    ));
    assert!(foreign.eid().is_none());
}

#[test]
fn test_invalid_class_name() {
    let store = store();
    let err = store.create_class("Article", ClassOptions::new()).unwrap_err();
    assert!(err.is_validation());
    assert!(store.class_names().unwrap().is_empty());
}

#[test]
fn test_class_handles_share_state() {
    let store = store();
    let notes = store.create_class("note", ClassOptions::new()).unwrap();
    let handle = store.class("note").unwrap().unwrap();
    notes.save(&mut notes.new_entity()).unwrap();
    assert!(handle.contains("a").unwrap());
    assert_eq!(store.compact().unwrap(), 0);
}

#[cfg(not(feature = "persistent"))]
#[test]
fn test_persistent_config_without_feature() {
    let err = Store::open(StoreConfig::persistent("unused")).unwrap_err();
    assert!(matches!(err, StoreError::Storage(StorageError::Unavailable(_))));
}

#[test]
fn test_storage_error_classification() {
    let err = StoreError::from(StorageError::DuplicateIdentifier("a".to_string()));
    assert!(err.is_storage());
    assert!(!err.is_retryable());
}
