//! Class definitions: names, options, and declared relations.
//!
//! Relations are declared when a class is created, never inferred from the
//! values later assigned. A relation `article.author -> author` lets an
//! article hold a reference to an author and makes every author expose a
//! back-reference named `article`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

static CLASS_NAME: OnceLock<Regex> = OnceLock::new();
static FIELD_NAME: OnceLock<Regex> = OnceLock::new();

fn class_name_regex() -> &'static Regex {
    CLASS_NAME.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("static class name regex"))
}

fn field_name_regex() -> &'static Regex {
    FIELD_NAME.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static field name regex"))
}

/// Checks that `name` can be used as a class name.
///
/// # Errors
/// `InvalidClassName` unless the name matches `[a-z][a-z0-9_]*`.
pub fn validate_class_name(name: &str) -> Result<(), ValidationError> {
    if class_name_regex().is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidClassName {
            name: name.to_string(),
        })
    }
}

/// Checks that `name` can be used as a field name.
///
/// # Errors
/// `InvalidFieldName` unless the name matches `[a-z_][a-z0-9_]*`.
pub fn validate_field_name(name: &str) -> Result<(), ValidationError> {
    if field_name_regex().is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFieldName {
            name: name.to_string(),
        })
    }
}

/// Singular form of a class name, used for default back-reference names.
///
/// ```
/// use storekeep::schema::singularize;
///
/// assert_eq!(singularize("article"), "article");
/// assert_eq!(singularize("articles"), "article");
/// assert_eq!(singularize("categories"), "category");
/// assert_eq!(singularize("address"), "address");
/// ```
#[must_use]
pub fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    if name.ends_with("ss") {
        return name.to_string();
    }
    match name.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

/// A declared reference field from one class to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Field on the declaring class that holds the reference.
    pub field: String,
    /// Class of the referenced entities.
    pub target: String,
    /// Back-reference name exposed by the target; defaults to the singular
    /// form of the declaring class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_name: Option<String>,
}

/// Options accepted by [`Store::create_class`](crate::Store::create_class).
#[derive(Debug, Clone, Default)]
pub struct ClassOptions {
    /// Drop any previously persisted state for the class.
    pub destroy: bool,
    relations: Vec<Relation>,
}

impl ClassOptions {
    /// Default options: keep existing data, no relations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether existing data is destroyed on creation.
    #[must_use]
    pub const fn destroy(mut self, destroy: bool) -> Self {
        self.destroy = destroy;
        self
    }

    /// Declares `field` as a reference to entities of `target`.
    #[must_use]
    pub fn relation(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.relations.push(Relation {
            field: field.into(),
            target: target.into(),
            back_name: None,
        });
        self
    }

    /// Like [`relation`](Self::relation) with an explicit back-reference name.
    #[must_use]
    pub fn relation_as(
        mut self,
        field: impl Into<String>,
        target: impl Into<String>,
        back_name: impl Into<String>,
    ) -> Self {
        self.relations.push(Relation {
            field: field.into(),
            target: target.into(),
            back_name: Some(back_name.into()),
        });
        self
    }

    /// Declared relations.
    #[must_use]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }
}

/// The resolved definition of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSchema {
    name: String,
    relations: Vec<Relation>,
}

impl ClassSchema {
    /// Validates names and fills in default back-reference names.
    ///
    /// # Errors
    /// `InvalidClassName` / `InvalidFieldName` for malformed names.
    pub fn new(name: &str, relations: &[Relation]) -> Result<Self, ValidationError> {
        validate_class_name(name)?;
        let mut resolved = Vec::with_capacity(relations.len());
        for rel in relations {
            validate_field_name(&rel.field)?;
            validate_class_name(&rel.target)?;
            let back_name = rel.back_name.clone().unwrap_or_else(|| singularize(name));
            validate_field_name(&back_name)?;
            resolved.push(Relation {
                field: rel.field.clone(),
                target: rel.target.clone(),
                back_name: Some(back_name),
            });
        }
        Ok(Self {
            name: name.to_string(),
            relations: resolved,
        })
    }

    /// Class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared relations, back-reference names filled in.
    #[must_use]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// The relation declared on `field`, if any.
    #[must_use]
    pub fn relation(&self, field: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.field == field)
    }

    /// Relations of this class pointing at `target` and exposed there as
    /// `back_name`.
    pub fn back_relations<'a>(
        &'a self,
        target: &'a str,
        back_name: &'a str,
    ) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations
            .iter()
            .filter(move |r| r.target == target && r.back_name.as_deref() == Some(back_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_names() {
        assert!(validate_class_name("article").is_ok());
        assert!(validate_class_name("blog_post2").is_ok());
        assert!(validate_class_name("").is_err());
        assert!(validate_class_name("Article").is_err());
        assert!(validate_class_name("_hidden").is_err());
        assert!(validate_class_name("../etc").is_err());
    }

    #[test]
    fn test_field_names() {
        assert!(validate_field_name("title").is_ok());
        assert!(validate_field_name("_private").is_ok());
        assert!(validate_field_name("2fast").is_err());
        assert!(validate_field_name("has space").is_err());
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("authors"), "author");
        assert_eq!(singularize("entries"), "entry");
        assert_eq!(singularize("class"), "class");
        assert_eq!(singularize("s"), "s");
        assert_eq!(singularize("ies"), "ie");
    }

    #[test]
    fn test_default_back_name() {
        let options = ClassOptions::new().relation("author", "author");
        let schema = ClassSchema::new("articles", options.relations()).unwrap();
        let rel = schema.relation("author").unwrap();
        assert_eq!(rel.back_name.as_deref(), Some("article"));
    }

    #[test]
    fn test_explicit_back_name() {
        let options = ClassOptions::new().relation_as("writer", "author", "work");
        let schema = ClassSchema::new("article", options.relations()).unwrap();
        assert_eq!(schema.back_relations("author", "work").count(), 1);
        assert_eq!(schema.back_relations("author", "article").count(), 0);
    }

    #[test]
    fn test_rejects_bad_relation_names() {
        let options = ClassOptions::new().relation("Author", "author");
        assert!(ClassSchema::new("article", options.relations()).is_err());

        let options = ClassOptions::new().relation("author", "Author");
        assert!(ClassSchema::new("article", options.relations()).is_err());
    }

    #[test]
    fn test_destroy_flag() {
        assert!(!ClassOptions::new().destroy);
        assert!(ClassOptions::new().destroy(true).destroy);
    }
}
