//! Entities and their dynamic fields.
//!
//! An entity starts unsaved, without an identifier. Saving it through its
//! [`EntityClass`](crate::EntityClass) assigns an [`Eid`] exactly once;
//! field content stays mutable until the entity is deleted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::eid::Eid;
use crate::error::ValidationError;
use crate::schema;
use crate::value::{EntityRef, FieldValue};

/// Field name → value mapping of an entity.
pub type Fields = BTreeMap<String, FieldValue>;

/// An instance of an entity class.
///
/// # Examples
///
/// ```
/// use storekeep::{Store, ClassOptions};
///
/// let store = Store::in_memory();
/// let articles = store.create_class("article", ClassOptions::new())?;
/// let mut article = articles.new_entity();
/// article.set("title", "the article")?;
/// assert!(article.eid().is_none());
/// assert_eq!(article.get("title").and_then(|v| v.as_str()), Some("the article"));
/// # Ok::<(), storekeep::StoreError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    eid: Option<Eid>,
    #[serde(default)]
    fields: Fields,
}

impl Entity {
    pub(crate) fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            eid: None,
            fields: Fields::new(),
        }
    }

    pub(crate) fn from_record(class: impl Into<String>, eid: Eid, fields: Fields) -> Self {
        Self {
            class: class.into(),
            eid: Some(eid),
            fields,
        }
    }

    /// Name of the class this entity belongs to.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Identifier, once saved.
    #[must_use]
    pub const fn eid(&self) -> Option<&Eid> {
        self.eid.as_ref()
    }

    /// Returns true if the entity has been assigned an identifier.
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        self.eid.is_some()
    }

    /// Sets a scalar or structured field.
    ///
    /// Entity references go through
    /// [`EntityClass::assign`](crate::EntityClass::assign) so that the
    /// relation declaration can be checked.
    ///
    /// # Errors
    /// `InvalidFieldName` if `field` is not a valid identifier.
    pub fn set(
        &mut self,
        field: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<(), ValidationError> {
        let field = field.into();
        schema::validate_field_name(&field)?;
        self.fields.insert(field, value.into());
        Ok(())
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Removes a field, returning its previous value.
    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    /// All fields of this entity.
    #[must_use]
    pub const fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Consumes the entity, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// A reference to this entity, if it has been saved.
    #[must_use]
    pub fn reference(&self) -> Option<EntityRef> {
        self.eid
            .as_ref()
            .map(|eid| EntityRef::new(self.class.clone(), eid.clone()))
    }

    pub(crate) fn assign_eid(&mut self, eid: Eid) {
        debug_assert!(self.eid.is_none(), "eid is assigned once");
        self.eid = Some(eid);
    }

    pub(crate) fn set_unchecked(&mut self, field: String, value: FieldValue) {
        self.fields.insert(field, value);
    }
}
