//! Entity and attribute instances.
//!
//! An entity is created from exactly one entity template and owns attribute
//! instances mirroring that template's attribute templates. Trait attributes are
//! nested under the measured attribute they describe.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::TraitKind;
use crate::event::EventId;
use crate::template::{split_path, AttributeTemplateId, DataSource, TemplateId};
use crate::value::ValueType;

/// Globally unique, stable entity identifier.
///
/// # Examples
///
/// ```
/// use traitlens::EntityId;
///
/// let id = EntityId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an attribute instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeId(Uuid);

impl AttributeId {
    /// Creates a new random attribute ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttributeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an attribute instance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AttributeOwner {
    /// A monitored entity.
    Entity(EntityId),
    /// A detected event.
    Event(EventId),
}

/// A concrete attribute on an entity or event.
///
/// Snapshots include direct children, so trait lookups on a returned attribute
/// need no further store calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Unique identifier.
    pub id: AttributeId,
    pub owner: AttributeOwner,
    /// Name of the owning entity or event.
    pub subject_name: String,
    /// Parent attribute for nested (trait) attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<AttributeId>,
    /// Attribute template this instance was created from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<AttributeTemplateId>,
    pub name: String,
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trait_kind: Option<TraitKind>,
    #[serde(default)]
    pub source: DataSource,
    #[serde(default)]
    pub is_configuration_item: bool,
    /// Direct children at the time of the snapshot.
    #[serde(default)]
    pub children: Vec<Attribute>,
}

impl Attribute {
    /// Returns true if this attribute carries a trait.
    #[must_use]
    pub const fn is_trait(&self) -> bool {
        self.trait_kind.is_some()
    }

    /// Direct child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Attribute> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// A concrete instance created from an entity template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Globally unique identifier.
    pub id: EntityId,
    pub name: String,
    /// Template this entity was created from.
    pub template: TemplateId,
    pub created_at: DateTime<Utc>,
    /// Top-level attributes.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Entity {
    /// Top-level attribute with the given name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Resolves a relative path such as `Temperature|LimitHi`.
    ///
    /// A path without separators is a top-level lookup.
    #[must_use]
    pub fn attribute_by_path(&self, path: &str) -> Option<&Attribute> {
        let mut segments = split_path(path).into_iter();
        let mut current = self.attribute(segments.next()?)?;
        for segment in segments {
            current = current.child(segment)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(entity: &EntityId, parent: Option<AttributeId>, name: &str, kind: Option<TraitKind>) -> Attribute {
        Attribute {
            id: AttributeId::new(),
            owner: AttributeOwner::Entity(*entity),
            subject_name: "Location7".to_string(),
            parent,
            template: None,
            name: name.to_string(),
            value_type: ValueType::Numeric,
            trait_kind: kind,
            source: DataSource::Stored,
            is_configuration_item: false,
            children: Vec::new(),
        }
    }

    fn location() -> Entity {
        let id = EntityId::new();
        let mut temp = attr(&id, None, "Temperature", None);
        let hi = attr(&id, Some(temp.id), "LimitHi", Some(TraitKind::UpperLimit));
        temp.children.push(hi);
        Entity {
            id,
            name: "Location7".to_string(),
            template: TemplateId::new(),
            created_at: Utc::now(),
            attributes: vec![temp, attr(&id, None, "Humidity", None)],
        }
    }

    #[test]
    fn attribute_lookup_is_top_level_only() {
        let e = location();
        assert!(e.attribute("Temperature").is_some());
        assert!(e.attribute("LimitHi").is_none());
    }

    #[test]
    fn attribute_by_path_walks_children() {
        let e = location();
        let hi = e.attribute_by_path("Temperature|LimitHi").unwrap();
        assert!(hi.is_trait());
        assert_eq!(hi.parent, Some(e.attributes[0].id));
        assert!(e.attribute_by_path("Temperature|LimitLo").is_none());
        assert!(e.attribute_by_path("").is_none());
        assert_eq!(e.attribute_by_path("Humidity").unwrap().name, "Humidity");
    }

    #[test]
    fn entity_serialization() {
        let e = location();
        let json = serde_json::to_string(&e).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
