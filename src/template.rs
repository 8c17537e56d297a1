//! Template schema types.
//!
//! Entity templates are the roots of the schema; attribute templates are named,
//! typed slots beneath them and may nest. Trait attributes are attribute
//! templates whose `trait_kind` is set. Snapshots returned by the store carry
//! their direct children so that single-hop lookups need no further calls.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::TraitKind;
use crate::value::{Value, ValueType};

/// Separator between segments of a template or attribute path.
pub const PATH_SEPARATOR: char = '|';

/// Unique identifier for an entity template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(Uuid);

impl TemplateId {
    /// Creates a new random template ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TemplateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an attribute template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeTemplateId(Uuid);

impl AttributeTemplateId {
    /// Creates a new random attribute template ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttributeTemplateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttributeTemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What instances of an entity template represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateRole {
    /// Monitored assets (locations, machines, ...).
    Asset,
    /// Detected events. Only these accept event traits.
    Event,
}

/// Where an attribute's value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSource {
    /// Values are written to and read from the store's own history.
    Stored,
    /// A fixed value, time invariant.
    Static {
        /// The value.
        value: Value,
        /// Unit of measure, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    /// Reads are proxied to an external series.
    Linked {
        /// Key of the external series.
        series_key: String,
    },
}

impl DataSource {
    /// Creates a static source.
    #[must_use]
    pub fn fixed(value: impl Into<Value>, unit: Option<String>) -> Self {
        Self::Static {
            value: value.into(),
            unit,
        }
    }

    /// Creates a linked source.
    #[must_use]
    pub fn linked(series_key: impl Into<String>) -> Self {
        Self::Linked {
            series_key: series_key.into(),
        }
    }

    pub const fn is_linked(&self) -> bool {
        matches!(self, Self::Linked { .. })
    }

    /// The unit of a static source.
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::Static { unit, .. } => unit.as_deref(),
            _ => None,
        }
    }
}

impl Default for DataSource {
    fn default() -> Self {
        Self::Stored
    }
}

/// Configuration of an analysis attached to an entity template.
///
/// The config string is a `;`-separated list of `KEY=Value` settings consumed
/// by the external detection engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRule {
    /// Analysis name.
    pub name: String,
    /// Raw configuration string.
    pub config: String,
}

impl AnalysisRule {
    /// Creates a new analysis rule.
    #[must_use]
    pub fn new(name: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: config.into(),
        }
    }
}

/// A named, typed slot within an entity template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeTemplate {
    /// Unique identifier.
    pub id: AttributeTemplateId,
    /// Owning entity template.
    pub template: TemplateId,
    /// Parent attribute template; `None` for top-level slots.
    pub parent: Option<AttributeTemplateId>,
    pub name: String,
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trait_kind: Option<TraitKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_unit: Option<String>,
    #[serde(default)]
    pub source: DataSource,
    /// Configuration items are set once, not monitored over time.
    #[serde(default)]
    pub is_configuration_item: bool,
    /// Direct children at the time of the snapshot.
    #[serde(default)]
    pub children: Vec<AttributeTemplate>,
}

impl AttributeTemplate {
    /// Creates an untrait numeric slot with a stored value source.
    #[must_use]
    pub fn new(template: TemplateId, parent: Option<AttributeTemplateId>, name: impl Into<String>) -> Self {
        Self {
            id: AttributeTemplateId::new(),
            template,
            parent,
            name: name.into(),
            value_type: ValueType::Numeric,
            trait_kind: None,
            default_unit: None,
            source: DataSource::Stored,
            is_configuration_item: false,
            children: Vec::new(),
        }
    }

    /// Direct child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&AttributeTemplate> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Root of a hierarchy of entities sharing a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTemplate {
    /// Unique identifier.
    pub id: TemplateId,
    pub name: String,
    pub role: TemplateRole,
    /// Top-level attribute templates.
    #[serde(default)]
    pub attributes: Vec<AttributeTemplate>,
    #[serde(default)]
    pub analyses: Vec<AnalysisRule>,
}

impl EntityTemplate {
    /// Creates an empty template.
    #[must_use]
    pub fn new(name: impl Into<String>, role: TemplateRole) -> Self {
        Self {
            id: TemplateId::new(),
            name: name.into(),
            role,
            attributes: Vec::new(),
            analyses: Vec::new(),
        }
    }
}

/// Reference to a node that can own attribute templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum TemplateParent {
    /// An entity template root.
    Entity(TemplateId),
    /// An attribute template.
    Attribute(AttributeTemplateId),
}

/// A schema node: an entity template or an attribute template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TemplateNode {
    /// Entity template root.
    Entity(EntityTemplate),
    /// Attribute template.
    Attribute(AttributeTemplate),
}

impl TemplateNode {
    /// Reference usable as the parent of new attribute templates.
    #[must_use]
    pub const fn as_parent(&self) -> TemplateParent {
        match self {
            Self::Entity(t) => TemplateParent::Entity(t.id),
            Self::Attribute(a) => TemplateParent::Attribute(a.id),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Entity(t) => &t.name,
            Self::Attribute(a) => &a.name,
        }
    }

    /// Direct attribute-template children.
    #[must_use]
    pub fn children(&self) -> &[AttributeTemplate] {
        match self {
            Self::Entity(t) => &t.attributes,
            Self::Attribute(a) => &a.children,
        }
    }

    /// Direct child carrying the given trait.
    #[must_use]
    pub fn child_with_trait(&self, kind: TraitKind) -> Option<&AttributeTemplate> {
        self.children().iter().find(|c| c.trait_kind == Some(kind))
    }

    #[must_use]
    pub fn child_named(&self, name: &str) -> Option<&AttributeTemplate> {
        self.children().iter().find(|c| c.name == name)
    }

    /// Unit used when a static value is provisioned without one.
    #[must_use]
    pub fn default_unit(&self) -> Option<&str> {
        match self {
            Self::Entity(_) => None,
            Self::Attribute(a) => a.default_unit.as_deref(),
        }
    }

    /// Role of an entity-template root; `None` for attribute templates.
    #[must_use]
    pub const fn role(&self) -> Option<TemplateRole> {
        match self {
            Self::Entity(t) => Some(t.role),
            Self::Attribute(_) => None,
        }
    }
}

impl fmt::Display for TemplateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(t) => write!(f, "entity template '{}'", t.name),
            Self::Attribute(a) => write!(f, "attribute template '{}'", a.name),
        }
    }
}

/// Splits a template path (`Template|Attribute|Child`) into its segments.
///
/// Empty segments are dropped, so `"Temperature_Simple||Temperature"` and
/// `"Temperature_Simple|Temperature"` are the same path.
#[must_use]
pub fn split_path(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temperature_node() -> TemplateNode {
        let root = EntityTemplate::new("Temperature_Simple", TemplateRole::Asset);
        let mut temp = AttributeTemplate::new(root.id, None, "Temperature");
        temp.default_unit = Some("degC".to_string());
        let mut hi = AttributeTemplate::new(root.id, Some(temp.id), "LimitHi");
        hi.trait_kind = Some(TraitKind::UpperLimit);
        hi.source = DataSource::fixed(100.0, Some("degC".to_string()));
        temp.children.push(hi);
        TemplateNode::Attribute(temp)
    }

    #[test]
    fn child_with_trait_is_single_hop() {
        let node = temperature_node();
        let hi = node.child_with_trait(TraitKind::UpperLimit).unwrap();
        assert_eq!(hi.name, "LimitHi");
        assert!(node.child_with_trait(TraitKind::LowerLimit).is_none());
        assert_eq!(node.default_unit(), Some("degC"));
        assert_eq!(node.role(), None);
    }

    #[test]
    fn as_parent_matches_node_kind() {
        let root = EntityTemplate::new("VeryHot", TemplateRole::Event);
        let id = root.id;
        let node = TemplateNode::Entity(root);
        assert_eq!(node.as_parent(), TemplateParent::Entity(id));
        assert_eq!(node.role(), Some(TemplateRole::Event));
        assert_eq!(node.to_string(), "entity template 'VeryHot'");
    }

    #[test]
    fn split_path_drops_empty_segments() {
        assert_eq!(
            split_path("Temperature_Simple||Temperature"),
            vec!["Temperature_Simple", "Temperature"]
        );
        assert!(split_path("").is_empty());
    }

    #[test]
    fn data_source_accessors() {
        let s = DataSource::fixed(90.0, Some("degC".to_string()));
        assert_eq!(s.unit(), Some("degC"));
        assert!(!s.is_linked());
        assert!(DataSource::linked("cdt_plus_1d").is_linked());
        assert_eq!(DataSource::default(), DataSource::Stored);
    }
}
