//! Abstract hierarchy store.
//!
//! The store owns templates, entities, attribute values and events. The core
//! holds no persistent state of its own: every operation reads and writes
//! through this trait. Each method is one request/response round trip, which is
//! what the bulk-read contract of the evaluator is measured in.

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

use crate::catalog::TraitKind;
use crate::entity::{Attribute, AttributeId, Entity, EntityId};
use crate::error::ValidationError;
use crate::event::{Event, NewEvent};
use crate::template::{AttributeTemplate, AttributeTemplateId, TemplateId, TemplateNode, TemplateParent};
use crate::value::{Value, ValueType};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be reached or refused the call.
    #[error("Store unavailable ({operation}): {reason}")]
    Unavailable { operation: String, reason: String },

    /// The store did not answer in time.
    #[error("Store call {operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// No template at the given path.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Attribute template not found.
    #[error("Attribute template not found: {0}")]
    AttributeTemplateNotFound(AttributeTemplateId),

    /// Entity not found.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Attribute not found.
    #[error("Attribute not found: {0}")]
    AttributeNotFound(AttributeId),

    /// A sibling with the same name already exists.
    #[error("Duplicate name '{name}' under {parent}")]
    DuplicateName { parent: String, name: String },

    /// Backend error.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Returns true for outages and timeouts.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Sort direction, always keyed on subject (owning entity) name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// A to Z.
    #[default]
    Ascending,
    /// Z to A.
    Descending,
}

/// Attribute name matcher supporting `*` and `?` wildcards.
///
/// # Examples
///
/// ```
/// use traitlens::NamePattern;
///
/// let p = NamePattern::new("Temp*").unwrap();
/// assert!(p.matches("Temperature"));
/// assert!(!p.matches("Humidity"));
/// ```
#[derive(Debug, Clone)]
pub struct NamePattern {
    raw: String,
    regex: Regex,
}

impl NamePattern {
    /// Compiles a wildcard pattern. Matching is exact and case sensitive.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyName` for a blank pattern.
    pub fn new(pattern: &str) -> Result<Self, ValidationError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let mut source = String::with_capacity(trimmed.len() + 2);
        source.push('^');
        for ch in trimmed.chars() {
            match ch {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(&other.to_string())),
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| ValidationError::InvalidNamePattern {
            pattern: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: trimmed.to_string(),
            regex,
        })
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Bulk attribute query.
///
/// Only entity-owned attributes are searched; every nesting level is included,
/// so trait attributes are found as well as measured ones.
#[derive(Debug, Clone)]
pub struct AttributeFilter {
    /// Restrict to entities created from this template.
    pub template: Option<TemplateId>,
    /// Restrict by attribute name.
    pub name: Option<NamePattern>,
    /// Restrict to attributes carrying this trait.
    pub trait_kind: Option<TraitKind>,
    /// Restrict by declared value type.
    pub value_type: Option<ValueType>,
    pub sort: SortOrder,
    /// Maximum number of attributes returned.
    pub page_size: usize,
}

impl AttributeFilter {
    /// Default page size when none is given.
    pub const DEFAULT_PAGE_SIZE: usize = 1000;

    /// A filter matching everything, capped at the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            template: None,
            name: None,
            trait_kind: None,
            value_type: None,
            sort: SortOrder::Ascending,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn template(mut self, template: TemplateId) -> Self {
        self.template = Some(template);
        self
    }

    #[must_use]
    pub fn name(mut self, pattern: NamePattern) -> Self {
        self.name = Some(pattern);
        self
    }

    #[must_use]
    pub fn trait_kind(mut self, kind: TraitKind) -> Self {
        self.trait_kind = Some(kind);
        self
    }

    #[must_use]
    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Checks every criterion except the template restriction.
    #[must_use]
    pub fn matches(&self, attribute: &Attribute) -> bool {
        self.name.as_ref().map_or(true, |p| p.matches(&attribute.name))
            && self.trait_kind.map_or(true, |k| attribute.trait_kind == Some(k))
            && self.value_type.map_or(true, |t| attribute.value_type == t)
    }
}

impl Default for AttributeFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage trait for the asset hierarchy.
///
/// Schema edits (`add_attribute_template`, `update_attribute_template`) are
/// visible in template snapshots immediately but entities only instantiate
/// attribute templates that have been committed. Concurrent schema edits under
/// the same parent are not supported; provisioning assumes a single writer.
pub trait HierarchyStore: Send + Sync {
    /// Resolve a template path: `Template` or `Template|Attribute|...`.
    fn get_template(&self, path: &str) -> Result<TemplateNode, StorageError>;

    /// Fetch a fresh snapshot of a node by reference.
    fn get_template_node(&self, node: TemplateParent) -> Result<TemplateNode, StorageError>;

    /// Add an untrait attribute template under `parent`.
    ///
    /// # Errors
    /// - `DuplicateName`: a direct child with this name already exists
    fn add_attribute_template(
        &self,
        parent: TemplateParent,
        name: &str,
    ) -> Result<AttributeTemplate, StorageError>;

    /// Overwrite the settings of an existing attribute template. Children are ignored.
    fn update_attribute_template(&self, template: &AttributeTemplate) -> Result<(), StorageError>;

    /// Replace the config string of the `index`-th analysis of a template.
    fn set_analysis_config(
        &self,
        template: TemplateId,
        index: usize,
        config: &str,
    ) -> Result<(), StorageError>;

    /// Bulk attribute search, sorted by subject name and capped at `page_size`.
    fn find_attributes(&self, filter: &AttributeFilter) -> Result<Vec<Attribute>, StorageError>;

    /// Bulk value read. `values[i]` belongs to `attributes[i]`; `at = None` means current.
    ///
    /// Unknown attributes and attributes without data read as `Value::Null`.
    fn bulk_get_values(
        &self,
        attributes: &[AttributeId],
        at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, StorageError>;

    /// Bulk value write at a single timestamp.
    fn write_values(&self, values: &[(AttributeId, Value)], at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Flush pending schema and value mutations.
    fn commit(&self) -> Result<(), StorageError>;

    /// Create an entity from a template.
    fn create_entity(&self, template: TemplateId, name: &str) -> Result<Entity, StorageError>;

    /// Get an entity by ID.
    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, StorageError>;

    /// Delete an entity and all of its attributes.
    fn delete_entity(&self, id: EntityId) -> Result<(), StorageError>;

    /// List entities created from a template, sorted by name.
    fn list_entities(&self, template: TemplateId) -> Result<Vec<Entity>, StorageError>;

    /// Record a detected event. Called by the detection engine.
    fn create_event(&self, event: NewEvent) -> Result<Event, StorageError>;

    /// Find events created from the named template, ordered by start time.
    fn find_events(&self, template_name: &str) -> Result<Vec<Event>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_hierarchy_store_object_safe(_: &dyn HierarchyStore) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::EntityNotFound(EntityId::new());
        assert!(err.to_string().contains("Entity not found"));
        assert!(!err.is_unavailable());

        let err = StorageError::Unavailable {
            operation: "commit".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("connection refused"));
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_name_pattern_wildcards() {
        let p = NamePattern::new("Temp?rature").unwrap();
        assert!(p.matches("Temperature"));
        assert!(!p.matches("Temperature2"));

        let p = NamePattern::new("Limit*").unwrap();
        assert!(p.matches("LimitHi"));
        assert!(p.matches("Limit"));
        assert!(!p.matches("HiLimit"));
    }

    #[test]
    fn test_name_pattern_escapes_regex_metacharacters() {
        let p = NamePattern::new("Flow (m3/h)").unwrap();
        assert!(p.matches("Flow (m3/h)"));
        assert!(!p.matches("Flow m3/h"));
    }

    #[test]
    fn test_name_pattern_rejects_blank() {
        assert!(matches!(NamePattern::new("  "), Err(ValidationError::EmptyName)));
    }
}
