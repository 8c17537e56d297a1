//! Detected events.
//!
//! Events are created by the external detection engine and consumed read-only.
//! The trigger expression that fired the event is stored as an attribute
//! carrying the `CauseTriggerExpression` trait.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::TraitKind;
use crate::entity::{Attribute, EntityId};
use crate::template::TemplateId;
use crate::time::TimeRange;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A detected time interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier.
    pub id: EventId,
    pub name: String,
    /// Name of the event template this event was created from.
    pub template_name: String,
    pub window: TimeRange,
    /// The entity the event is about.
    pub primary_subject: EntityId,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Event {
    /// Attribute carrying the given event trait.
    #[must_use]
    pub fn trait_attribute(&self, kind: TraitKind) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.trait_kind == Some(kind))
    }
}

/// What the detection engine hands the store when an event fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    /// Event template to instantiate.
    pub template: TemplateId,
    pub window: TimeRange,
    pub primary_subject: EntityId,
    /// Written to the `CauseTriggerExpression` attribute, if the template has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_expression: Option<String>,
    /// Written to the `CauseTriggerName` attribute, if the template has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_name: Option<String>,
}

impl NewEvent {
    /// Creates an event description without trigger data.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        template: TemplateId,
        window: TimeRange,
        primary_subject: EntityId,
    ) -> Self {
        Self {
            name: name.into(),
            template,
            window,
            primary_subject,
            trigger_expression: None,
            trigger_name: None,
        }
    }

    /// Records the trigger expression that fired the event.
    #[must_use]
    pub fn with_trigger(mut self, expression: impl Into<String>, name: impl Into<String>) -> Self {
        self.trigger_expression = Some(expression.into());
        self.trigger_name = Some(name.into());
        self
    }
}
