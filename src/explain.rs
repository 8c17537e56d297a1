//! Causal attribution for detected events.
//!
//! The trigger expression recorded on an event is scanned for single-quoted
//! tokens. Each token naming a plain measured attribute of the event's primary
//! subject is reported with its value and the values of its attribute traits,
//! all read at the event's start time.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::TraitKind;
use crate::config::MonitorConfig;
use crate::entity::{Attribute, AttributeId, Entity};
use crate::error::{LensError, LensResult};
use crate::event::{Event, EventId};
use crate::resolver::all_traits;
use crate::storage::HierarchyStore;
use crate::template::PATH_SEPARATOR;
use crate::value::Value;

static QUOTED_TOKEN: OnceLock<Option<Regex>> = OnceLock::new();

fn quoted_token() -> Option<&'static Regex> {
    QUOTED_TOKEN
        .get_or_init(|| Regex::new(r"'([^']*)'").ok())
        .as_ref()
}

/// Extracts the single-quoted tokens of a trigger expression, in order.
///
/// Tokens are kept verbatim, surrounding spaces included. Empty tokens are
/// dropped and repeated tokens are reported once.
///
/// ```
/// use traitlens::explain::extract_references;
///
/// assert_eq!(
///     extract_references("Trigger if 'Temperature' > 'LimitHi'"),
///     vec!["Temperature", "LimitHi"]
/// );
/// ```
#[must_use]
pub fn extract_references(expression: &str) -> Vec<String> {
    let Some(regex) = quoted_token() else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    regex
        .captures_iter(expression)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|token| !token.is_empty() && seen.insert(*token))
        .map(str::to_string)
        .collect()
}

/// Why a referenced token was left out of an explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The token names no attribute of the primary subject.
    UnknownReference,
    /// The token names a trait attribute, such as a limit.
    TraitAttribute,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedReference {
    pub name: String,
    pub reason: SkipReason,
}

/// A plain attribute referenced by the trigger, with its traits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CauseEntry {
    pub attribute_name: String,
    /// Value at the event's start.
    pub value: Value,
    /// Attribute-trait values at the event's start.
    pub traits: BTreeMap<TraitKind, Value>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attribution {
    /// The expression is missing or has no quoted tokens.
    NoCauseIdentified,
    /// One entry per resolved plain attribute, in expression order.
    Causes(Vec<CauseEntry>),
}

/// Explanation of a single event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventExplanation {
    pub event: EventId,
    pub event_name: String,
    pub subject_name: String,
    /// Timestamp every value was read at.
    pub at: DateTime<Utc>,
    pub expression: Option<String>,
    pub attribution: Attribution,
    pub skipped: Vec<SkippedReference>,
}

impl EventExplanation {
    /// Cause entries, empty when no cause was identified.
    #[must_use]
    pub fn causes(&self) -> &[CauseEntry] {
        match &self.attribution {
            Attribution::Causes(causes) => causes,
            Attribution::NoCauseIdentified => &[],
        }
    }
}

/// Looks a token up on the subject: a top-level name, or an explicit `|` path.
fn resolve<'a>(subject: &'a Entity, token: &str) -> Option<&'a Attribute> {
    let token = token.trim_start_matches(PATH_SEPARATOR);
    if let Some(found) = subject.attribute(token) {
        return Some(found);
    }
    if token.contains(PATH_SEPARATOR) {
        return subject.attribute_by_path(token);
    }
    None
}

/// Explains why `event` fired.
///
/// Store calls: the subject entity, the trigger expression, and one batch for
/// every value in the explanation.
///
/// # Errors
///
/// - `Storage(EntityNotFound)`: the primary subject no longer exists
/// - `StoreUnavailable`: a store call failed
pub fn explain_event(store: &dyn HierarchyStore, event: &Event) -> LensResult<EventExplanation> {
    let at = event.window.start;
    let subject = store
        .get_entity(event.primary_subject)
        .map_err(|e| LensError::from_store("get_entity", e))?
        .ok_or(LensError::Storage(
            crate::storage::StorageError::EntityNotFound(event.primary_subject),
        ))?;

    let mut explanation = EventExplanation {
        event: event.id,
        event_name: event.name.clone(),
        subject_name: subject.name.clone(),
        at,
        expression: None,
        attribution: Attribution::NoCauseIdentified,
        skipped: Vec::new(),
    };

    let Some(expr_attr) = event.trait_attribute(TraitKind::CauseTriggerExpression) else {
        debug!(event = %event.name, "event has no trigger expression attribute");
        return Ok(explanation);
    };
    let expression = store
        .bulk_get_values(&[expr_attr.id], Some(at))
        .map_err(|e| LensError::from_store("bulk_get_values", e))?
        .into_iter()
        .next()
        .and_then(|v| v.as_text().map(str::to_string));
    explanation.expression.clone_from(&expression);

    let references = expression.as_deref().map(extract_references).unwrap_or_default();
    if references.is_empty() {
        info!(event = %event.name, "no cause identified");
        return Ok(explanation);
    }

    let mut plain: Vec<&Attribute> = Vec::new();
    for name in references {
        match resolve(&subject, &name) {
            None => {
                debug!(event = %event.name, reference = %name, "unknown reference skipped");
                explanation.skipped.push(SkippedReference {
                    name,
                    reason: SkipReason::UnknownReference,
                });
            }
            Some(attr) if attr.is_trait() => {
                explanation.skipped.push(SkippedReference {
                    name,
                    reason: SkipReason::TraitAttribute,
                });
            }
            Some(attr) => plain.push(attr),
        }
    }

    // Each plain attribute followed by its traits, in one batch.
    let mut ids: Vec<AttributeId> = Vec::new();
    let mut layout: Vec<Vec<TraitKind>> = Vec::with_capacity(plain.len());
    for attr in &plain {
        ids.push(attr.id);
        let mut kinds = Vec::new();
        for t in all_traits(attr) {
            if let Some(kind) = t.trait_kind {
                ids.push(t.id);
                kinds.push(kind);
            }
        }
        layout.push(kinds);
    }
    let values = if ids.is_empty() {
        Vec::new()
    } else {
        store
            .bulk_get_values(&ids, Some(at))
            .map_err(|e| LensError::from_store("bulk_get_values", e))?
    };

    let mut values = values.into_iter();
    let causes: Vec<CauseEntry> = plain
        .iter()
        .zip(layout)
        .map(|(attr, kinds)| CauseEntry {
            attribute_name: attr.name.clone(),
            value: values.next().unwrap_or_default(),
            traits: kinds
                .into_iter()
                .map(|k| (k, values.next().unwrap_or_default()))
                .collect(),
        })
        .collect();

    info!(
        event = %event.name,
        subject = %subject.name,
        causes = causes.len(),
        skipped = explanation.skipped.len(),
        "event explained"
    );
    explanation.attribution = Attribution::Causes(causes);
    Ok(explanation)
}

/// Explains every event created from `template_name`, ordered by start time.
///
/// An event whose subject is gone or whose explanation fails for a reason
/// other than an outage is logged and left out.
///
/// # Errors
///
/// `StoreUnavailable` aborts the whole batch.
pub fn explain_events(store: &dyn HierarchyStore, template_name: &str) -> LensResult<Vec<EventExplanation>> {
    let events = store
        .find_events(template_name)
        .map_err(|e| LensError::from_store("find_events", e))?;

    let mut explanations = Vec::with_capacity(events.len());
    for event in &events {
        match explain_event(store, event) {
            Ok(explanation) => explanations.push(explanation),
            Err(e) if e.is_store_unavailable() => return Err(e),
            Err(e) => warn!(event = %event.name, error = %e, "event skipped"),
        }
    }
    Ok(explanations)
}

/// Explains the events of `config.event_template`.
///
/// # Errors
///
/// Same as [`explain_events`].
pub fn explain_configured(store: &dyn HierarchyStore, config: &MonitorConfig) -> LensResult<Vec<EventExplanation>> {
    explain_events(store, &config.event_template)
}
