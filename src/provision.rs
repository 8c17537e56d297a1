//! Template provisioning.
//!
//! `ensure_trait` idempotently attaches a trait attribute under a template
//! node: if a direct child already carries the kind it is returned untouched,
//! otherwise a child named after the kind's code is created and configured.
//! Provisioning is a setup-phase operation and assumes a single writer per
//! template; call `commit` afterwards so entities pick up the new schema.

use tracing::{debug, info};

use crate::catalog::{TraitCategory, TraitKind, ALL_EVENT_TRAITS};
use crate::error::{LensError, LensResult};
use crate::storage::{HierarchyStore, StorageError};
use crate::template::{AttributeTemplate, DataSource, TemplateNode, TemplateRole};
use crate::value::{Value, ValueType};

/// Config settings that make the detection engine record trigger data.
pub const TRIGGER_CAPTURE_CONFIG: &str = ";SAVETRIGGEREXPRESSION=True;SAVETRIGGERNAME=True";

/// How a newly created trait attribute gets its value.
///
/// A series link wins over a static value. Without either, the static value is 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraitOptions {
    /// Static value stored on the attribute.
    pub static_value: Option<f64>,
    /// Unit for the static value; defaults to the parent's default unit.
    pub unit: Option<String>,
    /// Key of an external series to link to.
    pub series_link: Option<String>,
}

impl TraitOptions {
    /// Options with nothing set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A static value in the parent's default unit.
    #[must_use]
    pub fn fixed(value: f64) -> Self {
        Self {
            static_value: Some(value),
            ..Self::default()
        }
    }

    /// A link to an external series.
    #[must_use]
    pub fn linked(series_key: impl Into<String>) -> Self {
        Self {
            series_link: Some(series_key.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// One entry of a provisioning batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitSpec {
    pub kind: TraitKind,
    pub options: TraitOptions,
}

impl TraitSpec {
    #[must_use]
    pub fn new(kind: TraitKind, options: TraitOptions) -> Self {
        Self { kind, options }
    }
}

/// Limits applied by [`provision_standard_traits`].
#[derive(Debug, Clone, PartialEq)]
pub struct StandardLimits {
    /// External series holding the forecast, if any.
    pub forecast_series: Option<String>,
    pub upper: f64,
    pub upper_upper: f64,
    pub target: f64,
}

fn check_category(parent: &TemplateNode, kind: TraitKind) -> LensResult<()> {
    let allowed = match kind.category() {
        TraitCategory::AttributeTrait => matches!(parent, TemplateNode::Attribute(_)),
        TraitCategory::EventTrait => parent.role() == Some(TemplateRole::Event),
    };
    if allowed {
        Ok(())
    } else {
        Err(LensError::ConfigMismatch {
            kind,
            expected: kind.category(),
            parent: parent.to_string(),
        })
    }
}

fn configure(template: &mut AttributeTemplate, kind: TraitKind, parent: &TemplateNode, opts: &TraitOptions) {
    template.trait_kind = Some(kind);

    if kind.is_event_trait() {
        template.value_type = ValueType::Text;
        template.is_configuration_item = true;
        template.source = DataSource::Stored;
        return;
    }

    template.value_type = ValueType::Numeric;
    if let Some(series_key) = &opts.series_link {
        template.source = DataSource::linked(series_key.clone());
    } else {
        let unit = opts
            .unit
            .clone()
            .or_else(|| parent.default_unit().map(str::to_string));
        template.default_unit.clone_from(&unit);
        template.source = DataSource::Static {
            value: Value::Float(opts.static_value.unwrap_or(0.0)),
            unit,
        };
    }
}

/// A child exactly as `add_attribute_template` creates it.
fn is_unconfigured(child: &AttributeTemplate) -> bool {
    child.trait_kind.is_none()
        && child.value_type == ValueType::Numeric
        && child.source == DataSource::Stored
        && child.default_unit.is_none()
        && !child.is_configuration_item
        && child.children.is_empty()
}

/// Ensures `parent` has a direct child carrying `kind`.
///
/// The category guard runs before any store call, so a mismatch mutates
/// nothing. The parent's children are re-read from the store, so a stale
/// `parent` snapshot still converges to a single trait attribute. A child
/// named after the kind's code that still has creation defaults is taken to
/// be a previous attempt interrupted between its two store calls, and is
/// configured in place, so retrying after an outage converges.
///
/// # Errors
///
/// - `ConfigMismatch`: attribute traits need an attribute-template parent and
///   event traits an event-template root
/// - `Storage(DuplicateName)`: a configured child already uses the kind's code without carrying the trait
/// - `StoreUnavailable`: the store failed; calling again completes the trait
pub fn ensure_trait(
    store: &dyn HierarchyStore,
    parent: &TemplateNode,
    kind: TraitKind,
    opts: &TraitOptions,
) -> LensResult<AttributeTemplate> {
    check_category(parent, kind)?;

    let parent_ref = parent.as_parent();
    let fresh = store
        .get_template_node(parent_ref)
        .map_err(|e| LensError::from_store("get_template_node", e))?;

    if let Some(existing) = fresh.child_with_trait(kind) {
        debug!(kind = %kind, parent = %fresh, "trait already present");
        return Ok(existing.clone());
    }
    let mut created = match fresh.child_named(kind.code()) {
        // Left behind when an earlier attempt failed between add and update.
        Some(child) if is_unconfigured(child) => {
            debug!(kind = %kind, parent = %fresh, "finishing half-created trait");
            child.clone()
        }
        Some(_) => {
            return Err(LensError::Storage(StorageError::DuplicateName {
                parent: fresh.to_string(),
                name: kind.code().to_string(),
            }));
        }
        None => store
            .add_attribute_template(parent_ref, kind.code())
            .map_err(|e| LensError::from_store("add_attribute_template", e))?,
    };
    configure(&mut created, kind, &fresh, opts);
    store
        .update_attribute_template(&created)
        .map_err(|e| LensError::from_store("update_attribute_template", e))?;

    info!(kind = %kind, parent = %fresh, linked = created.source.is_linked(), "trait created");
    Ok(created)
}

/// Resolves `path` and ensures the trait under it.
pub fn ensure_trait_at(
    store: &dyn HierarchyStore,
    path: &str,
    kind: TraitKind,
    opts: &TraitOptions,
) -> LensResult<AttributeTemplate> {
    let parent = store
        .get_template(path)
        .map_err(|e| LensError::from_store("get_template", e))?;
    ensure_trait(store, &parent, kind, opts)
}

/// Applies a batch of trait specs under one parent.
///
/// Each spec gets its own result: a `ConfigMismatch` fails only its entry. An
/// unavailable store fails the remaining entries as well, without retrying.
pub fn ensure_traits(
    store: &dyn HierarchyStore,
    parent: &TemplateNode,
    specs: &[TraitSpec],
) -> Vec<LensResult<AttributeTemplate>> {
    let mut results = Vec::with_capacity(specs.len());
    let mut outage: Option<&'static str> = None;

    for spec in specs {
        if let Some(operation) = outage {
            results.push(Err(LensError::StoreUnavailable {
                operation,
                source: StorageError::Unavailable {
                    operation: operation.to_string(),
                    reason: "earlier call in batch failed".to_string(),
                },
            }));
            continue;
        }

        let result = ensure_trait(store, parent, spec.kind, &spec.options);
        if let Err(LensError::StoreUnavailable { operation, .. }) = &result {
            outage = Some(*operation);
        }
        results.push(result);
    }
    results
}

/// Adds LowerLimit and UpperLimit static traits under a measured attribute.
///
/// Each kind is guarded against its own presence, so an existing upper limit
/// never suppresses creation of the lower one.
pub fn provision_limits(
    store: &dyn HierarchyStore,
    attribute_path: &str,
    lower: f64,
    upper: f64,
) -> LensResult<(AttributeTemplate, AttributeTemplate)> {
    let parent = store
        .get_template(attribute_path)
        .map_err(|e| LensError::from_store("get_template", e))?;
    let upper = ensure_trait(store, &parent, TraitKind::UpperLimit, &TraitOptions::fixed(upper))?;
    let lower = ensure_trait(store, &parent, TraitKind::LowerLimit, &TraitOptions::fixed(lower))?;
    Ok((lower, upper))
}

/// Adds the forecast link and the upper, upper-upper and target limits.
pub fn provision_standard_traits(
    store: &dyn HierarchyStore,
    attribute_path: &str,
    limits: &StandardLimits,
) -> LensResult<Vec<AttributeTemplate>> {
    let parent = store
        .get_template(attribute_path)
        .map_err(|e| LensError::from_store("get_template", e))?;

    let mut specs = Vec::with_capacity(4);
    if let Some(series) = &limits.forecast_series {
        specs.push(TraitSpec::new(TraitKind::Forecast, TraitOptions::linked(series.clone())));
    }
    specs.push(TraitSpec::new(TraitKind::UpperLimit, TraitOptions::fixed(limits.upper)));
    specs.push(TraitSpec::new(
        TraitKind::UpperUpperLimit,
        TraitOptions::fixed(limits.upper_upper),
    ));
    specs.push(TraitSpec::new(TraitKind::TargetLimit, TraitOptions::fixed(limits.target)));

    ensure_traits(store, &parent, &specs).into_iter().collect()
}

/// Adds every event trait under an event template.
pub fn provision_event_traits(
    store: &dyn HierarchyStore,
    event_template_path: &str,
) -> LensResult<Vec<AttributeTemplate>> {
    let parent = store
        .get_template(event_template_path)
        .map_err(|e| LensError::from_store("get_template", e))?;
    ALL_EVENT_TRAITS
        .iter()
        .map(|kind| ensure_trait(store, &parent, *kind, &TraitOptions::new()))
        .collect()
}

/// Makes every analysis on a template record its trigger expression and name.
///
/// Returns how many analyses were changed; analyses that already carry the
/// settings are left alone.
pub fn connect_analysis(store: &dyn HierarchyStore, template_path: &str) -> LensResult<usize> {
    let node = store
        .get_template(template_path)
        .map_err(|e| LensError::from_store("get_template", e))?;
    let TemplateNode::Entity(template) = node else {
        return Err(LensError::Storage(StorageError::TemplateNotFound(
            template_path.to_string(),
        )));
    };

    let mut changed = 0;
    for (index, analysis) in template.analyses.iter().enumerate() {
        if analysis.config.contains(TRIGGER_CAPTURE_CONFIG) {
            continue;
        }
        let config = format!("{}{TRIGGER_CAPTURE_CONFIG}", analysis.config);
        store
            .set_analysis_config(template.id, index, &config)
            .map_err(|e| LensError::from_store("set_analysis_config", e))?;
        changed += 1;
    }
    info!(template = %template.name, changed, "analyses connected to trigger traits");
    Ok(changed)
}
