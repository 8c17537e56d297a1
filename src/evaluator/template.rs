//! Template strategy: resolve each reading's own limits.

use tracing::{debug, info};

use crate::catalog::TraitKind;
use crate::config::MonitorConfig;
use crate::entity::{Attribute, AttributeId};
use crate::error::{LensError, LensResult};
use crate::resolver::find_trait;
use crate::storage::{AttributeFilter, HierarchyStore, NamePattern, StorageError};
use crate::template::{TemplateId, TemplateNode};
use crate::value::{Value, ValueType};

use super::{Violation, ViolationKind, ViolationReport};

#[derive(Debug, Clone, Copy)]
struct Bounds {
    // Indices into the limit value batch.
    lower: Option<usize>,
    upper: Option<usize>,
}

/// Evaluates the `attribute` readings of every entity created from `template`.
///
/// Three store calls: the attribute query, the readings, and the resolved
/// limits. Upper is checked first; a reading above its upper limit is not also
/// checked against its lower limit. A missing bound is skipped for that reading.
///
/// # Errors
///
/// Any store failure aborts the whole pass. Outages surface as `StoreUnavailable`.
pub fn evaluate_template(
    store: &dyn HierarchyStore,
    template: TemplateId,
    attribute: &str,
    config: &MonitorConfig,
) -> LensResult<ViolationReport> {
    let filter = AttributeFilter::new()
        .template(template)
        .name(NamePattern::new(attribute)?)
        .value_type(ValueType::Numeric)
        .sort(config.template_sort)
        .page_size(config.template_page_size);
    let measured: Vec<Attribute> = store
        .find_attributes(&filter)
        .map_err(|e| LensError::from_store("find_attributes", e))?
        .into_iter()
        .filter(|a| !a.is_trait())
        .collect();

    let mut report = ViolationReport::default();
    if measured.is_empty() {
        info!(attribute, "no measured attributes found");
        return Ok(report);
    }

    let ids: Vec<AttributeId> = measured.iter().map(|a| a.id).collect();
    let readings = store
        .bulk_get_values(&ids, None)
        .map_err(|e| LensError::from_store("bulk_get_values", e))?;

    let mut limit_ids = Vec::new();
    let mut push = |limit: Option<&Attribute>| {
        limit.map(|l| {
            limit_ids.push(l.id);
            limit_ids.len() - 1
        })
    };
    let bounds: Vec<Bounds> = measured
        .iter()
        .map(|a| Bounds {
            lower: push(find_trait(a, TraitKind::LowerLimit)),
            upper: push(find_trait(a, TraitKind::UpperLimit)),
        })
        .collect();

    let limits = if limit_ids.is_empty() {
        Vec::new()
    } else {
        store
            .bulk_get_values(&limit_ids, None)
            .map_err(|e| LensError::from_store("bulk_get_values", e))?
    };
    let limit_at = |index: Option<usize>| index.and_then(|i| limits.get(i)).and_then(Value::as_float);

    for ((attr, reading), bound) in measured.iter().zip(&readings).zip(&bounds) {
        let Some(observed) = reading.as_float() else {
            debug!(subject = %attr.subject_name, "reading is not numeric, skipped");
            report.skipped += 1;
            continue;
        };
        let upper = limit_at(bound.upper);
        let lower = limit_at(bound.lower);
        if upper.is_none() && lower.is_none() {
            debug!(subject = %attr.subject_name, "no limits resolved, skipped");
            report.skipped += 1;
            continue;
        }

        report.evaluated += 1;
        let violation = match (upper, lower) {
            (Some(limit), _) if ViolationKind::Above.is_violated(observed, limit) => {
                Some((ViolationKind::Above, limit))
            }
            (_, Some(limit)) if ViolationKind::Below.is_violated(observed, limit) => {
                Some((ViolationKind::Below, limit))
            }
            _ => None,
        };
        if let Some((kind, limit)) = violation {
            report.violations.push(Violation {
                subject_name: attr.subject_name.clone(),
                attribute: attr.id,
                kind,
                observed,
                limit,
            });
        }
    }

    info!(
        attribute,
        evaluated = report.evaluated,
        skipped = report.skipped,
        above = report.count(ViolationKind::Above),
        below = report.count(ViolationKind::Below),
        "template evaluation complete"
    );
    Ok(report)
}

/// Runs the template strategy on `config.asset_template` and `config.measured_attribute`.
///
/// Resolving the template adds one store call to the three of [`evaluate_template`].
pub fn evaluate_configured(store: &dyn HierarchyStore, config: &MonitorConfig) -> LensResult<ViolationReport> {
    let template = match store
        .get_template(&config.asset_template)
        .map_err(|e| LensError::from_store("get_template", e))?
    {
        TemplateNode::Entity(template) => template,
        TemplateNode::Attribute(_) => {
            return Err(LensError::Storage(StorageError::TemplateNotFound(
                config.asset_template.clone(),
            )));
        }
    };
    evaluate_template(store, template.id, &config.measured_attribute, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    use crate::evaluator::test_support::populated;
    use crate::storage::InMemoryHierarchyStore;
    use crate::template::{TemplateParent, TemplateRole};

    #[test]
    fn reading_equal_to_limit_is_not_a_violation() {
        let readings = [90.0, 91.0, 0.0, -1.0, 45.0].map(Value::Float);
        let (store, template) = populated(&readings, 0.0, 90.0);

        let report = evaluate_template(&store, template.id, "Temperature", &MonitorConfig::default()).unwrap();
        assert_eq!(report.evaluated, 5);
        let got: Vec<(&str, ViolationKind)> = report
            .violations
            .iter()
            .map(|v| (v.subject_name.as_str(), v.kind))
            .collect();
        assert_eq!(
            got,
            vec![("Location1", ViolationKind::Above), ("Location3", ViolationKind::Below)]
        );
    }

    #[test]
    fn upper_is_checked_first() {
        // Inverted band: 100 is above 90 and below 95.
        let (store, template) = populated(&[Value::Float(100.0)], 95.0, 90.0);
        let report = evaluate_template(&store, template.id, "Temperature", &MonitorConfig::default()).unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::Above);
        assert_eq!(report.violations[0].limit, 90.0);
    }

    #[test]
    fn uses_three_round_trips() {
        let readings: Vec<Value> = (0..200).map(|i| Value::Float(f64::from(i))).collect();
        let (store, template) = populated(&readings, 10.0, 150.0);

        let report = evaluate_template(&store, template.id, "Temperature", &MonitorConfig::default()).unwrap();
        assert_eq!(store.round_trips(), 3);
        assert_eq!(report.count(ViolationKind::Below), 10);
        assert_eq!(report.count(ViolationKind::Above), 49);
    }

    #[test]
    fn instances_without_limits_are_skipped() {
        let store = InMemoryHierarchyStore::new();
        let template = store
            .add_entity_template("Temperature_Simple", TemplateRole::Asset)
            .unwrap();
        store
            .add_attribute_template(TemplateParent::Entity(template.id), "Temperature")
            .unwrap();
        store.commit().unwrap();
        let e = store.create_entity(template.id, "Location0").unwrap();
        store
            .write_values(&[(e.attribute("Temperature").unwrap().id, Value::Float(500.0))], Utc::now())
            .unwrap();
        store.reset_round_trips();

        let report = evaluate_template(&store, template.id, "Temperature", &MonitorConfig::default()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.skipped, 1);
        // No limits resolved, so no limit fetch.
        assert_eq!(store.round_trips(), 2);
    }

    #[test]
    fn configured_names_select_the_population() {
        let readings = [95.0, 20.0, -5.0].map(Value::Float);
        let (store, _) = populated(&readings, 0.0, 90.0);

        let report = evaluate_configured(&store, &MonitorConfig::default()).unwrap();
        assert_eq!(report.evaluated, 3);
        assert_eq!(report.count(ViolationKind::Above), 1);
        assert_eq!(report.count(ViolationKind::Below), 1);
        assert_eq!(store.round_trips(), 4);

        let missing = MonitorConfig::default().with_asset_template("Pressure_Simple");
        let err = evaluate_configured(&store, &missing).unwrap_err();
        assert!(matches!(err, LensError::Storage(StorageError::TemplateNotFound(_))));
    }

    #[test]
    fn limits_are_matched_to_their_own_reading() {
        let readings = [95.0, 20.0].map(Value::Float);
        let (store, template) = populated(&readings, 0.0, 90.0);

        // Raise Location0's own limit above its reading.
        let e = store
            .list_entities(template.id)
            .unwrap()
            .into_iter()
            .find(|e| e.name == "Location0")
            .unwrap();
        let hi = e.attribute_by_path("Temperature|LimitHi").unwrap().id;
        store.write_values(&[(hi, Value::Float(99.0))], Utc::now()).unwrap();

        let report = evaluate_template(&store, template.id, "Temperature", &MonitorConfig::default()).unwrap();
        assert!(report.is_clean());
    }
}
