//! Flat strategy: query limit trait attributes directly.

use crossbeam_channel::bounded;
use tracing::{debug, info, warn};

use crate::catalog::TraitKind;
use crate::config::MonitorConfig;
use crate::entity::AttributeId;
use crate::error::{LensError, LensResult};
use crate::storage::{AttributeFilter, HierarchyStore};
use crate::value::ValueType;

use super::{Violation, ViolationKind, ViolationReport};

/// Evaluates every LowerLimit and UpperLimit trait attribute in the store.
///
/// The two lists are independent: each is fetched on its own scoped thread
/// with one `find_attributes` call and one `bulk_get_values` call covering
/// both the limits and their parents' readings. Within each list violations
/// follow `config.flat_sort`; the Below list is reported before the Above list.
///
/// # Errors
///
/// Any store failure aborts the whole pass. Outages surface as `StoreUnavailable`.
pub fn evaluate_flat(store: &dyn HierarchyStore, config: &MonitorConfig) -> LensResult<ViolationReport> {
    let (tx, rx) = bounded(2);

    std::thread::scope(|scope| {
        for (kind, side) in [
            (TraitKind::LowerLimit, ViolationKind::Below),
            (TraitKind::UpperLimit, ViolationKind::Above),
        ] {
            let tx = tx.clone();
            scope.spawn(move || {
                let result = evaluate_list(store, config, kind, side);
                // The receiver outlives the scope.
                let _ = tx.send((side, result));
            });
        }
    });
    drop(tx);

    let mut below = None;
    let mut above = None;
    for (side, result) in rx.iter() {
        let report = result.inspect_err(|e| warn!(side = %side, error = %e, "flat evaluation aborted"))?;
        match side {
            ViolationKind::Below => below = Some(report),
            ViolationKind::Above => above = Some(report),
        }
    }

    let (Some(mut report), Some(above)) = (below, above) else {
        return Err(LensError::internal("flat evaluation worker exited without a result"));
    };
    report.merge(above);

    info!(
        evaluated = report.evaluated,
        above = report.count(ViolationKind::Above),
        below = report.count(ViolationKind::Below),
        "flat evaluation complete"
    );
    Ok(report)
}

fn evaluate_list(
    store: &dyn HierarchyStore,
    config: &MonitorConfig,
    kind: TraitKind,
    side: ViolationKind,
) -> LensResult<ViolationReport> {
    let filter = AttributeFilter::new()
        .trait_kind(kind)
        .value_type(ValueType::Numeric)
        .sort(config.flat_sort)
        .page_size(config.flat_page_size);
    let limits = store
        .find_attributes(&filter)
        .map_err(|e| LensError::from_store("find_attributes", e))?;

    let mut report = ViolationReport::default();
    let pairs: Vec<(usize, AttributeId)> = limits
        .iter()
        .enumerate()
        .filter_map(|(i, limit)| limit.parent.map(|p| (i, p)))
        .collect();
    report.skipped += limits.len() - pairs.len();
    if limits.is_empty() {
        return Ok(report);
    }

    // One batch: limit values first, then parent readings.
    let mut ids: Vec<AttributeId> = limits.iter().map(|a| a.id).collect();
    ids.extend(pairs.iter().map(|(_, parent)| *parent));
    let values = store
        .bulk_get_values(&ids, None)
        .map_err(|e| LensError::from_store("bulk_get_values", e))?;
    let (limit_values, readings) = values.split_at(limits.len().min(values.len()));

    for ((index, parent), reading) in pairs.iter().zip(readings) {
        let limit_attr = &limits[*index];
        let (Some(observed), Some(limit)) = (
            reading.as_float(),
            limit_values.get(*index).and_then(crate::value::Value::as_float),
        ) else {
            debug!(subject = %limit_attr.subject_name, kind = %kind, "non-numeric reading or limit skipped");
            report.skipped += 1;
            continue;
        };

        report.evaluated += 1;
        if side.is_violated(observed, limit) {
            report.violations.push(Violation {
                subject_name: limit_attr.subject_name.clone(),
                attribute: *parent,
                kind: side,
                observed,
                limit,
            });
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::evaluator::test_support::populated;
    use crate::storage::SortOrder;
    use crate::value::Value;

    #[test]
    fn reports_both_sides_with_strict_comparison() {
        let readings = [50.0, 90.0, 91.0, 0.0, -1.0].map(Value::Float);
        let (store, _) = populated(&readings, 0.0, 90.0);

        let report = evaluate_flat(&store, &MonitorConfig::default()).unwrap();
        assert_eq!(report.evaluated, 10);
        assert_eq!(report.count(ViolationKind::Above), 1);
        assert_eq!(report.count(ViolationKind::Below), 1);

        let above: Vec<&str> = report
            .violations
            .iter()
            .filter(|v| v.kind == ViolationKind::Above)
            .map(|v| v.subject_name.as_str())
            .collect();
        assert_eq!(above, vec!["Location2"]);
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::Below && v.subject_name == "Location4" && v.limit == 0.0));
    }

    #[test]
    fn uses_four_round_trips() {
        let readings: Vec<Value> = (0..50).map(|i| Value::Float(f64::from(i) * 3.0)).collect();
        let (store, _) = populated(&readings, 10.0, 120.0);

        evaluate_flat(&store, &MonitorConfig::default()).unwrap();
        assert_eq!(store.round_trips(), 4);
    }

    #[test]
    fn page_size_and_sort_apply_per_list() {
        let readings: Vec<Value> = (0..5).map(|_| Value::Float(200.0)).collect();
        let (store, _) = populated(&readings, 0.0, 90.0);

        let config = MonitorConfig::default().with_flat_page_size(2);
        let report = evaluate_flat(&store, &config).unwrap();
        let names: Vec<&str> = report.violations.iter().map(|v| v.subject_name.as_str()).collect();
        assert_eq!(config.flat_sort, SortOrder::Descending);
        assert_eq!(names, vec!["Location4", "Location3"]);
    }

    #[test]
    fn missing_readings_are_skipped() {
        let readings = [Value::Null, Value::Text("n/a".into()), Value::Float(100.0)];
        let (store, _) = populated(&readings, 0.0, 90.0);

        let report = evaluate_flat(&store, &MonitorConfig::default()).unwrap();
        assert_eq!(report.skipped, 4);
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.count(ViolationKind::Above), 1);
    }

    #[test]
    fn outage_aborts_the_pass() {
        let (store, _) = populated(&[Value::Float(1.0)], 0.0, 90.0);
        store.set_available(false);
        let err = evaluate_flat(&store, &MonitorConfig::default()).unwrap_err();
        assert!(err.is_store_unavailable());
        assert!(err.is_retryable());
    }
}
