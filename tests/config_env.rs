//! Environment-driven configuration. Kept to one test so the process
//! environment is only touched from a single thread.

use std::env;

use chrono::{Duration, Utc};

use traitlens::population::ensure_population;
use traitlens::provision::provision_limits;
use traitlens::storage::InMemoryHierarchyStore;
use traitlens::{
    evaluate_configured, HierarchyStore, MonitorConfig, SortOrder, TemplateParent, TemplateRole, ValidationError,
    Value, ValueGenerator, ViolationKind,
};

const KEYS: [&str; 4] = [
    "TRAITLENS_FLAT_PAGE_SIZE",
    "TRAITLENS_FLAT_SORT",
    "TRAITLENS_ASSET_TEMPLATE",
    "TRAITLENS_MEASURED_ATTRIBUTE",
];

fn clear() {
    for key in KEYS {
        env::remove_var(key);
    }
}

#[test]
fn from_env_overlays_and_rejects() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    clear();

    env::set_var("TRAITLENS_FLAT_PAGE_SIZE", "25");
    env::set_var("TRAITLENS_FLAT_SORT", "asc");
    env::set_var("TRAITLENS_ASSET_TEMPLATE", "Boiler");
    env::set_var("TRAITLENS_MEASURED_ATTRIBUTE", " Pressure ");
    let config = MonitorConfig::from_env().unwrap();
    assert_eq!(config.flat_page_size, 25);
    assert_eq!(config.flat_sort, SortOrder::Ascending);
    assert_eq!(config.template_page_size, 200);
    assert_eq!(config.asset_template, "Boiler");
    assert_eq!(config.measured_attribute, "Pressure");

    // The loaded names drive the configured evaluation.
    let store = InMemoryHierarchyStore::new();
    let boiler = store.add_entity_template("Boiler", TemplateRole::Asset).unwrap();
    store
        .add_attribute_template(TemplateParent::Entity(boiler.id), "Pressure")
        .unwrap();
    provision_limits(&store, "Boiler|Pressure", 1.0, 5.0).unwrap();
    store.commit().unwrap();
    ensure_population(&store, "Boiler", 2, &ValueGenerator::new(9)).unwrap();
    let writes: Vec<_> = store
        .list_entities(boiler.id)
        .unwrap()
        .iter()
        .zip([7.5, 3.0])
        .map(|(e, v)| (e.attribute("Pressure").unwrap().id, Value::Float(v)))
        .collect();
    store.write_values(&writes, Utc::now() + Duration::seconds(1)).unwrap();

    let report = evaluate_configured(&store, &config).unwrap();
    assert_eq!(report.evaluated, 2);
    assert_eq!(report.count(ViolationKind::Above), 1);
    assert_eq!(report.violations[0].subject_name, "Location0");

    env::set_var("TRAITLENS_FLAT_PAGE_SIZE", "abc");
    match MonitorConfig::from_env() {
        Err(ValidationError::InvalidEnv { key, value }) => {
            assert_eq!(key, "TRAITLENS_FLAT_PAGE_SIZE");
            assert_eq!(value, "abc");
        }
        other => panic!("expected InvalidEnv, got {other:?}"),
    }

    env::set_var("TRAITLENS_FLAT_PAGE_SIZE", "25");
    env::set_var("TRAITLENS_FLAT_SORT", "sideways");
    assert!(matches!(
        MonitorConfig::from_env(),
        Err(ValidationError::InvalidEnv { .. })
    ));

    env::set_var("TRAITLENS_FLAT_SORT", "desc");
    env::set_var("TRAITLENS_FLAT_PAGE_SIZE", "0");
    assert!(matches!(
        MonitorConfig::from_env(),
        Err(ValidationError::InvalidPageSize { value: 0 })
    ));

    clear();
    assert_eq!(MonitorConfig::from_env().unwrap(), MonitorConfig::default());
}
