//! Bulk management of a monitored population.
//!
//! A population is the set of `Location{i}` entities created from one asset
//! template. Measured values are seeded from a [`ValueGenerator`] and written
//! in a single batch.

use std::collections::HashSet;
use std::ops::Range;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::entity::{AttributeId, Entity};
use crate::error::{LensError, LensResult};
use crate::generate::ValueGenerator;
use crate::storage::{HierarchyStore, StorageError};
use crate::template::{EntityTemplate, TemplateNode};
use crate::value::Value;

/// Range of seeded Temperature readings.
pub const TEMPERATURE_RANGE: Range<f64> = -20.0..120.0;
/// Range of seeded Humidity readings.
pub const HUMIDITY_RANGE: Range<f64> = 0.0..100.0;

/// Outcome of [`ensure_population`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PopulationSummary {
    pub created: usize,
    pub existing: usize,
    /// Names already taken by an entity of another template.
    pub skipped: usize,
}

/// Name of the `index`-th entity of a population.
#[must_use]
pub fn location_name(index: usize) -> String {
    format!("Location{index}")
}

fn entity_template(store: &dyn HierarchyStore, path: &str) -> LensResult<EntityTemplate> {
    match store
        .get_template(path)
        .map_err(|e| LensError::from_store("get_template", e))?
    {
        TemplateNode::Entity(template) => Ok(template),
        TemplateNode::Attribute(_) => Err(LensError::Storage(StorageError::TemplateNotFound(
            path.to_string(),
        ))),
    }
}

fn seed_writes(entities: &[Entity], generator: &ValueGenerator) -> LensResult<Vec<(AttributeId, Value)>> {
    let temperatures = generator.stream(0).sample(TEMPERATURE_RANGE, entities.len())?;
    let humidities = generator.stream(1).sample(HUMIDITY_RANGE, entities.len())?;

    let mut writes = Vec::with_capacity(entities.len() * 2);
    for ((entity, t), h) in entities.iter().zip(temperatures).zip(humidities) {
        if let Some(attr) = entity.attribute("Temperature") {
            writes.push((attr.id, Value::Float(t)));
        }
        if let Some(attr) = entity.attribute("Humidity") {
            writes.push((attr.id, Value::Float(h)));
        }
    }
    Ok(writes)
}

/// Creates `Location0..Location{count-1}` where missing, seeds their readings
/// and commits.
///
/// Entities that already exist are left untouched. A name held by an entity
/// of another template is skipped with a warning.
pub fn ensure_population(
    store: &dyn HierarchyStore,
    template_path: &str,
    count: usize,
    generator: &ValueGenerator,
) -> LensResult<PopulationSummary> {
    let template = entity_template(store, template_path)?;
    let present: HashSet<String> = store
        .list_entities(template.id)
        .map_err(|e| LensError::from_store("list_entities", e))?
        .into_iter()
        .map(|e| e.name)
        .collect();

    let mut created = Vec::new();
    let mut skipped = 0;
    for index in 0..count {
        let name = location_name(index);
        if present.contains(&name) {
            continue;
        }
        match store.create_entity(template.id, &name) {
            Ok(entity) => created.push(entity),
            Err(StorageError::DuplicateName { .. }) => {
                warn!(template = %template.name, entity = %name, "name taken by another template, skipped");
                skipped += 1;
            }
            Err(e) => return Err(LensError::from_store("create_entity", e)),
        }
    }

    let writes = seed_writes(&created, generator)?;
    if !writes.is_empty() {
        store
            .write_values(&writes, Utc::now())
            .map_err(|e| LensError::from_store("write_values", e))?;
    }
    store.commit().map_err(|e| LensError::from_store("commit", e))?;

    let summary = PopulationSummary {
        created: created.len(),
        existing: present.len(),
        skipped,
    };
    info!(
        template = %template.name,
        created = summary.created,
        existing = summary.existing,
        skipped = summary.skipped,
        "population ensured"
    );
    Ok(summary)
}

/// Writes fresh readings for every entity of the template at `at`.
///
/// Returns the number of values written.
pub fn regenerate_values(
    store: &dyn HierarchyStore,
    template_path: &str,
    generator: &ValueGenerator,
    at: DateTime<Utc>,
) -> LensResult<usize> {
    let template = entity_template(store, template_path)?;
    let entities = store
        .list_entities(template.id)
        .map_err(|e| LensError::from_store("list_entities", e))?;

    let writes = seed_writes(&entities, generator)?;
    if !writes.is_empty() {
        store
            .write_values(&writes, at)
            .map_err(|e| LensError::from_store("write_values", e))?;
    }
    store.commit().map_err(|e| LensError::from_store("commit", e))?;

    info!(template = %template.name, written = writes.len(), "values regenerated");
    Ok(writes.len())
}

/// Deletes every entity of the template and commits. Returns the count deleted.
pub fn delete_population(store: &dyn HierarchyStore, template_path: &str) -> LensResult<usize> {
    let template = entity_template(store, template_path)?;
    let entities = store
        .list_entities(template.id)
        .map_err(|e| LensError::from_store("list_entities", e))?;

    for entity in &entities {
        store
            .delete_entity(entity.id)
            .map_err(|e| LensError::from_store("delete_entity", e))?;
    }
    store.commit().map_err(|e| LensError::from_store("commit", e))?;

    info!(template = %template.name, deleted = entities.len(), "population deleted");
    Ok(entities.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::InMemoryHierarchyStore;
    use crate::template::{TemplateParent, TemplateRole};

    fn store() -> (InMemoryHierarchyStore, EntityTemplate) {
        let store = InMemoryHierarchyStore::new();
        let t = store
            .add_entity_template("Temperature_Simple", TemplateRole::Asset)
            .unwrap();
        for name in ["Temperature", "Humidity"] {
            store
                .add_attribute_template(TemplateParent::Entity(t.id), name)
                .unwrap();
        }
        store.commit().unwrap();
        (store, t)
    }

    fn readings(store: &InMemoryHierarchyStore, template: &EntityTemplate, name: &str) -> Vec<Value> {
        let ids: Vec<AttributeId> = store
            .list_entities(template.id)
            .unwrap()
            .iter()
            .filter_map(|e| e.attribute(name).map(|a| a.id))
            .collect();
        store.bulk_get_values(&ids, None).unwrap()
    }

    fn reading_of(store: &InMemoryHierarchyStore, template: &EntityTemplate, entity: &str) -> Value {
        let e = store
            .list_entities(template.id)
            .unwrap()
            .into_iter()
            .find(|e| e.name == entity)
            .unwrap();
        let id = e.attribute("Temperature").unwrap().id;
        store.bulk_get_values(&[id], None).unwrap().remove(0)
    }

    #[test]
    fn ensure_population_is_idempotent() {
        let (store, t) = store();
        let g = ValueGenerator::new(11);

        let first = ensure_population(&store, "Temperature_Simple", 10, &g).unwrap();
        assert_eq!(first, PopulationSummary { created: 10, existing: 0, skipped: 0 });
        let before = reading_of(&store, &t, "Location0");

        let second = ensure_population(&store, "Temperature_Simple", 12, &g).unwrap();
        assert_eq!(second, PopulationSummary { created: 2, existing: 10, skipped: 0 });
        assert_eq!(store.list_entities(t.id).unwrap().len(), 12);

        // Existing readings are not rewritten.
        assert_eq!(reading_of(&store, &t, "Location0"), before);
    }

    #[test]
    fn names_held_by_another_template_are_skipped() {
        let (store, t) = store();
        let other = store
            .add_entity_template("Humidity_Simple", TemplateRole::Asset)
            .unwrap();
        store.create_entity(other.id, "Location1").unwrap();

        let summary = ensure_population(&store, "Temperature_Simple", 3, &ValueGenerator::new(5)).unwrap();
        assert_eq!(summary, PopulationSummary { created: 2, existing: 0, skipped: 1 });

        let names: Vec<String> = store.list_entities(t.id).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n != "Location1"));
        for v in readings(&store, &t, "Temperature") {
            assert!(v.as_float().is_some());
        }
    }

    #[test]
    fn seeded_values_stay_in_range() {
        let (store, t) = store();
        ensure_population(&store, "Temperature_Simple", 50, &ValueGenerator::new(3)).unwrap();

        for v in readings(&store, &t, "Temperature") {
            assert!(TEMPERATURE_RANGE.contains(&v.as_float().unwrap()));
        }
        for v in readings(&store, &t, "Humidity") {
            assert!(HUMIDITY_RANGE.contains(&v.as_float().unwrap()));
        }
    }

    #[test]
    fn regenerate_uses_one_write() {
        let (store, t) = store();
        ensure_population(&store, "Temperature_Simple", 20, &ValueGenerator::new(1)).unwrap();
        let before = readings(&store, &t, "Temperature");

        store.reset_round_trips();
        let written = regenerate_values(
            &store,
            "Temperature_Simple",
            &ValueGenerator::new(2),
            Utc::now() + chrono::Duration::seconds(1),
        )
        .unwrap();
        assert_eq!(written, 40);
        // get_template, list_entities, write_values, commit
        assert_eq!(store.round_trips(), 4);
        assert_ne!(before, readings(&store, &t, "Temperature"));
    }

    #[test]
    fn delete_population_removes_everything() {
        let (store, t) = store();
        ensure_population(&store, "Temperature_Simple", 5, &ValueGenerator::new(1)).unwrap();
        assert_eq!(delete_population(&store, "Temperature_Simple").unwrap(), 5);
        assert!(store.list_entities(t.id).unwrap().is_empty());
        assert_eq!(delete_population(&store, "Temperature_Simple").unwrap(), 0);
    }

    #[test]
    fn attribute_path_is_not_a_population() {
        let (store, _) = store();
        let err = delete_population(&store, "Temperature_Simple|Temperature").unwrap_err();
        assert!(matches!(err, LensError::Storage(StorageError::TemplateNotFound(_))));
    }
}
