//! In-memory storage backend.
//!
//! Thread-safe implementation of [`HierarchyStore`] for embedded usage, tests,
//! and as a reference implementation. Every trait method counts as one round
//! trip, and the store can be switched offline to exercise outage handling.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::catalog::TraitKind;
use crate::entity::{Attribute, AttributeId, AttributeOwner, Entity, EntityId};
use crate::event::{Event, EventId, NewEvent};
use crate::storage::traits::{AttributeFilter, HierarchyStore, SortOrder, StorageError};
use crate::template::{
    split_path, AnalysisRule, AttributeTemplate, AttributeTemplateId, DataSource, EntityTemplate,
    TemplateId, TemplateNode, TemplateParent, TemplateRole,
};
use crate::time::TimeRange;
use crate::value::{Value, ValueType};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

type Series = BTreeMap<DateTime<Utc>, Value>;

fn read_series(series: Option<&Series>, at: Option<DateTime<Utc>>) -> Value {
    let Some(series) = series else {
        return Value::Null;
    };
    let found = match at {
        Some(at) => series.range(..=at).next_back(),
        None => series.iter().next_back(),
    };
    found.map_or(Value::Null, |(_, v)| v.clone())
}

#[derive(Debug, Clone)]
struct TemplateRecord {
    id: TemplateId,
    name: String,
    role: TemplateRole,
    roots: Vec<AttributeTemplateId>,
    analyses: Vec<AnalysisRule>,
}

#[derive(Debug, Clone)]
struct AttributeTemplateRecord {
    // `children` on the stored template is always empty; see `children` below.
    template: AttributeTemplate,
    children: Vec<AttributeTemplateId>,
    committed: bool,
}

#[derive(Debug, Clone)]
struct AttributeRecord {
    attribute: Attribute,
    children: Vec<AttributeId>,
}

#[derive(Debug, Clone)]
struct EntityRecord {
    id: EntityId,
    name: String,
    template: TemplateId,
    created_at: DateTime<Utc>,
    roots: Vec<AttributeId>,
}

#[derive(Debug, Clone)]
struct EventRecord {
    id: EventId,
    name: String,
    template_name: String,
    window: TimeRange,
    primary_subject: EntityId,
    roots: Vec<AttributeId>,
}

#[derive(Debug, Default)]
struct HierarchyState {
    templates: HashMap<TemplateId, TemplateRecord>,
    template_names: HashMap<String, TemplateId>,
    attribute_templates: HashMap<AttributeTemplateId, AttributeTemplateRecord>,
    entities: HashMap<EntityId, EntityRecord>,
    entity_names: HashMap<String, EntityId>,
    attributes: HashMap<AttributeId, AttributeRecord>,
    history: HashMap<AttributeId, Series>,
    series: HashMap<String, Series>,
    events: Vec<EventRecord>,
}

impl HierarchyState {
    fn attribute_template_snapshot(&self, id: AttributeTemplateId) -> Option<AttributeTemplate> {
        let rec = self.attribute_templates.get(&id)?;
        let mut snapshot = rec.template.clone();
        snapshot.children = rec
            .children
            .iter()
            .filter_map(|c| self.attribute_template_snapshot(*c))
            .collect();
        Some(snapshot)
    }

    fn template_snapshot(&self, rec: &TemplateRecord) -> EntityTemplate {
        EntityTemplate {
            id: rec.id,
            name: rec.name.clone(),
            role: rec.role,
            attributes: rec
                .roots
                .iter()
                .filter_map(|c| self.attribute_template_snapshot(*c))
                .collect(),
            analyses: rec.analyses.clone(),
        }
    }

    fn attribute_snapshot(&self, id: AttributeId) -> Option<Attribute> {
        let rec = self.attributes.get(&id)?;
        let mut snapshot = rec.attribute.clone();
        snapshot.children = rec
            .children
            .iter()
            .filter_map(|c| self.attribute_snapshot(*c))
            .collect();
        Some(snapshot)
    }

    fn entity_snapshot(&self, rec: &EntityRecord) -> Entity {
        Entity {
            id: rec.id,
            name: rec.name.clone(),
            template: rec.template,
            created_at: rec.created_at,
            attributes: rec
                .roots
                .iter()
                .filter_map(|a| self.attribute_snapshot(*a))
                .collect(),
        }
    }

    fn event_snapshot(&self, rec: &EventRecord) -> Event {
        Event {
            id: rec.id,
            name: rec.name.clone(),
            template_name: rec.template_name.clone(),
            window: rec.window.clone(),
            primary_subject: rec.primary_subject,
            attributes: rec
                .roots
                .iter()
                .filter_map(|a| self.attribute_snapshot(*a))
                .collect(),
        }
    }

    fn sibling_names(&self, parent: TemplateParent) -> Result<(Vec<AttributeTemplateId>, String), StorageError> {
        match parent {
            TemplateParent::Entity(id) => {
                let rec = self
                    .templates
                    .get(&id)
                    .ok_or_else(|| StorageError::TemplateNotFound(id.to_string()))?;
                Ok((rec.roots.clone(), format!("entity template '{}'", rec.name)))
            }
            TemplateParent::Attribute(id) => {
                let rec = self
                    .attribute_templates
                    .get(&id)
                    .ok_or(StorageError::AttributeTemplateNotFound(id))?;
                Ok((
                    rec.children.clone(),
                    format!("attribute template '{}'", rec.template.name),
                ))
            }
        }
    }

    /// Creates an attribute instance (and its committed children) from a template.
    fn instantiate(
        &mut self,
        owner: AttributeOwner,
        subject_name: &str,
        parent: Option<AttributeId>,
        template_id: AttributeTemplateId,
    ) -> Option<AttributeId> {
        let rec = self.attribute_templates.get(&template_id)?;
        if !rec.committed {
            return None;
        }
        let tmpl = rec.template.clone();
        let child_templates = rec.children.clone();

        let id = AttributeId::new();
        let attribute = Attribute {
            id,
            owner,
            subject_name: subject_name.to_string(),
            parent,
            template: Some(template_id),
            name: tmpl.name,
            value_type: tmpl.value_type,
            trait_kind: tmpl.trait_kind,
            source: tmpl.source,
            is_configuration_item: tmpl.is_configuration_item,
            children: Vec::new(),
        };
        self.attributes.insert(
            id,
            AttributeRecord {
                attribute,
                children: Vec::new(),
            },
        );

        let children: Vec<AttributeId> = child_templates
            .into_iter()
            .filter_map(|c| self.instantiate(owner, subject_name, Some(id), c))
            .collect();
        if let Some(rec) = self.attributes.get_mut(&id) {
            rec.children = children;
        }
        Some(id)
    }

    /// Adds instances for committed templates missing under `existing`.
    ///
    /// Returns the ids to append to the parent's child list. Existing instances
    /// are never modified.
    fn reconcile(
        &mut self,
        owner: AttributeOwner,
        subject_name: &str,
        parent: Option<AttributeId>,
        existing: &[AttributeId],
        templates: &[AttributeTemplateId],
    ) -> Vec<AttributeId> {
        let mut added = Vec::new();
        for template_id in templates {
            let matched = existing.iter().copied().find(|a| {
                self.attributes
                    .get(a)
                    .is_some_and(|r| r.attribute.template == Some(*template_id))
            });

            match matched {
                Some(attr_id) => {
                    let child_templates = self
                        .attribute_templates
                        .get(template_id)
                        .map(|r| r.children.clone())
                        .unwrap_or_default();
                    let current = self
                        .attributes
                        .get(&attr_id)
                        .map(|r| r.children.clone())
                        .unwrap_or_default();
                    let new_children =
                        self.reconcile(owner, subject_name, Some(attr_id), &current, &child_templates);
                    if let Some(rec) = self.attributes.get_mut(&attr_id) {
                        rec.children.extend(new_children);
                    }
                }
                None => {
                    if let Some(id) = self.instantiate(owner, subject_name, parent, *template_id) {
                        added.push(id);
                    }
                }
            }
        }
        added
    }

    fn collect_matching(&self, ids: &[AttributeId], filter: &AttributeFilter, out: &mut Vec<AttributeId>) {
        for id in ids {
            if let Some(rec) = self.attributes.get(id) {
                if filter.matches(&rec.attribute) {
                    out.push(*id);
                }
                self.collect_matching(&rec.children, filter, out);
            }
        }
    }

    fn remove_attribute_tree(&mut self, id: AttributeId) {
        if let Some(rec) = self.attributes.remove(&id) {
            self.history.remove(&id);
            for child in rec.children {
                self.remove_attribute_tree(child);
            }
        }
    }

    fn read_value(&self, id: AttributeId, at: Option<DateTime<Utc>>) -> Value {
        let Some(rec) = self.attributes.get(&id) else {
            return Value::Null;
        };
        match &rec.attribute.source {
            DataSource::Static { value, .. } => value.clone(),
            DataSource::Linked { series_key } => read_series(self.series.get(series_key), at),
            DataSource::Stored => read_series(self.history.get(&id), at),
        }
    }
}

/// Thread-safe in-memory hierarchy store.
#[derive(Debug)]
pub struct InMemoryHierarchyStore {
    state: RwLock<HierarchyState>,
    round_trips: AtomicUsize,
    available: AtomicBool,
}

impl Default for InMemoryHierarchyStore {
    fn default() -> Self {
        Self {
            state: RwLock::new(HierarchyState::default()),
            round_trips: AtomicUsize::new(0),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryHierarchyStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait calls served (or refused) since the last reset.
    #[must_use]
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    pub fn reset_round_trips(&self) {
        self.round_trips.store(0, Ordering::SeqCst);
    }

    /// Simulate an outage: while unavailable every trait call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn begin(&self, operation: &'static str) -> Result<(), StorageError> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable {
                operation: operation.to_string(),
                reason: "store is offline".to_string(),
            })
        }
    }

    /// Register an entity template. Template names are unique.
    pub fn add_entity_template(&self, name: &str, role: TemplateRole) -> Result<EntityTemplate, StorageError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::Backend("template name cannot be empty".to_string()));
        }
        let mut state = self.state.write().map_err(|_| lock_err("template.add"))?;
        if state.template_names.contains_key(name) {
            return Err(StorageError::DuplicateName {
                parent: "templates".to_string(),
                name: name.to_string(),
            });
        }
        let template = EntityTemplate::new(name, role);
        state.template_names.insert(template.name.clone(), template.id);
        state.templates.insert(
            template.id,
            TemplateRecord {
                id: template.id,
                name: template.name.clone(),
                role,
                roots: Vec::new(),
                analyses: Vec::new(),
            },
        );
        Ok(template)
    }

    /// Attach an analysis to an entity template.
    pub fn add_analysis(&self, template: TemplateId, rule: AnalysisRule) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("template.add_analysis"))?;
        let rec = state
            .templates
            .get_mut(&template)
            .ok_or_else(|| StorageError::TemplateNotFound(template.to_string()))?;
        rec.analyses.push(rule);
        Ok(())
    }

    /// Record a point on an external series that linked attributes read from.
    pub fn write_series(&self, key: &str, at: DateTime<Utc>, value: Value) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("series.write"))?;
        state.series.entry(key.to_string()).or_default().insert(at, value);
        Ok(())
    }
}

impl HierarchyStore for InMemoryHierarchyStore {
    fn get_template(&self, path: &str) -> Result<TemplateNode, StorageError> {
        self.begin("get_template")?;
        let state = self.state.read().map_err(|_| lock_err("template.get"))?;
        let not_found = || StorageError::TemplateNotFound(path.to_string());

        let segments = split_path(path);
        let (root, rest) = segments.split_first().ok_or_else(not_found)?;
        let template_id = state.template_names.get(*root).ok_or_else(not_found)?;
        let rec = state.templates.get(template_id).ok_or_else(not_found)?;

        let mut children = rec.roots.clone();
        let mut current: Option<AttributeTemplateId> = None;
        for segment in rest {
            let next = children
                .iter()
                .copied()
                .find(|c| {
                    state
                        .attribute_templates
                        .get(c)
                        .is_some_and(|r| r.template.name == *segment)
                })
                .ok_or_else(not_found)?;
            children = state
                .attribute_templates
                .get(&next)
                .map(|r| r.children.clone())
                .unwrap_or_default();
            current = Some(next);
        }

        match current {
            None => Ok(TemplateNode::Entity(state.template_snapshot(rec))),
            Some(id) => state
                .attribute_template_snapshot(id)
                .map(TemplateNode::Attribute)
                .ok_or_else(not_found),
        }
    }

    fn get_template_node(&self, node: TemplateParent) -> Result<TemplateNode, StorageError> {
        self.begin("get_template_node")?;
        let state = self.state.read().map_err(|_| lock_err("template.get_node"))?;
        match node {
            TemplateParent::Entity(id) => state
                .templates
                .get(&id)
                .map(|rec| TemplateNode::Entity(state.template_snapshot(rec)))
                .ok_or_else(|| StorageError::TemplateNotFound(id.to_string())),
            TemplateParent::Attribute(id) => state
                .attribute_template_snapshot(id)
                .map(TemplateNode::Attribute)
                .ok_or(StorageError::AttributeTemplateNotFound(id)),
        }
    }

    fn add_attribute_template(
        &self,
        parent: TemplateParent,
        name: &str,
    ) -> Result<AttributeTemplate, StorageError> {
        self.begin("add_attribute_template")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::Backend("attribute name cannot be empty".to_string()));
        }
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("attribute_template.add"))?;

        let (siblings, parent_label) = state.sibling_names(parent)?;
        let duplicate = siblings.iter().any(|s| {
            state
                .attribute_templates
                .get(s)
                .is_some_and(|r| r.template.name == name)
        });
        if duplicate {
            return Err(StorageError::DuplicateName {
                parent: parent_label,
                name: name.to_string(),
            });
        }

        let template = match parent {
            TemplateParent::Entity(id) => AttributeTemplate::new(id, None, name),
            TemplateParent::Attribute(id) => {
                let owner = state
                    .attribute_templates
                    .get(&id)
                    .map(|r| r.template.template)
                    .ok_or(StorageError::AttributeTemplateNotFound(id))?;
                AttributeTemplate::new(owner, Some(id), name)
            }
        };

        match parent {
            TemplateParent::Entity(id) => {
                if let Some(rec) = state.templates.get_mut(&id) {
                    rec.roots.push(template.id);
                }
            }
            TemplateParent::Attribute(id) => {
                if let Some(rec) = state.attribute_templates.get_mut(&id) {
                    rec.children.push(template.id);
                }
            }
        }
        state.attribute_templates.insert(
            template.id,
            AttributeTemplateRecord {
                template: template.clone(),
                children: Vec::new(),
                committed: false,
            },
        );
        Ok(template)
    }

    fn update_attribute_template(&self, template: &AttributeTemplate) -> Result<(), StorageError> {
        self.begin("update_attribute_template")?;
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("attribute_template.update"))?;

        let current = state
            .attribute_templates
            .get(&template.id)
            .ok_or(StorageError::AttributeTemplateNotFound(template.id))?;
        if current.template.name != template.name {
            let parent = current
                .template
                .parent
                .map_or(TemplateParent::Entity(current.template.template), TemplateParent::Attribute);
            let (siblings, parent_label) = state.sibling_names(parent)?;
            let clash = siblings.iter().any(|s| {
                *s != template.id
                    && state
                        .attribute_templates
                        .get(s)
                        .is_some_and(|r| r.template.name == template.name)
            });
            if clash {
                return Err(StorageError::DuplicateName {
                    parent: parent_label,
                    name: template.name.clone(),
                });
            }
        }

        if let Some(rec) = state.attribute_templates.get_mut(&template.id) {
            let stored = &mut rec.template;
            stored.name.clone_from(&template.name);
            stored.value_type = template.value_type;
            stored.trait_kind = template.trait_kind;
            stored.default_unit.clone_from(&template.default_unit);
            stored.source = template.source.clone();
            stored.is_configuration_item = template.is_configuration_item;
        }
        Ok(())
    }

    fn set_analysis_config(
        &self,
        template: TemplateId,
        index: usize,
        config: &str,
    ) -> Result<(), StorageError> {
        self.begin("set_analysis_config")?;
        let mut state = self.state.write().map_err(|_| lock_err("analysis.set"))?;
        let rec = state
            .templates
            .get_mut(&template)
            .ok_or_else(|| StorageError::TemplateNotFound(template.to_string()))?;
        let analysis = rec.analyses.get_mut(index).ok_or_else(|| {
            StorageError::Backend(format!("template '{}' has no analysis #{index}", rec.name))
        })?;
        analysis.config = config.to_string();
        Ok(())
    }

    fn find_attributes(&self, filter: &AttributeFilter) -> Result<Vec<Attribute>, StorageError> {
        self.begin("find_attributes")?;
        let state = self.state.read().map_err(|_| lock_err("attribute.find"))?;

        let mut matched = Vec::new();
        for entity in state.entities.values() {
            if filter.template.is_some_and(|t| t != entity.template) {
                continue;
            }
            state.collect_matching(&entity.roots, filter, &mut matched);
        }

        let mut keyed: Vec<(&str, &str, AttributeId)> = matched
            .iter()
            .filter_map(|id| {
                state.attributes.get(id).map(|r| {
                    (
                        r.attribute.subject_name.as_str(),
                        r.attribute.name.as_str(),
                        *id,
                    )
                })
            })
            .collect();
        match filter.sort {
            SortOrder::Ascending => keyed.sort_unstable(),
            SortOrder::Descending => keyed.sort_unstable_by(|a, b| b.cmp(a)),
        }
        keyed.truncate(filter.page_size);

        Ok(keyed
            .into_iter()
            .filter_map(|(_, _, id)| state.attribute_snapshot(id))
            .collect())
    }

    fn bulk_get_values(
        &self,
        attributes: &[AttributeId],
        at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, StorageError> {
        self.begin("bulk_get_values")?;
        let state = self.state.read().map_err(|_| lock_err("value.bulk_get"))?;
        Ok(attributes.iter().map(|id| state.read_value(*id, at)).collect())
    }

    fn write_values(&self, values: &[(AttributeId, Value)], at: DateTime<Utc>) -> Result<(), StorageError> {
        self.begin("write_values")?;
        let mut state = self.state.write().map_err(|_| lock_err("value.write"))?;

        // Validate the whole batch before touching anything.
        if let Some((missing, _)) = values.iter().find(|(id, _)| !state.attributes.contains_key(id)) {
            return Err(StorageError::AttributeNotFound(*missing));
        }

        for (id, value) in values {
            let source = state
                .attributes
                .get(id)
                .map(|r| r.attribute.source.clone())
                .unwrap_or_default();
            match source {
                DataSource::Stored => {
                    state.history.entry(*id).or_default().insert(at, value.clone());
                }
                DataSource::Linked { series_key } => {
                    state.series.entry(series_key).or_default().insert(at, value.clone());
                }
                DataSource::Static { unit, .. } => {
                    if let Some(rec) = state.attributes.get_mut(id) {
                        rec.attribute.source = DataSource::Static {
                            value: value.clone(),
                            unit,
                        };
                    }
                }
            }
        }
        Ok(())
    }

    fn commit(&self) -> Result<(), StorageError> {
        self.begin("commit")?;
        let mut state = self.state.write().map_err(|_| lock_err("commit"))?;

        for rec in state.attribute_templates.values_mut() {
            rec.committed = true;
        }

        let entities: Vec<(EntityId, String, Vec<AttributeId>, Vec<AttributeTemplateId>)> = state
            .entities
            .values()
            .map(|e| {
                let roots = state
                    .templates
                    .get(&e.template)
                    .map(|t| t.roots.clone())
                    .unwrap_or_default();
                (e.id, e.name.clone(), e.roots.clone(), roots)
            })
            .collect();

        for (id, name, existing, templates) in entities {
            let added = state.reconcile(AttributeOwner::Entity(id), &name, None, &existing, &templates);
            if let Some(rec) = state.entities.get_mut(&id) {
                rec.roots.extend(added);
            }
        }
        Ok(())
    }

    fn create_entity(&self, template: TemplateId, name: &str) -> Result<Entity, StorageError> {
        self.begin("create_entity")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::Backend("entity name cannot be empty".to_string()));
        }
        let mut state = self.state.write().map_err(|_| lock_err("entity.create"))?;
        if state.entity_names.contains_key(name) {
            return Err(StorageError::DuplicateName {
                parent: "entities".to_string(),
                name: name.to_string(),
            });
        }
        let roots = state
            .templates
            .get(&template)
            .map(|t| t.roots.clone())
            .ok_or_else(|| StorageError::TemplateNotFound(template.to_string()))?;

        let id = EntityId::new();
        let owner = AttributeOwner::Entity(id);
        let attributes: Vec<AttributeId> = roots
            .into_iter()
            .filter_map(|t| state.instantiate(owner, name, None, t))
            .collect();

        let rec = EntityRecord {
            id,
            name: name.to_string(),
            template,
            created_at: Utc::now(),
            roots: attributes,
        };
        let snapshot = state.entity_snapshot(&rec);
        state.entity_names.insert(rec.name.clone(), id);
        state.entities.insert(id, rec);
        Ok(snapshot)
    }

    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, StorageError> {
        self.begin("get_entity")?;
        let state = self.state.read().map_err(|_| lock_err("entity.get"))?;
        Ok(state.entities.get(&id).map(|rec| state.entity_snapshot(rec)))
    }

    fn delete_entity(&self, id: EntityId) -> Result<(), StorageError> {
        self.begin("delete_entity")?;
        let mut state = self.state.write().map_err(|_| lock_err("entity.delete"))?;
        let rec = state
            .entities
            .remove(&id)
            .ok_or(StorageError::EntityNotFound(id))?;
        state.entity_names.remove(&rec.name);
        for attr in rec.roots {
            state.remove_attribute_tree(attr);
        }
        Ok(())
    }

    fn list_entities(&self, template: TemplateId) -> Result<Vec<Entity>, StorageError> {
        self.begin("list_entities")?;
        let state = self.state.read().map_err(|_| lock_err("entity.list"))?;
        let mut entities: Vec<Entity> = state
            .entities
            .values()
            .filter(|e| e.template == template)
            .map(|e| state.entity_snapshot(e))
            .collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entities)
    }

    fn create_event(&self, event: NewEvent) -> Result<Event, StorageError> {
        self.begin("create_event")?;
        let mut state = self.state.write().map_err(|_| lock_err("event.create"))?;
        if !state.entities.contains_key(&event.primary_subject) {
            return Err(StorageError::EntityNotFound(event.primary_subject));
        }
        let (template_name, roots) = state
            .templates
            .get(&event.template)
            .map(|t| (t.name.clone(), t.roots.clone()))
            .ok_or_else(|| StorageError::TemplateNotFound(event.template.to_string()))?;

        let id = EventId::new();
        let owner = AttributeOwner::Event(id);
        let attributes: Vec<AttributeId> = roots
            .into_iter()
            .filter_map(|t| state.instantiate(owner, &event.name, None, t))
            .collect();

        for attr_id in &attributes {
            let Some(rec) = state.attributes.get_mut(attr_id) else {
                continue;
            };
            let text = match rec.attribute.trait_kind {
                Some(TraitKind::CauseTriggerExpression) => event.trigger_expression.clone(),
                Some(TraitKind::CauseTriggerName) => event.trigger_name.clone(),
                _ => None,
            };
            if let Some(text) = text {
                rec.attribute.value_type = ValueType::Text;
                rec.attribute.source = DataSource::fixed(text, None);
            }
        }

        let rec = EventRecord {
            id,
            name: event.name,
            template_name,
            window: event.window,
            primary_subject: event.primary_subject,
            roots: attributes,
        };
        let snapshot = state.event_snapshot(&rec);
        state.events.push(rec);
        Ok(snapshot)
    }

    fn find_events(&self, template_name: &str) -> Result<Vec<Event>, StorageError> {
        self.begin("find_events")?;
        let state = self.state.read().map_err(|_| lock_err("event.find"))?;
        let mut events: Vec<Event> = state
            .events
            .iter()
            .filter(|e| e.template_name == template_name)
            .map(|e| state.event_snapshot(e))
            .collect();
        events.sort_by(|a, b| a.window.start.cmp(&b.window.start));
        Ok(events)
    }
}
