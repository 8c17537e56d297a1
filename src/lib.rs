//! # TraitLens - Trait metadata for asset hierarchies
//!
//! TraitLens attaches typed metadata ("traits") such as limits and forecasts to
//! the attributes of template-based asset hierarchies, and uses that metadata
//! to find threshold violations and to explain why monitored events fired.
//!
//! ## Core Concepts
//!
//! - **Trait**: a typed role (e.g. `UpperLimit`) carried by a child attribute
//! - **Template**: a schema node from which entities are instantiated
//! - **Entity**: a concrete instance owning measured and trait attributes
//! - **Event**: a detected interval with a recorded trigger expression
//!
//! ## Usage
//!
//! ```rust,ignore
//! use traitlens::{ensure_trait_at, evaluate_template, MonitorConfig, TraitKind, TraitOptions};
//! use traitlens::storage::InMemoryHierarchyStore;
//!
//! let store = InMemoryHierarchyStore::new();
//! ensure_trait_at(&store, "Temperature_Simple|Temperature", TraitKind::UpperLimit,
//!     &TraitOptions::fixed(90.0))?;
//! store.commit()?;
//!
//! let report = evaluate_template(&store, template_id, "Temperature", &MonitorConfig::default())?;
//! for v in &report.violations {
//!     println!("{v}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Schema and data types
pub mod catalog;
pub mod entity;
pub mod error;
pub mod event;
pub mod template;
pub mod time;
pub mod value;

// Store seam
pub mod storage;

// Operations
pub mod config;
pub mod evaluator;
pub mod explain;
pub mod generate;
pub mod population;
pub mod provision;
pub mod resolver;

pub use catalog::{TraitCategory, TraitKind, ValueKind, ALL_ATTRIBUTE_TRAITS, ALL_EVENT_TRAITS};
pub use config::MonitorConfig;
pub use entity::{Attribute, AttributeId, AttributeOwner, Entity, EntityId};
pub use error::{LensError, LensResult, ValidationError};
pub use event::{Event, EventId, NewEvent};
pub use evaluator::{
    evaluate_configured, evaluate_flat, evaluate_template, Violation, ViolationKind, ViolationReport,
};
pub use explain::{
    explain_configured, explain_event, explain_events, Attribution, CauseEntry, EventExplanation,
};
pub use generate::ValueGenerator;
pub use population::{delete_population, ensure_population, regenerate_values};
pub use provision::{ensure_trait, ensure_trait_at, ensure_traits, TraitOptions, TraitSpec};
pub use resolver::{all_traits, find_trait};
pub use storage::{AttributeFilter, HierarchyStore, NamePattern, SortOrder, StorageError};
pub use template::{
    AttributeTemplate, AttributeTemplateId, DataSource, EntityTemplate, TemplateId, TemplateNode,
    TemplateParent, TemplateRole,
};
pub use time::TimeRange;
pub use value::{Value, ValueType};
