//! Storage for the asset hierarchy.
//!
//! The `HierarchyStore` trait is the only seam between the core and the
//! external store. `InMemoryHierarchyStore` is the embedded reference backend.

pub mod memory;
mod traits;

pub use memory::InMemoryHierarchyStore;
pub use traits::{AttributeFilter, HierarchyStore, NamePattern, SortOrder, StorageError};
