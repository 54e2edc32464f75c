//! # agora-core
//!
//! Core types, declarative entity schemas, and trait definitions for the
//! agora explore engine.
//!
//! This crate is storage-agnostic: predicates are plain data
//! ([`Predicate`]) that `agora-db` renders to SQL, and the store itself is
//! reached through the [`ExploreStore`] trait.

pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod models;
pub mod pagination;
pub mod period;
pub mod predicate;
pub mod schema;
pub mod traits;
pub mod visibility;

// Re-export commonly used types at crate root
pub use catalog::FacetCatalog;
pub use config::{ExploreConfig, ExploreFeatureFlags, ImageProxyConfig};
pub use error::{Error, Result};
pub use filter::{FacetSelection, FilterRequest, RawFacetValue, RawFilterRequest, SortBy};
pub use models::*;
pub use pagination::{OrderTerm, PageSpec, SortDirection};
pub use period::{Period, PeriodWindow};
pub use predicate::{ColumnRef, CompareOp, Join, Predicate, QueryParam, Subquery, TableRef};
pub use schema::{
    schema_for, EntitySchema, FacetDef, FacetSource, FieldDef, ImageDef, NestedDef, SearchField,
    SearchFieldKind, SortField, VisibilityTable,
};
pub use traits::*;
pub use visibility::{is_visible, VisibilityRecord};
