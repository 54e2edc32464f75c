//! Core traits for agora's collaborators.
//!
//! The engine in `agora-search` talks to the store and to the label catalog
//! only through these traits, so tests can swap in in-memory doubles.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::pagination::OrderTerm;
use crate::predicate::Predicate;
use crate::schema::{EntitySchema, FacetDef};

// =============================================================================
// STORE TRAITS
// =============================================================================

/// Read-only access to searchable entities.
///
/// Every predicate passed in has already been simplified and is never
/// [`Predicate::False`]; the engine short-circuits that case itself.
#[async_trait]
pub trait ExploreStore: Send + Sync {
    /// Number of entities matching `predicate`.
    async fn count(&self, schema: &'static EntitySchema, predicate: &Predicate) -> Result<i64>;

    /// Identifiers of the first `take` matching entities in `order`.
    async fn fetch_page(
        &self,
        schema: &'static EntitySchema,
        predicate: &Predicate,
        order: &[OrderTerm],
        take: i64,
    ) -> Result<Vec<Uuid>>;

    /// Full rows for `ids` with facet values and nested relations attached.
    ///
    /// Output order is unspecified; ids without a row are skipped.
    async fn hydrate(&self, schema: &'static EntitySchema, ids: &[Uuid]) -> Result<Vec<RawEntity>>;

    /// Per-slug document counts of a facet among entities matching `predicate`,
    /// taken from the precomputed filter vectors. Slugs with no match may be
    /// absent.
    async fn facet_value_counts(
        &self,
        schema: &'static EntitySchema,
        facet: &'static FacetDef,
        predicate: &Predicate,
    ) -> Result<HashMap<String, i64>>;

    /// For each named variant, the number of entities matching
    /// `base AND variant`, computed in a single pass.
    async fn predicate_counts(
        &self,
        schema: &'static EntitySchema,
        base: &Predicate,
        variants: &[(String, Predicate)],
    ) -> Result<HashMap<String, i64>>;

    /// Every facet value, keyed by value table.
    async fn facet_values(&self) -> Result<BTreeMap<String, Vec<FacetValue>>>;
}

/// Maintenance of the precomputed `filter_vector` column.
#[async_trait]
pub trait FilterVectorRefresher: Send + Sync {
    /// Recompute filter vectors of one entity, or of every entity of the kind
    /// when `id` is `None`. Returns the number of rows updated.
    async fn refresh_filter_vectors(&self, kind: EntityKind, id: Option<Uuid>) -> Result<u64>;
}

// =============================================================================
// LABEL CATALOG
// =============================================================================

/// Locale-aware mapping from a typed word to a facet slug.
pub trait LabelCatalog: Send + Sync {
    /// Slug of the value in `group` whose label in `language` equals `word`
    /// (case-insensitive), if exactly one does.
    fn slug_for_word(&self, word: &str, group: &str, language: &str) -> Option<String>;

    /// Display label of `slug` in `group` for `language`, if one is known.
    fn label(&self, slug: &str, group: &str, language: &str) -> Option<String>;
}
