//! # agora-search
//!
//! Faceted explore engine for agora.
//!
//! This crate provides:
//! - Facet, free-text and visibility predicate builders
//! - Filter vectors (per-facet co-occurrence counts)
//! - Result hydration with per-field redaction for anonymous callers
//! - Signed image-proxy URLs
//! - [`ExploreEngine`], which runs one search per entity kind or all of them
//!   concurrently
//!
//! Storage is reached only through [`agora_core::ExploreStore`].

pub mod engine;
pub mod facet_filter;
pub mod filter_vector;
pub mod hydrate;
pub mod images;
pub mod labels;
pub mod query;
pub mod text_filter;
pub mod visibility_filter;

// Re-export core types
pub use agora_core::*;

pub use engine::{Clock, ExploreEngine};
pub use filter_vector::{compute_filter_vectors, facet_options};
pub use hydrate::{hydrate_item, in_page_order};
pub use images::ImageUrlBuilder;
pub use labels::StaticLabelCatalog;
pub use query::ExploreQuery;
pub use text_filter::text_predicate;
