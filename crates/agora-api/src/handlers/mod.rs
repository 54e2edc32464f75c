//! HTTP handlers.

pub mod explore;

pub use explore::{
    explore_all, explore_kind, health_check, refresh_filter_vectors, reload_catalog,
};
