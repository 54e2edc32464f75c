//! In-memory snapshot of every known facet value.
//!
//! Used as the slug allowlist during validation and as the source of option
//! titles for filter vectors. Loaded from the store at startup and swapped
//! atomically on reload.

use std::collections::{BTreeMap, HashSet};

use crate::models::FacetValue;
use crate::period::Period;
use crate::schema::FacetDef;

/// Known facet values keyed by value table.
#[derive(Debug, Clone, Default)]
pub struct FacetCatalog {
    values: BTreeMap<String, Vec<FacetValue>>,
    slugs: BTreeMap<String, HashSet<String>>,
}

impl FacetCatalog {
    pub fn new(values: BTreeMap<String, Vec<FacetValue>>) -> Self {
        let slugs = values
            .iter()
            .map(|(table, vals)| {
                (
                    table.clone(),
                    vals.iter().map(|v| v.slug.clone()).collect::<HashSet<_>>(),
                )
            })
            .collect();
        Self { values, slugs }
    }

    /// All values of a value table, in store order.
    pub fn values(&self, table: &str) -> &[FacetValue] {
        self.values.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, table: &str, slug: &str) -> bool {
        self.slugs
            .get(table)
            .is_some_and(|slugs| slugs.contains(slug))
    }

    pub fn title(&self, table: &str, slug: &str) -> Option<&str> {
        self.values(table)
            .iter()
            .find(|v| v.slug == slug)
            .map(|v| v.title.as_str())
    }

    /// Options of a facet, including the synthetic time-window values.
    pub fn facet_values(&self, facet: &FacetDef) -> Vec<FacetValue> {
        match facet.value_table() {
            Some(table) => self.values(table).to_vec(),
            None => Period::ALL
                .iter()
                .map(|p| FacetValue::new(p.as_slug(), p.default_title()))
                .collect(),
        }
    }

    /// Whether `slug` is a valid option of `facet`.
    pub fn accepts(&self, facet: &FacetDef, slug: &str) -> bool {
        match facet.value_table() {
            Some(table) => self.contains(table, slug),
            None => slug.parse::<Period>().is_ok(),
        }
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Total number of values across all tables.
    pub fn len(&self) -> usize {
        self.values.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
