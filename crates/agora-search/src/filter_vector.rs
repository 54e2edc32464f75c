//! Filter vectors: per-facet co-occurrence counts.
//!
//! For facet K and value V the count is the size of the result set the
//! caller would get after replacing K's selection with `[V]`. Facets are
//! counted concurrently; any failing count fails the whole search.

use std::collections::{BTreeMap, HashMap};

use agora_core::{
    ExploreStore, FacetCatalog, FacetCount, FacetDef, LabelCatalog, Result,
};
use futures::future::try_join_all;
use tracing::{debug, instrument, trace};

use crate::facet_filter::period_variants;
use crate::query::ExploreQuery;

/// Count every facet of the query's schema.
#[instrument(
    skip_all,
    fields(subsystem = "search", component = "filter_vector", op = "compute", entity_kind = %query.schema.kind)
)]
pub async fn compute_filter_vectors(
    store: &dyn ExploreStore,
    catalog: &FacetCatalog,
    labels: &dyn LabelCatalog,
    query: &ExploreQuery<'_>,
) -> Result<BTreeMap<String, Vec<FacetCount>>> {
    let counted = try_join_all(
        query
            .schema
            .facets
            .iter()
            .map(|facet| facet_counts(store, catalog, labels, query, facet)),
    )
    .await?;

    Ok(counted.into_iter().collect())
}

async fn facet_counts(
    store: &dyn ExploreStore,
    catalog: &FacetCatalog,
    labels: &dyn LabelCatalog,
    query: &ExploreQuery<'_>,
    facet: &'static FacetDef,
) -> Result<(String, Vec<FacetCount>)> {
    let predicate = query.count_predicate(facet);

    let counts = if predicate.is_false() {
        debug!(facet_key = facet.key, short_circuit = true, "Facet count skipped");
        HashMap::new()
    } else if facet.is_period() {
        let variants = period_variants(query.schema, facet, query.now, query.time_zone);
        store
            .predicate_counts(query.schema, &predicate, &variants)
            .await?
    } else {
        store
            .facet_value_counts(query.schema, facet, &predicate)
            .await?
    };
    trace!(
        facet_key = facet.key,
        predicate_shape = %predicate.shape(),
        values = counts.len(),
        "Facet counted"
    );

    Ok((
        facet.key.to_string(),
        facet_options(catalog, labels, query, facet, &counts),
    ))
}

/// Every known option of `facet`, annotated with its count and state.
pub fn facet_options(
    catalog: &FacetCatalog,
    labels: &dyn LabelCatalog,
    query: &ExploreQuery<'_>,
    facet: &FacetDef,
    counts: &HashMap<String, i64>,
) -> Vec<FacetCount> {
    catalog
        .facet_values(facet)
        .into_iter()
        .map(|value| {
            let count = counts.get(&value.slug).copied().unwrap_or(0);
            let selected = query.request.is_selected(facet, &value.slug);
            let title = labels
                .label(&value.slug, facet.label_group, &query.request.language)
                .unwrap_or(value.title);
            FacetCount {
                value: value.slug,
                title,
                count,
                selected,
                disabled: !selected && count == 0,
            }
        })
        .collect()
}
