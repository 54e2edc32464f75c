//! Explore query-string parsing.
//!
//! Each entity kind reads its own prefixed parameters:
//!
//! - `<prefix>Filter.<facetKey>=<slug>` (repeatable; `<prefix>Filter[<facetKey>]`
//!   is accepted too)
//! - `<prefix>SortBy=<field>-<direction>`
//! - `<prefix>Page=<n>`
//!
//! `search` and `lang` apply to every kind. Prefixes are `prf`, `org`, `evt`,
//! `prj` and `fnd`. Unrelated parameters are ignored.

use std::collections::BTreeMap;

use agora_core::{EntityKind, Error, RawFacetValue, RawFilterRequest, Result};

/// Per-kind filter requests decoded from query pairs.
pub fn parse_explore_params(
    pairs: Vec<(String, String)>,
) -> Result<BTreeMap<EntityKind, RawFilterRequest>> {
    let mut requests: BTreeMap<EntityKind, RawFilterRequest> = EntityKind::ALL
        .into_iter()
        .map(|kind| (kind, RawFilterRequest::default()))
        .collect();
    let mut search = None;
    let mut language = None;

    for (key, value) in pairs {
        match key.as_str() {
            "search" => {
                search = Some(value);
                continue;
            }
            "lang" => {
                language = Some(value);
                continue;
            }
            _ => {}
        }

        let Some((kind, param)) = EntityKind::ALL
            .into_iter()
            .find_map(|kind| key.strip_prefix(kind.prefix()).map(|rest| (kind, rest)))
        else {
            continue;
        };
        let Some(request) = requests.get_mut(&kind) else {
            continue;
        };

        match param {
            "SortBy" => request.sort_by = Some(value),
            "Page" => {
                let page = value.trim().parse::<u32>().map_err(|_| {
                    Error::InvalidInput(format!("Invalid page for {}: {}", kind, value))
                })?;
                request.page = Some(page);
            }
            other => {
                if let Some(facet) = filter_key(other) {
                    push_slug(&mut request.filter, facet, value);
                }
            }
        }
    }

    for request in requests.values_mut() {
        request.search.clone_from(&search);
        request.language.clone_from(&language);
    }

    Ok(requests)
}

/// Facet key of a `Filter.<key>` or `Filter[<key>]` parameter suffix.
fn filter_key(param: &str) -> Option<&str> {
    let rest = param.strip_prefix("Filter")?;
    let key = match rest.strip_prefix('.') {
        Some(key) => key,
        None => rest.strip_prefix('[')?.strip_suffix(']')?,
    };
    (!key.is_empty()).then_some(key)
}

fn push_slug(filter: &mut BTreeMap<String, RawFacetValue>, facet: &str, slug: String) {
    if slug.trim().is_empty() {
        return;
    }
    match filter.remove(facet) {
        None => {
            filter.insert(facet.to_string(), RawFacetValue::One(slug));
        }
        Some(RawFacetValue::One(first)) => {
            filter.insert(facet.to_string(), RawFacetValue::Many(vec![first, slug]));
        }
        Some(RawFacetValue::Many(mut slugs)) => {
            slugs.push(slug);
            filter.insert(facet.to_string(), RawFacetValue::Many(slugs));
        }
    }
}
