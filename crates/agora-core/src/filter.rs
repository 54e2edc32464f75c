//! Filter request parsing and validation.
//!
//! A [`RawFilterRequest`] is what the HTTP layer deserialises. Validation
//! turns it into a [`FilterRequest`] whose facet keys, slugs, sort key, page
//! and search tokens are all known-good. Nothing reaches a predicate builder
//! before this step succeeds.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::FacetCatalog;
use crate::config::ExploreConfig;
use crate::error::{Error, Result};
use crate::models::EntityKind;
use crate::pagination::SortDirection;
use crate::period::Period;
use crate::schema::{EntitySchema, FacetDef};

/// Slugs are ASCII words with `-`/`_`; anything else is rejected before the
/// catalog lookup.
static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,127}$").expect("valid slug regex"));

static LANGUAGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2,3}(-[A-Za-z]{2})?$").expect("valid language regex"));

// =============================================================================
// RAW REQUEST
// =============================================================================

/// A facet selection as it arrives on the wire: one slug or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFacetValue {
    One(String),
    Many(Vec<String>),
}

impl RawFacetValue {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

/// Unvalidated filter request for one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFilterRequest {
    #[serde(default)]
    pub filter: BTreeMap<String, RawFacetValue>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub language: Option<String>,
}

// =============================================================================
// VALIDATED REQUEST
// =============================================================================

/// A validated `<field>-<direction>` sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortBy {
    /// Sort key declared by the entity schema.
    pub field: &'static str,
    pub direction: SortDirection,
}

impl SortBy {
    /// Parse `<field>-<asc|desc>`; `None` yields the schema default.
    pub fn parse(raw: Option<&str>, schema: &EntitySchema) -> Result<Self> {
        let raw = match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw,
            None => {
                let (field, direction) = schema.default_sort;
                return Ok(Self { field, direction });
            }
        };

        let (field, direction) = raw.rsplit_once('-').ok_or_else(|| {
            Error::InvalidInput(format!("Invalid sort key: {} (expected <field>-<asc|desc>)", raw))
        })?;
        let direction = direction.parse::<SortDirection>()?;
        let field = schema.sort_field(field).ok_or_else(|| {
            Error::InvalidInput(format!("Unknown sort field for {}: {}", schema.kind, field))
        })?;

        Ok(Self {
            field: field.key,
            direction,
        })
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.field, self.direction)
    }
}

/// Non-empty, validated selection of one facet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetSelection {
    pub facet: &'static FacetDef,
    pub slugs: Vec<String>,
}

/// A validated filter request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRequest {
    pub kind: EntityKind,
    /// Selections of relation/column facets in declared facet order.
    pub selections: Vec<FacetSelection>,
    /// Effective time window; `Some` exactly when the kind has a period facet.
    pub period: Option<Period>,
    /// Whether the time window was chosen by the caller (not defaulted).
    pub period_selected: bool,
    /// Whitespace-separated tokens, empty tokens discarded.
    pub search: Vec<String>,
    pub sort: SortBy,
    pub page: u32,
    pub language: String,
}

impl FilterRequest {
    /// Validate a raw request against the entity schema and the facet catalog.
    pub fn validate(
        raw: RawFilterRequest,
        schema: &'static EntitySchema,
        catalog: &FacetCatalog,
        config: &ExploreConfig,
    ) -> Result<Self> {
        let mut by_key: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();

        for (key, value) in raw.filter {
            let facet = schema.facet(&key).ok_or_else(|| {
                Error::InvalidInput(format!("Unknown filter key for {}: {}", schema.kind, key))
            })?;

            let mut slugs: Vec<String> = Vec::new();
            for slug in value.into_vec() {
                let slug = slug.trim();
                if slug.is_empty() || slugs.iter().any(|s| s == slug) {
                    continue;
                }
                if !SLUG_PATTERN.is_match(slug) || !catalog.accepts(facet, slug) {
                    return Err(Error::InvalidInput(format!(
                        "Unknown value for filter {}: {}",
                        facet.key, slug
                    )));
                }
                slugs.push(slug.to_string());
            }

            if !facet.multi && slugs.len() > 1 {
                return Err(Error::InvalidInput(format!(
                    "Filter {} accepts a single value, got {}",
                    facet.key,
                    slugs.len()
                )));
            }

            by_key.insert(facet.key, slugs);
        }

        let mut period = None;
        let mut period_selected = false;
        let mut selections = Vec::new();
        for facet in schema.facets {
            let slugs = by_key.remove(facet.key).unwrap_or_default();
            if facet.is_period() {
                period_selected = !slugs.is_empty();
                period = Some(match slugs.first() {
                    Some(slug) => slug.parse::<Period>()?,
                    None => Period::default(),
                });
            } else if !slugs.is_empty() {
                selections.push(FacetSelection { facet, slugs });
            }
        }

        let search = tokenize(raw.search.as_deref().unwrap_or_default());
        if search.len() > config.max_search_tokens {
            return Err(Error::InvalidInput(format!(
                "Too many search terms: {} (max {})",
                search.len(),
                config.max_search_tokens
            )));
        }

        let sort = SortBy::parse(raw.sort_by.as_deref(), schema)?;

        let page = raw.page.unwrap_or(1);
        if page == 0 || page > config.max_page {
            return Err(Error::InvalidInput(format!(
                "Page out of range: {} (1..={})",
                page, config.max_page
            )));
        }

        let language = raw
            .language
            .map(|l| l.trim().to_string())
            .filter(|l| LANGUAGE_PATTERN.is_match(l))
            .unwrap_or_else(|| config.default_language.clone());

        Ok(Self {
            kind: schema.kind,
            selections,
            period,
            period_selected,
            search,
            sort,
            page,
            language,
        })
    }

    pub fn selection(&self, key: &str) -> Option<&FacetSelection> {
        self.selections.iter().find(|s| s.facet.key == key)
    }

    /// Whether `slug` is currently selected for facet `key`.
    pub fn is_selected(&self, facet: &FacetDef, slug: &str) -> bool {
        if facet.is_period() {
            return self.period_selected && self.period.is_some_and(|p| p.as_slug() == slug);
        }
        self.selection(facet.key)
            .is_some_and(|s| s.slugs.iter().any(|v| v == slug))
    }
}

/// Split search text on whitespace, discarding empty tokens.
pub fn tokenize(search: &str) -> Vec<String> {
    search.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FacetValue;
    use crate::schema::{EVENTS, ORGANIZATIONS, PROFILES};

    fn catalog() -> FacetCatalog {
        let mut values = BTreeMap::new();
        values.insert(
            "stage".to_string(),
            vec![FacetValue::new("online", "Online"), FacetValue::new("hybrid", "Hybrid")],
        );
        values.insert(
            "area".to_string(),
            vec![FacetValue::new("bayern", "Bayern"), FacetValue::new("berlin", "Berlin")],
        );
        values.insert(
            "organization_type".to_string(),
            vec![FacetValue::new("stiftung", "Stiftung")],
        );
        FacetCatalog::new(values)
    }

    fn raw(filter: &[(&str, RawFacetValue)]) -> RawFilterRequest {
        RawFilterRequest {
            filter: filter
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            ..Default::default()
        }
    }

    fn many(slugs: &[&str]) -> RawFacetValue {
        RawFacetValue::Many(slugs.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_defaults() {
        let req = FilterRequest::validate(
            RawFilterRequest::default(),
            &EVENTS,
            &catalog(),
            &ExploreConfig::default(),
        )
        .unwrap();
        assert_eq!(req.kind, EntityKind::Events);
        assert!(req.selections.is_empty());
        assert_eq!(req.period, Some(Period::Now));
        assert!(!req.period_selected);
        assert_eq!(req.page, 1);
        assert_eq!(req.sort.to_string(), "startTime-asc");
        assert_eq!(req.language, "de");
    }

    #[test]
    fn test_kind_without_period_has_none() {
        let req = FilterRequest::validate(
            RawFilterRequest::default(),
            &PROFILES,
            &catalog(),
            &ExploreConfig::default(),
        )
        .unwrap();
        assert_eq!(req.period, None);
    }

    #[test]
    fn test_unknown_slug_rejected() {
        let err = FilterRequest::validate(
            raw(&[("area", many(&["hessen"]))]),
            &ORGANIZATIONS,
            &catalog(),
            &ExploreConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_slug_with_sql_rejected() {
        let err = FilterRequest::validate(
            raw(&[("area", RawFacetValue::One("x' OR 1=1 --".into()))]),
            &ORGANIZATIONS,
            &catalog(),
            &ExploreConfig::default(),
        )
        .unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = FilterRequest::validate(
            raw(&[("stage", many(&["online"]))]),
            &ORGANIZATIONS,
            &catalog(),
            &ExploreConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown filter key"));
    }

    #[test]
    fn test_single_valued_facet_rejects_many() {
        let err = FilterRequest::validate(
            raw(&[("stage", many(&["online", "hybrid"]))]),
            &EVENTS,
            &catalog(),
            &ExploreConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("single value"));
    }

    #[test]
    fn test_empty_list_is_no_selection() {
        let req = FilterRequest::validate(
            raw(&[("area", many(&[])), ("type", many(&["", " "]))]),
            &ORGANIZATIONS,
            &catalog(),
            &ExploreConfig::default(),
        )
        .unwrap();
        assert!(req.selections.is_empty());
    }

    #[test]
    fn test_selections_follow_declared_order_and_dedup() {
        let req = FilterRequest::validate(
            raw(&[
                ("area", many(&["bayern", "bayern", "berlin"])),
                ("type", RawFacetValue::One("stiftung".into())),
            ]),
            &ORGANIZATIONS,
            &catalog(),
            &ExploreConfig::default(),
        )
        .unwrap();
        let keys: Vec<_> = req.selections.iter().map(|s| s.facet.key).collect();
        assert_eq!(keys, vec!["type", "area"]);
        assert_eq!(req.selection("area").unwrap().slugs, vec!["bayern", "berlin"]);
        assert!(req.is_selected(ORGANIZATIONS.facet("type").unwrap(), "stiftung"));
    }

    #[test]
    fn test_period_selection() {
        let req = FilterRequest::validate(
            raw(&[("periodOfTime", RawFacetValue::One("past".into()))]),
            &EVENTS,
            &catalog(),
            &ExploreConfig::default(),
        )
        .unwrap();
        assert_eq!(req.period, Some(Period::Past));
        assert!(req.period_selected);
        let facet = EVENTS.facet("periodOfTime").unwrap();
        assert!(req.is_selected(facet, "past"));
        assert!(!req.is_selected(facet, "now"));
    }

    #[test]
    fn test_sort_validation() {
        assert!(SortBy::parse(Some("startTime-desc"), &EVENTS).is_ok());
        assert!(SortBy::parse(Some("startTime"), &EVENTS).is_err());
        assert!(SortBy::parse(Some("title-asc"), &EVENTS).is_err());
        assert!(SortBy::parse(Some("name-up"), &EVENTS).is_err());
        let default = SortBy::parse(Some("  "), &PROFILES).unwrap();
        assert_eq!(default.to_string(), "firstName-asc");
    }

    #[test]
    fn test_page_range() {
        let config = ExploreConfig {
            max_page: 5,
            ..Default::default()
        };
        for (page, ok) in [(0, false), (1, true), (5, true), (6, false)] {
            let req = RawFilterRequest {
                page: Some(page),
                ..Default::default()
            };
            assert_eq!(
                FilterRequest::validate(req, &PROFILES, &catalog(), &config).is_ok(),
                ok,
                "page {page}"
            );
        }
    }

    #[test]
    fn test_search_tokens() {
        assert_eq!(tokenize("  Berlin   jazz \t"), vec!["Berlin", "jazz"]);
        assert!(tokenize("   ").is_empty());

        let config = ExploreConfig {
            max_search_tokens: 2,
            ..Default::default()
        };
        let req = RawFilterRequest {
            search: Some("a b c".into()),
            ..Default::default()
        };
        assert!(FilterRequest::validate(req, &PROFILES, &catalog(), &config).is_err());
    }

    #[test]
    fn test_language_fallback() {
        let req = RawFilterRequest {
            language: Some("en".into()),
            ..Default::default()
        };
        let ok = FilterRequest::validate(req, &PROFILES, &catalog(), &ExploreConfig::default());
        assert_eq!(ok.unwrap().language, "en");

        let req = RawFilterRequest {
            language: Some("../etc".into()),
            ..Default::default()
        };
        let fallback =
            FilterRequest::validate(req, &PROFILES, &catalog(), &ExploreConfig::default());
        assert_eq!(fallback.unwrap().language, "de");
    }

    #[test]
    fn test_raw_facet_value_deserializes_both_shapes() {
        let req: RawFilterRequest = serde_json::from_str(
            r#"{"filter": {"area": "bayern", "type": ["stiftung"]}, "sortBy": "name-asc"}"#,
        )
        .unwrap();
        assert_eq!(req.filter["area"], RawFacetValue::One("bayern".into()));
        assert_eq!(req.filter["type"], many(&["stiftung"]));
        assert_eq!(req.sort_by.as_deref(), Some("name-asc"));
    }
}
