//! Data models shared across the explore engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::error::Error;

// =============================================================================
// ENTITY KINDS
// =============================================================================

/// The five searchable entity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Profiles,
    Organizations,
    Events,
    Projects,
    Fundings,
}

impl EntityKind {
    /// All kinds in the order the aggregate view presents them.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Profiles,
        EntityKind::Organizations,
        EntityKind::Events,
        EntityKind::Projects,
        EntityKind::Fundings,
    ];

    /// Path segment / serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::Organizations => "organizations",
            Self::Events => "events",
            Self::Projects => "projects",
            Self::Fundings => "fundings",
        }
    }

    /// Query parameter prefix (`evtFilter`, `evtSortBy`, `evtPage`).
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Profiles => "prf",
            Self::Organizations => "org",
            Self::Events => "evt",
            Self::Projects => "prj",
            Self::Fundings => "fnd",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s || k.prefix() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown entity kind: {}", s)))
    }
}

// =============================================================================
// CALLER
// =============================================================================

/// Identity of the caller as supplied by the session provider.
///
/// The engine never authenticates; it only distinguishes anonymous callers,
/// who get visibility predicates and redaction, from authenticated ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<Uuid>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn authenticated(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

// =============================================================================
// FACET VALUES
// =============================================================================

/// A reference value of a facet (area, focus, stage, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetValue {
    /// Stable wire value used in filter requests.
    pub slug: String,
    /// Display title in the store's default language.
    pub title: String,
}

impl FacetValue {
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
        }
    }
}

// =============================================================================
// RAW STORE ROWS
// =============================================================================

/// An entity row as fetched from the store, before redaction.
#[derive(Debug, Clone, Default)]
pub struct RawEntity {
    pub id: Uuid,
    /// Column name → value.
    pub record: Map<String, JsonValue>,
    /// Visibility record columns, `None` when the entity has none.
    pub visibility: Option<Map<String, JsonValue>>,
    /// Facet key → attached facet values.
    pub facets: BTreeMap<String, Vec<FacetValue>>,
    /// Nested relation key → related rows.
    pub nested: BTreeMap<String, Vec<RawNested>>,
}

/// A related entity row (team member, responsible organization, ...).
#[derive(Debug, Clone, Default)]
pub struct RawNested {
    pub id: Uuid,
    pub record: Map<String, JsonValue>,
    pub visibility: Option<Map<String, JsonValue>>,
}

// =============================================================================
// HYDRATED OUTPUT
// =============================================================================

/// Resolved image-proxy URLs for one image field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUrls {
    pub url: String,
    /// Low-resolution blurred variant for progressive loading.
    pub blurred_url: String,
}

/// A fully hydrated, redacted record ready for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploreItem {
    pub id: Uuid,
    pub kind: EntityKind,
    /// Output field name → value (`null` when not visible).
    pub fields: Map<String, JsonValue>,
    /// Facet key → attached values (empty when not visible).
    pub facets: BTreeMap<String, Vec<FacetValue>>,
    /// Image field name → URLs (`null` when missing or not visible).
    pub images: BTreeMap<String, Option<ImageUrls>>,
    /// Nested relation key → redacted sub-records.
    pub nested: BTreeMap<String, Vec<NestedItem>>,
}

/// A redacted nested sub-record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedItem {
    pub id: Uuid,
    pub kind: EntityKind,
    pub fields: Map<String, JsonValue>,
    pub images: BTreeMap<String, Option<ImageUrls>>,
}

/// Co-occurrence count for one facet value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetCount {
    pub value: String,
    pub title: String,
    pub count: i64,
    pub selected: bool,
    /// Unselected option whose selection would produce no results.
    pub disabled: bool,
}

/// Result of one entity-collection search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploreResult {
    pub kind: EntityKind,
    pub items: Vec<ExploreItem>,
    pub total_count: i64,
    pub filter_vectors: BTreeMap<String, Vec<FacetCount>>,
    pub page: u32,
    pub take: i64,
    /// Effective sort key after defaults and overrides (`startTime-desc`).
    pub sort_by: String,
}

/// Result of the aggregate "explore all" view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploreAllResult {
    pub results: BTreeMap<EntityKind, ExploreResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_round_trip_names() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
            assert_eq!(kind.prefix().parse::<EntityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_entity_kind_unknown() {
        let err = "people".parse::<EntityKind>().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_entity_kind_serializes_as_path_segment() {
        let json = serde_json::to_string(&EntityKind::Organizations).unwrap();
        assert_eq!(json, "\"organizations\"");
    }

    #[test]
    fn test_caller() {
        assert!(!Caller::anonymous().is_authenticated());
        assert!(Caller::authenticated(Uuid::nil()).is_authenticated());
        assert_eq!(Caller::default(), Caller::anonymous());
    }

    #[test]
    fn test_facet_count_serializes_camel_case() {
        let count = FacetCount {
            value: "online".into(),
            title: "Online".into(),
            count: 0,
            selected: false,
            disabled: true,
        };
        let json = serde_json::to_value(&count).unwrap();
        assert_eq!(json["disabled"], true);
        assert_eq!(json["value"], "online");
    }
}
