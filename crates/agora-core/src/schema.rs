//! Declarative per-entity schemas.
//!
//! Every entity collection is described once here: its table, visibility
//! record, facet relations, free-text fields, output fields, images, nested
//! relations, and sort keys. The generic engine in `agora-search` is driven
//! entirely by these descriptions; there is no per-entity search code.
//!
//! All identifiers are `&'static str` and are the only text that is ever
//! interpolated into SQL.

use crate::models::EntityKind;
use crate::pagination::SortDirection;
use crate::predicate::{ColumnRef, TableRef};

/// Alias of the visibility record joined to the main row.
pub const VISIBILITY_ALIAS: &str = "v";

/// Alias of a facet join table inside EXISTS subqueries.
pub const JOIN_ALIAS: &str = "j";

/// Alias of a facet value table inside EXISTS subqueries.
pub const VALUE_ALIAS: &str = "fv";

/// Alias of a nested target table inside EXISTS subqueries.
pub const TARGET_ALIAS: &str = "t";

/// Alias of a nested target's visibility record.
pub const TARGET_VISIBILITY_ALIAS: &str = "tv";

// =============================================================================
// SCHEMA TYPES
// =============================================================================

/// The 1:1 visibility record of an entity.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityTable {
    pub table: &'static str,
    /// Foreign key column pointing at the entity id.
    pub entity_column: &'static str,
}

/// Where a facet's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetSource {
    /// Many-to-many through a join table.
    Relation {
        join_table: &'static str,
        owner_column: &'static str,
        value_column: &'static str,
        value_table: &'static str,
    },
    /// To-one foreign key on the entity row.
    Column {
        column: &'static str,
        value_table: &'static str,
    },
    /// Computed time window over the entity's own start/end timestamps.
    Period {
        start_column: &'static str,
        end_column: &'static str,
    },
}

/// A filterable dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetDef {
    pub key: &'static str,
    pub source: FacetSource,
    /// Multi-valued facets OR their selections; single-valued accept one slug.
    pub multi: bool,
    /// Visibility flag guarding this relation for anonymous callers.
    pub visibility: Option<&'static str>,
    /// Whether free-text tokens are matched against this facet's values.
    pub searchable: bool,
    /// Label catalog group used for locale-aware lookups.
    pub label_group: &'static str,
}

impl FacetDef {
    /// Reference table holding the facet's values, if it has one.
    pub fn value_table(&self) -> Option<&'static str> {
        match self.source {
            FacetSource::Relation { value_table, .. } | FacetSource::Column { value_table, .. } => {
                Some(value_table)
            }
            FacetSource::Period { .. } => None,
        }
    }

    pub fn is_period(&self) -> bool {
        matches!(self.source, FacetSource::Period { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFieldKind {
    /// Case-insensitive substring match.
    Text,
    /// Exact element membership in a text array.
    TextArray,
}

/// A scalar column matched by free-text tokens.
#[derive(Debug, Clone, Copy)]
pub struct SearchField {
    pub column: &'static str,
    pub kind: SearchFieldKind,
    pub visibility: Option<&'static str>,
}

/// An output field of a hydrated record.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Name in the output record.
    pub name: &'static str,
    pub column: &'static str,
    pub visibility: Option<&'static str>,
}

/// An image column resolved to image-proxy URLs.
#[derive(Debug, Clone, Copy)]
pub struct ImageDef {
    pub name: &'static str,
    pub column: &'static str,
    pub width: u32,
    pub height: u32,
    pub visibility: Option<&'static str>,
}

/// A relation to other searchable entities (team members, organizations).
#[derive(Debug, Clone, Copy)]
pub struct NestedDef {
    pub key: &'static str,
    pub join_table: &'static str,
    pub owner_column: &'static str,
    pub target_column: &'static str,
    pub target: EntityKind,
    /// Output field names of the target schema to include.
    pub fields: &'static [&'static str],
    /// Image names of the target schema to include.
    pub images: &'static [&'static str],
    /// Visibility flag of the owning entity guarding the whole relation.
    pub visibility: Option<&'static str>,
    /// Target column matched by free-text tokens, if any.
    pub search_column: Option<&'static str>,
}

/// A sortable field: wire key → column.
#[derive(Debug, Clone, Copy)]
pub struct SortField {
    pub key: &'static str,
    pub column: &'static str,
}

/// Complete description of one searchable entity collection.
#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub table: TableRef,
    pub visibility: Option<VisibilityTable>,
    /// Boolean column that must be true for every caller.
    pub published_column: Option<&'static str>,
    /// Facets in their fixed processing order.
    pub facets: &'static [FacetDef],
    pub search_fields: &'static [SearchField],
    pub fields: &'static [FieldDef],
    pub images: &'static [ImageDef],
    pub nested: &'static [NestedDef],
    pub sort_fields: &'static [SortField],
    pub default_sort: (&'static str, SortDirection),
    /// Sort key forced to descending when the time window is `past`.
    pub past_sort_override: Option<&'static str>,
}

impl EntitySchema {
    pub fn facet(&self, key: &str) -> Option<&'static FacetDef> {
        self.facets.iter().find(|f| f.key == key)
    }

    pub fn period_facet(&self) -> Option<&'static FacetDef> {
        self.facets.iter().find(|f| f.is_period())
    }

    pub fn sort_field(&self, key: &str) -> Option<&'static SortField> {
        self.sort_fields.iter().find(|s| s.key == key)
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_column(&self, column: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.column == column)
    }

    pub fn image(&self, name: &str) -> Option<&'static ImageDef> {
        self.images.iter().find(|i| i.name == name)
    }

    pub fn id_column(&self) -> ColumnRef {
        self.table.col("id")
    }

    /// Visibility flag column on the joined record.
    ///
    /// `None` when the flag is absent or the entity kind has no visibility
    /// concept at all (its data is public).
    pub fn visibility_flag(&self, flag: Option<&'static str>) -> Option<ColumnRef> {
        match (self.visibility, flag) {
            (Some(_), Some(name)) => Some(ColumnRef::new(VISIBILITY_ALIAS, name)),
            _ => None,
        }
    }

    /// Whether anonymous callers are subject to visibility checks.
    pub fn has_visibility(&self) -> bool {
        self.visibility.is_some()
    }
}

/// Look up the schema of an entity kind.
pub fn schema_for(kind: EntityKind) -> &'static EntitySchema {
    match kind {
        EntityKind::Profiles => &PROFILES,
        EntityKind::Organizations => &ORGANIZATIONS,
        EntityKind::Events => &EVENTS,
        EntityKind::Projects => &PROJECTS,
        EntityKind::Fundings => &FUNDINGS,
    }
}

// =============================================================================
// PROFILES
// =============================================================================

pub static PROFILES: EntitySchema = EntitySchema {
    kind: EntityKind::Profiles,
    table: TableRef::new("profile", "p"),
    visibility: Some(VisibilityTable {
        table: "profile_visibility",
        entity_column: "profile_id",
    }),
    published_column: None,
    facets: &[
        FacetDef {
            key: "area",
            source: FacetSource::Relation {
                join_table: "areas_on_profiles",
                owner_column: "profile_id",
                value_column: "area_id",
                value_table: "area",
            },
            multi: true,
            visibility: Some("areas"),
            searchable: true,
            label_group: "area",
        },
        FacetDef {
            key: "offer",
            source: FacetSource::Relation {
                join_table: "offers_on_profiles",
                owner_column: "profile_id",
                value_column: "offer_id",
                value_table: "offer",
            },
            multi: true,
            visibility: Some("offers"),
            searchable: true,
            label_group: "offer",
        },
        FacetDef {
            key: "seeking",
            source: FacetSource::Relation {
                join_table: "seekings_on_profiles",
                owner_column: "profile_id",
                value_column: "offer_id",
                value_table: "offer",
            },
            multi: true,
            visibility: Some("seekings"),
            searchable: true,
            label_group: "offer",
        },
    ],
    search_fields: &[
        SearchField { column: "username", kind: SearchFieldKind::Text, visibility: Some("username") },
        SearchField { column: "first_name", kind: SearchFieldKind::Text, visibility: Some("first_name") },
        SearchField { column: "last_name", kind: SearchFieldKind::Text, visibility: Some("last_name") },
        SearchField { column: "academic_title", kind: SearchFieldKind::Text, visibility: Some("academic_title") },
        SearchField { column: "position", kind: SearchFieldKind::Text, visibility: Some("position") },
        SearchField { column: "bio", kind: SearchFieldKind::Text, visibility: Some("bio") },
    ],
    fields: &[
        FieldDef { name: "username", column: "username", visibility: Some("username") },
        FieldDef { name: "firstName", column: "first_name", visibility: Some("first_name") },
        FieldDef { name: "lastName", column: "last_name", visibility: Some("last_name") },
        FieldDef { name: "academicTitle", column: "academic_title", visibility: Some("academic_title") },
        FieldDef { name: "position", column: "position", visibility: Some("position") },
        FieldDef { name: "bio", column: "bio", visibility: Some("bio") },
        FieldDef { name: "email", column: "email", visibility: Some("email") },
        FieldDef { name: "phone", column: "phone", visibility: Some("phone") },
        FieldDef { name: "website", column: "website", visibility: Some("website") },
    ],
    images: &[
        ImageDef { name: "avatar", column: "avatar", width: 144, height: 144, visibility: Some("avatar") },
        ImageDef { name: "background", column: "background", width: 1488, height: 480, visibility: Some("background") },
    ],
    nested: &[NestedDef {
        key: "memberOf",
        join_table: "member_of_organization",
        owner_column: "profile_id",
        target_column: "organization_id",
        target: EntityKind::Organizations,
        fields: &["slug", "name"],
        images: &["logo"],
        visibility: Some("member_of"),
        search_column: None,
    }],
    sort_fields: &[
        SortField { key: "firstName", column: "first_name" },
        SortField { key: "lastName", column: "last_name" },
        SortField { key: "createdAt", column: "created_at" },
    ],
    default_sort: ("firstName", SortDirection::Asc),
    past_sort_override: None,
};

// =============================================================================
// ORGANIZATIONS
// =============================================================================

pub static ORGANIZATIONS: EntitySchema = EntitySchema {
    kind: EntityKind::Organizations,
    table: TableRef::new("organization", "o"),
    visibility: Some(VisibilityTable {
        table: "organization_visibility",
        entity_column: "organization_id",
    }),
    published_column: None,
    facets: &[
        FacetDef {
            key: "type",
            source: FacetSource::Relation {
                join_table: "organization_types_on_organizations",
                owner_column: "organization_id",
                value_column: "organization_type_id",
                value_table: "organization_type",
            },
            multi: true,
            visibility: Some("types"),
            searchable: true,
            label_group: "organizationType",
        },
        FacetDef {
            key: "focus",
            source: FacetSource::Relation {
                join_table: "focuses_on_organizations",
                owner_column: "organization_id",
                value_column: "focus_id",
                value_table: "focus",
            },
            multi: true,
            visibility: Some("focuses"),
            searchable: true,
            label_group: "focus",
        },
        FacetDef {
            key: "area",
            source: FacetSource::Relation {
                join_table: "areas_on_organizations",
                owner_column: "organization_id",
                value_column: "area_id",
                value_table: "area",
            },
            multi: true,
            visibility: Some("areas"),
            searchable: true,
            label_group: "area",
        },
    ],
    search_fields: &[
        SearchField { column: "name", kind: SearchFieldKind::Text, visibility: Some("name") },
        SearchField { column: "email", kind: SearchFieldKind::Text, visibility: Some("email") },
        SearchField { column: "phone", kind: SearchFieldKind::Text, visibility: Some("phone") },
        SearchField { column: "street", kind: SearchFieldKind::Text, visibility: Some("street") },
        SearchField { column: "city", kind: SearchFieldKind::Text, visibility: Some("city") },
        SearchField { column: "zip_code", kind: SearchFieldKind::Text, visibility: Some("zip_code") },
        SearchField { column: "bio", kind: SearchFieldKind::Text, visibility: Some("bio") },
        SearchField { column: "supported_by", kind: SearchFieldKind::TextArray, visibility: Some("supported_by") },
    ],
    fields: &[
        FieldDef { name: "slug", column: "slug", visibility: Some("slug") },
        FieldDef { name: "name", column: "name", visibility: Some("name") },
        FieldDef { name: "bio", column: "bio", visibility: Some("bio") },
        FieldDef { name: "email", column: "email", visibility: Some("email") },
        FieldDef { name: "phone", column: "phone", visibility: Some("phone") },
        FieldDef { name: "website", column: "website", visibility: Some("website") },
        FieldDef { name: "street", column: "street", visibility: Some("street") },
        FieldDef { name: "streetNumber", column: "street_number", visibility: Some("street_number") },
        FieldDef { name: "zipCode", column: "zip_code", visibility: Some("zip_code") },
        FieldDef { name: "city", column: "city", visibility: Some("city") },
        FieldDef { name: "supportedBy", column: "supported_by", visibility: Some("supported_by") },
    ],
    images: &[
        ImageDef { name: "logo", column: "logo", width: 144, height: 144, visibility: Some("logo") },
        ImageDef { name: "background", column: "background", width: 1488, height: 480, visibility: Some("background") },
    ],
    nested: &[NestedDef {
        key: "teamMembers",
        join_table: "member_of_organization",
        owner_column: "organization_id",
        target_column: "profile_id",
        target: EntityKind::Profiles,
        fields: &["username", "firstName", "lastName", "academicTitle"],
        images: &["avatar"],
        visibility: Some("team_members"),
        search_column: None,
    }],
    sort_fields: &[
        SortField { key: "name", column: "name" },
        SortField { key: "createdAt", column: "created_at" },
    ],
    default_sort: ("name", SortDirection::Asc),
    past_sort_override: None,
};

// =============================================================================
// EVENTS
// =============================================================================

pub static EVENTS: EntitySchema = EntitySchema {
    kind: EntityKind::Events,
    table: TableRef::new("event", "e"),
    visibility: Some(VisibilityTable {
        table: "event_visibility",
        entity_column: "event_id",
    }),
    published_column: Some("published"),
    facets: &[
        FacetDef {
            key: "periodOfTime",
            source: FacetSource::Period {
                start_column: "start_time",
                end_column: "end_time",
            },
            multi: false,
            visibility: None,
            searchable: false,
            label_group: "periodOfTime",
        },
        FacetDef {
            key: "stage",
            source: FacetSource::Column {
                column: "stage_id",
                value_table: "stage",
            },
            multi: false,
            visibility: Some("stage"),
            searchable: true,
            label_group: "stage",
        },
        FacetDef {
            key: "focus",
            source: FacetSource::Relation {
                join_table: "focuses_on_events",
                owner_column: "event_id",
                value_column: "focus_id",
                value_table: "focus",
            },
            multi: true,
            visibility: Some("focuses"),
            searchable: true,
            label_group: "focus",
        },
        FacetDef {
            key: "eventTargetGroup",
            source: FacetSource::Relation {
                join_table: "event_target_groups_on_events",
                owner_column: "event_id",
                value_column: "event_target_group_id",
                value_table: "event_target_group",
            },
            multi: true,
            visibility: Some("target_groups"),
            searchable: true,
            label_group: "eventTargetGroup",
        },
        FacetDef {
            key: "area",
            source: FacetSource::Relation {
                join_table: "areas_on_events",
                owner_column: "event_id",
                value_column: "area_id",
                value_table: "area",
            },
            multi: true,
            visibility: Some("areas"),
            searchable: true,
            label_group: "area",
        },
    ],
    search_fields: &[
        SearchField { column: "name", kind: SearchFieldKind::Text, visibility: Some("name") },
        SearchField { column: "subline", kind: SearchFieldKind::Text, visibility: Some("subline") },
        SearchField { column: "description", kind: SearchFieldKind::Text, visibility: Some("description") },
        SearchField { column: "venue_name", kind: SearchFieldKind::Text, visibility: Some("venue_name") },
        SearchField { column: "venue_street", kind: SearchFieldKind::Text, visibility: Some("venue_street") },
        SearchField { column: "venue_city", kind: SearchFieldKind::Text, visibility: Some("venue_city") },
        SearchField { column: "venue_zip_code", kind: SearchFieldKind::Text, visibility: Some("venue_zip_code") },
    ],
    fields: &[
        FieldDef { name: "slug", column: "slug", visibility: Some("slug") },
        FieldDef { name: "name", column: "name", visibility: Some("name") },
        FieldDef { name: "subline", column: "subline", visibility: Some("subline") },
        FieldDef { name: "description", column: "description", visibility: Some("description") },
        FieldDef { name: "startTime", column: "start_time", visibility: Some("start_time") },
        FieldDef { name: "endTime", column: "end_time", visibility: Some("end_time") },
        FieldDef { name: "participantLimit", column: "participant_limit", visibility: Some("participant_limit") },
        FieldDef { name: "canceled", column: "canceled", visibility: Some("canceled") },
        FieldDef { name: "venueName", column: "venue_name", visibility: Some("venue_name") },
        FieldDef { name: "venueStreet", column: "venue_street", visibility: Some("venue_street") },
        FieldDef { name: "venueZipCode", column: "venue_zip_code", visibility: Some("venue_zip_code") },
        FieldDef { name: "venueCity", column: "venue_city", visibility: Some("venue_city") },
    ],
    images: &[ImageDef {
        name: "background",
        column: "background",
        width: 1488,
        height: 480,
        visibility: Some("background"),
    }],
    nested: &[NestedDef {
        key: "responsibleOrganizations",
        join_table: "responsible_organizations_on_events",
        owner_column: "event_id",
        target_column: "organization_id",
        target: EntityKind::Organizations,
        fields: &["slug", "name"],
        images: &["logo"],
        visibility: Some("responsible_organizations"),
        search_column: Some("name"),
    }],
    sort_fields: &[
        SortField { key: "startTime", column: "start_time" },
        SortField { key: "name", column: "name" },
        SortField { key: "createdAt", column: "created_at" },
    ],
    default_sort: ("startTime", SortDirection::Asc),
    past_sort_override: Some("startTime"),
};

// =============================================================================
// PROJECTS
// =============================================================================

pub static PROJECTS: EntitySchema = EntitySchema {
    kind: EntityKind::Projects,
    table: TableRef::new("project", "pj"),
    visibility: Some(VisibilityTable {
        table: "project_visibility",
        entity_column: "project_id",
    }),
    published_column: Some("published"),
    facets: &[
        FacetDef {
            key: "discipline",
            source: FacetSource::Relation {
                join_table: "disciplines_on_projects",
                owner_column: "project_id",
                value_column: "discipline_id",
                value_table: "discipline",
            },
            multi: true,
            visibility: Some("disciplines"),
            searchable: true,
            label_group: "discipline",
        },
        FacetDef {
            key: "additionalDiscipline",
            source: FacetSource::Relation {
                join_table: "additional_disciplines_on_projects",
                owner_column: "project_id",
                value_column: "additional_discipline_id",
                value_table: "additional_discipline",
            },
            multi: true,
            visibility: Some("additional_disciplines"),
            searchable: true,
            label_group: "additionalDiscipline",
        },
        FacetDef {
            key: "projectTargetGroup",
            source: FacetSource::Relation {
                join_table: "project_target_groups_on_projects",
                owner_column: "project_id",
                value_column: "project_target_group_id",
                value_table: "project_target_group",
            },
            multi: true,
            visibility: Some("target_groups"),
            searchable: true,
            label_group: "projectTargetGroup",
        },
        FacetDef {
            key: "area",
            source: FacetSource::Relation {
                join_table: "areas_on_projects",
                owner_column: "project_id",
                value_column: "area_id",
                value_table: "area",
            },
            multi: true,
            visibility: Some("areas"),
            searchable: true,
            label_group: "area",
        },
    ],
    search_fields: &[
        SearchField { column: "name", kind: SearchFieldKind::Text, visibility: Some("name") },
        SearchField { column: "subline", kind: SearchFieldKind::Text, visibility: Some("subline") },
        SearchField { column: "excerpt", kind: SearchFieldKind::Text, visibility: Some("excerpt") },
        SearchField { column: "description", kind: SearchFieldKind::Text, visibility: Some("description") },
        SearchField { column: "city", kind: SearchFieldKind::Text, visibility: Some("city") },
        SearchField { column: "zip_code", kind: SearchFieldKind::Text, visibility: Some("zip_code") },
    ],
    fields: &[
        FieldDef { name: "slug", column: "slug", visibility: Some("slug") },
        FieldDef { name: "name", column: "name", visibility: Some("name") },
        FieldDef { name: "subline", column: "subline", visibility: Some("subline") },
        FieldDef { name: "excerpt", column: "excerpt", visibility: Some("excerpt") },
        FieldDef { name: "description", column: "description", visibility: Some("description") },
        FieldDef { name: "city", column: "city", visibility: Some("city") },
        FieldDef { name: "zipCode", column: "zip_code", visibility: Some("zip_code") },
    ],
    images: &[
        ImageDef { name: "logo", column: "logo", width: 144, height: 144, visibility: Some("logo") },
        ImageDef { name: "background", column: "background", width: 1488, height: 480, visibility: Some("background") },
    ],
    nested: &[NestedDef {
        key: "responsibleOrganizations",
        join_table: "responsible_organizations_on_projects",
        owner_column: "project_id",
        target_column: "organization_id",
        target: EntityKind::Organizations,
        fields: &["slug", "name"],
        images: &["logo"],
        visibility: Some("responsible_organizations"),
        search_column: Some("name"),
    }],
    sort_fields: &[
        SortField { key: "name", column: "name" },
        SortField { key: "createdAt", column: "created_at" },
    ],
    default_sort: ("name", SortDirection::Asc),
    past_sort_override: None,
};

// =============================================================================
// FUNDINGS
// =============================================================================

/// Fundings are public reference data and carry no visibility record.
pub static FUNDINGS: EntitySchema = EntitySchema {
    kind: EntityKind::Fundings,
    table: TableRef::new("funding", "f"),
    visibility: None,
    published_column: None,
    facets: &[
        FacetDef {
            key: "type",
            source: FacetSource::Relation {
                join_table: "funding_types_on_fundings",
                owner_column: "funding_id",
                value_column: "funding_type_id",
                value_table: "funding_type",
            },
            multi: true,
            visibility: None,
            searchable: true,
            label_group: "fundingType",
        },
        FacetDef {
            key: "area",
            source: FacetSource::Relation {
                join_table: "funding_areas_on_fundings",
                owner_column: "funding_id",
                value_column: "funding_area_id",
                value_table: "funding_area",
            },
            multi: true,
            visibility: None,
            searchable: true,
            label_group: "fundingArea",
        },
        FacetDef {
            key: "region",
            source: FacetSource::Relation {
                join_table: "areas_on_fundings",
                owner_column: "funding_id",
                value_column: "area_id",
                value_table: "area",
            },
            multi: true,
            visibility: None,
            searchable: true,
            label_group: "area",
        },
        FacetDef {
            key: "eligibleEntity",
            source: FacetSource::Relation {
                join_table: "eligible_entities_on_fundings",
                owner_column: "funding_id",
                value_column: "eligible_entity_id",
                value_table: "eligible_entity",
            },
            multi: true,
            visibility: None,
            searchable: true,
            label_group: "eligibleEntity",
        },
    ],
    search_fields: &[
        SearchField { column: "title", kind: SearchFieldKind::Text, visibility: None },
        SearchField { column: "funder_name", kind: SearchFieldKind::Text, visibility: None },
    ],
    fields: &[
        FieldDef { name: "slug", column: "slug", visibility: None },
        FieldDef { name: "title", column: "title", visibility: None },
        FieldDef { name: "url", column: "url", visibility: None },
        FieldDef { name: "funderName", column: "funder_name", visibility: None },
    ],
    images: &[],
    nested: &[],
    sort_fields: &[
        SortField { key: "title", column: "title" },
        SortField { key: "createdAt", column: "created_at" },
    ],
    default_sort: ("createdAt", SortDirection::Desc),
    past_sort_override: None,
};
