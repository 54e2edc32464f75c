//! Facet predicates: one condition per selected facet, AND-ed in the
//! schema's declared order.
//!
//! A multi-valued selection is a disjunction over its slugs. It is emitted
//! as a single `EXISTS` whose value filter is `slug = ANY(...)`, which
//! matches exactly the rows at least one per-slug `EXISTS` would.

use agora_core::schema::{JOIN_ALIAS, VALUE_ALIAS};
use agora_core::{
    Caller, ColumnRef, CompareOp, EntitySchema, FacetDef, FacetSource, FilterRequest, Join,
    Period, PeriodWindow, Predicate, QueryParam, Subquery, TableRef,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::visibility_filter::guarded;

/// Slug column of the facet value table inside a relation subquery.
pub(crate) const VALUE_SLUG: ColumnRef = ColumnRef::new(VALUE_ALIAS, "slug");

/// Title column of the facet value table inside a relation subquery.
pub(crate) const VALUE_TITLE: ColumnRef = ColumnRef::new(VALUE_ALIAS, "title");

/// `EXISTS` over the facet's value rows attached to the outer entity,
/// restricted by `filter` on the value table. `None` for the time window.
pub fn relation_exists(
    schema: &EntitySchema,
    facet: &FacetDef,
    filter: Predicate,
) -> Option<Predicate> {
    let sub = match facet.source {
        FacetSource::Relation {
            join_table,
            owner_column,
            value_column,
            value_table,
        } => Subquery {
            from: TableRef::new(join_table, JOIN_ALIAS),
            joins: vec![Join::new(
                TableRef::new(value_table, VALUE_ALIAS),
                ColumnRef::new(VALUE_ALIAS, "id"),
                ColumnRef::new(JOIN_ALIAS, value_column),
            )],
            inner: ColumnRef::new(JOIN_ALIAS, owner_column),
            outer: schema.id_column(),
            filter,
        },
        FacetSource::Column {
            column,
            value_table,
        } => Subquery {
            from: TableRef::new(value_table, VALUE_ALIAS),
            joins: Vec::new(),
            inner: ColumnRef::new(VALUE_ALIAS, "id"),
            outer: schema.table.col(column),
            filter,
        },
        FacetSource::Period { .. } => return None,
    };
    Some(Predicate::exists(sub))
}

/// Condition for one facet selection. Empty selections impose nothing.
pub fn selection_condition(
    schema: &EntitySchema,
    facet: &FacetDef,
    slugs: &[String],
    caller: &Caller,
) -> Predicate {
    if slugs.is_empty() {
        return Predicate::True;
    }
    match relation_exists(schema, facet, Predicate::any_of(VALUE_SLUG, slugs.to_vec())) {
        Some(exists) => guarded(exists, schema, facet.visibility, caller),
        None => Predicate::True,
    }
}

/// Condition a time window imposes on the facet's start/end columns.
pub fn period_condition(schema: &EntitySchema, facet: &FacetDef, window: PeriodWindow) -> Predicate {
    let FacetSource::Period {
        start_column,
        end_column,
    } = facet.source
    else {
        return Predicate::True;
    };
    let start = schema.table.col(start_column);
    let end = schema.table.col(end_column);

    match window {
        PeriodWindow::EndsAfter(at) => {
            Predicate::compare(end, CompareOp::Gte, QueryParam::timestamp(at))
        }
        PeriodWindow::EndedBy(at) => {
            Predicate::compare(end, CompareOp::Lte, QueryParam::timestamp(at))
        }
        PeriodWindow::Intersects {
            start: from,
            end: until,
        } => Predicate::and([
            Predicate::compare(start, CompareOp::Lt, QueryParam::timestamp(until)),
            Predicate::compare(end, CompareOp::Gte, QueryParam::timestamp(from)),
        ]),
    }
}

/// Named per-value variants of the time-window facet, for counting.
pub fn period_variants(
    schema: &EntitySchema,
    facet: &FacetDef,
    now: DateTime<Utc>,
    tz: Tz,
) -> Vec<(String, Predicate)> {
    Period::ALL
        .iter()
        .map(|p| {
            (
                p.as_slug().to_string(),
                period_condition(schema, facet, p.window(now, tz)),
            )
        })
        .collect()
}

/// Conjunction of every facet condition of `request`, optionally leaving
/// out facet `exclude`.
pub fn facets_predicate(
    schema: &EntitySchema,
    request: &FilterRequest,
    caller: &Caller,
    now: DateTime<Utc>,
    tz: Tz,
    exclude: Option<&str>,
) -> Predicate {
    let mut parts = Vec::with_capacity(schema.facets.len());
    for facet in schema.facets {
        if exclude == Some(facet.key) {
            continue;
        }
        if facet.is_period() {
            if let Some(period) = request.period {
                parts.push(period_condition(schema, facet, period.window(now, tz)));
            }
        } else if let Some(selection) = request.selection(facet.key) {
            parts.push(selection_condition(schema, facet, &selection.slugs, caller));
        }
    }
    Predicate::And(parts)
}
