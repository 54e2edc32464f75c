//! Cumulative pagination and deterministic ordering.
//!
//! Page `n` always requests the first `n` pages' worth of rows
//! (`take = page_size * page`), so "load more" results are append-only for
//! unchanged data. Every ordering ends with `id ASC` as a tie-break.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::filter::SortBy;
use crate::period::Period;
use crate::predicate::ColumnRef;
use crate::schema::EntitySchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(Error::InvalidInput(format!(
                "Invalid sort direction: {} (expected asc or desc)",
                other
            ))),
        }
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

/// Resolved take count and ordering for one entity search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpec {
    pub page: u32,
    pub take: i64,
    /// Effective sort after the `past` override.
    pub sort: SortBy,
    /// Sort term followed by the `id ASC` tie-break.
    pub order: Vec<OrderTerm>,
}

impl PageSpec {
    /// Resolve pagination for a validated request.
    ///
    /// `sort.field` must already be a sort key declared by `schema`.
    pub fn resolve(
        schema: &EntitySchema,
        sort: SortBy,
        page: u32,
        page_size: u32,
        period: Option<Period>,
    ) -> Self {
        let mut sort = sort;
        if period == Some(Period::Past) && schema.past_sort_override == Some(sort.field) {
            sort.direction = SortDirection::Desc;
        }

        let mut order = Vec::with_capacity(2);
        if let Some(field) = schema.sort_field(sort.field) {
            order.push(OrderTerm {
                column: schema.table.col(field.column),
                direction: sort.direction,
            });
        }
        order.push(OrderTerm {
            column: schema.id_column(),
            direction: SortDirection::Asc,
        });

        Self {
            page,
            take: i64::from(page_size) * i64::from(page),
            sort,
            order,
        }
    }

    /// Wire form of the effective sort (`startTime-desc`).
    pub fn sort_by(&self) -> String {
        self.sort.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EVENTS, FUNDINGS, PROFILES};

    fn sort(field: &'static str, direction: SortDirection) -> SortBy {
        SortBy { field, direction }
    }

    #[test]
    fn test_take_is_cumulative() {
        let s = sort("firstName", SortDirection::Asc);
        assert_eq!(PageSpec::resolve(&PROFILES, s, 1, 12, None).take, 12);
        assert_eq!(PageSpec::resolve(&PROFILES, s, 3, 12, None).take, 36);
    }

    #[test]
    fn test_order_ends_with_id_tie_break() {
        let spec = PageSpec::resolve(&PROFILES, sort("lastName", SortDirection::Desc), 1, 12, None);
        assert_eq!(spec.order.len(), 2);
        assert_eq!(spec.order[0].column, ColumnRef::new("p", "last_name"));
        assert_eq!(spec.order[0].direction, SortDirection::Desc);
        assert_eq!(spec.order[1].column, ColumnRef::new("p", "id"));
        assert_eq!(spec.order[1].direction, SortDirection::Asc);
    }

    #[test]
    fn test_past_forces_start_time_descending() {
        let spec = PageSpec::resolve(
            &EVENTS,
            sort("startTime", SortDirection::Asc),
            1,
            12,
            Some(Period::Past),
        );
        assert_eq!(spec.sort.direction, SortDirection::Desc);
        assert_eq!(spec.order[0].direction, SortDirection::Desc);
        assert_eq!(spec.sort_by(), "startTime-desc");
    }

    #[test]
    fn test_past_keeps_other_sort_fields() {
        let spec = PageSpec::resolve(
            &EVENTS,
            sort("name", SortDirection::Asc),
            1,
            12,
            Some(Period::Past),
        );
        assert_eq!(spec.sort.direction, SortDirection::Asc);
    }

    #[test]
    fn test_future_periods_keep_requested_direction() {
        let spec = PageSpec::resolve(
            &EVENTS,
            sort("startTime", SortDirection::Asc),
            2,
            10,
            Some(Period::ThisWeek),
        );
        assert_eq!(spec.sort_by(), "startTime-asc");
        assert_eq!(spec.take, 20);
    }

    #[test]
    fn test_kind_without_period_ignores_override() {
        let spec = PageSpec::resolve(
            &FUNDINGS,
            sort("createdAt", SortDirection::Asc),
            1,
            12,
            Some(Period::Past),
        );
        assert_eq!(spec.sort.direction, SortDirection::Asc);
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert_eq!("desc".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert!("DESC".parse::<SortDirection>().is_err());
    }
}
