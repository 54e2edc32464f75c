//! Predicates of one explore request, assembled from the facet, free-text
//! and visibility builders.

use agora_core::{Caller, EntitySchema, FacetDef, FilterRequest, Predicate};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::facet_filter::facets_predicate;
use crate::visibility_filter::{guarded, publication};

/// Everything needed to build the predicates of one entity search.
#[derive(Debug, Clone)]
pub struct ExploreQuery<'a> {
    pub schema: &'static EntitySchema,
    pub request: &'a FilterRequest,
    pub caller: Caller,
    /// Instant the time windows are anchored to.
    pub now: DateTime<Utc>,
    pub time_zone: Tz,
    /// Free-text predicate, built once per request.
    pub text: Predicate,
}

impl ExploreQuery<'_> {
    /// Main result predicate, simplified.
    pub fn predicate(&self) -> Predicate {
        Predicate::and([
            publication(self.schema),
            facets_predicate(
                self.schema,
                self.request,
                &self.caller,
                self.now,
                self.time_zone,
                None,
            ),
            self.text.clone(),
        ])
        .simplify()
    }

    /// Predicate over which the values of `facet` are counted: the main
    /// predicate without `facet`'s own selection, restricted to entities
    /// whose `facet` relation the caller may see.
    pub fn count_predicate(&self, facet: &FacetDef) -> Predicate {
        Predicate::and([
            publication(self.schema),
            facets_predicate(
                self.schema,
                self.request,
                &self.caller,
                self.now,
                self.time_zone,
                Some(facet.key),
            ),
            self.text.clone(),
            guarded(Predicate::True, self.schema, facet.visibility, &self.caller),
        ])
        .simplify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::schema::{EVENTS, PROFILES};
    use agora_core::{ColumnRef, FacetSelection, Period, SortBy, SortDirection};
    use chrono::TimeZone;

    fn request(schema: &'static EntitySchema, area: &[&str]) -> FilterRequest {
        FilterRequest {
            kind: schema.kind,
            selections: if area.is_empty() {
                Vec::new()
            } else {
                vec![FacetSelection {
                    facet: schema.facet("area").unwrap(),
                    slugs: area.iter().map(|s| s.to_string()).collect(),
                }]
            },
            period: schema.period_facet().map(|_| Period::Now),
            period_selected: false,
            search: Vec::new(),
            sort: SortBy {
                field: schema.default_sort.0,
                direction: SortDirection::Asc,
            },
            page: 1,
            language: "de".into(),
        }
    }

    fn query<'a>(schema: &'static EntitySchema, request: &'a FilterRequest) -> ExploreQuery<'a> {
        ExploreQuery {
            schema,
            request,
            caller: Caller::anonymous(),
            now: Utc.with_ymd_and_hms(2026, 10, 14, 10, 0, 0).unwrap(),
            time_zone: chrono_tz::Europe::Berlin,
            text: Predicate::And(Vec::new()),
        }
    }

    #[test]
    fn test_unfiltered_profiles_match_everything() {
        let req = request(&PROFILES, &[]);
        assert!(query(&PROFILES, &req).predicate().is_true());
    }

    #[test]
    fn test_events_always_require_publication() {
        let req = request(&EVENTS, &[]);
        let Predicate::And(parts) = query(&EVENTS, &req).predicate() else {
            panic!("expected conjunction");
        };
        assert_eq!(parts[0], Predicate::IsTrue(ColumnRef::new("e", "published")));
    }

    #[test]
    fn test_count_predicate_drops_own_selection_and_adds_own_flag() {
        let req = request(&PROFILES, &["bayern"]);
        let q = query(&PROFILES, &req);
        let area = PROFILES.facet("area").unwrap();
        assert_eq!(
            q.count_predicate(area),
            Predicate::IsTrue(ColumnRef::new("v", "areas"))
        );

        // Another facet keeps the area selection.
        let offer = PROFILES.facet("offer").unwrap();
        let Predicate::And(parts) = q.count_predicate(offer) else {
            panic!("expected conjunction");
        };
        assert!(parts.iter().any(|p| matches!(p, Predicate::Exists(_))));
        assert!(parts.contains(&Predicate::IsTrue(ColumnRef::new("v", "offers"))));
    }

    #[test]
    fn test_false_text_short_circuits() {
        let req = request(&PROFILES, &[]);
        let mut q = query(&PROFILES, &req);
        q.text = Predicate::And(vec![Predicate::Or(Vec::new())]);
        assert!(q.predicate().is_false());
        assert!(q.count_predicate(PROFILES.facet("area").unwrap()).is_false());
    }
}
