//! Free-text predicates.
//!
//! Tokens are AND-ed; each token is an OR over every place it may match.
//! A token with no candidate at all contributes `Or([])`, which is FALSE,
//! so the whole search then matches nothing.

use agora_core::schema::{JOIN_ALIAS, TARGET_ALIAS, TARGET_VISIBILITY_ALIAS};
use agora_core::{
    schema_for, Caller, ColumnRef, EntitySchema, Join, LabelCatalog, NestedDef, Predicate,
    SearchFieldKind, Subquery, TableRef,
};

use crate::facet_filter::{relation_exists, VALUE_SLUG, VALUE_TITLE};
use crate::visibility_filter::guarded;

/// Build the free-text predicate for `tokens`.
///
/// `labels` enables the exact label lookup; pass `None` to disable it.
pub fn text_predicate(
    schema: &EntitySchema,
    tokens: &[String],
    language: &str,
    caller: &Caller,
    labels: Option<&dyn LabelCatalog>,
) -> Predicate {
    Predicate::And(
        tokens
            .iter()
            .map(|token| token_predicate(schema, token, language, caller, labels))
            .collect(),
    )
}

fn token_predicate(
    schema: &EntitySchema,
    token: &str,
    language: &str,
    caller: &Caller,
    labels: Option<&dyn LabelCatalog>,
) -> Predicate {
    let mut any = Vec::new();

    for field in schema.search_fields {
        let column = schema.table.col(field.column);
        let matcher = match field.kind {
            SearchFieldKind::Text => Predicate::contains(column, token),
            SearchFieldKind::TextArray => Predicate::has(column, token),
        };
        any.push(guarded(matcher, schema, field.visibility, caller));
    }

    for facet in schema.facets.iter().filter(|f| f.searchable) {
        let by_text = Predicate::or([
            Predicate::contains(VALUE_TITLE, token),
            Predicate::contains(VALUE_SLUG, token),
        ]);
        if let Some(exists) = relation_exists(schema, facet, by_text) {
            any.push(guarded(exists, schema, facet.visibility, caller));
        }

        let slug = labels.and_then(|l| l.slug_for_word(token, facet.label_group, language));
        if let Some(slug) = slug {
            if let Some(exists) =
                relation_exists(schema, facet, Predicate::any_of(VALUE_SLUG, vec![slug]))
            {
                any.push(guarded(exists, schema, facet.visibility, caller));
            }
        }
    }

    for nested in schema.nested {
        if let Some(matcher) = nested_match(schema, nested, token, caller) {
            any.push(matcher);
        }
    }

    Predicate::Or(any)
}

/// Match on the searchable column of related entities.
///
/// Anonymous callers only match related rows whose own visibility record
/// exposes that column, and only when the owner exposes the relation.
fn nested_match(
    schema: &EntitySchema,
    nested: &NestedDef,
    token: &str,
    caller: &Caller,
) -> Option<Predicate> {
    let column = nested.search_column?;
    let target = schema_for(nested.target);
    let target_table = TableRef::new(target.table.table, TARGET_ALIAS);

    let mut joins = vec![Join::new(
        target_table,
        target_table.col("id"),
        ColumnRef::new(JOIN_ALIAS, nested.target_column),
    )];
    let mut filter = vec![Predicate::contains(target_table.col(column), token)];

    if !caller.is_authenticated() {
        if let Some(vis) = target.visibility {
            let flag = target.field_by_column(column).and_then(|f| f.visibility);
            joins.push(Join::new(
                TableRef::new(vis.table, TARGET_VISIBILITY_ALIAS),
                ColumnRef::new(TARGET_VISIBILITY_ALIAS, vis.entity_column),
                target_table.col("id"),
            ));
            if let Some(flag) = flag {
                filter.push(Predicate::IsTrue(ColumnRef::new(TARGET_VISIBILITY_ALIAS, flag)));
            }
        }
    }

    let exists = Predicate::exists(Subquery {
        from: TableRef::new(nested.join_table, JOIN_ALIAS),
        joins,
        inner: ColumnRef::new(JOIN_ALIAS, nested.owner_column),
        outer: schema.id_column(),
        filter: Predicate::And(filter),
    });
    Some(guarded(exists, schema, nested.visibility, caller))
}
