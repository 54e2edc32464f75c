//! Query-level visibility: publication state and per-flag guards.

use agora_core::{Caller, ColumnRef, EntitySchema, Predicate};

/// Condition every caller is subject to (`published IS TRUE`).
pub fn publication(schema: &EntitySchema) -> Predicate {
    match schema.published_column {
        Some(column) => Predicate::IsTrue(schema.table.col(column)),
        None => Predicate::True,
    }
}

/// Flag column guarding `flag` for this caller.
///
/// Authenticated callers are never guarded. Kinds without a visibility
/// record yield `None` as well.
pub fn guard_column(
    schema: &EntitySchema,
    flag: Option<&'static str>,
    caller: &Caller,
) -> Option<ColumnRef> {
    if caller.is_authenticated() {
        return None;
    }
    schema.visibility_flag(flag)
}

/// `predicate` AND-ed with the caller's guard for `flag`.
pub fn guarded(
    predicate: Predicate,
    schema: &EntitySchema,
    flag: Option<&'static str>,
    caller: &Caller,
) -> Predicate {
    predicate.guarded_by(guard_column(schema, flag, caller))
}
