//! Field/relation visibility for anonymous callers.
//!
//! Authenticated callers see everything. Anonymous callers see a field only
//! when the entity's visibility record has its flag set to `true`; a missing
//! record hides everything. The query-level counterpart is
//! `v.<flag> IS TRUE`, built from [`crate::EntitySchema::visibility_flag`].

use serde_json::{Map, Value as JsonValue};

use crate::models::Caller;
use crate::schema::EntitySchema;

/// The visibility state of one fetched entity.
#[derive(Debug, Clone, Copy)]
pub enum VisibilityRecord<'a> {
    /// The entity kind has no visibility concept; all data is public.
    Public,
    /// The kind has visibility records but this entity has none.
    Missing,
    /// The entity's flags, keyed by visibility column name.
    Flags(&'a Map<String, JsonValue>),
}

impl<'a> VisibilityRecord<'a> {
    pub fn for_schema(schema: &EntitySchema, record: Option<&'a Map<String, JsonValue>>) -> Self {
        if !schema.has_visibility() {
            return Self::Public;
        }
        match record {
            Some(flags) => Self::Flags(flags),
            None => Self::Missing,
        }
    }

    /// Whether `flag` is explicitly `true`.
    fn flag(&self, flag: &str) -> bool {
        match self {
            Self::Public => true,
            Self::Missing => false,
            Self::Flags(flags) => matches!(flags.get(flag), Some(JsonValue::Bool(true))),
        }
    }
}

/// Decide whether a field or relation guarded by `flag` may be returned.
///
/// `flag == None` means the field has no flag of its own; it is then visible
/// whenever a record exists.
pub fn is_visible(record: VisibilityRecord<'_>, flag: Option<&str>, caller: &Caller) -> bool {
    if caller.is_authenticated() {
        return true;
    }
    match (record, flag) {
        (VisibilityRecord::Public, _) => true,
        (VisibilityRecord::Missing, _) => false,
        (VisibilityRecord::Flags(_), None) => true,
        (record, Some(flag)) => record.flag(flag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FUNDINGS, PROFILES};
    use serde_json::json;
    use uuid::Uuid;

    fn flags(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_authenticated_sees_everything() {
        let caller = Caller::authenticated(Uuid::nil());
        let missing = VisibilityRecord::for_schema(&PROFILES, None);
        assert!(is_visible(missing, Some("bio"), &caller));
    }

    #[test]
    fn test_missing_record_fails_closed() {
        let missing = VisibilityRecord::for_schema(&PROFILES, None);
        let anon = Caller::anonymous();
        assert!(!is_visible(missing, Some("bio"), &anon));
        assert!(!is_visible(missing, None, &anon));
    }

    #[test]
    fn test_flags_respected() {
        let record = flags(json!({"bio": true, "email": false, "phone": null}));
        let vis = VisibilityRecord::for_schema(&PROFILES, Some(&record));
        let anon = Caller::anonymous();
        assert!(is_visible(vis, Some("bio"), &anon));
        assert!(!is_visible(vis, Some("email"), &anon));
        assert!(!is_visible(vis, Some("phone"), &anon));
        assert!(!is_visible(vis, Some("website"), &anon));
    }

    #[test]
    fn test_non_boolean_flag_is_not_visible() {
        let record = flags(json!({"bio": "true"}));
        let vis = VisibilityRecord::for_schema(&PROFILES, Some(&record));
        assert!(!is_visible(vis, Some("bio"), &Caller::anonymous()));
    }

    #[test]
    fn test_kind_without_visibility_is_public() {
        let vis = VisibilityRecord::for_schema(&FUNDINGS, None);
        assert!(is_visible(vis, Some("title"), &Caller::anonymous()));
        assert!(is_visible(vis, None, &Caller::anonymous()));
    }
}
