//! Result hydration and the redaction pass.
//!
//! Raw store rows are turned into [`ExploreItem`]s in page order. For
//! anonymous callers every field, relation and image whose visibility flag
//! is not `true` is nulled or emptied; nested sub-records are redacted by
//! their own visibility records. A missing record leaves only the id.

use std::collections::{BTreeMap, HashMap};

use agora_core::{
    is_visible, schema_for, Caller, EntitySchema, ExploreItem, ImageDef, ImageUrls, NestedDef,
    NestedItem, RawEntity, RawNested, VisibilityRecord,
};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::images::ImageUrlBuilder;

/// Reorder `rows` to follow `ids`, dropping ids the store did not return.
pub fn in_page_order(ids: &[Uuid], rows: Vec<RawEntity>) -> Vec<RawEntity> {
    let mut by_id: HashMap<Uuid, RawEntity> = rows.into_iter().map(|r| (r.id, r)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// Hydrate and redact one row.
pub fn hydrate_item(
    schema: &EntitySchema,
    raw: RawEntity,
    caller: &Caller,
    images: &ImageUrlBuilder,
) -> ExploreItem {
    let vis = VisibilityRecord::for_schema(schema, raw.visibility.as_ref());

    let mut fields = Map::new();
    for field in schema.fields {
        let value = if is_visible(vis, field.visibility, caller) {
            raw.record.get(field.column).cloned().unwrap_or(JsonValue::Null)
        } else {
            JsonValue::Null
        };
        fields.insert(field.name.to_string(), value);
    }

    let mut facets = BTreeMap::new();
    for facet in schema.facets.iter().filter(|f| !f.is_period()) {
        let values = if is_visible(vis, facet.visibility, caller) {
            raw.facets.get(facet.key).cloned().unwrap_or_default()
        } else {
            Vec::new()
        };
        facets.insert(facet.key.to_string(), values);
    }

    let image_urls = schema
        .images
        .iter()
        .map(|image| {
            let urls = if is_visible(vis, image.visibility, caller) {
                image_urls(&raw.record, image, images)
            } else {
                None
            };
            (image.name.to_string(), urls)
        })
        .collect();

    let mut nested = BTreeMap::new();
    for def in schema.nested {
        let items = if is_visible(vis, def.visibility, caller) {
            raw.nested
                .get(def.key)
                .map(|rows| {
                    rows.iter()
                        .map(|row| nested_item(def, row, caller, images))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        nested.insert(def.key.to_string(), items);
    }

    ExploreItem {
        id: raw.id,
        kind: schema.kind,
        fields,
        facets,
        images: image_urls,
        nested,
    }
}

fn nested_item(
    def: &NestedDef,
    row: &RawNested,
    caller: &Caller,
    images: &ImageUrlBuilder,
) -> NestedItem {
    let target = schema_for(def.target);
    let vis = VisibilityRecord::for_schema(target, row.visibility.as_ref());

    let mut fields = Map::new();
    for field in def.fields.iter().filter_map(|name| target.field(name)) {
        let value = if is_visible(vis, field.visibility, caller) {
            row.record.get(field.column).cloned().unwrap_or(JsonValue::Null)
        } else {
            JsonValue::Null
        };
        fields.insert(field.name.to_string(), value);
    }

    let image_urls = def
        .images
        .iter()
        .filter_map(|name| target.image(name))
        .map(|image| {
            let urls = if is_visible(vis, image.visibility, caller) {
                image_urls(&row.record, image, images)
            } else {
                None
            };
            (image.name.to_string(), urls)
        })
        .collect();

    NestedItem {
        id: row.id,
        kind: def.target,
        fields,
        images: image_urls,
    }
}

fn image_urls(
    record: &Map<String, JsonValue>,
    image: &ImageDef,
    images: &ImageUrlBuilder,
) -> Option<ImageUrls> {
    match record.get(image.column) {
        Some(JsonValue::String(path)) if !path.trim().is_empty() => {
            Some(images.urls(path, image.width, image.height))
        }
        _ => None,
    }
}
