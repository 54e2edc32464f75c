//! PostgreSQL implementation of [`ExploreStore`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument, trace, Span};
use uuid::Uuid;

use agora_core::logging;
use agora_core::schema::{
    FacetSource, NestedDef, JOIN_ALIAS, TARGET_ALIAS, TARGET_VISIBILITY_ALIAS, VALUE_ALIAS,
};
use agora_core::{
    schema_for, EntityKind, EntitySchema, Error, ExploreStore, FacetDef, FacetValue, OrderTerm,
    Predicate, QueryParam, RawEntity, RawNested, Result,
};

use crate::escape_like;
use crate::sql::{bind_params, from_clause, SqlWriter};

/// Explore queries over the entity tables.
#[derive(Clone)]
pub struct PgExploreRepository {
    pool: PgPool,
}

impl PgExploreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Facet values attached to `ids`, per facet key.
    async fn fetch_facets(
        &self,
        schema: &'static EntitySchema,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, BTreeMap<String, Vec<FacetValue>>>> {
        let mut out: HashMap<Uuid, BTreeMap<String, Vec<FacetValue>>> = HashMap::new();

        for facet in schema.facets {
            let sql = match facet.source {
                FacetSource::Relation {
                    join_table,
                    owner_column,
                    value_column,
                    value_table,
                } => format!(
                    "SELECT {j}.{owner_column} AS owner_id, {fv}.slug, {fv}.title \
                     FROM {join_table} {j} JOIN {value_table} {fv} ON {fv}.id = {j}.{value_column} \
                     WHERE {j}.{owner_column} = ANY($1) ORDER BY {fv}.title, {fv}.slug",
                    j = JOIN_ALIAS,
                    fv = VALUE_ALIAS,
                ),
                FacetSource::Column {
                    column,
                    value_table,
                } => format!(
                    "SELECT {a}.id AS owner_id, {fv}.slug, {fv}.title \
                     FROM {table} {a} JOIN {value_table} {fv} ON {fv}.id = {a}.{column} \
                     WHERE {a}.id = ANY($1)",
                    a = schema.table.alias,
                    table = schema.table.table,
                    fv = VALUE_ALIAS,
                ),
                FacetSource::Period { .. } => continue,
            };

            let rows = sqlx::query(&sql)
                .bind(ids.to_vec())
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;

            for row in rows {
                let owner: Uuid = row.try_get("owner_id").map_err(Error::Database)?;
                let value = FacetValue {
                    slug: row.try_get("slug").map_err(Error::Database)?,
                    title: row.try_get("title").map_err(Error::Database)?,
                };
                out.entry(owner)
                    .or_default()
                    .entry(facet.key.to_string())
                    .or_default()
                    .push(value);
            }
        }

        Ok(out)
    }

    /// Nested related rows of `ids` for one relation.
    async fn fetch_nested(
        &self,
        nested: &NestedDef,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<RawNested>>> {
        let target = schema_for(nested.target);
        let (vis_select, vis_join) = match target.visibility {
            Some(vis) => (
                format!(
                    "CASE WHEN {tv}.{fk} IS NULL THEN NULL ELSE to_jsonb({tv}) END",
                    tv = TARGET_VISIBILITY_ALIAS,
                    fk = vis.entity_column
                ),
                format!(
                    " LEFT JOIN {table} {tv} ON {tv}.{fk} = {t}.id",
                    table = vis.table,
                    tv = TARGET_VISIBILITY_ALIAS,
                    fk = vis.entity_column,
                    t = TARGET_ALIAS
                ),
            ),
            None => ("NULL::jsonb".to_string(), String::new()),
        };

        let sql = format!(
            "SELECT {j}.{owner} AS owner_id, {t}.id, to_jsonb({t}) - 'filter_vector' AS record, \
             {vis_select} AS visibility \
             FROM {join_table} {j} JOIN {target_table} {t} ON {t}.id = {j}.{target_column}{vis_join} \
             WHERE {j}.{owner} = ANY($1) ORDER BY {t}.id",
            j = JOIN_ALIAS,
            t = TARGET_ALIAS,
            owner = nested.owner_column,
            join_table = nested.join_table,
            target_table = target.table.table,
            target_column = nested.target_column,
        );

        let rows = sqlx::query(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut out: HashMap<Uuid, Vec<RawNested>> = HashMap::new();
        for row in rows {
            let owner: Uuid = row.try_get("owner_id").map_err(Error::Database)?;
            let record: JsonValue = row.try_get("record").map_err(Error::Database)?;
            let visibility: Option<JsonValue> = row.try_get("visibility").map_err(Error::Database)?;
            out.entry(owner).or_default().push(RawNested {
                id: row.try_get("id").map_err(Error::Database)?,
                record: into_object(record),
                visibility: visibility.map(into_object),
            });
        }
        Ok(out)
    }
}

fn into_object(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        _ => Map::new(),
    }
}

/// Distinct value tables referenced by any entity schema.
fn value_tables() -> BTreeSet<&'static str> {
    EntityKind::ALL
        .iter()
        .flat_map(|kind| schema_for(*kind).facets.iter())
        .filter_map(|facet| facet.value_table())
        .collect()
}

#[async_trait]
impl ExploreStore for PgExploreRepository {
    #[instrument(
        skip(self, schema, predicate),
        fields(subsystem = "db", component = "explore", op = "count", entity_kind = %schema.kind)
    )]
    async fn count(&self, schema: &'static EntitySchema, predicate: &Predicate) -> Result<i64> {
        let mut w = SqlWriter::new(0);
        w.push_str("SELECT COUNT(*) FROM ")
            .push_str(&from_clause(schema))
            .push_str(" WHERE ")
            .push_predicate(predicate);
        let (sql, params) = w.finish();

        let count: i64 = bind_params!(sqlx::query_scalar::<_, i64>(&sql), &params)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }

    #[instrument(
        skip(self, schema, predicate, order),
        fields(
            subsystem = "db",
            component = "explore",
            op = "fetch_page",
            entity_kind = %schema.kind,
            result_count = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        )
    )]
    async fn fetch_page(
        &self,
        schema: &'static EntitySchema,
        predicate: &Predicate,
        order: &[OrderTerm],
        take: i64,
    ) -> Result<Vec<Uuid>> {
        let start = Instant::now();
        let alias = schema.table.alias;

        let mut w = SqlWriter::new(0);
        w.push_str(&format!("SELECT {alias}.id FROM "))
            .push_str(&from_clause(schema))
            .push_str(" WHERE ")
            .push_predicate(predicate)
            .push_str(" ORDER BY ");
        for (i, term) in order.iter().enumerate() {
            if i > 0 {
                w.push_str(", ");
            }
            w.push_column(term.column)
                .push_str(" ")
                .push_str(term.direction.as_sql());
        }
        w.push_str(" LIMIT ").push_param(QueryParam::Int(take));
        let (sql, params) = w.finish();

        let ids: Vec<Uuid> = bind_params!(sqlx::query_scalar::<_, Uuid>(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let span = Span::current();
        span.record(logging::RESULT_COUNT, ids.len() as u64);
        span.record(logging::DURATION_MS, start.elapsed().as_millis() as u64);
        Ok(ids)
    }

    #[instrument(
        skip(self, schema, ids),
        fields(subsystem = "db", component = "explore", op = "hydrate", entity_kind = %schema.kind, ids = ids.len() as u64)
    )]
    async fn hydrate(&self, schema: &'static EntitySchema, ids: &[Uuid]) -> Result<Vec<RawEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let alias = schema.table.alias;
        let mut sql = format!(
            "SELECT {alias}.id, to_jsonb({alias}) - 'filter_vector' AS record, "
        );
        match schema.visibility {
            Some(vis) => {
                let _ = write!(
                    sql,
                    "CASE WHEN v.{fk} IS NULL THEN NULL ELSE to_jsonb(v) END AS visibility ",
                    fk = vis.entity_column
                );
            }
            None => sql.push_str("NULL::jsonb AS visibility "),
        }
        let _ = write!(
            sql,
            "FROM {} WHERE {alias}.id = ANY($1)",
            from_clause(schema)
        );

        let rows = sqlx::query(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut facets = self.fetch_facets(schema, ids).await?;
        let mut nested = BTreeMap::new();
        for def in schema.nested {
            nested.insert(def.key, self.fetch_nested(def, ids).await?);
        }

        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.try_get("id").map_err(Error::Database)?;
            let record: JsonValue = row.try_get("record").map_err(Error::Database)?;
            let visibility: Option<JsonValue> = row.try_get("visibility").map_err(Error::Database)?;

            let mut entity = RawEntity {
                id,
                record: into_object(record),
                visibility: visibility.map(into_object),
                facets: facets.remove(&id).unwrap_or_default(),
                nested: BTreeMap::new(),
            };
            for (key, by_owner) in nested.iter_mut() {
                entity
                    .nested
                    .insert(key.to_string(), by_owner.remove(&id).unwrap_or_default());
            }
            entities.push(entity);
        }

        debug!(hydrated = entities.len(), "Hydrated page");
        Ok(entities)
    }

    #[instrument(
        skip(self, schema, facet, predicate),
        fields(
            subsystem = "db",
            component = "filter_vector",
            op = "facet_value_counts",
            entity_kind = %schema.kind,
            facet_key = facet.key,
        )
    )]
    async fn facet_value_counts(
        &self,
        schema: &'static EntitySchema,
        facet: &'static FacetDef,
        predicate: &Predicate,
    ) -> Result<HashMap<String, i64>> {
        let prefix = format!("{}:", facet.key);

        let mut w = SqlWriter::new(0);
        w.push_str("SELECT u.lexeme, COUNT(*) AS count FROM ")
            .push_str(&from_clause(schema))
            .push_str(&format!(
                " CROSS JOIN LATERAL unnest({}.filter_vector) AS u(lexeme, positions, weights)",
                schema.table.alias
            ))
            .push_str(" WHERE ")
            .push_predicate(predicate)
            .push_str(" AND u.lexeme LIKE ")
            .push_param(QueryParam::String(format!("{}%", escape_like(&prefix))))
            .push_str(" GROUP BY u.lexeme");
        let (sql, params) = w.finish();

        let rows = bind_params!(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let lexeme: String = row.try_get("lexeme").map_err(Error::Database)?;
            let count: i64 = row.try_get("count").map_err(Error::Database)?;
            if let Some(slug) = lexeme.strip_prefix(&prefix) {
                counts.insert(slug.to_string(), count);
            }
        }

        trace!(values = counts.len(), "Facet values counted");
        Ok(counts)
    }

    #[instrument(
        skip(self, schema, base, variants),
        fields(
            subsystem = "db",
            component = "filter_vector",
            op = "predicate_counts",
            entity_kind = %schema.kind,
            variants = variants.len(),
        )
    )]
    async fn predicate_counts(
        &self,
        schema: &'static EntitySchema,
        base: &Predicate,
        variants: &[(String, Predicate)],
    ) -> Result<HashMap<String, i64>> {
        if variants.is_empty() {
            return Ok(HashMap::new());
        }

        let mut w = SqlWriter::new(0);
        w.push_str("SELECT ");
        for (i, (_, variant)) in variants.iter().enumerate() {
            if i > 0 {
                w.push_str(", ");
            }
            w.push_str("COUNT(*) FILTER (WHERE ")
                .push_predicate(variant)
                .push_str(")");
        }
        w.push_str(" FROM ")
            .push_str(&from_clause(schema))
            .push_str(" WHERE ")
            .push_predicate(base);
        let (sql, params) = w.finish();

        let row = bind_params!(sqlx::query(&sql), &params)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut counts = HashMap::with_capacity(variants.len());
        for (i, (name, _)) in variants.iter().enumerate() {
            let count: i64 = row.try_get(i).map_err(Error::Database)?;
            counts.insert(name.clone(), count);
        }
        Ok(counts)
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "catalog", op = "facet_values"))]
    async fn facet_values(&self) -> Result<BTreeMap<String, Vec<FacetValue>>> {
        let mut out = BTreeMap::new();
        for table in value_tables() {
            let sql = format!("SELECT slug, title FROM {table} ORDER BY title, slug");
            let rows = sqlx::query(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;

            let mut values = Vec::with_capacity(rows.len());
            for row in rows {
                values.push(FacetValue {
                    slug: row.try_get("slug").map_err(Error::Database)?,
                    title: row.try_get("title").map_err(Error::Database)?,
                });
            }
            out.insert(table.to_string(), values);
        }

        debug!(tables = out.len(), "Facet catalog loaded");
        Ok(out)
    }
}
