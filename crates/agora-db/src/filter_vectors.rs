//! Maintenance of the precomputed `filter_vector` column.
//!
//! Each entity row carries a tsvector with one lexeme per attached facet
//! value, spelled `<facetKey>:<slug>`. Facet counts unnest these lexemes
//! instead of joining every relation table per request. Time windows are
//! not stored; they depend on "now" and are counted from the row itself.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use agora_core::schema::{JOIN_ALIAS, VALUE_ALIAS};
use agora_core::{
    schema_for, EntityKind, EntitySchema, Error, FacetSource, FilterVectorRefresher, QueryParam,
    Result,
};

use crate::sql::{bind_params, SqlWriter};

/// Rebuilds filter vectors from the facet relations.
#[derive(Clone)]
pub struct PgFilterVectorRepository {
    pool: PgPool,
}

impl PgFilterVectorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `UPDATE` statement recomputing the filter vector of one or all rows.
pub(crate) fn refresh_statement(schema: &EntitySchema, id: Option<Uuid>) -> (String, Vec<QueryParam>) {
    let alias = schema.table.alias;
    let mut w = SqlWriter::new(0);
    w.push_str(&format!(
        "UPDATE {} {alias} SET filter_vector = array_to_tsvector(ARRAY(",
        schema.table.table
    ));

    let mut first = true;
    for facet in schema.facets {
        let prefix = QueryParam::String(format!("{}:", facet.key));
        match facet.source {
            FacetSource::Relation {
                join_table,
                owner_column,
                value_column,
                value_table,
            } => {
                if !first {
                    w.push_str(" UNION ");
                }
                w.push_str("SELECT ").push_param(prefix).push_str(&format!(
                    "::text || {fv}.slug FROM {join_table} {j} JOIN {value_table} {fv} \
                     ON {fv}.id = {j}.{value_column} WHERE {j}.{owner_column} = {alias}.id",
                    fv = VALUE_ALIAS,
                    j = JOIN_ALIAS,
                ));
            }
            FacetSource::Column {
                column,
                value_table,
            } => {
                if !first {
                    w.push_str(" UNION ");
                }
                w.push_str("SELECT ").push_param(prefix).push_str(&format!(
                    "::text || {fv}.slug FROM {value_table} {fv} WHERE {fv}.id = {alias}.{column}",
                    fv = VALUE_ALIAS,
                ));
            }
            FacetSource::Period { .. } => continue,
        }
        first = false;
    }
    if first {
        w.push_str("SELECT NULL::text WHERE FALSE");
    }
    w.push_str("))");

    if let Some(id) = id {
        w.push_str(&format!(" WHERE {alias}.id = "))
            .push_param(QueryParam::Uuid(id));
    }
    w.finish()
}

#[async_trait]
impl FilterVectorRefresher for PgFilterVectorRepository {
    #[instrument(
        skip(self),
        fields(subsystem = "db", component = "filter_vector", op = "refresh", entity_kind = %kind)
    )]
    async fn refresh_filter_vectors(&self, kind: EntityKind, id: Option<Uuid>) -> Result<u64> {
        let start = Instant::now();
        let schema = schema_for(kind);
        let (sql, params) = refresh_statement(schema, id);

        let result = bind_params!(sqlx::query(&sql), &params)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        info!(
            db_table = schema.table.table,
            rows_affected = result.rows_affected(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Filter vectors refreshed"
        );
        Ok(result.rows_affected())
    }
}
