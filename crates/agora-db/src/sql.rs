//! Rendering of predicate trees into parameterised PostgreSQL.
//!
//! Identifiers come from the static entity schemas; every value is appended
//! to the parameter list and referenced as `$n`. The renderer never
//! interpolates a value into the SQL text.

use std::fmt::Write as _;

use agora_core::schema::VISIBILITY_ALIAS;
use agora_core::{ColumnRef, EntitySchema, Predicate, QueryParam, Subquery};

use crate::escape_like;

/// Accumulates SQL text and its bound parameters.
#[derive(Debug, Default)]
pub struct SqlWriter {
    sql: String,
    params: Vec<QueryParam>,
    param_offset: usize,
}

impl SqlWriter {
    /// Create a writer whose first parameter is `$param_offset + 1`.
    pub fn new(param_offset: usize) -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            param_offset,
        }
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        self.sql.push_str(s);
        self
    }

    /// Append a parameter and return its placeholder.
    pub fn param(&mut self, value: QueryParam) -> String {
        self.params.push(value);
        format!("${}", self.param_offset + self.params.len())
    }

    pub fn push_param(&mut self, value: QueryParam) -> &mut Self {
        let placeholder = self.param(value);
        self.sql.push_str(&placeholder);
        self
    }

    pub fn push_column(&mut self, column: ColumnRef) -> &mut Self {
        let _ = write!(self.sql, "{}.{}", column.alias, column.column);
        self
    }

    /// Render a predicate at the current position.
    pub fn push_predicate(&mut self, predicate: &Predicate) -> &mut Self {
        match predicate {
            Predicate::True => self.push_str("TRUE"),
            Predicate::False => self.push_str("FALSE"),
            Predicate::And(parts) => self.push_junction(parts, " AND ", "TRUE"),
            Predicate::Or(parts) => self.push_junction(parts, " OR ", "FALSE"),
            Predicate::Not(inner) => {
                self.push_str("NOT (");
                self.push_predicate(inner);
                self.push_str(")")
            }
            Predicate::Compare { column, op, value } => {
                self.push_column(*column);
                let _ = write!(self.sql, " {} ", op.as_sql());
                self.push_param(value.clone())
            }
            Predicate::AnyOf { column, values } => {
                self.push_column(*column);
                self.push_str(" = ANY(");
                self.push_param(QueryParam::StringArray(values.clone()));
                self.push_str(")")
            }
            Predicate::Contains { column, needle } => {
                self.push_column(*column);
                self.push_str(" ILIKE ");
                self.push_param(QueryParam::String(format!("%{}%", escape_like(needle))))
            }
            Predicate::Has { column, value } => {
                self.push_param(QueryParam::String(value.clone()));
                self.push_str(" = ANY(");
                self.push_column(*column);
                self.push_str(")")
            }
            Predicate::IsTrue(column) => {
                self.push_column(*column);
                self.push_str(" IS TRUE")
            }
            Predicate::Exists(sub) => self.push_exists(sub),
        }
    }

    fn push_junction(&mut self, parts: &[Predicate], sep: &str, empty: &str) -> &mut Self {
        if parts.is_empty() {
            return self.push_str(empty);
        }
        self.push_str("(");
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.push_str(sep);
            }
            self.push_predicate(part);
        }
        self.push_str(")")
    }

    fn push_exists(&mut self, sub: &Subquery) -> &mut Self {
        let _ = write!(
            self.sql,
            "EXISTS (SELECT 1 FROM {} {}",
            sub.from.table, sub.from.alias
        );
        for join in &sub.joins {
            let _ = write!(
                self.sql,
                " JOIN {} {} ON {}.{} = {}.{}",
                join.table.table,
                join.table.alias,
                join.left.alias,
                join.left.column,
                join.right.alias,
                join.right.column
            );
        }
        self.push_str(" WHERE ");
        self.push_column(sub.inner);
        self.push_str(" = ");
        self.push_column(sub.outer);
        if !sub.filter.is_true() {
            self.push_str(" AND ");
            self.push_predicate(&sub.filter);
        }
        self.push_str(")")
    }

    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    pub fn finish(self) -> (String, Vec<QueryParam>) {
        (self.sql, self.params)
    }
}

/// Render a standalone predicate with parameters numbered from
/// `$param_offset + 1`.
pub fn render_predicate(predicate: &Predicate, param_offset: usize) -> (String, Vec<QueryParam>) {
    let mut writer = SqlWriter::new(param_offset);
    writer.push_predicate(predicate);
    writer.finish()
}

/// `FROM` clause of an entity: the main table plus its visibility record.
///
/// The visibility record is LEFT JOINed so a missing record yields NULL
/// flags, which `IS TRUE` treats as not visible.
pub fn from_clause(schema: &EntitySchema) -> String {
    match schema.visibility {
        Some(vis) => format!(
            "{} {} LEFT JOIN {} {} ON {}.{} = {}.id",
            schema.table.table,
            schema.table.alias,
            vis.table,
            VISIBILITY_ALIAS,
            VISIBILITY_ALIAS,
            vis.entity_column,
            schema.table.alias
        ),
        None => format!("{} {}", schema.table.table, schema.table.alias),
    }
}

/// Bind a list of [`QueryParam`]s to a sqlx query in order.
///
/// Works for `query`, `query_as` and `query_scalar` builders alike.
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut q = $query;
        for param in $params {
            q = match param {
                agora_core::QueryParam::Uuid(v) => q.bind(*v),
                agora_core::QueryParam::UuidArray(v) => q.bind(v.clone()),
                agora_core::QueryParam::Int(v) => q.bind(*v),
                agora_core::QueryParam::Timestamp(v) => q.bind(*v),
                agora_core::QueryParam::Bool(v) => q.bind(*v),
                agora_core::QueryParam::String(v) => q.bind(v.clone()),
                agora_core::QueryParam::StringArray(v) => q.bind(v.clone()),
            };
        }
        q
    }};
}

pub(crate) use bind_params;
