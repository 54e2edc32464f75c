//! Composable boolean predicate trees.
//!
//! Builders in `agora-search` produce [`Predicate`] values; `agora-db`
//! renders them to parameterised SQL. Identifiers inside a predicate are
//! `&'static str` taken from the static entity schemas, so user input can
//! only ever reach the store as a bound [`QueryParam`].
//!
//! Empty conjunctions and disjunctions have their logical meaning:
//! `And([])` is `TRUE` and `Or([])` is `FALSE`. A search whose tokens match
//! nothing therefore simplifies to [`Predicate::False`] instead of silently
//! matching everything.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use uuid::Uuid;

// =============================================================================
// QUERY PARAMETERS
// =============================================================================

/// Query parameter types for dynamic SQL binding.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// Single UUID parameter.
    Uuid(Uuid),
    /// Array of UUIDs (for ANY/ALL operations).
    UuidArray(Vec<Uuid>),
    /// Integer parameter.
    Int(i64),
    /// Timestamp parameter.
    Timestamp(DateTime<Utc>),
    /// Boolean parameter.
    Bool(bool),
    /// String parameter.
    String(String),
    /// Array of strings (slug lists).
    StringArray(Vec<String>),
}

impl QueryParam {
    pub fn timestamp(ts: DateTime<Utc>) -> Self {
        QueryParam::Timestamp(ts)
    }

    pub fn string(val: impl Into<String>) -> Self {
        QueryParam::String(val.into())
    }
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// A column qualified by its table alias (`e.start_time`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub alias: &'static str,
    pub column: &'static str,
}

impl ColumnRef {
    pub const fn new(alias: &'static str, column: &'static str) -> Self {
        Self { alias, column }
    }
}

/// A table with the alias it is referenced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub table: &'static str,
    pub alias: &'static str,
}

impl TableRef {
    pub const fn new(table: &'static str, alias: &'static str) -> Self {
        Self { table, alias }
    }

    /// Column of this table.
    pub const fn col(&self, column: &'static str) -> ColumnRef {
        ColumnRef::new(self.alias, column)
    }
}

/// An inner join inside an EXISTS subquery: `JOIN table alias ON left = right`.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: TableRef,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

impl Join {
    pub fn new(table: TableRef, left: ColumnRef, right: ColumnRef) -> Self {
        Self { table, left, right }
    }
}

/// Correlated subquery: `EXISTS (SELECT 1 FROM from JOIN ... WHERE inner = outer AND filter)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    pub from: TableRef,
    pub joins: Vec<Join>,
    /// Column of the subquery correlated with the outer row.
    pub inner: ColumnRef,
    /// Outer column the subquery is correlated with.
    pub outer: ColumnRef,
    pub filter: Predicate,
}

/// Comparison operators for scalar conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

// =============================================================================
// PREDICATE
// =============================================================================

/// Boolean condition over an entity row and its relations.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    False,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// `column <op> $n`
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: QueryParam,
    },
    /// `column = ANY($n)` over a slug list.
    AnyOf {
        column: ColumnRef,
        values: Vec<String>,
    },
    /// Case-insensitive substring match; the needle is escaped when rendered.
    Contains { column: ColumnRef, needle: String },
    /// Array membership: `$n = ANY(column)`.
    Has { column: ColumnRef, value: String },
    /// `column IS TRUE` (NULL counts as false).
    IsTrue(ColumnRef),
    Exists(Box<Subquery>),
}

impl Predicate {
    pub fn and(parts: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::And(parts.into_iter().collect())
    }

    pub fn or(parts: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Or(parts.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    pub fn compare(column: ColumnRef, op: CompareOp, value: QueryParam) -> Self {
        Predicate::Compare { column, op, value }
    }

    pub fn any_of(column: ColumnRef, values: Vec<String>) -> Self {
        Predicate::AnyOf { column, values }
    }

    pub fn contains(column: ColumnRef, needle: impl Into<String>) -> Self {
        Predicate::Contains {
            column,
            needle: needle.into(),
        }
    }

    pub fn has(column: ColumnRef, value: impl Into<String>) -> Self {
        Predicate::Has {
            column,
            value: value.into(),
        }
    }

    pub fn exists(subquery: Subquery) -> Self {
        Predicate::Exists(Box::new(subquery))
    }

    /// Conjunction of `self` with a visibility flag, unless no flag applies.
    pub fn guarded_by(self, flag: Option<ColumnRef>) -> Self {
        match flag {
            Some(column) => Predicate::And(vec![Predicate::IsTrue(column), self]),
            None => self,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Predicate::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Predicate::False)
    }

    /// Fold constants and flatten nested conjunctions/disjunctions.
    pub fn simplify(self) -> Predicate {
        match self {
            Predicate::And(parts) => {
                let mut out = Vec::with_capacity(parts.len());
                for part in parts {
                    match part.simplify() {
                        Predicate::True => {}
                        Predicate::False => return Predicate::False,
                        Predicate::And(inner) => out.extend(inner),
                        other => out.push(other),
                    }
                }
                match out.len() {
                    0 => Predicate::True,
                    1 => out.remove(0),
                    _ => Predicate::And(out),
                }
            }
            Predicate::Or(parts) => {
                let mut out = Vec::with_capacity(parts.len());
                for part in parts {
                    match part.simplify() {
                        Predicate::False => {}
                        Predicate::True => return Predicate::True,
                        Predicate::Or(inner) => out.extend(inner),
                        other => out.push(other),
                    }
                }
                match out.len() {
                    0 => Predicate::False,
                    1 => out.remove(0),
                    _ => Predicate::Or(out),
                }
            }
            Predicate::Not(inner) => match inner.simplify() {
                Predicate::True => Predicate::False,
                Predicate::False => Predicate::True,
                Predicate::Not(twice) => *twice,
                other => Predicate::Not(Box::new(other)),
            },
            Predicate::AnyOf { values, .. } if values.is_empty() => Predicate::False,
            Predicate::Exists(mut sub) => {
                let filter = std::mem::replace(&mut sub.filter, Predicate::True).simplify();
                if filter.is_false() {
                    return Predicate::False;
                }
                sub.filter = filter;
                Predicate::Exists(sub)
            }
            other => other,
        }
    }

    /// Structural description with every value replaced by `?`.
    ///
    /// Safe to log: contains identifiers from the static schema only, never
    /// bound values or raw search text.
    pub fn shape(&self) -> String {
        let mut out = String::new();
        self.write_shape(&mut out);
        out
    }

    fn write_shape(&self, out: &mut String) {
        match self {
            Predicate::True => out.push_str("TRUE"),
            Predicate::False => out.push_str("FALSE"),
            Predicate::And(parts) | Predicate::Or(parts) => {
                out.push_str(if matches!(self, Predicate::And(_)) {
                    "AND("
                } else {
                    "OR("
                });
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    part.write_shape(out);
                }
                out.push(')');
            }
            Predicate::Not(inner) => {
                out.push_str("NOT(");
                inner.write_shape(out);
                out.push(')');
            }
            Predicate::Compare { column, op, .. } => {
                let _ = write!(out, "{}.{} {} ?", column.alias, column.column, op.as_sql());
            }
            Predicate::AnyOf { column, .. } => {
                let _ = write!(out, "{}.{} = ANY(?)", column.alias, column.column);
            }
            Predicate::Contains { column, .. } => {
                let _ = write!(out, "{}.{} ILIKE ?", column.alias, column.column);
            }
            Predicate::Has { column, .. } => {
                let _ = write!(out, "? = ANY({}.{})", column.alias, column.column);
            }
            Predicate::IsTrue(column) => {
                let _ = write!(out, "{}.{} IS TRUE", column.alias, column.column);
            }
            Predicate::Exists(sub) => {
                let _ = write!(out, "EXISTS({}: ", sub.from.table);
                sub.filter.write_shape(out);
                out.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: TableRef = TableRef::new("profile", "p");

    fn leaf(column: &'static str) -> Predicate {
        Predicate::contains(P.col(column), "x")
    }

    #[test]
    fn test_empty_and_is_true() {
        assert_eq!(Predicate::and([]).simplify(), Predicate::True);
    }

    #[test]
    fn test_empty_or_is_false() {
        assert_eq!(Predicate::or([]).simplify(), Predicate::False);
    }

    #[test]
    fn test_and_with_false_is_false() {
        let p = Predicate::and([leaf("first_name"), Predicate::False]);
        assert!(p.simplify().is_false());
    }

    #[test]
    fn test_or_with_true_is_true() {
        let p = Predicate::or([leaf("first_name"), Predicate::True]);
        assert!(p.simplify().is_true());
    }

    #[test]
    fn test_single_child_unwrapped() {
        let p = Predicate::and([Predicate::True, leaf("bio")]);
        assert_eq!(p.simplify(), leaf("bio"));
    }

    #[test]
    fn test_nested_and_flattened() {
        let p = Predicate::and([
            leaf("a"),
            Predicate::and([leaf("b"), Predicate::and([leaf("c")])]),
        ]);
        assert_eq!(
            p.simplify(),
            Predicate::And(vec![leaf("a"), leaf("b"), leaf("c")])
        );
    }

    #[test]
    fn test_tokens_with_no_candidates_collapse_to_false() {
        // Two tokens: the second has no possible disjunct at all.
        let p = Predicate::and([
            Predicate::or([leaf("first_name")]),
            Predicate::or(Vec::new()),
        ]);
        assert!(p.simplify().is_false());
    }

    #[test]
    fn test_not_folding() {
        assert!(Predicate::not(Predicate::True).simplify().is_false());
        assert!(Predicate::not(Predicate::False).simplify().is_true());
        assert_eq!(
            Predicate::not(Predicate::not(leaf("a"))).simplify(),
            leaf("a")
        );
    }

    #[test]
    fn test_empty_any_of_is_false() {
        let p = Predicate::any_of(P.col("slug"), vec![]);
        assert!(p.simplify().is_false());
    }

    #[test]
    fn test_exists_with_false_filter_is_false() {
        let sub = Subquery {
            from: TableRef::new("areas_on_profiles", "j"),
            joins: vec![],
            inner: ColumnRef::new("j", "profile_id"),
            outer: P.col("id"),
            filter: Predicate::or([]),
        };
        assert!(Predicate::exists(sub).simplify().is_false());
    }

    #[test]
    fn test_guarded_by() {
        let flag = ColumnRef::new("v", "bio");
        let p = leaf("bio").guarded_by(Some(flag));
        assert_eq!(
            p,
            Predicate::And(vec![Predicate::IsTrue(flag), leaf("bio")])
        );
        assert_eq!(leaf("bio").guarded_by(None), leaf("bio"));
    }

    #[test]
    fn test_shape_hides_values() {
        let p = Predicate::and([
            Predicate::contains(P.col("first_name"), "'; DROP TABLE profile; --"),
            Predicate::compare(
                P.col("created_at"),
                CompareOp::Gte,
                QueryParam::Timestamp(Utc::now()),
            ),
        ]);
        let shape = p.shape();
        assert_eq!(
            shape,
            "AND(p.first_name ILIKE ?, p.created_at >= ?)"
        );
        assert!(!shape.contains("DROP"));
    }
}
