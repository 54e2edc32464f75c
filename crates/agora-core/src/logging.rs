//! Structured logging field names shared by every agora crate.
//!
//! Spans declare these fields up front (as `tracing::field::Empty` when the
//! value is only known later) and record them through these constants, so log
//! aggregation can query the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Failed store query, request-level failure |
//! | WARN  | Recoverable issue, fallback applied (e.g. label file missing) |
//! | INFO  | Lifecycle events, completed explore requests |
//! | DEBUG | Decision points: short-circuits, resolved sort, catalog sizes |
//! | TRACE | Per-facet counts, rendered predicate shapes |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event: "api", "search", "db".
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem, e.g. "explore", "filter_vector", "pool".
pub const COMPONENT: &str = "component";

/// Logical operation name, e.g. "explore", "explore_all", "refresh".
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Entity collection being searched ("events", "profiles", ...).
pub const ENTITY_KIND: &str = "entity_kind";

/// Facet key being counted.
pub const FACET_KEY: &str = "facet_key";

/// Shape of the predicate (placeholders only, never bound values).
pub const PREDICATE_SHAPE: &str = "predicate_shape";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of hydrated items returned.
pub const RESULT_COUNT: &str = "result_count";

/// Total number of matching entities.
pub const TOTAL_COUNT: &str = "total_count";

/// Number of free-text tokens after tokenization.
pub const TOKEN_COUNT: &str = "token_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Whether the predicate short-circuited to FALSE.
pub const SHORT_CIRCUIT: &str = "short_circuit";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
