// Pushdown planning for a PostgreSQL-to-PostgreSQL foreign-data wrapper.
//
// The planner examines a foreign relation's restriction clauses to decide
// which are safe to evaluate on the remote server (`pushdown`), partitions
// them accordingly (`classify`), and renders the remotable subset plus the
// surrounding scan statements back into SQL text (`deparse`, `statements`).
//
// The emitted SQL assumes the remote session runs with
// `search_path = pg_catalog`, so all and only names outside pg_catalog are
// schema-qualified. COLLATE decoration is never emitted: an expression is
// only admitted when every collation in it traces back to a column of the
// foreign table itself, so the remote server's own column collations apply.

pub mod classify;
pub mod ctx;
pub mod deparse;
pub mod pushdown;
pub mod statements;

pub use classify::{classify_conditions, ClassifiedConditions};
pub use ctx::{ForeignRel, PlannerContext, RestrictInfo};
pub use pushdown::{is_foreign_expr, Remotability};
pub use statements::{
    append_where_clause, deparse_analyze_size_sql, deparse_analyze_sql, deparse_simple_sql,
};
