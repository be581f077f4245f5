//! Builders for the top-level statements the executor sends: the scan
//! SELECT, its WHERE clause, and the ANALYZE support queries.

use pgbridge_core::{
    buf::SqlBuffer,
    catalog::{Catalog, TransmissionModes},
    err::Result,
    oid::{Oid, BLOCK_SIZE},
    options::ColumnOptions,
};

use crate::{
    ctx::{pull_var_attnos, ForeignRel, PlannerContext, RestrictInfo},
    deparse::{deparse_column_ref, deparse_expr, deparse_relation},
};

/// Construct a simple `SELECT ... FROM tablename` retrieving the interesting
/// columns of the foreign table: those appearing in the scan's target list
/// or in conditions that can't be executed remotely.
///
/// Columns are listed in attribute order, with `NULL` standing in for ones
/// that need not be fetched, so positional decoding stays stable; dropped
/// columns are omitted entirely.
pub fn deparse_simple_sql(
    buf: &mut SqlBuffer,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
    rel: &ForeignRel,
    local_conds: &[RestrictInfo],
) -> Result<()> {
    let rel_oid = planner.rte_relation(rel.relid)?;

    let mut attrs_used = rel.target_attrs.clone();
    for ri in local_conds {
        pull_var_attnos(&ri.clause, rel.relid, &mut attrs_used);
    }

    // A whole-row reference forces fetching everything
    let have_wholerow = attrs_used.contains(&0);

    buf.push_str("SELECT ");
    let mut first = true;
    for attno in 1..=rel.max_attr {
        if catalog.attribute_is_dropped(rel_oid, attno)? {
            continue;
        }

        if !first {
            buf.push_str(", ");
        }
        first = false;

        if have_wholerow || attrs_used.contains(&attno) {
            deparse_column_ref(buf, rel.relid, attno, catalog, planner)?;
        } else {
            buf.push_str("NULL");
        }
    }

    // Don't generate bad syntax if no undropped columns
    if first {
        buf.push_str("NULL");
    }

    buf.push_str(" FROM ");
    deparse_relation(buf, rel_oid, catalog)
}

/// Deparse the given restriction clauses as a WHERE clause, AND-joined and
/// each wrapped in its own parentheses. Pass `is_first = false` when a WHERE
/// clause already exists in the buffer.
pub fn append_where_clause(
    buf: &mut SqlBuffer,
    is_first: bool,
    exprs: &[RestrictInfo],
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    // Make sure any constants in the exprs are printed portably
    let _modes = TransmissionModes::set(catalog)?;

    let mut is_first = is_first;
    for ri in exprs {
        if is_first {
            buf.push_str(" WHERE ");
        } else {
            buf.push_str(" AND ");
        }

        buf.push_char('(');
        deparse_expr(buf, &ri.clause, catalog, planner)?;
        buf.push_char(')');

        is_first = false;
    }

    Ok(())
}

/// Construct a SELECT returning the remote relation's size in blocks.
///
/// Uses the local block size, which is a known approximation when the remote
/// server was built with a different one.
pub fn deparse_analyze_size_sql(buf: &mut SqlBuffer, catalog: &dyn Catalog, rel_oid: Oid) -> Result<()> {
    // The remote relation name is embedded as a regclass literal
    let mut relname = SqlBuffer::new();
    deparse_relation(&mut relname, rel_oid, catalog)?;

    buf.push_str("SELECT pg_catalog.pg_relation_size(");
    buf.push_string_literal(relname.as_str());
    buf.push_str("::pg_catalog.regclass) / ");
    buf.push_display(BLOCK_SIZE);

    Ok(())
}

/// Construct the SELECT used to acquire sample rows of the relation for
/// ANALYZE, naming every non-dropped column by its remote name.
pub fn deparse_analyze_sql(buf: &mut SqlBuffer, catalog: &dyn Catalog, rel_oid: Oid) -> Result<()> {
    buf.push_str("SELECT ");

    let mut first = true;
    for attno in 1..=catalog.attribute_count(rel_oid)? {
        if catalog.attribute_is_dropped(rel_oid, attno)? {
            continue;
        }

        let options = ColumnOptions::parse(&catalog.foreign_column_options(rel_oid, attno)?)?;
        let colname = match options.column_name {
            Some(name) => name,
            None => catalog.attribute_name(rel_oid, attno)?,
        };

        if !first {
            buf.push_str(", ");
        }
        buf.push_identifier(&colname);
        first = false;
    }

    // Don't generate bad syntax for a zero-column relation
    if first {
        buf.push_str("NULL");
    }

    buf.push_str(" FROM ");
    deparse_relation(buf, rel_oid, catalog)
}
