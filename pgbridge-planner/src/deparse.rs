//! Renders admitted expressions back into SQL text for the remote session.
//!
//! Supports exactly the node kinds the safety walker admits; the closed
//! `Expr` sum type makes that contract a compile-time property. The
//! parenthesization scheme is hard-wired rather than precedence-aware:
//! anything more complex than a column, constant, function call or cast is
//! self-parenthesized.

use pgbridge_core::{
    buf::SqlBuffer,
    catalog::{Catalog, OperatorInfo, OperatorKind},
    err::{ensure, Result},
    expr::{
        ArrayExpr, ArrayRef, BoolExpr, BoolOp, CoercionForm, Const, Expr, FuncExpr, NullTest,
        NullTestKind, OpExpr, Param, RelabelType, ScalarArrayOpExpr, Var,
    },
    oid::{types, AttrNumber, Oid, VarNo, PG_CATALOG_NAMESPACE},
    options::{ColumnOptions, TableOptions},
};

use crate::ctx::PlannerContext;

/// Deparse an expression subtree into `buf`.
pub fn deparse_expr(
    buf: &mut SqlBuffer,
    expr: &Expr,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    match expr {
        Expr::Var(node) => deparse_var(buf, node, catalog, planner),
        Expr::Const(node) => deparse_const(buf, node, catalog),
        Expr::Param(node) => deparse_param(buf, node, catalog),
        Expr::ArrayRef(node) => deparse_array_ref(buf, node, catalog, planner),
        Expr::Func(node) => deparse_func_expr(buf, node, catalog, planner),
        Expr::Op(node) => deparse_op_expr(buf, node, catalog, planner),
        Expr::Distinct(node) => deparse_distinct_expr(buf, node, catalog, planner),
        Expr::ScalarArrayOp(node) => deparse_scalar_array_op_expr(buf, node, catalog, planner),
        Expr::Relabel(node) => deparse_relabel_type(buf, node, catalog, planner),
        Expr::Bool(node) => deparse_bool_expr(buf, node, catalog, planner),
        Expr::NullTest(node) => deparse_null_test(buf, node, catalog, planner),
        Expr::Array(node) => deparse_array_expr(buf, node, catalog, planner),
    }
}

/// Emit the remote name of the given column: the `column_name` FDW option if
/// set on that attribute, the local attribute name otherwise.
pub fn deparse_column_ref(
    buf: &mut SqlBuffer,
    varno: VarNo,
    attno: AttrNumber,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    let rel_oid = planner.rte_relation(varno)?;

    let options = ColumnOptions::parse(&catalog.foreign_column_options(rel_oid, attno)?)?;
    let colname = match options.column_name {
        Some(name) => name,
        None => catalog.attribute_name(rel_oid, attno)?,
    };

    buf.push_identifier(&colname);

    Ok(())
}

/// Emit the remote name of the given foreign table as `schema.table`,
/// honoring the `schema_name`/`table_name` FDW options.
pub fn deparse_relation(buf: &mut SqlBuffer, rel_oid: Oid, catalog: &dyn Catalog) -> Result<()> {
    let options = TableOptions::parse(&catalog.foreign_table_options(rel_oid)?)?;

    let nspname = match options.schema_name {
        Some(name) => name,
        None => catalog.namespace_name(catalog.relation_namespace(rel_oid)?)?,
    };
    let relname = match options.table_name {
        Some(name) => name,
        None => catalog.relation_name(rel_oid)?,
    };

    buf.push_identifier(&nspname);
    buf.push_char('.');
    buf.push_identifier(&relname);

    Ok(())
}

fn deparse_var(
    buf: &mut SqlBuffer,
    node: &Var,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    debug_assert_eq!(node.levels_up, 0);
    deparse_column_ref(buf, node.rel, node.attno, catalog, planner)
}

/// Deparse a constant. Has to stay in sync with how the remote parser will
/// implicitly type an undecorated literal: the `::typename` suffix is
/// omitted exactly when re-parsing yields the same type anyway.
fn deparse_const(buf: &mut SqlBuffer, node: &Const, catalog: &dyn Catalog) -> Result<()> {
    if node.is_null() {
        buf.push_str("NULL");
        buf.push_str("::");
        buf.push_str(&catalog.format_type(node.r#type, node.typmod)?);
        return Ok(());
    }

    let extval = catalog.type_output(node.r#type, &node.value)?;
    let mut isfloat = false;

    match node.r#type {
        types::INT2
        | types::INT4
        | types::INT8
        | types::OID
        | types::FLOAT4
        | types::FLOAT8
        | types::NUMERIC => {
            // No need to quote unless it's a special value such as 'NaN'.
            if extval
                .chars()
                .all(|c| matches!(c, '0'..='9' | '+' | '-' | 'e' | 'E' | '.'))
            {
                if extval.starts_with('+') || extval.starts_with('-') {
                    buf.push_char('(');
                    buf.push_str(&extval);
                    buf.push_char(')');
                } else {
                    buf.push_str(&extval);
                }
                if extval.contains(['e', 'E', '.']) {
                    isfloat = true;
                }
            } else {
                buf.push_char('\'');
                buf.push_str(&extval);
                buf.push_char('\'');
            }
        }
        types::BIT | types::VARBIT => {
            buf.push_str("B'");
            buf.push_str(&extval);
            buf.push_char('\'');
        }
        types::BOOL => {
            if extval == "t" {
                buf.push_str("true");
            } else {
                buf.push_str("false");
            }
        }
        _ => buf.push_string_literal(&extval),
    }

    let needlabel = match node.r#type {
        // The remote parser types these correctly on its own
        types::BOOL | types::INT4 | types::UNKNOWN => false,
        types::NUMERIC => !isfloat || node.typmod >= 0,
        _ => true,
    };
    if needlabel {
        buf.push_str("::");
        buf.push_str(&catalog.format_type(node.r#type, node.typmod)?);
    }

    Ok(())
}

/// Deparse a parameter reference as `$N::typename`.
///
/// The ID is the parser's original numbering, which the executor preserves
/// when binding values remotely. The explicit type label means the remote
/// types need only share names with the local ones, not OIDs.
fn deparse_param(buf: &mut SqlBuffer, node: &Param, catalog: &dyn Catalog) -> Result<()> {
    buf.push_char('$');
    buf.push_display(node.id);
    buf.push_str("::");
    buf.push_str(&catalog.format_type(node.r#type, node.typmod)?);

    Ok(())
}

fn deparse_array_ref(
    buf: &mut SqlBuffer,
    node: &ArrayRef,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    buf.push_char('(');

    // If the base expression involves a cast, parenthesize it so the
    // subscript isn't taken as typename decoration. Subscripting a plain
    // column doesn't need that.
    if node.base.is_var() {
        deparse_expr(buf, &node.base, catalog, planner)?;
    } else {
        buf.push_char('(');
        deparse_expr(buf, &node.base, catalog, planner)?;
        buf.push_char(')');
    }

    let mut lower = node.lower.iter();
    for upper in &node.upper {
        buf.push_char('[');
        if let Some(lower) = lower.next() {
            deparse_expr(buf, lower, catalog, planner)?;
            buf.push_char(':');
        }
        deparse_expr(buf, upper, catalog, planner)?;
        buf.push_char(']');
    }

    buf.push_char(')');

    Ok(())
}

fn deparse_func_expr(
    buf: &mut SqlBuffer,
    node: &FuncExpr,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    match node.format {
        // An implicit coercion isn't displayed at all
        CoercionForm::ImplicitCast => {
            ensure!(!node.args.is_empty(), "cast node has no argument");
            deparse_expr(buf, &node.args[0], catalog, planner)
        }
        // An explicit cast shows the first argument plus a cast operation,
        // carrying the typmod when the function is a length coercion
        CoercionForm::ExplicitCast => {
            ensure!(!node.args.is_empty(), "cast node has no argument");
            let typmod = node.length_coercion_typmod().unwrap_or(-1);

            deparse_expr(buf, &node.args[0], catalog, planner)?;
            buf.push_str("::");
            buf.push_str(&catalog.format_type(node.result_type, typmod)?);

            Ok(())
        }
        CoercionForm::ExplicitCall => {
            let func = catalog.function(node.func)?;

            // Print the schema name only if it's not pg_catalog
            if func.namespace != PG_CATALOG_NAMESPACE {
                buf.push_identifier(&catalog.namespace_name(func.namespace)?);
                buf.push_char('.');
            }

            buf.push_identifier(&func.name);
            buf.push_char('(');
            let mut first = true;
            for arg in &node.args {
                if !first {
                    buf.push_str(", ");
                }
                deparse_expr(buf, arg, catalog, planner)?;
                first = false;
            }
            buf.push_char(')');

            Ok(())
        }
    }
}

fn deparse_op_expr(
    buf: &mut SqlBuffer,
    node: &OpExpr,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    let op = catalog.operator(node.op)?;

    match op.kind {
        OperatorKind::Infix => ensure!(
            node.args.len() == 2,
            "operator {} is binary but node has {} argument(s)",
            node.op,
            node.args.len()
        ),
        OperatorKind::Prefix | OperatorKind::Postfix => ensure!(
            node.args.len() == 1,
            "operator {} is unary but node has {} argument(s)",
            node.op,
            node.args.len()
        ),
    }

    buf.push_char('(');

    if matches!(op.kind, OperatorKind::Infix | OperatorKind::Postfix) {
        deparse_expr(buf, &node.args[0], catalog, planner)?;
        buf.push_char(' ');
    }

    deparse_operator_name(buf, &op, catalog)?;

    if matches!(op.kind, OperatorKind::Infix | OperatorKind::Prefix) {
        buf.push_char(' ');
        deparse_expr(buf, node.args.last().unwrap(), catalog, planner)?;
    }

    buf.push_char(')');

    Ok(())
}

/// An operator name is not a SQL identifier and is never quoted; one living
/// outside pg_catalog needs the OPERATOR() decoration instead.
fn deparse_operator_name(buf: &mut SqlBuffer, op: &OperatorInfo, catalog: &dyn Catalog) -> Result<()> {
    if op.namespace != PG_CATALOG_NAMESPACE {
        buf.push_str("OPERATOR(");
        buf.push_identifier(&catalog.namespace_name(op.namespace)?);
        buf.push_char('.');
        buf.push_str(&op.name);
        buf.push_char(')');
    } else {
        buf.push_str(&op.name);
    }

    Ok(())
}

fn deparse_distinct_expr(
    buf: &mut SqlBuffer,
    node: &OpExpr,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    ensure!(
        node.args.len() == 2,
        "IS DISTINCT FROM node has {} argument(s)",
        node.args.len()
    );

    buf.push_char('(');
    deparse_expr(buf, &node.args[0], catalog, planner)?;
    buf.push_str(" IS DISTINCT FROM ");
    deparse_expr(buf, &node.args[1], catalog, planner)?;
    buf.push_char(')');

    Ok(())
}

fn deparse_scalar_array_op_expr(
    buf: &mut SqlBuffer,
    node: &ScalarArrayOpExpr,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    let op = catalog.operator(node.op)?;

    ensure!(
        node.args.len() == 2,
        "ANY/ALL node has {} argument(s)",
        node.args.len()
    );

    buf.push_char('(');
    deparse_expr(buf, &node.args[0], catalog, planner)?;
    buf.push_char(' ');

    deparse_operator_name(buf, &op, catalog)?;
    buf.push_str(if node.use_or { " ANY (" } else { " ALL (" });

    deparse_expr(buf, &node.args[1], catalog, planner)?;
    buf.push_char(')');

    buf.push_char(')');

    Ok(())
}

fn deparse_relabel_type(
    buf: &mut SqlBuffer,
    node: &RelabelType,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    deparse_expr(buf, &node.arg, catalog, planner)?;

    if node.format != CoercionForm::ImplicitCast {
        buf.push_str("::");
        buf.push_str(&catalog.format_type(node.result_type, node.typmod)?);
    }

    Ok(())
}

fn deparse_bool_expr(
    buf: &mut SqlBuffer,
    node: &BoolExpr,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    let op = match node.op {
        BoolOp::And => "AND",
        BoolOp::Or => "OR",
        BoolOp::Not => {
            buf.push_str("(NOT ");
            deparse_expr(buf, &node.args[0], catalog, planner)?;
            buf.push_char(')');
            return Ok(());
        }
    };

    buf.push_char('(');
    let mut first = true;
    for arg in &node.args {
        if !first {
            buf.push_char(' ');
            buf.push_str(op);
            buf.push_char(' ');
        }
        deparse_expr(buf, arg, catalog, planner)?;
        first = false;
    }
    buf.push_char(')');

    Ok(())
}

fn deparse_null_test(
    buf: &mut SqlBuffer,
    node: &NullTest,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    buf.push_char('(');
    deparse_expr(buf, &node.arg, catalog, planner)?;
    match node.kind {
        NullTestKind::IsNull => buf.push_str(" IS NULL)"),
        NullTestKind::IsNotNull => buf.push_str(" IS NOT NULL)"),
    }

    Ok(())
}

fn deparse_array_expr(
    buf: &mut SqlBuffer,
    node: &ArrayExpr,
    catalog: &dyn Catalog,
    planner: &PlannerContext,
) -> Result<()> {
    buf.push_str("ARRAY[");
    let mut first = true;
    for element in &node.elements {
        if !first {
            buf.push_str(", ");
        }
        deparse_expr(buf, element, catalog, planner)?;
        first = false;
    }
    buf.push_char(']');

    // An empty array needs an explicit cast to pin its type
    if node.elements.is_empty() {
        buf.push_str("::");
        buf.push_str(&catalog.format_type(node.array_type, -1)?);
    }

    Ok(())
}
