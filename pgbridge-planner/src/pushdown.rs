//! Decides whether an expression is safe to evaluate on the remote server.
//!
//! An expression is admitted only if every node kind is one the deparser can
//! render, every type/function/operator OID involved is built-in (so the
//! remote server is assumed to have it with identical semantics), and every
//! collation used in it derives from a column of the foreign table. The
//! walker tracks collation provenance with a three-valued lattice, merging
//! child state into the parent on the way back up; a node that introduces a
//! collation from anywhere else marks the subtree indeterminate rather than
//! failing outright, since the parent may not care about its collation.
//!
//! Rejection is a normal outcome (the clause is simply evaluated locally);
//! only catalog failures escalate as errors.

use log::debug;
use serde::{Deserialize, Serialize};

use pgbridge_core::{
    catalog::Catalog,
    err::Result,
    expr::{Expr, ParamKind},
    oid::{oid_is_valid, Oid, ParamId, DEFAULT_COLLATION_OID, INVALID_OID},
};

use crate::ctx::ForeignRel;

/// Where a subtree's collation came from.
///
/// The ordering matters: a stronger state always overrides a weaker one when
/// sibling subtrees are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CollateState {
    /// The expression is of a noncollatable type
    None,
    /// Collation derives from a column of the foreign table
    Safe,
    /// Collation derives from something else
    Unsafe,
}

/// Collation bookkeeping for one tree level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollateCxt {
    pub collation: Oid,
    pub state: CollateState,
}

impl Default for CollateCxt {
    fn default() -> Self {
        Self {
            collation: INVALID_OID,
            state: CollateState::None,
        }
    }
}

impl CollateCxt {
    /// Merge a completed child's `(collation, state)` into this context.
    fn absorb(&mut self, collation: Oid, state: CollateState) {
        if state > self.state {
            // Override previous state
            self.collation = collation;
            self.state = state;
        } else if state == self.state {
            match state {
                CollateState::None => {}
                CollateState::Safe => {
                    if collation != self.collation {
                        // Non-default collation always beats default
                        if self.collation == DEFAULT_COLLATION_OID {
                            self.collation = collation;
                        } else if collation != DEFAULT_COLLATION_OID {
                            // Two different non-default collations conflict;
                            // the parent may still not care, so mark rather
                            // than reject here.
                            self.state = CollateState::Unsafe;
                        }
                    }
                }
                CollateState::Unsafe => {}
            }
        }
    }
}

/// Outcome of the safety analysis for one expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Remotability {
    /// Safe to send; `param_ids` lists the external parameters it uses, in
    /// discovery order and with duplicates preserved
    Remote { param_ids: Vec<ParamId> },
    /// Must be evaluated locally
    Local,
}

impl Remotability {
    pub fn is_remote(&self) -> bool {
        matches!(self, Remotability::Remote { .. })
    }
}

/// Accrued state for one walk of an expression tree.
struct GlobCxt<'a> {
    catalog: &'a dyn Catalog,
    rel: &'a ForeignRel,
    param_ids: Vec<ParamId>,
}

/// Returns whether `expr` is safe to evaluate on the foreign server.
///
/// The clause must be a restriction clause, i.e. boolean and therefore
/// noncollatable at the root.
pub fn is_foreign_expr(catalog: &dyn Catalog, rel: &ForeignRel, expr: &Expr) -> Result<Remotability> {
    let mut glob = GlobCxt {
        catalog,
        rel,
        param_ids: vec![],
    };
    let mut outer = CollateCxt::default();

    if !walk(expr, &mut glob, &mut outer) {
        return Ok(Remotability::Local);
    }

    // Restriction clauses are boolean, so an admitted one cannot bubble a
    // collation up to the root.
    debug_assert_eq!(outer.state, CollateState::None);

    // An expression containing any mutable function can't be sent over: its
    // result is not stable, and e.g. evaluating now() remote side could give
    // confusing answers under clock offsets. Checked last because it costs a
    // catalog lookup per call site.
    if catalog.contain_mutable_functions(expr)? {
        debug!("rejecting clause: contains mutable function");
        return Ok(Remotability::Local);
    }

    Ok(Remotability::Remote {
        param_ids: glob.param_ids,
    })
}

/// Post-order walk of one node. Returns false if the subtree must stay
/// local; on success merges the node's collation state into `outer`.
fn walk(expr: &Expr, glob: &mut GlobCxt<'_>, outer: &mut CollateCxt) -> bool {
    let mut inner = CollateCxt::default();
    let collation: Oid;
    let state: CollateState;

    match expr {
        Expr::Var(var) => {
            // Only plain user columns of the relation being planned can be
            // shipped; anything else in a baserestrict clause stays local.
            if var.rel != glob.rel.relid || var.levels_up != 0 || var.attno <= 0 {
                return false;
            }

            // A foreign column's collation is the definition of "safe".
            collation = var.collation;
            state = if oid_is_valid(collation) {
                CollateState::Safe
            } else {
                CollateState::None
            };
        }
        Expr::Const(c) => {
            // A constant with a nondefault collation either has a
            // non-built-in type or reflects folding of a COLLATE clause;
            // either way it can't be sent.
            if oid_is_valid(c.collation) && c.collation != DEFAULT_COLLATION_OID {
                return false;
            }

            collation = INVALID_OID;
            state = CollateState::None;
        }
        Expr::Param(p) => {
            // Only externally supplied parameters have known values to bind
            // on the remote side.
            if p.kind != ParamKind::External {
                return false;
            }

            if oid_is_valid(p.collation) && p.collation != DEFAULT_COLLATION_OID {
                return false;
            }

            // Duplicates are eliminated at classify time, not here.
            glob.param_ids.push(p.id);

            collation = INVALID_OID;
            state = CollateState::None;
        }
        Expr::ArrayRef(ar) => {
            // Assignment belongs to UPDATE targets, not restrictions.
            if ar.assignment.is_some() {
                return false;
            }

            // Subscripts yield noncollatable integers, so they won't affect
            // the inner state; walk them for safety anyway.
            if !walk_list(&ar.upper, glob, &mut inner)
                || !walk_list(&ar.lower, glob, &mut inner)
                || !walk(&ar.base, glob, &mut inner)
            {
                return false;
            }

            // Subscripting yields the input's collation; use the same logic
            // as for function nodes.
            collation = ar.collation;
            state = result_state(collation, &inner);
        }
        Expr::Func(fe) => {
            // A non-built-in function might have different semantics on the
            // remote side.
            if !glob.catalog.is_builtin(fe.func) {
                return false;
            }

            if !walk_list(&fe.args, glob, &mut inner) {
                return false;
            }

            if !input_collation_derivable(fe.input_collation, &inner) {
                return false;
            }

            collation = fe.collation;
            state = result_state(collation, &inner);
        }
        Expr::Op(oe) | Expr::Distinct(oe) => {
            // Only built-in operators (and hence their underlying functions)
            // can be sent.
            if !glob.catalog.is_builtin(oe.op) {
                return false;
            }

            if !walk_list(&oe.args, glob, &mut inner) {
                return false;
            }

            if !input_collation_derivable(oe.input_collation, &inner) {
                return false;
            }

            collation = oe.collation;
            state = result_state(collation, &inner);
        }
        Expr::ScalarArrayOp(se) => {
            if !glob.catalog.is_builtin(se.op) {
                return false;
            }

            if !walk_list(&se.args, glob, &mut inner) {
                return false;
            }

            if !input_collation_derivable(se.input_collation, &inner) {
                return false;
            }

            // Output is always boolean and so noncollatable.
            collation = INVALID_OID;
            state = CollateState::None;
        }
        Expr::Relabel(r) => {
            if !walk(&r.arg, glob, &mut inner) {
                return false;
            }

            // A relabel must not introduce a collation not derived from an
            // input foreign column.
            collation = r.collation;
            state = result_state(collation, &inner);
        }
        Expr::Bool(b) => {
            if !walk_list(&b.args, glob, &mut inner) {
                return false;
            }

            collation = INVALID_OID;
            state = CollateState::None;
        }
        Expr::NullTest(nt) => {
            if !walk(&nt.arg, glob, &mut inner) {
                return false;
            }

            collation = INVALID_OID;
            state = CollateState::None;
        }
        Expr::Array(a) => {
            if !walk_list(&a.elements, glob, &mut inner) {
                return false;
            }

            collation = a.collation;
            state = result_state(collation, &inner);
        }
    }

    // A non-built-in result type might have incompatible semantics on the
    // remote side, whatever the node kind was.
    if !glob.catalog.is_builtin(expr.result_type()) {
        return false;
    }

    outer.absorb(collation, state);

    true
}

/// Walk a sequence of sibling subexpressions, merging every element into the
/// same context. There is no result-type check for the sequence itself.
fn walk_list(exprs: &[Expr], glob: &mut GlobCxt<'_>, inner: &mut CollateCxt) -> bool {
    for expr in exprs {
        if !walk(expr, glob, inner) {
            return false;
        }
    }

    true
}

/// Collation state a composite node ends up with, given its declared result
/// collation and the merged state of its inputs.
fn result_state(collation: Oid, inner: &CollateCxt) -> CollateState {
    if !oid_is_valid(collation) {
        CollateState::None
    } else if inner.state == CollateState::Safe && collation == inner.collation {
        CollateState::Safe
    } else {
        CollateState::Unsafe
    }
}

/// Whether a node's input collation is derivable from its arguments, i.e.
/// absent or exactly the safely derived one.
fn input_collation_derivable(input_collation: Oid, inner: &CollateCxt) -> bool {
    !oid_is_valid(input_collation)
        || (inner.state == CollateState::Safe && input_collation == inner.collation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgbridge_core::{
        catalog::{FunctionInfo, MemoryCatalog, OperatorInfo, Volatility},
        datum::Datum,
        expr::{
            ArrayExpr, ArrayRef, BoolExpr, BoolOp, CoercionForm, Const, FuncExpr, NullTest,
            NullTestKind, OpExpr, Param, RelabelType, ScalarArrayOpExpr, Var,
        },
        oid::{types, C_COLLATION_OID, PG_CATALOG_NAMESPACE, POSIX_COLLATION_OID},
    };

    const INT4_EQ: Oid = 96;
    const INT4_PL: Oid = 551;
    const TEXT_EQ: Oid = 98;

    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.add_operator(INT4_EQ, OperatorInfo::infix("=", PG_CATALOG_NAMESPACE));
        catalog.add_operator(INT4_PL, OperatorInfo::infix("+", PG_CATALOG_NAMESPACE));
        catalog.add_operator(TEXT_EQ, OperatorInfo::infix("=", PG_CATALOG_NAMESPACE));
        catalog.add_function(
            1299,
            FunctionInfo::new("now", PG_CATALOG_NAMESPACE, Volatility::Volatile),
        );
        catalog.add_function(
            870,
            FunctionInfo::new("lower", PG_CATALOG_NAMESPACE, Volatility::Immutable),
        );
        catalog
    }

    fn rel() -> ForeignRel {
        ForeignRel::new(1, 8)
    }

    fn int_var(attno: i16) -> Expr {
        Expr::Var(Var::new(1, attno, types::INT4, -1, INVALID_OID))
    }

    fn int_const(val: i32) -> Expr {
        Expr::Const(Const::new(types::INT4, -1, INVALID_OID, Datum::Int32(val)))
    }

    fn text_var(attno: i16, collation: Oid) -> Expr {
        Expr::Var(Var::new(1, attno, types::TEXT, -1, collation))
    }

    fn text_const(val: &str) -> Expr {
        Expr::Const(Const::new(types::TEXT, -1, DEFAULT_COLLATION_OID, val.into()))
    }

    fn remote(outcome: Remotability) -> Vec<ParamId> {
        match outcome {
            Remotability::Remote { param_ids } => param_ids,
            Remotability::Local => panic!("expected clause to be remotable"),
        }
    }

    #[test]
    fn test_pushdown_simple_comparison_is_remote() {
        let clause = Expr::Op(OpExpr::binary(INT4_EQ, types::BOOL, int_var(1), int_const(101)));

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(remote(outcome), Vec::<ParamId>::new());
    }

    #[test]
    fn test_pushdown_var_of_other_relation_is_local() {
        let other = Expr::Var(Var::new(2, 1, types::INT4, -1, INVALID_OID));
        let clause = Expr::Op(OpExpr::binary(INT4_EQ, types::BOOL, other, int_const(1)));

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(outcome, Remotability::Local);
    }

    #[test]
    fn test_pushdown_upper_level_var_is_local() {
        let mut var = Var::new(1, 1, types::INT4, -1, INVALID_OID);
        var.levels_up = 1;
        let clause = Expr::Op(OpExpr::binary(INT4_EQ, types::BOOL, Expr::Var(var), int_const(1)));

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(outcome, Remotability::Local);
    }

    #[test]
    fn test_pushdown_whole_row_var_is_local() {
        let whole_row = Expr::Var(Var::new(1, 0, 2249, -1, INVALID_OID));
        let clause = Expr::NullTest(NullTest::new(whole_row, NullTestKind::IsNull));

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(outcome, Remotability::Local);
    }

    #[test]
    fn test_pushdown_const_with_nondefault_collation_is_local() {
        let tainted = Expr::Const(Const::new(
            types::TEXT,
            -1,
            POSIX_COLLATION_OID,
            "foo".into(),
        ));
        let clause = Expr::Op(OpExpr {
            op: TEXT_EQ,
            result_type: types::BOOL,
            collation: INVALID_OID,
            input_collation: POSIX_COLLATION_OID,
            args: vec![text_var(3, DEFAULT_COLLATION_OID), tainted],
        });

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(outcome, Remotability::Local);
    }

    #[test]
    fn test_pushdown_external_param_is_remote_and_recorded() {
        let param = Expr::Param(Param::external(1, types::INT4, -1, INVALID_OID));
        let clause = Expr::Op(OpExpr::binary(INT4_EQ, types::BOOL, int_var(1), param));

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(remote(outcome), vec![1]);
    }

    #[test]
    fn test_pushdown_executor_param_is_local() {
        let param = Expr::Param(Param {
            kind: ParamKind::Executor,
            id: 1,
            r#type: types::INT4,
            typmod: -1,
            collation: INVALID_OID,
        });
        let clause = Expr::Op(OpExpr::binary(INT4_EQ, types::BOOL, int_var(1), param));

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(outcome, Remotability::Local);
    }

    #[test]
    fn test_pushdown_duplicate_param_ids_are_kept() {
        // ($1 = c1) AND ($1 = c2): the walker reports one entry per use
        let clause = Expr::Bool(BoolExpr::new(
            BoolOp::And,
            vec![
                Expr::Op(OpExpr::binary(
                    INT4_EQ,
                    types::BOOL,
                    Expr::Param(Param::external(1, types::INT4, -1, INVALID_OID)),
                    int_var(1),
                )),
                Expr::Op(OpExpr::binary(
                    INT4_EQ,
                    types::BOOL,
                    Expr::Param(Param::external(1, types::INT4, -1, INVALID_OID)),
                    int_var(2),
                )),
            ],
        ));

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(remote(outcome), vec![1, 1]);
    }

    #[test]
    fn test_pushdown_non_builtin_operator_is_local() {
        let clause = Expr::Op(OpExpr::binary(16384, types::BOOL, int_var(1), int_const(1)));

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(outcome, Remotability::Local);
    }

    #[test]
    fn test_pushdown_non_builtin_result_type_is_local() {
        // c8 = 'foo' where c8 is a user-defined enum: the enum equality
        // operator is built-in but the operand type is not
        let enum_type: Oid = 16500;
        let clause = Expr::Op(OpExpr::binary(
            3516,
            types::BOOL,
            Expr::Var(Var::new(1, 8, enum_type, -1, INVALID_OID)),
            Expr::Const(Const::new(enum_type, -1, INVALID_OID, "foo".into())),
        ));

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(outcome, Remotability::Local);
    }

    #[test]
    fn test_pushdown_mutable_function_is_local() {
        // c4 = now(): every node admissible, but now() is volatile
        let clause = Expr::Op(OpExpr::binary(
            INT4_EQ,
            types::BOOL,
            Expr::Var(Var::new(1, 4, types::TIMESTAMPTZ, -1, INVALID_OID)),
            Expr::Func(FuncExpr::call(1299, types::TIMESTAMPTZ, vec![])),
        ));

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(outcome, Remotability::Local);
    }

    #[test]
    fn test_pushdown_input_collation_must_derive_from_foreign_var() {
        // f1 COLLATE "POSIX" = 'foo' where f1 has collation "C": after
        // folding, the operator's input collation no longer matches the one
        // derived from the column
        let clause = Expr::Op(OpExpr {
            op: TEXT_EQ,
            result_type: types::BOOL,
            collation: INVALID_OID,
            input_collation: POSIX_COLLATION_OID,
            args: vec![text_var(1, C_COLLATION_OID), text_const("foo")],
        });

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(outcome, Remotability::Local);
    }

    #[test]
    fn test_pushdown_matching_column_collation_is_remote() {
        let clause = Expr::Op(OpExpr {
            op: TEXT_EQ,
            result_type: types::BOOL,
            collation: INVALID_OID,
            input_collation: C_COLLATION_OID,
            args: vec![text_var(1, C_COLLATION_OID), text_const("foo")],
        });

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert!(outcome.is_remote());
    }

    #[test]
    fn test_pushdown_relabel_keeps_column_collation_safe() {
        // c6 = '1' with c6::text relabeled implicitly
        let relabel = Expr::Relabel(RelabelType {
            arg: Box::new(Expr::Var(Var::new(
                1,
                6,
                types::VARCHAR,
                -1,
                DEFAULT_COLLATION_OID,
            ))),
            result_type: types::TEXT,
            typmod: -1,
            collation: DEFAULT_COLLATION_OID,
            format: CoercionForm::ImplicitCast,
        });
        let clause = Expr::Op(OpExpr {
            op: TEXT_EQ,
            result_type: types::BOOL,
            collation: INVALID_OID,
            input_collation: DEFAULT_COLLATION_OID,
            args: vec![relabel, text_const("1")],
        });

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert!(outcome.is_remote());
    }

    #[test]
    fn test_pushdown_array_ref_assignment_is_local() {
        let array_ref = Expr::ArrayRef(ArrayRef {
            result_type: types::INT4,
            collation: INVALID_OID,
            upper: vec![int_const(1)],
            lower: vec![],
            base: Box::new(Expr::Var(Var::new(1, 2, types::INT4_ARRAY, -1, INVALID_OID))),
            assignment: Some(Box::new(int_const(5))),
        });
        let clause = Expr::Op(OpExpr::binary(INT4_EQ, types::BOOL, array_ref, int_const(1)));

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert_eq!(outcome, Remotability::Local);
    }

    #[test]
    fn test_pushdown_scalar_array_op_is_remote() {
        // c1 = ANY(ARRAY[c2, 1, c1 + 0])
        let array = Expr::Array(ArrayExpr::new(
            types::INT4_ARRAY,
            INVALID_OID,
            vec![
                int_var(2),
                int_const(1),
                Expr::Op(OpExpr::binary(INT4_PL, types::INT4, int_var(1), int_const(0))),
            ],
        ));
        let clause = Expr::ScalarArrayOp(ScalarArrayOpExpr {
            op: INT4_EQ,
            input_collation: INVALID_OID,
            use_or: true,
            args: vec![int_var(1), array],
        });

        let outcome = is_foreign_expr(&catalog(), &rel(), &clause).unwrap();
        assert!(outcome.is_remote());
    }

    #[test]
    fn test_pushdown_collate_lattice_merge() {
        let mut cxt = CollateCxt::default();

        // None + None stays None
        cxt.absorb(INVALID_OID, CollateState::None);
        assert_eq!(cxt.state, CollateState::None);

        // Safe overrides None
        cxt.absorb(DEFAULT_COLLATION_OID, CollateState::Safe);
        assert_eq!((cxt.collation, cxt.state), (DEFAULT_COLLATION_OID, CollateState::Safe));

        // Non-default beats default
        cxt.absorb(C_COLLATION_OID, CollateState::Safe);
        assert_eq!((cxt.collation, cxt.state), (C_COLLATION_OID, CollateState::Safe));

        // A second, different non-default collation is a conflict
        cxt.absorb(POSIX_COLLATION_OID, CollateState::Safe);
        assert_eq!(cxt.state, CollateState::Unsafe);

        // Unsafe is sticky
        cxt.absorb(C_COLLATION_OID, CollateState::Safe);
        assert_eq!(cxt.state, CollateState::Unsafe);
    }
}
