//! Planner-side context handed to the pushdown analyzer and deparser: the
//! query's range table, the foreign relation being planned, and its
//! restriction list.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use pgbridge_core::{
    err::{Context, Result},
    expr::Expr,
    oid::{AttrNumber, Oid, VarNo},
};

/// Set of attribute numbers referenced somewhere in a query. Attribute 0
/// denotes a whole-row reference; negative numbers are system attributes.
pub type AttrSet = BTreeSet<AttrNumber>;

/// Per-query planner state: the range table mapping `Var` relation indexes
/// to relation OIDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerContext {
    range_table: Vec<Oid>,
}

impl PlannerContext {
    pub fn new(range_table: Vec<Oid>) -> Self {
        Self { range_table }
    }

    /// Resolves a 1-based range-table index to the relation's OID.
    pub fn rte_relation(&self, varno: VarNo) -> Result<Oid> {
        (varno as usize)
            .checked_sub(1)
            .and_then(|idx| self.range_table.get(idx))
            .copied()
            .with_context(|| format!("range table has no entry {}", varno))
    }
}

/// A restriction clause attached to a base relation during planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictInfo {
    pub clause: Expr,
}

impl RestrictInfo {
    pub fn new(clause: Expr) -> Self {
        Self { clause }
    }
}

/// The foreign relation being planned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignRel {
    /// 1-based index of this relation in the range table
    pub relid: VarNo,
    /// Highest attribute number of the relation (dropped columns included)
    pub max_attr: AttrNumber,
    /// Attributes referenced by the scan's target list
    pub target_attrs: AttrSet,
    /// The relation's restriction clauses
    pub baserestrictinfo: Vec<RestrictInfo>,
}

impl ForeignRel {
    pub fn new(relid: VarNo, max_attr: AttrNumber) -> Self {
        Self {
            relid,
            max_attr,
            target_attrs: AttrSet::new(),
            baserestrictinfo: vec![],
        }
    }
}

/// Collect the attribute numbers of every `Var` of the given relation (at
/// the current query level) into `attrs`.
pub fn pull_var_attnos(expr: &Expr, relid: VarNo, attrs: &mut AttrSet) {
    if let Expr::Var(var) = expr {
        if var.rel == relid && var.levels_up == 0 {
            attrs.insert(var.attno);
        }
    }

    for child in expr.children() {
        pull_var_attnos(child, relid, attrs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgbridge_core::{
        datum::Datum,
        expr::{BoolExpr, BoolOp, Const, OpExpr, Var},
        oid::{types, INVALID_OID},
    };

    #[test]
    fn test_ctx_rte_relation_lookup() {
        let planner = PlannerContext::new(vec![16402, 16404]);

        assert_eq!(planner.rte_relation(1).unwrap(), 16402);
        assert_eq!(planner.rte_relation(2).unwrap(), 16404);
        assert!(planner.rte_relation(0).is_err());
        assert!(planner.rte_relation(3).is_err());
    }

    #[test]
    fn test_ctx_pull_var_attnos() {
        // (c2 = 5) AND (c4 = c2), with a var of another relation mixed in
        let clause = Expr::Bool(BoolExpr::new(
            BoolOp::And,
            vec![
                Expr::Op(OpExpr::binary(
                    96,
                    types::BOOL,
                    Expr::Var(Var::new(1, 2, types::INT4, -1, INVALID_OID)),
                    Expr::Const(Const::new(types::INT4, -1, INVALID_OID, Datum::Int32(5))),
                )),
                Expr::Op(OpExpr::binary(
                    96,
                    types::BOOL,
                    Expr::Var(Var::new(1, 4, types::INT4, -1, INVALID_OID)),
                    Expr::Var(Var::new(2, 7, types::INT4, -1, INVALID_OID)),
                )),
            ],
        ));

        let mut attrs = AttrSet::new();
        pull_var_attnos(&clause, 1, &mut attrs);

        assert_eq!(attrs, AttrSet::from([2, 4]));
    }

    #[test]
    fn test_ctx_pull_var_attnos_whole_row() {
        let clause = Expr::Var(Var {
            rel: 1,
            attno: 0,
            r#type: 2249,
            typmod: -1,
            collation: INVALID_OID,
            levels_up: 0,
        });

        let mut attrs = AttrSet::new();
        pull_var_attnos(&clause, 1, &mut attrs);

        assert!(attrs.contains(&0));
    }
}
