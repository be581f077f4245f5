use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use crate::{
    datum::Datum,
    oid::{self, types, AttrNumber, Oid, ParamId, TypeMod, VarNo},
};

/// A node of the host planner's analyzed expression tree.
///
/// This is the closed set of node kinds the pushdown planner understands;
/// the safety walker decides per tree whether a clause built from them may
/// be evaluated remotely, and the deparser renders exactly this set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumAsInner)]
pub enum Expr {
    Var(Var),
    Const(Const),
    Param(Param),
    ArrayRef(ArrayRef),
    Func(FuncExpr),
    Op(OpExpr),
    /// `IS DISTINCT FROM`; structurally identical to a binary operator node.
    Distinct(OpExpr),
    ScalarArrayOp(ScalarArrayOpExpr),
    Relabel(RelabelType),
    Bool(BoolExpr),
    NullTest(NullTest),
    Array(ArrayExpr),
}

/// A reference to a column of a relation in the range table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Var {
    /// 1-based index of the relation in the planner's range table
    pub rel: VarNo,
    /// 1-based attribute number (0 = whole row, negative = system attribute)
    pub attno: AttrNumber,
    pub r#type: Oid,
    pub typmod: TypeMod,
    pub collation: Oid,
    /// Subquery nesting depth of the referenced relation; 0 for the current
    /// query level
    pub levels_up: u32,
}

impl Var {
    pub fn new(rel: VarNo, attno: AttrNumber, r#type: Oid, typmod: TypeMod, collation: Oid) -> Self {
        Self {
            rel,
            attno,
            r#type,
            typmod,
            collation,
            levels_up: 0,
        }
    }
}

/// A literal embedded in the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Const {
    pub r#type: Oid,
    pub typmod: TypeMod,
    pub collation: Oid,
    pub value: Datum,
}

impl Const {
    pub fn new(r#type: Oid, typmod: TypeMod, collation: Oid, value: Datum) -> Self {
        Self {
            r#type,
            typmod,
            collation,
            value,
        }
    }

    /// A typed NULL literal.
    pub fn null(r#type: Oid, typmod: TypeMod) -> Self {
        Self::new(r#type, typmod, oid::INVALID_OID, Datum::Null)
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

/// Discriminator for parameter references. Only externally supplied
/// parameters can be forwarded to the remote server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    /// Supplied by the client at execution time
    External,
    /// Produced by another plan node at runtime
    Executor,
    /// Output of an uncorrelated subplan
    Sublink,
}

/// A query parameter reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub kind: ParamKind,
    pub id: ParamId,
    pub r#type: Oid,
    pub typmod: TypeMod,
    pub collation: Oid,
}

impl Param {
    pub fn external(id: ParamId, r#type: Oid, typmod: TypeMod, collation: Oid) -> Self {
        Self {
            kind: ParamKind::External,
            id,
            r#type,
            typmod,
            collation,
        }
    }
}

/// An array subscript expression, e.g. `arr[2]` or `arr[1:3]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayRef {
    /// Type of the fetch result (the element type for single subscripting)
    pub result_type: Oid,
    pub collation: Oid,
    pub upper: Vec<Expr>,
    /// Lower bounds for slice syntax; empty for plain subscripting
    pub lower: Vec<Expr>,
    pub base: Box<Expr>,
    /// Present only in UPDATE targets; never admissible in restrictions
    pub assignment: Option<Box<Expr>>,
}

/// How a function call or cast node was written in the source query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoercionForm {
    /// An ordinary call, `f(x)`
    ExplicitCall,
    /// A cast the user wrote, `x::t` or `CAST(x AS t)`
    ExplicitCast,
    /// A cast inserted by the parser; not displayed
    ImplicitCast,
}

/// A function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncExpr {
    pub func: Oid,
    pub result_type: Oid,
    pub collation: Oid,
    pub input_collation: Oid,
    pub format: CoercionForm,
    pub args: Vec<Expr>,
}

impl FuncExpr {
    pub fn call(func: Oid, result_type: Oid, args: Vec<Expr>) -> Self {
        Self {
            func,
            result_type,
            collation: oid::INVALID_OID,
            input_collation: oid::INVALID_OID,
            format: CoercionForm::ExplicitCall,
            args,
        }
    }

    /// If this node is a length-coercion cast, return the typmod it applies.
    ///
    /// A length coercion takes the value as its first argument and the
    /// target typmod as a constant int4 second argument (an optional third
    /// argument carries the explicit/implicit flag). This is a structural
    /// property of the tree, so no catalog access is needed.
    pub fn length_coercion_typmod(&self) -> Option<TypeMod> {
        if self.args.len() < 2 || self.args.len() > 3 {
            return None;
        }

        match &self.args[1] {
            Expr::Const(c) if c.r#type == types::INT4 && !c.is_null() => match c.value {
                Datum::Int32(typmod) => Some(typmod),
                _ => None,
            },
            _ => None,
        }
    }
}

/// An operator invocation. Also used for `IS DISTINCT FROM` via
/// [`Expr::Distinct`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpExpr {
    pub op: Oid,
    pub result_type: Oid,
    pub collation: Oid,
    pub input_collation: Oid,
    /// One operand for prefix/postfix operators, two for infix
    pub args: Vec<Expr>,
}

impl OpExpr {
    pub fn binary(op: Oid, result_type: Oid, left: Expr, right: Expr) -> Self {
        Self {
            op,
            result_type,
            collation: oid::INVALID_OID,
            input_collation: oid::INVALID_OID,
            args: vec![left, right],
        }
    }
}

/// `expr op ANY/ALL (array)`. The result is always boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarArrayOpExpr {
    pub op: Oid,
    pub input_collation: Oid,
    /// true for ANY, false for ALL
    pub use_or: bool,
    /// Exactly two: the scalar operand and the array operand
    pub args: Vec<Expr>,
}

/// A binary-compatible ("relabel") cast: same bits, new type identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelabelType {
    pub arg: Box<Expr>,
    pub result_type: Oid,
    pub typmod: TypeMod,
    pub collation: Oid,
    pub format: CoercionForm,
}

/// Boolean connective of a [`BoolExpr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

/// N-ary AND/OR or unary NOT. By the time the planner sees these, nested
/// AND/OR chains have been flattened into N-argument form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolExpr {
    pub op: BoolOp,
    pub args: Vec<Expr>,
}

impl BoolExpr {
    pub fn new(op: BoolOp, args: Vec<Expr>) -> Self {
        Self { op, args }
    }

    pub fn not(arg: Expr) -> Self {
        Self::new(BoolOp::Not, vec![arg])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullTestKind {
    IsNull,
    IsNotNull,
}

/// `expr IS [NOT] NULL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullTest {
    pub arg: Box<Expr>,
    pub kind: NullTestKind,
}

impl NullTest {
    pub fn new(arg: Expr, kind: NullTestKind) -> Self {
        Self {
            arg: Box::new(arg),
            kind,
        }
    }
}

/// An `ARRAY[...]` constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayExpr {
    pub array_type: Oid,
    pub collation: Oid,
    pub elements: Vec<Expr>,
}

impl ArrayExpr {
    pub fn new(array_type: Oid, collation: Oid, elements: Vec<Expr>) -> Self {
        Self {
            array_type,
            collation,
            elements,
        }
    }
}

impl Expr {
    /// The type OID this expression yields.
    pub fn result_type(&self) -> Oid {
        match self {
            Expr::Var(v) => v.r#type,
            Expr::Const(c) => c.r#type,
            Expr::Param(p) => p.r#type,
            Expr::ArrayRef(a) => a.result_type,
            Expr::Func(f) => f.result_type,
            Expr::Op(o) => o.result_type,
            Expr::Distinct(_) => types::BOOL,
            Expr::ScalarArrayOp(_) => types::BOOL,
            Expr::Relabel(r) => r.result_type,
            Expr::Bool(_) => types::BOOL,
            Expr::NullTest(_) => types::BOOL,
            Expr::Array(a) => a.array_type,
        }
    }

    /// The collation this expression's result carries, or `INVALID_OID` for
    /// non-collatable results.
    pub fn result_collation(&self) -> Oid {
        match self {
            Expr::Var(v) => v.collation,
            Expr::Const(c) => c.collation,
            Expr::Param(p) => p.collation,
            Expr::ArrayRef(a) => a.collation,
            Expr::Func(f) => f.collation,
            Expr::Op(o) => o.collation,
            Expr::Distinct(_) => oid::INVALID_OID,
            Expr::ScalarArrayOp(_) => oid::INVALID_OID,
            Expr::Relabel(r) => r.collation,
            Expr::Bool(_) => oid::INVALID_OID,
            Expr::NullTest(_) => oid::INVALID_OID,
            Expr::Array(a) => a.collation,
        }
    }

    /// Child expressions, in evaluation order. Used by generic walks such as
    /// mutability checking and attribute collection.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Var(_) | Expr::Const(_) | Expr::Param(_) => vec![],
            Expr::ArrayRef(a) => {
                let mut children: Vec<&Expr> = a.upper.iter().chain(a.lower.iter()).collect();
                children.push(&a.base);
                if let Some(assign) = &a.assignment {
                    children.push(assign);
                }
                children
            }
            Expr::Func(f) => f.args.iter().collect(),
            Expr::Op(o) | Expr::Distinct(o) => o.args.iter().collect(),
            Expr::ScalarArrayOp(s) => s.args.iter().collect(),
            Expr::Relabel(r) => vec![&r.arg],
            Expr::Bool(b) => b.args.iter().collect(),
            Expr::NullTest(n) => vec![&n.arg],
            Expr::Array(a) => a.elements.iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_result_type_of_bool_kinds() {
        let nt = Expr::NullTest(NullTest::new(
            Expr::Var(Var::new(1, 1, types::INT4, -1, oid::INVALID_OID)),
            NullTestKind::IsNull,
        ));
        assert_eq!(nt.result_type(), types::BOOL);
        assert_eq!(nt.result_collation(), oid::INVALID_OID);
    }

    #[test]
    fn test_expr_length_coercion_typmod() {
        // varchar(10) length coercion: varchar(val, 14, false)
        let func = FuncExpr {
            func: 669,
            result_type: types::VARCHAR,
            collation: oid::DEFAULT_COLLATION_OID,
            input_collation: oid::DEFAULT_COLLATION_OID,
            format: CoercionForm::ExplicitCast,
            args: vec![
                Expr::Var(Var::new(1, 1, types::VARCHAR, -1, oid::DEFAULT_COLLATION_OID)),
                Expr::Const(Const::new(types::INT4, -1, oid::INVALID_OID, Datum::Int32(14))),
                Expr::Const(Const::new(types::BOOL, -1, oid::INVALID_OID, Datum::Boolean(false))),
            ],
        };

        assert_eq!(func.length_coercion_typmod(), Some(14));
    }

    #[test]
    fn test_expr_length_coercion_typmod_rejects_plain_calls() {
        let func = FuncExpr::call(
            870,
            types::TEXT,
            vec![Expr::Const(Const::new(
                types::TEXT,
                -1,
                oid::DEFAULT_COLLATION_OID,
                "abc".into(),
            ))],
        );

        assert_eq!(func.length_coercion_typmod(), None);
    }
}
