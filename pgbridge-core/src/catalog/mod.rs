//! The catalog oracle: the single interface through which the walker and
//! deparser read host metadata. Keeping it behind a trait keeps both
//! subsystems testable with the in-memory implementation in
//! [`memory::MemoryCatalog`].
//!
//! Lookup failures from these operations are fatal to the caller; the
//! planner never routes around a broken catalog.

use serde::{Deserialize, Serialize};

use crate::{
    datum::Datum,
    err::Result,
    expr::Expr,
    oid::{AttrNumber, Oid, TypeMod, FIRST_BOOTSTRAP_OBJECT_ID},
};

pub mod memory;

pub use memory::MemoryCatalog;

/// How an operator binds its operand(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorKind {
    Prefix,
    Postfix,
    Infix,
}

/// Function volatility class. Anything that is not immutable may yield a
/// different answer on the remote server and blocks pushdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Volatility {
    Immutable,
    Stable,
    Volatile,
}

/// Catalog row for an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorInfo {
    pub name: String,
    pub namespace: Oid,
    pub kind: OperatorKind,
    pub volatility: Volatility,
}

impl OperatorInfo {
    pub fn new(
        name: impl Into<String>,
        namespace: Oid,
        kind: OperatorKind,
        volatility: Volatility,
    ) -> Self {
        Self {
            name: name.into(),
            namespace,
            kind,
            volatility,
        }
    }

    pub fn infix(name: impl Into<String>, namespace: Oid) -> Self {
        Self::new(name, namespace, OperatorKind::Infix, Volatility::Immutable)
    }

    pub fn prefix(name: impl Into<String>, namespace: Oid) -> Self {
        Self::new(name, namespace, OperatorKind::Prefix, Volatility::Immutable)
    }
}

/// Catalog row for a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub namespace: Oid,
    pub volatility: Volatility,
}

impl FunctionInfo {
    pub fn new(name: impl Into<String>, namespace: Oid, volatility: Volatility) -> Self {
        Self {
            name: name.into(),
            namespace,
            volatility,
        }
    }
}

/// Read-only access to the host catalogs and session settings.
pub trait Catalog {
    /// The OID cutoff below which objects count as built-in. Overridable per
    /// server so a deployment talking to older remotes can tighten it.
    fn builtin_cutoff(&self) -> Oid {
        FIRST_BOOTSTRAP_OBJECT_ID
    }

    /// Whether the object was hand-assigned its OID and can be assumed to
    /// exist with identical semantics on the remote server.
    fn is_builtin(&self, oid: Oid) -> bool {
        oid < self.builtin_cutoff()
    }

    fn namespace_name(&self, oid: Oid) -> Result<String>;

    fn relation_namespace(&self, rel: Oid) -> Result<Oid>;

    fn relation_name(&self, rel: Oid) -> Result<String>;

    /// Number of attributes (dropped ones included) in the relation.
    fn attribute_count(&self, rel: Oid) -> Result<AttrNumber>;

    fn attribute_name(&self, rel: Oid, attno: AttrNumber) -> Result<String>;

    fn attribute_is_dropped(&self, rel: Oid, attno: AttrNumber) -> Result<bool>;

    /// FDW options attached to the foreign table (server options already
    /// folded in by the host).
    fn foreign_table_options(&self, rel: Oid) -> Result<Vec<(String, String)>>;

    fn foreign_column_options(&self, rel: Oid, attno: AttrNumber) -> Result<Vec<(String, String)>>;

    fn operator(&self, oid: Oid) -> Result<OperatorInfo>;

    fn function(&self, oid: Oid) -> Result<FunctionInfo>;

    /// Render a constant's datum through the type's output function.
    fn type_output(&self, type_oid: Oid, value: &Datum) -> Result<String>;

    /// Render a type name with its modifier, e.g. `character varying(10)`.
    fn format_type(&self, type_oid: Oid, typmod: TypeMod) -> Result<String>;

    /// Pin session output settings (ISO dates, postgres interval style, full
    /// float precision) so constants render portably. Returns the nest level
    /// to pass to [`Catalog::reset_transmission_modes`]; use
    /// [`TransmissionModes`] to guarantee the reset.
    fn set_transmission_modes(&self) -> Result<i32>;

    fn reset_transmission_modes(&self, nestlevel: i32);

    /// Whether any function (or operator implementation) reachable from
    /// `expr` is not immutable. Expensive: one catalog lookup per call site
    /// in the tree.
    fn contain_mutable_functions(&self, expr: &Expr) -> Result<bool> {
        match expr {
            Expr::Func(f) => {
                if self.function(f.func)?.volatility != Volatility::Immutable {
                    return Ok(true);
                }
            }
            Expr::Op(o) | Expr::Distinct(o) => {
                if self.operator(o.op)?.volatility != Volatility::Immutable {
                    return Ok(true);
                }
            }
            Expr::ScalarArrayOp(s) => {
                if self.operator(s.op)?.volatility != Volatility::Immutable {
                    return Ok(true);
                }
            }
            _ => {}
        }

        for child in expr.children() {
            if self.contain_mutable_functions(child)? {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

/// Scoped transmission-mode switch: the settings are restored when the guard
/// drops, on every exit path.
pub struct TransmissionModes<'a> {
    catalog: &'a dyn Catalog,
    nestlevel: i32,
}

impl<'a> TransmissionModes<'a> {
    pub fn set(catalog: &'a dyn Catalog) -> Result<Self> {
        let nestlevel = catalog.set_transmission_modes()?;
        Ok(Self { catalog, nestlevel })
    }
}

impl Drop for TransmissionModes<'_> {
    fn drop(&mut self) {
        self.catalog.reset_transmission_modes(self.nestlevel);
    }
}
