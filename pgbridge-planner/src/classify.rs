//! Partitions a foreign relation's restriction list by where each clause
//! can be evaluated.
//!
//! `remote_conds` are usable both for normal remote execution and for remote
//! EXPLAIN. `param_conds` are remotable too, but reference external
//! parameters whose values are unknown at plan time, so they cannot appear
//! in EXPLAIN unless representative values are bound; keeping them separate
//! lets the executor attach them only where values actually are.

use itertools::Itertools;
use log::debug;

use pgbridge_core::{catalog::Catalog, err::Result, oid::ParamId};
use serde::{Deserialize, Serialize};

use crate::{
    ctx::{ForeignRel, RestrictInfo},
    pushdown::{is_foreign_expr, Remotability},
};

/// The three-way partition of a restriction list.
///
/// The buckets are pairwise disjoint and together contain every input
/// clause; `param_ids` is the deduplicated union of the external-parameter
/// IDs appearing in `param_conds`, in first-appearance order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassifiedConditions {
    /// Remotable, with no external parameters
    pub remote_conds: Vec<RestrictInfo>,
    /// Remotable, but referencing one or more external parameters
    pub param_conds: Vec<RestrictInfo>,
    /// Everything that must be evaluated locally
    pub local_conds: Vec<RestrictInfo>,
    pub param_ids: Vec<ParamId>,
}

/// Examine each restriction clause of `rel` and classify it.
pub fn classify_conditions(catalog: &dyn Catalog, rel: &ForeignRel) -> Result<ClassifiedConditions> {
    let mut classified = ClassifiedConditions::default();
    let mut param_ids = vec![];

    for ri in &rel.baserestrictinfo {
        match is_foreign_expr(catalog, rel, &ri.clause)? {
            Remotability::Remote { param_ids: ids } if ids.is_empty() => {
                classified.remote_conds.push(ri.clone())
            }
            Remotability::Remote { param_ids: ids } => {
                classified.param_conds.push(ri.clone());
                param_ids.extend(ids);
            }
            Remotability::Local => classified.local_conds.push(ri.clone()),
        }
    }

    classified.param_ids = param_ids.into_iter().unique().collect();

    debug!(
        "classified {} restriction(s): {} remote, {} parameterized, {} local",
        rel.baserestrictinfo.len(),
        classified.remote_conds.len(),
        classified.param_conds.len(),
        classified.local_conds.len(),
    );

    Ok(classified)
}
