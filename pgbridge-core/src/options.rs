//! Typed views over the FDW option lists attached to foreign tables and
//! their columns. Option names are case-sensitive.

use serde::{Deserialize, Serialize};

use crate::err::{bail, Result};

pub const OPT_SCHEMA_NAME: &str = "schema_name";
pub const OPT_TABLE_NAME: &str = "table_name";
pub const OPT_COLUMN_NAME: &str = "column_name";
pub const OPT_USE_REMOTE_ESTIMATE: &str = "use_remote_estimate";

/// Options attached to a foreign table (or inherited from its server).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableOptions {
    /// Remote schema name; falls back to the local namespace name
    pub schema_name: Option<String>,
    /// Remote table name; falls back to the local relation name
    pub table_name: Option<String>,
    /// Whether the cost layer should ask the remote server for estimates
    pub use_remote_estimate: Option<bool>,
}

impl TableOptions {
    pub fn parse(options: &[(String, String)]) -> Result<Self> {
        let mut parsed = Self::default();

        for (name, value) in options {
            match name.as_str() {
                OPT_SCHEMA_NAME => parsed.schema_name = Some(value.clone()),
                OPT_TABLE_NAME => parsed.table_name = Some(value.clone()),
                OPT_USE_REMOTE_ESTIMATE => {
                    parsed.use_remote_estimate = Some(parse_bool(name, value)?)
                }
                _ => {}
            }
        }

        Ok(parsed)
    }
}

/// Options attached to a single foreign-table column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnOptions {
    /// Remote column name; falls back to the local attribute name
    pub column_name: Option<String>,
}

impl ColumnOptions {
    pub fn parse(options: &[(String, String)]) -> Result<Self> {
        let mut parsed = Self::default();

        for (name, value) in options {
            if name == OPT_COLUMN_NAME {
                parsed.column_name = Some(value.clone());
            }
        }

        Ok(parsed)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => bail!("{} requires a Boolean value, got \"{}\"", name, value),
    }
}
