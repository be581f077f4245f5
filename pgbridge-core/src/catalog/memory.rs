//! In-memory catalog for embedders and tests.
//!
//! Mirrors the behavior the planner depends on from a live host: name
//! lookups, FDW option lists, operator/function metadata, type output and
//! formatting. Populated through the builder-style `add_*`/`with_*` API.

use std::cell::Cell;
use std::collections::HashMap;

use chrono::TimeZone;

use crate::{
    catalog::{Catalog, FunctionInfo, OperatorInfo},
    datum::Datum,
    err::{bail, Context, Result},
    oid::{types, AttrNumber, Oid, TypeMod, FIRST_BOOTSTRAP_OBJECT_ID},
};

/// Definition of a relation and its columns, in attribute-number order.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDef {
    pub oid: Oid,
    pub namespace: Oid,
    pub name: String,
    pub options: Vec<(String, String)>,
    pub columns: Vec<ColumnDef>,
}

impl RelationDef {
    pub fn new(oid: Oid, namespace: Oid, name: impl Into<String>) -> Self {
        Self {
            oid,
            namespace,
            name: name.into(),
            options: vec![],
            columns: vec![],
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((name.into(), value.into()));
        self
    }

    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub dropped: bool,
    pub options: Vec<(String, String)>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dropped: false,
            options: vec![],
        }
    }

    pub fn dropped() -> Self {
        Self {
            name: "........pg.dropped........".into(),
            dropped: true,
            options: vec![],
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((name.into(), value.into()));
        self
    }
}

/// A [`Catalog`] backed by plain maps.
pub struct MemoryCatalog {
    builtin_cutoff: Oid,
    namespaces: HashMap<Oid, String>,
    relations: HashMap<Oid, RelationDef>,
    operators: HashMap<Oid, OperatorInfo>,
    functions: HashMap<Oid, FunctionInfo>,
    type_names: HashMap<Oid, String>,
    modes_nest: Cell<i32>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            builtin_cutoff: FIRST_BOOTSTRAP_OBJECT_ID,
            namespaces: HashMap::new(),
            relations: HashMap::new(),
            operators: HashMap::new(),
            functions: HashMap::new(),
            type_names: HashMap::new(),
            modes_nest: Cell::new(0),
        }
    }

    /// Lower (or raise) the built-in cutoff for this server.
    pub fn with_builtin_cutoff(mut self, cutoff: Oid) -> Self {
        self.builtin_cutoff = cutoff;
        self
    }

    pub fn add_namespace(&mut self, oid: Oid, name: impl Into<String>) {
        self.namespaces.insert(oid, name.into());
    }

    pub fn add_relation(&mut self, relation: RelationDef) {
        self.relations.insert(relation.oid, relation);
    }

    pub fn add_operator(&mut self, oid: Oid, info: OperatorInfo) {
        self.operators.insert(oid, info);
    }

    pub fn add_function(&mut self, oid: Oid, info: FunctionInfo) {
        self.functions.insert(oid, info);
    }

    pub fn add_type(&mut self, oid: Oid, sql_name: impl Into<String>) {
        self.type_names.insert(oid, sql_name.into());
    }

    /// The current transmission-modes nest level; 0 when no guard is live.
    pub fn transmission_nest_level(&self) -> i32 {
        self.modes_nest.get()
    }

    fn relation(&self, rel: Oid) -> Result<&RelationDef> {
        self.relations
            .get(&rel)
            .with_context(|| format!("cache lookup failed for relation {}", rel))
    }

    fn column(&self, rel: Oid, attno: AttrNumber) -> Result<&ColumnDef> {
        let relation = self.relation(rel)?;

        if attno < 1 || attno as usize > relation.columns.len() {
            bail!("invalid attribute number {} for relation {}", attno, rel);
        }

        Ok(&relation.columns[(attno - 1) as usize])
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for MemoryCatalog {
    fn builtin_cutoff(&self) -> Oid {
        self.builtin_cutoff
    }

    fn namespace_name(&self, oid: Oid) -> Result<String> {
        self.namespaces
            .get(&oid)
            .cloned()
            .with_context(|| format!("cache lookup failed for namespace {}", oid))
    }

    fn relation_namespace(&self, rel: Oid) -> Result<Oid> {
        Ok(self.relation(rel)?.namespace)
    }

    fn relation_name(&self, rel: Oid) -> Result<String> {
        Ok(self.relation(rel)?.name.clone())
    }

    fn attribute_count(&self, rel: Oid) -> Result<AttrNumber> {
        Ok(self.relation(rel)?.columns.len() as AttrNumber)
    }

    fn attribute_name(&self, rel: Oid, attno: AttrNumber) -> Result<String> {
        Ok(self.column(rel, attno)?.name.clone())
    }

    fn attribute_is_dropped(&self, rel: Oid, attno: AttrNumber) -> Result<bool> {
        Ok(self.column(rel, attno)?.dropped)
    }

    fn foreign_table_options(&self, rel: Oid) -> Result<Vec<(String, String)>> {
        Ok(self.relation(rel)?.options.clone())
    }

    fn foreign_column_options(&self, rel: Oid, attno: AttrNumber) -> Result<Vec<(String, String)>> {
        Ok(self.column(rel, attno)?.options.clone())
    }

    fn operator(&self, oid: Oid) -> Result<OperatorInfo> {
        self.operators
            .get(&oid)
            .cloned()
            .with_context(|| format!("cache lookup failed for operator {}", oid))
    }

    fn function(&self, oid: Oid) -> Result<FunctionInfo> {
        self.functions
            .get(&oid)
            .cloned()
            .with_context(|| format!("cache lookup failed for function {}", oid))
    }

    fn type_output(&self, type_oid: Oid, value: &Datum) -> Result<String> {
        Ok(match value {
            Datum::Null => bail!("no output for null datum of type {}", type_oid),
            Datum::Boolean(b) => if *b { "t" } else { "f" }.to_string(),
            Datum::Int16(v) => v.to_string(),
            Datum::Int32(v) => v.to_string(),
            Datum::Int64(v) => v.to_string(),
            Datum::UInt32(v) => v.to_string(),
            Datum::Float32(v) => float_output(*v as f64),
            Datum::Float64(v) => float_output(*v),
            Datum::Decimal(v) => v.to_string(),
            Datum::Utf8String(v) => v.clone(),
            Datum::Binary(v) => {
                let mut out = String::with_capacity(2 + v.len() * 2);
                out.push_str("\\x");
                for byte in v {
                    out.push_str(&format!("{:02x}", byte));
                }
                out
            }
            Datum::Date(v) => v.format("%Y-%m-%d").to_string(),
            Datum::Time(v) => v.format("%H:%M:%S").to_string(),
            Datum::DateTime(v) => datetime_output(v),
            Datum::DateTimeWithTZ((naive, tz)) => tz
                .from_utc_datetime(naive)
                .format("%Y-%m-%d %H:%M:%S%z")
                .to_string(),
            Datum::Uuid(v) => v.to_string(),
        })
    }

    fn format_type(&self, type_oid: Oid, typmod: TypeMod) -> Result<String> {
        let name = self
            .type_names
            .get(&type_oid)
            .with_context(|| format!("cache lookup failed for type {}", type_oid))?;

        if typmod < 0 {
            return Ok(name.clone());
        }

        Ok(match type_oid {
            // Length-bearing typmods store length + header size.
            types::VARCHAR | types::BPCHAR => format!("{}({})", name, typmod - 4),
            types::NUMERIC => {
                let precision = ((typmod - 4) >> 16) & 0xffff;
                let scale = (typmod - 4) & 0xffff;
                format!("{}({},{})", name, precision, scale)
            }
            _ => format!("{}({})", name, typmod),
        })
    }

    fn set_transmission_modes(&self) -> Result<i32> {
        let nestlevel = self.modes_nest.get() + 1;
        self.modes_nest.set(nestlevel);
        Ok(nestlevel)
    }

    fn reset_transmission_modes(&self, nestlevel: i32) {
        debug_assert_eq!(self.modes_nest.get(), nestlevel);
        self.modes_nest.set(nestlevel - 1);
    }
}

fn float_output(val: f64) -> String {
    if val.is_nan() {
        "NaN".to_string()
    } else if val == f64::INFINITY {
        "Infinity".to_string()
    } else if val == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        val.to_string()
    }
}

fn datetime_output(val: &chrono::NaiveDateTime) -> String {
    use chrono::Timelike;

    if val.nanosecond() == 0 {
        val.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        val.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}
