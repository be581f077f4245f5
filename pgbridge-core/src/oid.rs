//! Object identifiers and the well-known constants the planner relies on.
//!
//! OIDs below the bootstrap cutoff are hand-assigned in the host catalogs
//! and are assumed present with identical semantics on any remote server of
//! the same dialect.

/// A catalog object identifier.
pub type Oid = u32;

/// A 1-based attribute number within a relation. Zero denotes a whole-row
/// reference, negative values denote system attributes.
pub type AttrNumber = i16;

/// A type modifier (length/precision decoration); -1 means "none".
pub type TypeMod = i32;

/// A 1-based index into the planner's range table.
pub type VarNo = u32;

/// A query parameter number as assigned by the host parser.
pub type ParamId = i32;

pub const INVALID_OID: Oid = 0;

/// Cutoff below which OIDs are hand-assigned ("built-in").
pub const FIRST_BOOTSTRAP_OBJECT_ID: Oid = 10000;

/// The database-default collation.
pub const DEFAULT_COLLATION_OID: Oid = 100;

/// The "C" and "POSIX" collations (built-in, non-default).
pub const C_COLLATION_OID: Oid = 950;
pub const POSIX_COLLATION_OID: Oid = 951;

/// Namespace OID of `pg_catalog`; objects there are never schema-qualified
/// because the remote session's search_path is assumed to be pg_catalog.
pub const PG_CATALOG_NAMESPACE: Oid = 11;

/// The local block size, used to convert pg_relation_size() output to pages.
pub const BLOCK_SIZE: u32 = 8192;

pub fn oid_is_valid(oid: Oid) -> bool {
    oid != INVALID_OID
}

/// Well-known type OIDs referenced by the constant deparser.
pub mod types {
    use super::Oid;

    pub const BOOL: Oid = 16;
    pub const BYTEA: Oid = 17;
    pub const INT8: Oid = 20;
    pub const INT2: Oid = 21;
    pub const INT4: Oid = 23;
    pub const TEXT: Oid = 25;
    pub const OID: Oid = 26;
    pub const FLOAT4: Oid = 700;
    pub const FLOAT8: Oid = 701;
    pub const UNKNOWN: Oid = 705;
    pub const BPCHAR: Oid = 1042;
    pub const VARCHAR: Oid = 1043;
    pub const DATE: Oid = 1082;
    pub const TIME: Oid = 1083;
    pub const TIMESTAMP: Oid = 1114;
    pub const TIMESTAMPTZ: Oid = 1184;
    pub const INTERVAL: Oid = 1186;
    pub const BIT: Oid = 1560;
    pub const VARBIT: Oid = 1562;
    pub const NUMERIC: Oid = 1700;
    pub const UUID: Oid = 2950;

    pub const INT4_ARRAY: Oid = 1007;
    pub const TEXT_ARRAY: Oid = 1009;
}
