//! Native type identifiers (OIDs) and the resolver from [`DbType`].

use crate::error::{Error, Result};

use super::db_type::{ArrayElement, BaseType, DbType};

/// Native type identifier.
pub type Oid = u32;

pub const BOOL: Oid = 16;
pub const BYTEA: Oid = 17;
pub const CHAR: Oid = 18;
pub const NAME: Oid = 19;
pub const INT8: Oid = 20;
pub const INT2: Oid = 21;
pub const INT4: Oid = 23;
pub const TEXT: Oid = 25;
pub const OID: Oid = 26;
pub const XID: Oid = 28;
pub const CID: Oid = 29;
pub const JSON: Oid = 114;
pub const FLOAT4: Oid = 700;
pub const FLOAT8: Oid = 701;
pub const UNKNOWN: Oid = 705;
pub const BPCHAR: Oid = 1042;
pub const VARCHAR: Oid = 1043;
pub const DATE: Oid = 1082;
pub const TIME: Oid = 1083;
pub const TIMESTAMP: Oid = 1114;
pub const TIMESTAMPTZ: Oid = 1184;
pub const NUMERIC: Oid = 1700;
pub const UUID: Oid = 2950;
pub const JSONB: Oid = 3802;

/// Native identifiers for one base type and the composites built on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OidMapping {
    pub base: BaseType,
    pub base_oid: Oid,
    /// `None` when the executor has no array type for this base type.
    pub array_oid: Option<Oid>,
    /// Range OID and range type name.
    pub range: Option<(Oid, &'static str)>,
    /// Multirange OID and multirange type name.
    pub multirange: Option<(Oid, &'static str)>,
}

const fn scalar(base: BaseType, base_oid: Oid, array_oid: Oid) -> OidMapping {
    OidMapping {
        base,
        base_oid,
        array_oid: Some(array_oid),
        range: None,
        multirange: None,
    }
}

const fn ranged(
    base: BaseType,
    base_oid: Oid,
    array_oid: Oid,
    range: (Oid, &'static str),
    multirange: (Oid, &'static str),
) -> OidMapping {
    OidMapping {
        base,
        base_oid,
        array_oid: Some(array_oid),
        range: Some(range),
        multirange: Some(multirange),
    }
}

/// Built-in types. Extension types (hstore, citext, geometry, ltree, ...) have
/// no fixed OID and are deliberately absent.
static OID_MAPPINGS: &[OidMapping] = &[
    ranged(BaseType::Bigint, INT8, 1016, (3926, "int8range"), (4536, "int8multirange")),
    scalar(BaseType::Boolean, BOOL, 1000),
    scalar(BaseType::Box, 603, 1020),
    scalar(BaseType::Bytea, BYTEA, 1001),
    scalar(BaseType::Circle, 718, 719),
    scalar(BaseType::Char, BPCHAR, 1014),
    ranged(BaseType::Date, DATE, 1182, (3912, "daterange"), (4535, "datemultirange")),
    scalar(BaseType::Double, FLOAT8, 1022),
    ranged(BaseType::Integer, INT4, 1007, (3904, "int4range"), (4451, "int4multirange")),
    scalar(BaseType::Line, 628, 629),
    scalar(BaseType::LSeg, 601, 1018),
    scalar(BaseType::Money, 790, 791),
    ranged(BaseType::Numeric, NUMERIC, 1231, (3906, "numrange"), (4532, "nummultirange")),
    scalar(BaseType::Path, 602, 1019),
    scalar(BaseType::Point, 600, 1017),
    scalar(BaseType::Polygon, 604, 1027),
    scalar(BaseType::Real, FLOAT4, 1021),
    scalar(BaseType::Smallint, INT2, 1005),
    scalar(BaseType::Text, TEXT, 1009),
    scalar(BaseType::Time, TIME, 1183),
    ranged(BaseType::Timestamp, TIMESTAMP, 1115, (3908, "tsrange"), (4533, "tsmultirange")),
    scalar(BaseType::Varchar, VARCHAR, 1015),
    scalar(BaseType::Refcursor, 1790, 2201),
    scalar(BaseType::Inet, 869, 1041),
    scalar(BaseType::Bit, 1560, 1561),
    ranged(
        BaseType::TimestampTz,
        TIMESTAMPTZ,
        1185,
        (3910, "tstzrange"),
        (4534, "tstzmultirange"),
    ),
    scalar(BaseType::Uuid, UUID, 2951),
    scalar(BaseType::Xml, 142, 143),
    scalar(BaseType::Oidvector, 30, 1013),
    scalar(BaseType::Interval, 1186, 1187),
    scalar(BaseType::TimeTz, 1266, 1270),
    scalar(BaseType::Name, NAME, 1003),
    scalar(BaseType::MacAddr, 829, 1040),
    scalar(BaseType::Json, JSON, 199),
    scalar(BaseType::Jsonb, JSONB, 3807),
    scalar(BaseType::InternalChar, CHAR, 1002),
    scalar(BaseType::Varbit, 1562, 1563),
    OidMapping {
        base: BaseType::Unknown,
        base_oid: UNKNOWN,
        array_oid: None,
        range: None,
        multirange: None,
    },
    scalar(BaseType::Oid, OID, 1028),
    scalar(BaseType::Xid, XID, 1011),
    scalar(BaseType::Cid, CID, 1012),
    scalar(BaseType::Cidr, 650, 651),
    scalar(BaseType::TsVector, 3614, 3643),
    scalar(BaseType::TsQuery, 3615, 3645),
    scalar(BaseType::Regtype, 2206, 2211),
    scalar(BaseType::Int2Vector, 22, 1006),
    scalar(BaseType::Tid, 27, 1010),
    scalar(BaseType::MacAddr8, 774, 775),
    scalar(BaseType::Regconfig, 3734, 3735),
    scalar(BaseType::JsonPath, 4072, 4073),
    scalar(BaseType::PgLsn, 3220, 3221),
    scalar(BaseType::Xid8, 5069, 271),
];

/// Array-of-range OIDs, keyed by range type name.
///
/// These are not derivable from the range OID and have to be looked up.
static RANGE_ARRAYS: &[(&str, Oid)] = &[
    ("int4range", 3905),
    ("numrange", 3907),
    ("tsrange", 3909),
    ("tstzrange", 3911),
    ("daterange", 3913),
    ("int8range", 3927),
];

/// Array-of-multirange OIDs, keyed by multirange type name.
static MULTIRANGE_ARRAYS: &[(&str, Oid)] = &[
    ("int4multirange", 6150),
    ("nummultirange", 6151),
    ("tsmultirange", 6152),
    ("tstzmultirange", 6153),
    ("datemultirange", 6155),
    ("int8multirange", 6157),
];

/// Table entry for a base type.
pub fn mapping(base: BaseType) -> Option<&'static OidMapping> {
    OID_MAPPINGS.iter().find(|m| m.base == base)
}

fn lookup(table: &[(&str, Oid)], name: &str) -> Option<Oid> {
    table.iter().find(|(n, _)| *n == name).map(|(_, oid)| *oid)
}

/// Resolve a type to its native OID.
pub fn resolve(ty: DbType) -> Result<Oid> {
    let unsupported = || Error::unsupported(ty.to_string());
    let entry = |base: BaseType| mapping(base).ok_or_else(unsupported);

    let oid = match ty {
        DbType::Base(base) => Some(entry(base)?.base_oid),
        DbType::Range(base) => entry(base)?.range.map(|(oid, _)| oid),
        DbType::Multirange(base) => entry(base)?.multirange.map(|(oid, _)| oid),
        DbType::Array(ArrayElement::Base(base)) => entry(base)?.array_oid,
        DbType::Array(ArrayElement::Range(base)) => entry(base)?
            .range
            .and_then(|(_, name)| lookup(RANGE_ARRAYS, name)),
        DbType::Array(ArrayElement::Multirange(base)) => entry(base)?
            .multirange
            .and_then(|(_, name)| lookup(MULTIRANGE_ARRAYS, name)),
    };

    oid.ok_or_else(unsupported)
}

/// Resolve a legacy type tag to its native OID.
pub fn resolve_legacy(tag: i32) -> Result<Oid> {
    resolve(DbType::from_legacy(tag)?)
}

/// Element OID of an array OID, if it is an array of a base type.
pub fn element_oid(array_oid: Oid) -> Option<Oid> {
    OID_MAPPINGS
        .iter()
        .find(|m| m.array_oid == Some(array_oid))
        .map(|m| m.base_oid)
}

/// SQL name of a native type, with arrays written as `T[]`.
pub fn type_name(oid: Oid) -> Option<String> {
    for m in OID_MAPPINGS {
        if m.base_oid == oid {
            return Some(m.base.name().to_string());
        }
        if m.array_oid == Some(oid) {
            return Some(format!("{}[]", m.base.name()));
        }
        if let Some((range_oid, name)) = m.range {
            if range_oid == oid {
                return Some(name.to_string());
            }
        }
        if let Some((multirange_oid, name)) = m.multirange {
            if multirange_oid == oid {
                return Some(name.to_string());
            }
        }
    }

    RANGE_ARRAYS
        .iter()
        .chain(MULTIRANGE_ARRAYS)
        .find(|(_, array_oid)| *array_oid == oid)
        .map(|(name, _)| format!("{}[]", name))
}
