//! Driver-level parameter/column type tags.
//!
//! `DbType` is an explicit tagged variant. The legacy signed-integer encoding,
//! where "array of", "range of" and "multirange of" are numeric offsets over a
//! base ordinal, is only understood by [`DbType::from_legacy`] and
//! [`DbType::to_legacy`].

use std::fmt;

use crate::error::{Error, Result};

use super::value::Value;

/// Legacy offset marking an array type. The most negative band.
pub const ARRAY_BAND: i32 = i32::MIN;
/// Legacy offset marking a range type.
pub const RANGE_BAND: i32 = 0x4000_0000;
/// Legacy offset marking a multirange type. Always below [`RANGE_BAND`].
pub const MULTIRANGE_BAND: i32 = 0x2000_0000;

macro_rules! base_types {
    ($($variant:ident = $ordinal:literal => $name:literal,)+) => {
        /// Scalar type, one per legacy base ordinal.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum BaseType {
            $($variant,)+
        }

        impl BaseType {
            /// Every base type, in ordinal order.
            pub const ALL: &'static [BaseType] = &[$(BaseType::$variant,)+];

            /// Look up a base type by its legacy ordinal.
            pub fn from_ordinal(ordinal: i32) -> Option<Self> {
                match ordinal {
                    $($ordinal => Some(BaseType::$variant),)+
                    _ => None,
                }
            }

            /// Legacy ordinal of this base type.
            pub fn ordinal(self) -> i32 {
                match self {
                    $(BaseType::$variant => $ordinal,)+
                }
            }

            /// SQL name of this base type.
            pub fn name(self) -> &'static str {
                match self {
                    $(BaseType::$variant => $name,)+
                }
            }
        }
    };
}

base_types! {
    Bigint = 1 => "int8",
    Boolean = 2 => "bool",
    Box = 3 => "box",
    Bytea = 4 => "bytea",
    Circle = 5 => "circle",
    Char = 6 => "bpchar",
    Date = 7 => "date",
    Double = 8 => "float8",
    Integer = 9 => "int4",
    Line = 10 => "line",
    LSeg = 11 => "lseg",
    Money = 12 => "money",
    Numeric = 13 => "numeric",
    Path = 14 => "path",
    Point = 15 => "point",
    Polygon = 16 => "polygon",
    Real = 17 => "float4",
    Smallint = 18 => "int2",
    Text = 19 => "text",
    Time = 20 => "time",
    Timestamp = 21 => "timestamp",
    Varchar = 22 => "varchar",
    Refcursor = 23 => "refcursor",
    Inet = 24 => "inet",
    Bit = 25 => "bit",
    TimestampTz = 26 => "timestamptz",
    Uuid = 27 => "uuid",
    Xml = 28 => "xml",
    Oidvector = 29 => "oidvector",
    Interval = 30 => "interval",
    TimeTz = 31 => "timetz",
    Name = 32 => "name",
    MacAddr = 34 => "macaddr",
    Json = 35 => "json",
    Jsonb = 36 => "jsonb",
    Hstore = 37 => "hstore",
    InternalChar = 38 => "char",
    Varbit = 39 => "varbit",
    Unknown = 40 => "unknown",
    Oid = 41 => "oid",
    Xid = 42 => "xid",
    Cid = 43 => "cid",
    Cidr = 44 => "cidr",
    TsVector = 45 => "tsvector",
    TsQuery = 46 => "tsquery",
    Regtype = 49 => "regtype",
    Geometry = 50 => "geometry",
    Citext = 51 => "citext",
    Int2Vector = 52 => "int2vector",
    Tid = 53 => "tid",
    MacAddr8 = 54 => "macaddr8",
    Geography = 55 => "geography",
    Regconfig = 56 => "regconfig",
    JsonPath = 57 => "jsonpath",
    PgLsn = 59 => "pg_lsn",
    LTree = 60 => "ltree",
    LQuery = 61 => "lquery",
    LTxtQuery = 62 => "ltxtquery",
    Xid8 = 64 => "xid8",
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element of an array type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayElement {
    Base(BaseType),
    Range(BaseType),
    Multirange(BaseType),
}

/// Logical type of a parameter or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    Base(BaseType),
    Range(BaseType),
    Multirange(BaseType),
    Array(ArrayElement),
}

/// Band a legacy tag falls into, before the base ordinal is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Range(i32),
    Multirange(i32),
    Base(i32),
    Array(i32),
}

impl Band {
    /// Bands nest by magnitude, so membership is tested from the largest
    /// offset down and arrays (everything at or below zero) last.
    fn of(tag: i32) -> Self {
        if tag > RANGE_BAND {
            Band::Range(tag - RANGE_BAND)
        } else if tag > MULTIRANGE_BAND {
            Band::Multirange(tag - MULTIRANGE_BAND)
        } else if tag > 0 {
            Band::Base(tag)
        } else {
            // `tag - ARRAY_BAND` overflows i32 for tag == 0, which is not a
            // valid array tag anyway.
            Band::Array(tag.wrapping_sub(ARRAY_BAND))
        }
    }
}

impl DbType {
    /// Array of a base type.
    pub fn array_of(base: BaseType) -> Self {
        DbType::Array(ArrayElement::Base(base))
    }

    /// Decode a legacy type tag.
    pub fn from_legacy(tag: i32) -> Result<Self> {
        let unsupported = || Error::UnsupportedLegacyType { tag };
        let base = |ordinal: i32| BaseType::from_ordinal(ordinal).ok_or_else(unsupported);

        match Band::of(tag) {
            Band::Range(ordinal) => Ok(DbType::Range(base(ordinal)?)),
            Band::Multirange(ordinal) => Ok(DbType::Multirange(base(ordinal)?)),
            Band::Base(ordinal) => Ok(DbType::Base(base(ordinal)?)),
            Band::Array(inner) if inner > 0 => match Band::of(inner) {
                Band::Range(ordinal) => Ok(DbType::Array(ArrayElement::Range(base(ordinal)?))),
                Band::Multirange(ordinal) => {
                    Ok(DbType::Array(ArrayElement::Multirange(base(ordinal)?)))
                }
                Band::Base(ordinal) => Ok(DbType::Array(ArrayElement::Base(base(ordinal)?))),
                Band::Array(_) => Err(unsupported()),
            },
            Band::Array(_) => Err(unsupported()),
        }
    }

    /// Encode as a legacy type tag.
    pub fn to_legacy(self) -> i32 {
        match self {
            DbType::Base(base) => base.ordinal(),
            DbType::Range(base) => RANGE_BAND + base.ordinal(),
            DbType::Multirange(base) => MULTIRANGE_BAND + base.ordinal(),
            DbType::Array(element) => {
                let inner = match element {
                    ArrayElement::Base(base) => base.ordinal(),
                    ArrayElement::Range(base) => RANGE_BAND + base.ordinal(),
                    ArrayElement::Multirange(base) => MULTIRANGE_BAND + base.ordinal(),
                };
                ARRAY_BAND + inner
            }
        }
    }

    /// Infer a type for a parameter value that was given without one.
    ///
    /// NULL and empty arrays carry no type information and infer to
    /// `unknown` / `text[]`, leaving the final decision to the executor.
    pub fn infer(value: &Value) -> Self {
        let base = match value {
            Value::Null => BaseType::Unknown,
            Value::Bool(_) => BaseType::Boolean,
            Value::Int2(_) => BaseType::Smallint,
            Value::Int4(_) => BaseType::Integer,
            Value::Int8(_) => BaseType::Bigint,
            Value::Float4(_) => BaseType::Real,
            Value::Float8(_) => BaseType::Double,
            Value::Numeric(_) => BaseType::Numeric,
            Value::Text(_) => BaseType::Text,
            Value::Bytea(_) => BaseType::Bytea,
            Value::Date(_) => BaseType::Date,
            Value::Time(_) => BaseType::Time,
            Value::Timestamp(_) => BaseType::Timestamp,
            Value::TimestampTz(_) => BaseType::TimestampTz,
            Value::Array(items) => {
                let element = items
                    .iter()
                    .find(|item| !item.is_null())
                    .map(DbType::infer)
                    .and_then(|ty| match ty {
                        DbType::Base(base) => Some(base),
                        _ => None,
                    })
                    .unwrap_or(BaseType::Text);
                return DbType::array_of(element);
            }
        };
        DbType::Base(base)
    }
}

impl From<BaseType> for DbType {
    fn from(base: BaseType) -> Self {
        DbType::Base(base)
    }
}

impl fmt::Display for ArrayElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayElement::Base(base) => write!(f, "{}", base),
            ArrayElement::Range(base) => write!(f, "range<{}>", base),
            ArrayElement::Multirange(base) => write!(f, "multirange<{}>", base),
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::Base(base) => write!(f, "{}", base),
            DbType::Range(base) => write!(f, "range<{}>", base),
            DbType::Multirange(base) => write!(f, "multirange<{}>", base),
            DbType::Array(element) => write!(f, "{}[]", element),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_ordinals_round_trip() {
        for base in BaseType::ALL {
            assert_eq!(BaseType::from_ordinal(base.ordinal()), Some(*base));
            assert_eq!(DbType::from_legacy(base.ordinal()).unwrap(), DbType::Base(*base));
        }
        assert_eq!(BaseType::from_ordinal(33), None);
    }

    #[test]
    fn test_legacy_composites() {
        assert_eq!(
            DbType::from_legacy(RANGE_BAND + 9).unwrap(),
            DbType::Range(BaseType::Integer)
        );
        assert_eq!(
            DbType::from_legacy(MULTIRANGE_BAND + 1).unwrap(),
            DbType::Multirange(BaseType::Bigint)
        );
        assert_eq!(
            DbType::from_legacy(ARRAY_BAND + 19).unwrap(),
            DbType::array_of(BaseType::Text)
        );
        assert_eq!(
            DbType::from_legacy(ARRAY_BAND + RANGE_BAND + 7).unwrap(),
            DbType::Array(ArrayElement::Range(BaseType::Date))
        );
        assert_eq!(
            DbType::from_legacy(ARRAY_BAND + MULTIRANGE_BAND + 13).unwrap(),
            DbType::Array(ArrayElement::Multirange(BaseType::Numeric))
        );
    }

    #[test]
    fn test_band_boundaries() {
        // Just above each boundary lands in that band, never a lower one.
        assert_eq!(Band::of(RANGE_BAND + 1), Band::Range(1));
        assert_eq!(Band::of(MULTIRANGE_BAND + 1), Band::Multirange(1));
        assert_eq!(Band::of(1), Band::Base(1));
        assert_eq!(Band::of(ARRAY_BAND + 1), Band::Array(1));

        // The boundaries themselves belong to the band below.
        assert_eq!(Band::of(RANGE_BAND), Band::Multirange(RANGE_BAND - MULTIRANGE_BAND));
        assert_eq!(Band::of(MULTIRANGE_BAND), Band::Base(MULTIRANGE_BAND));
        assert!(matches!(Band::of(0), Band::Array(_)));
    }

    #[test]
    fn test_invalid_legacy_tags() {
        for tag in [0, 33, RANGE_BAND, MULTIRANGE_BAND, ARRAY_BAND, -1, RANGE_BAND + 999] {
            match DbType::from_legacy(tag) {
                Err(Error::UnsupportedLegacyType { tag: t }) => assert_eq!(t, tag),
                other => panic!("expected UnsupportedLegacyType for {tag:#x}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_to_legacy_inverts_from_legacy() {
        let types = [
            DbType::Base(BaseType::Uuid),
            DbType::Range(BaseType::TimestampTz),
            DbType::Multirange(BaseType::Integer),
            DbType::array_of(BaseType::Jsonb),
            DbType::Array(ArrayElement::Range(BaseType::Bigint)),
            DbType::Array(ArrayElement::Multirange(BaseType::Timestamp)),
        ];
        for ty in types {
            assert_eq!(DbType::from_legacy(ty.to_legacy()).unwrap(), ty);
        }
    }

    #[test]
    fn test_infer() {
        assert_eq!(DbType::infer(&Value::Int4(1)), DbType::Base(BaseType::Integer));
        assert_eq!(DbType::infer(&Value::Null), DbType::Base(BaseType::Unknown));
        assert_eq!(
            DbType::infer(&Value::Array(vec![Value::Null, Value::Int8(3)])),
            DbType::array_of(BaseType::Bigint)
        );
        assert_eq!(
            DbType::infer(&Value::Array(vec![])),
            DbType::array_of(BaseType::Text)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(DbType::Base(BaseType::Integer).to_string(), "int4");
        assert_eq!(DbType::Range(BaseType::Date).to_string(), "range<date>");
        assert_eq!(
            DbType::Array(ArrayElement::Multirange(BaseType::Numeric)).to_string(),
            "multirange<numeric>[]"
        );
    }
}
