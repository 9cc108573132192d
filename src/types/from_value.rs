//! Typed access to marshalled values.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use thiserror::Error;

use super::value::Value;

/// Why a value could not be converted by [`FromValue`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// NULL read into a type with no NULL representation.
    #[error("value is NULL")]
    Null,

    /// NULL array element read into a type with no NULL representation.
    #[error("array contains NULL")]
    NullElement,

    /// Value of a different kind than the target type.
    #[error("unexpected value {0:?}")]
    Unexpected(Value),

    /// Integer does not fit the target width.
    #[error("{0} is out of range")]
    OutOfRange(i64),

    /// Numeric text that does not parse as the target type.
    #[error("numeric {0} is not representable")]
    NotRepresentable(String),
}

/// Conversion from a marshalled [`Value`] into a Rust type.
///
/// Nullability is decided by [`FromValue::from_null`]: plain value types
/// return `None` there, which makes a NULL column an invalid cast. `Option<T>`
/// maps NULL to `None`, and [`Value`] itself maps it to [`Value::Null`].
pub trait FromValue: Sized {
    /// Convert a non-null value.
    fn from_value(value: Value) -> Result<Self, ValueError>;

    /// Representation of NULL for this type, if it has one.
    fn from_null() -> Option<Self> {
        None
    }
}

fn mismatch<T>(value: Value) -> Result<T, ValueError> {
    Err(ValueError::Unexpected(value))
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }

    fn from_null() -> Option<Self> {
        Some(Value::Null)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }

    fn from_null() -> Option<Self> {
        Some(None)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => mismatch(other),
        }
    }
}

macro_rules! integer_from_value {
    ($($ty:ty),+) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let wide = match value {
                        Value::Int2(v) => i64::from(v),
                        Value::Int4(v) => i64::from(v),
                        Value::Int8(v) => v,
                        other => return mismatch(other),
                    };
                    <$ty>::try_from(wide)
                        .map_err(|_| ValueError::OutOfRange(wide))
                }
            }
        )+
    };
}

integer_from_value!(i16, i32, i64);

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float4(v) => Ok(v),
            Value::Int2(v) => Ok(f32::from(v)),
            other => mismatch(other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float4(v) => Ok(f64::from(v)),
            Value::Float8(v) => Ok(v),
            Value::Int2(v) => Ok(f64::from(v)),
            Value::Int4(v) => Ok(f64::from(v)),
            Value::Numeric(s) => s.parse().map_err(|_| ValueError::NotRepresentable(s)),
            other => mismatch(other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(s) | Value::Numeric(s) => Ok(s),
            other => mismatch(other),
        }
    }
}

impl FromValue for Bytes {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bytea(b) => Ok(b),
            other => mismatch(other),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Date(d) => Ok(d),
            other => mismatch(other),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Time(t) => Ok(t),
            other => mismatch(other),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            other => mismatch(other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::TimestampTz(ts) => Ok(ts),
            other => mismatch(other),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Null => T::from_null().ok_or(ValueError::NullElement),
                    item => T::from_value(item),
                })
                .collect(),
            other => mismatch(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handling() {
        assert_eq!(Value::from_null(), Some(Value::Null));
        assert_eq!(<Option<i32>>::from_null(), Some(None));
        assert_eq!(i32::from_null(), None);
        assert_eq!(String::from_null(), None);
    }

    #[test]
    fn test_integer_widening_and_range() {
        assert_eq!(i64::from_value(Value::Int2(3)), Ok(3));
        assert_eq!(i32::from_value(Value::Int8(40)), Ok(40));
        assert_eq!(
            i16::from_value(Value::Int4(70_000)),
            Err(ValueError::OutOfRange(70_000))
        );
        assert_eq!(
            i32::from_value(Value::Text("1".into())),
            Err(ValueError::Unexpected(Value::Text("1".into())))
        );
        assert_eq!(
            ValueError::OutOfRange(70_000).to_string(),
            "70000 is out of range"
        );
    }

    #[test]
    fn test_numeric_as_float() {
        assert_eq!(f64::from_value(Value::Numeric("2.5".into())), Ok(2.5));
        assert_eq!(
            f64::from_value(Value::Numeric("NaN?".into())),
            Err(ValueError::NotRepresentable("NaN?".into()))
        );
    }

    #[test]
    fn test_arrays() {
        let v = Value::Array(vec![Value::Int4(1), Value::Null]);
        assert_eq!(
            <Vec<Option<i32>>>::from_value(v.clone()),
            Ok(vec![Some(1), None])
        );
        assert_eq!(<Vec<i32>>::from_value(v), Err(ValueError::NullElement));
    }
}
