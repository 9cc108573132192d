//! Type tags, native OIDs and marshalled values.

mod column;
mod db_type;
mod from_value;
pub mod oid;
pub mod text;
mod value;

pub use column::{Column, ColumnInfo};
pub use db_type::{ArrayElement, BaseType, DbType, ARRAY_BAND, MULTIRANGE_BAND, RANGE_BAND};
pub use from_value::{FromValue, ValueError};
pub use oid::{resolve, resolve_legacy, Oid, OidMapping};
pub use value::Value;
