//! The native executor boundary.
//!
//! [`Executor`] is the capability interface the bridge drives: prepare,
//! bind, open a cursor, fetch, and release. The SPI binding in [`spi`] is the
//! production implementation. With the `mock` feature, `mock::MockExecutor`
//! is a scripted in-memory implementation.

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod spi;

use crate::error::Result;
use crate::types::{Column, Oid, Value};

/// Opaque native value handle.
///
/// The executor owns whatever a datum refers to; a datum is only meaningful
/// while the executor context that produced it is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Datum(pub usize);

impl Datum {
    /// Placeholder handle passed for NULL values.
    pub const NULL: Datum = Datum(0);
}

/// Operations of the in-process executor.
///
/// Calls other than [`Executor::ready`] are only valid after `ready` returned
/// true, and until [`Executor::finish`] releases the context.
pub trait Executor {
    /// Prepared statement handle.
    type Statement;
    /// Open cursor handle.
    type Cursor;

    /// Establish (or confirm) an executor context.
    fn ready(&mut self) -> bool;

    /// Prepare `sql` with the given parameter types.
    fn prepare(&mut self, sql: &str, param_oids: &[Oid]) -> Result<Self::Statement>;

    /// Execute unparameterised `sql`, returning the affected-row count.
    ///
    /// `count` limits the rows processed; 0 means no limit.
    fn execute(&mut self, sql: &str, read_only: bool, count: i64) -> Result<u64>;

    /// Execute a prepared statement with bound values, returning the
    /// affected-row count.
    fn execute_prepared(
        &mut self,
        statement: &Self::Statement,
        values: &[Datum],
        nulls: &[bool],
        read_only: bool,
        count: i64,
    ) -> Result<u64>;

    /// Open a cursor over a prepared statement with bound values.
    fn cursor_open(
        &mut self,
        statement: &Self::Statement,
        values: &[Datum],
        nulls: &[bool],
    ) -> Result<Self::Cursor>;

    /// Advance the cursor's fetch position.
    fn cursor_fetch(&mut self, cursor: &mut Self::Cursor) -> Result<()>;

    /// `(row_count, column_count)` of the last fetch.
    fn table_dimensions(&mut self) -> (usize, usize);

    /// Names and type OIDs of the last fetch's columns.
    fn column_properties(&mut self, column_count: usize) -> Result<Vec<Column>>;

    /// Fill the current row's datums and null flags.
    fn current_row(&mut self, values: &mut [Datum], nulls: &mut [bool]);

    /// Release the cursor and executor context.
    fn finish(&mut self);

    /// Marshal a non-null datum of type `oid` into a value.
    fn datum_to_value(&mut self, datum: Datum, oid: Oid) -> Result<Value>;

    /// Marshal a non-null value into a datum of type `oid`.
    fn value_to_datum(&mut self, value: &Value, oid: Oid) -> Result<Datum>;
}
