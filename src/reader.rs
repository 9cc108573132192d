//! Cursor-backed data reader.
//!
//! A [`DataReader`] pulls one row per fetch across the executor boundary.
//! Column metadata is read on the first non-empty fetch and cached for the
//! life of the reader; values are marshalled on access.

use std::any::type_name;

use tracing::{debug, trace};

use crate::command::PreparedStatement;
use crate::error::{Error, Result};
use crate::executor::{Datum, Executor};
use crate::session::Session;
use crate::types::{Column, ColumnInfo, FromValue, Oid, Value, ValueError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Cursor open, more rows may follow.
    Active,
    /// Last fetch returned no rows; resources released.
    Exhausted,
    /// Closed by the caller, or after an executor failure.
    Closed,
}

/// Forward-only reader over the rows of a command.
///
/// Holds the executor context of its command for as long as it is active,
/// so only one reader per connection can be open at a time. The context is
/// released once the rows are exhausted, on [`DataReader::close`], or on
/// drop, whichever comes first.
///
/// # Lifecycle
///
/// 1. Created by [`crate::Command::execute_reader`]
/// 2. Advanced with [`DataReader::read`]; values read with
///    [`DataReader::get`] / [`DataReader::get_value`]
/// 3. Released when `read()` returns false, or explicitly via `close()`
pub struct DataReader<'a, E: Executor> {
    session: Option<Session<'a, E>>,
    statement: Option<PreparedStatement<E::Statement>>,
    cursor: Option<E::Cursor>,
    state: ReaderState,
    columns: Option<ColumnInfo>,
    values: Vec<Datum>,
    nulls: Vec<bool>,
    has_row: bool,
    rows_fetched: u64,
    records_affected: i64,
}

impl<'a, E: Executor> DataReader<'a, E> {
    /// Reader over an open cursor.
    pub(crate) fn open(
        session: Session<'a, E>,
        statement: PreparedStatement<E::Statement>,
        cursor: E::Cursor,
    ) -> Self {
        Self {
            session: Some(session),
            statement: Some(statement),
            cursor: Some(cursor),
            state: ReaderState::Active,
            columns: None,
            values: Vec::new(),
            nulls: Vec::new(),
            has_row: false,
            rows_fetched: 0,
            records_affected: -1,
        }
    }

    /// Reader for a statement that returns no rows.
    pub(crate) fn exhausted(records_affected: u64) -> Self {
        Self {
            session: None,
            statement: None,
            cursor: None,
            state: ReaderState::Exhausted,
            columns: None,
            values: Vec::new(),
            nulls: Vec::new(),
            has_row: false,
            rows_fetched: 0,
            records_affected: i64::try_from(records_affected).unwrap_or(i64::MAX),
        }
    }

    /// Advance to the next row.
    ///
    /// Returns `Ok(false)` once the rows are exhausted; the executor context
    /// is released at that point and later calls return `Ok(false)` without
    /// touching the executor. An executor failure closes the reader.
    pub fn read(&mut self) -> Result<bool> {
        if self.state != ReaderState::Active {
            return Ok(false);
        }

        match self.fetch() {
            Ok(true) => Ok(true),
            Ok(false) => {
                trace!(rows = self.rows_fetched, "reader exhausted");
                self.state = ReaderState::Exhausted;
                self.release();
                Ok(false)
            }
            Err(e) => {
                debug!(error = %e, "fetch failed; closing reader");
                self.release();
                self.state = ReaderState::Closed;
                Err(e)
            }
        }
    }

    fn fetch(&mut self) -> Result<bool> {
        self.has_row = false;
        let (Some(session), Some(cursor)) = (self.session.as_mut(), self.cursor.as_mut()) else {
            return Ok(false);
        };
        let executor = session.executor();

        executor.cursor_fetch(cursor)?;
        let (row_count, column_count) = executor.table_dimensions();
        trace!(row_count, column_count, "fetched");
        if row_count < 1 {
            return Ok(false);
        }

        if self.columns.is_none() {
            let columns = executor.column_properties(column_count)?;
            self.values = vec![Datum::NULL; columns.len()];
            self.nulls = vec![false; columns.len()];
            self.columns = Some(ColumnInfo::new(columns));
        }

        executor.current_row(&mut self.values, &mut self.nulls);
        self.has_row = true;
        self.rows_fetched += 1;
        Ok(true)
    }

    fn release(&mut self) {
        self.has_row = false;
        self.cursor = None;
        self.statement = None;
        if let Some(mut session) = self.session.take() {
            session.finish();
        }
    }

    /// Close the reader, releasing the executor context. Idempotent.
    pub fn close(&mut self) {
        if self.state == ReaderState::Closed {
            return;
        }
        self.release();
        self.state = ReaderState::Closed;
    }

    /// Advance to the next row. Multiple result sets are not supported, so
    /// this is the same as [`DataReader::read`].
    pub fn next_result(&mut self) -> Result<bool> {
        self.read()
    }

    pub fn is_closed(&self) -> bool {
        self.state == ReaderState::Closed
    }

    /// Whether a row is positioned for value access.
    pub fn has_current_row(&self) -> bool {
        self.has_row
    }

    /// Rows read so far.
    pub fn rows_fetched(&self) -> u64 {
        self.rows_fetched
    }

    /// Rows affected by a non-query statement; -1 for queries.
    pub fn records_affected(&self) -> i64 {
        self.records_affected
    }

    /// Column metadata, once the first row has been read.
    pub fn columns(&self) -> Option<&ColumnInfo> {
        self.columns.as_ref()
    }

    /// Number of columns, 0 before the first row.
    pub fn field_count(&self) -> usize {
        self.columns.as_ref().map_or(0, ColumnInfo::len)
    }

    /// The prepared statement behind an active reader.
    pub fn statement(&self) -> Option<&PreparedStatement<E::Statement>> {
        self.statement.as_ref()
    }

    fn column(&self, ordinal: usize) -> Result<&Column> {
        if self.is_closed() {
            return Err(Error::ReaderClosed);
        }
        self.columns
            .as_ref()
            .and_then(|info| info.get(ordinal))
            .ok_or(Error::ColumnIndexOutOfBounds {
                index: ordinal,
                count: self.field_count(),
            })
    }

    /// Ordinal of a column by name, case-insensitive.
    pub fn get_ordinal(&self, name: &str) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::ReaderClosed);
        }
        self.columns
            .as_ref()
            .and_then(|info| info.find_by_name(name))
            .ok_or_else(|| Error::ColumnNotFound {
                name: name.to_string(),
            })
    }

    pub fn get_name(&self, ordinal: usize) -> Result<&str> {
        Ok(self.column(ordinal)?.name.as_str())
    }

    /// Native type OID of a column.
    pub fn get_field_type(&self, ordinal: usize) -> Result<Oid> {
        Ok(self.column(ordinal)?.oid)
    }

    /// SQL type name of a column.
    pub fn data_type_name(&self, ordinal: usize) -> Result<String> {
        Ok(self.column(ordinal)?.type_name())
    }

    /// Whether the current row's value is NULL.
    pub fn is_null(&self, ordinal: usize) -> Result<bool> {
        self.column(ordinal)?;
        if !self.has_row {
            return Err(Error::NoCurrentRow);
        }
        Ok(self.nulls[ordinal])
    }

    /// Value of a column in the current row. NULL reads as [`Value::Null`].
    pub fn get_value(&mut self, ordinal: usize) -> Result<Value> {
        let oid = self.column(ordinal)?.oid;
        if !self.has_row {
            return Err(Error::NoCurrentRow);
        }
        if self.nulls[ordinal] {
            return Ok(Value::Null);
        }

        let datum = self.values[ordinal];
        let session = self.session.as_mut().ok_or(Error::NoCurrentRow)?;
        session.executor().datum_to_value(datum, oid)
    }

    /// Typed value of a column in the current row.
    ///
    /// NULL reads as `None` for `Option<T>` and [`Value::Null`] for
    /// [`Value`]; any other target fails with [`Error::InvalidCast`].
    pub fn get<T: FromValue>(&mut self, ordinal: usize) -> Result<T> {
        let value = self.get_value(ordinal)?;
        let converted = if value.is_null() {
            T::from_null().ok_or(ValueError::Null)
        } else {
            T::from_value(value)
        };

        converted.map_err(|source| Error::InvalidCast {
            column: self
                .get_name(ordinal)
                .map_or_else(|_| ordinal.to_string(), str::to_string),
            target: type_name::<T>(),
            source,
        })
    }

    /// Typed value of a named column in the current row.
    pub fn get_by_name<T: FromValue>(&mut self, name: &str) -> Result<T> {
        let ordinal = self.get_ordinal(name)?;
        self.get(ordinal)
    }

    /// Copy the current row into `values`, returning the number copied.
    pub fn get_values(&mut self, values: &mut [Value]) -> Result<usize> {
        let count = values.len().min(self.field_count());
        for (ordinal, slot) in values.iter_mut().enumerate().take(count) {
            *slot = self.get_value(ordinal)?;
        }
        Ok(count)
    }
}

impl<E: Executor> Drop for DataReader<'_, E> {
    fn drop(&mut self) {
        if self.state == ReaderState::Active {
            debug!(rows = self.rows_fetched, "reader dropped while active");
        }
        self.close();
    }
}
