//! Scripted in-memory executor.
//!
//! Result sets, affected-row counts and failures are queued up front and
//! consumed in order. Every boundary call is recorded so callers can verify
//! how the bridge drove the executor.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::types::{Column, Oid, Value};

use super::{Datum, Executor};

/// A boundary call, as recorded by [`MockExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Ready,
    Prepare { sql: String, param_oids: Vec<Oid> },
    Execute { sql: String, read_only: bool, count: i64 },
    ExecutePrepared { sql: String, values: Vec<Value> },
    CursorOpen { sql: String, values: Vec<Value> },
    CursorFetch,
    TableDimensions,
    ColumnProperties,
    CurrentRow,
    Finish,
}

/// Boundary operation a scripted failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Prepare,
    Execute,
    CursorOpen,
    CursorFetch,
}

/// A scripted query result.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Result set with the given `(name, oid)` columns and no rows.
    pub fn new<'a>(columns: impl IntoIterator<Item = (&'a str, Oid)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, oid)| Column::new(name, oid))
                .collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row.
    pub fn row(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.rows.push(values.into_iter().collect());
        self
    }
}

/// Statement handle issued by [`MockExecutor`].
#[derive(Debug)]
pub struct MockStatement {
    sql: String,
}

/// Cursor handle issued by [`MockExecutor`].
#[derive(Debug)]
pub struct MockCursor {
    id: usize,
}

#[derive(Debug)]
struct OpenCursor {
    id: usize,
    result: ResultSet,
    next_row: usize,
    current: Option<usize>,
}

/// In-memory [`Executor`].
#[derive(Debug)]
pub struct MockExecutor {
    ready: bool,
    results: VecDeque<ResultSet>,
    affected: VecDeque<u64>,
    failures: Vec<(FailOn, i32, String)>,
    calls: Vec<Call>,
    datums: Vec<Value>,
    cursor: Option<OpenCursor>,
    cursors_opened: usize,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            ready: true,
            results: VecDeque::new(),
            affected: VecDeque::new(),
            failures: Vec::new(),
            calls: Vec::new(),
            datums: Vec::new(),
            cursor: None,
            cursors_opened: 0,
        }
    }

    /// Queue the result of the next cursor.
    pub fn push_result(&mut self, result: ResultSet) -> &mut Self {
        self.results.push_back(result);
        self
    }

    /// Queue the affected-row count of the next non-query execution.
    pub fn push_affected(&mut self, count: u64) -> &mut Self {
        self.affected.push_back(count);
        self
    }

    /// Make the next `op` call fail with an executor error.
    pub fn fail_next(&mut self, op: FailOn, code: i32, message: impl Into<String>) -> &mut Self {
        self.failures.push((op, code, message.into()));
        self
    }

    /// Value returned by subsequent `ready()` calls.
    pub fn set_ready(&mut self, ready: bool) -> &mut Self {
        self.ready = ready;
        self
    }

    /// All recorded calls.
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Number of recorded calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Number of `finish()` calls so far.
    pub fn finish_count(&self) -> usize {
        self.count_calls(|c| matches!(c, Call::Finish))
    }

    /// Forget recorded calls.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn check_failure(&mut self, op: FailOn) -> Result<()> {
        match self.failures.iter().position(|(o, _, _)| *o == op) {
            Some(idx) => {
                let (_, code, message) = self.failures.remove(idx);
                Err(Error::executor(code, message))
            }
            None => Ok(()),
        }
    }

    fn bound_values(&self, values: &[Datum], nulls: &[bool]) -> Vec<Value> {
        values
            .iter()
            .zip(nulls)
            .map(|(datum, is_null)| {
                if *is_null {
                    return Value::Null;
                }
                datum
                    .0
                    .checked_sub(1)
                    .and_then(|idx| self.datums.get(idx))
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect()
    }

    fn store(&mut self, value: Value) -> Datum {
        self.datums.push(value);
        Datum(self.datums.len())
    }
}

impl Executor for MockExecutor {
    type Statement = MockStatement;
    type Cursor = MockCursor;

    fn ready(&mut self) -> bool {
        self.calls.push(Call::Ready);
        self.ready
    }

    fn prepare(&mut self, sql: &str, param_oids: &[Oid]) -> Result<MockStatement> {
        self.calls.push(Call::Prepare {
            sql: sql.to_string(),
            param_oids: param_oids.to_vec(),
        });
        self.check_failure(FailOn::Prepare)?;
        Ok(MockStatement {
            sql: sql.to_string(),
        })
    }

    fn execute(&mut self, sql: &str, read_only: bool, count: i64) -> Result<u64> {
        self.calls.push(Call::Execute {
            sql: sql.to_string(),
            read_only,
            count,
        });
        self.check_failure(FailOn::Execute)?;
        Ok(self.affected.pop_front().unwrap_or(0))
    }

    fn execute_prepared(
        &mut self,
        statement: &MockStatement,
        values: &[Datum],
        nulls: &[bool],
        _read_only: bool,
        _count: i64,
    ) -> Result<u64> {
        let values = self.bound_values(values, nulls);
        self.calls.push(Call::ExecutePrepared {
            sql: statement.sql.clone(),
            values,
        });
        self.check_failure(FailOn::Execute)?;
        Ok(self.affected.pop_front().unwrap_or(0))
    }

    fn cursor_open(
        &mut self,
        statement: &MockStatement,
        values: &[Datum],
        nulls: &[bool],
    ) -> Result<MockCursor> {
        let values = self.bound_values(values, nulls);
        self.calls.push(Call::CursorOpen {
            sql: statement.sql.clone(),
            values,
        });
        self.check_failure(FailOn::CursorOpen)?;

        self.cursors_opened += 1;
        let id = self.cursors_opened;
        self.cursor = Some(OpenCursor {
            id,
            result: self.results.pop_front().unwrap_or_default(),
            next_row: 0,
            current: None,
        });
        Ok(MockCursor { id })
    }

    fn cursor_fetch(&mut self, cursor: &mut MockCursor) -> Result<()> {
        self.calls.push(Call::CursorFetch);
        self.check_failure(FailOn::CursorFetch)?;

        let open = self
            .cursor
            .as_mut()
            .filter(|open| open.id == cursor.id)
            .ok_or_else(|| Error::executor(-5, "cursor is not open"))?;
        if open.next_row < open.result.rows.len() {
            open.current = Some(open.next_row);
            open.next_row += 1;
        } else {
            open.current = None;
        }
        Ok(())
    }

    fn table_dimensions(&mut self) -> (usize, usize) {
        self.calls.push(Call::TableDimensions);
        match &self.cursor {
            Some(open) => (
                usize::from(open.current.is_some()),
                open.result.columns.len(),
            ),
            None => (0, 0),
        }
    }

    fn column_properties(&mut self, column_count: usize) -> Result<Vec<Column>> {
        self.calls.push(Call::ColumnProperties);
        let columns = self
            .cursor
            .as_ref()
            .map(|open| open.result.columns.clone())
            .unwrap_or_default();
        Ok(columns.into_iter().take(column_count).collect())
    }

    fn current_row(&mut self, values: &mut [Datum], nulls: &mut [bool]) {
        self.calls.push(Call::CurrentRow);
        let row = match &self.cursor {
            Some(OpenCursor {
                result,
                current: Some(idx),
                ..
            }) => result.rows[*idx].clone(),
            _ => return,
        };

        for (i, value) in row.into_iter().enumerate().take(values.len()) {
            if value.is_null() {
                values[i] = Datum::NULL;
                nulls[i] = true;
            } else {
                values[i] = self.store(value);
                nulls[i] = false;
            }
        }
    }

    fn finish(&mut self) {
        self.calls.push(Call::Finish);
        self.cursor = None;
    }

    fn datum_to_value(&mut self, datum: Datum, oid: Oid) -> Result<Value> {
        datum
            .0
            .checked_sub(1)
            .and_then(|idx| self.datums.get(idx))
            .cloned()
            .ok_or_else(|| Error::decode(oid, format!("unknown datum {}", datum.0)))
    }

    fn value_to_datum(&mut self, value: &Value, _oid: Oid) -> Result<Datum> {
        Ok(self.store(value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::oid;

    #[test]
    fn test_scripted_cursor() {
        let mut mock = MockExecutor::new();
        mock.push_result(
            ResultSet::new([("n", oid::INT4)])
                .row([Value::Int4(1)])
                .row([Value::Null]),
        );

        let stmt = mock.prepare("select n from t", &[]).unwrap();
        let mut cursor = mock.cursor_open(&stmt, &[], &[]).unwrap();

        mock.cursor_fetch(&mut cursor).unwrap();
        assert_eq!(mock.table_dimensions(), (1, 1));
        let mut values = [Datum::NULL];
        let mut nulls = [false];
        mock.current_row(&mut values, &mut nulls);
        assert!(!nulls[0]);
        assert_eq!(mock.datum_to_value(values[0], oid::INT4).unwrap(), Value::Int4(1));

        mock.cursor_fetch(&mut cursor).unwrap();
        mock.current_row(&mut values, &mut nulls);
        assert!(nulls[0]);

        mock.cursor_fetch(&mut cursor).unwrap();
        assert_eq!(mock.table_dimensions(), (0, 1));
    }

    #[test]
    fn test_scripted_failure_is_consumed() {
        let mut mock = MockExecutor::new();
        mock.fail_next(FailOn::Prepare, -6, "syntax error");

        let err = mock.prepare("selec 1", &[]).unwrap_err();
        assert!(err.is_executor());
        assert!(mock.prepare("select 1", &[]).is_ok());
    }

    #[test]
    fn test_affected_counts() {
        let mut mock = MockExecutor::new();
        mock.push_affected(3);

        assert_eq!(mock.execute("delete from t", false, 0).unwrap(), 3);
        assert_eq!(mock.execute("delete from t", false, 0).unwrap(), 0);
        assert_eq!(
            mock.calls()[0],
            Call::Execute {
                sql: "delete from t".to_string(),
                read_only: false,
                count: 0
            }
        );
    }
}
