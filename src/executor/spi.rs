//! SPI binding.
//!
//! The `pldotnet_*` entry points are only linked with the `spi` feature. The
//! datum layout helpers and result-code mapping below are independent of the
//! link and always available.
//!
//! Datum layout assumes a 64-bit executor build: `int8`, `float8` and the
//! date/time types are passed by value. Other types cross the boundary through
//! the executor's text output/input functions and [`crate::types::text`].

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};

use crate::error::{Error, Result};
use crate::types::oid::{self, Oid};
use crate::types::Value;

use super::Datum;

/// Microseconds between the Unix epoch and the executor epoch (2000-01-01).
const EPOCH_OFFSET_MICROS: i64 = 946_684_800_000_000;
/// `num_days_from_ce` of 2000-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 730_120;

/// Name of an SPI result code, for error messages.
pub fn result_code_name(code: i32) -> &'static str {
    match code {
        -1 => "SPI_ERROR_CONNECT",
        -2 => "SPI_ERROR_COPY",
        -3 => "SPI_ERROR_OPUNKNOWN",
        -4 => "SPI_ERROR_UNCONNECTED",
        -5 => "SPI_ERROR_CURSOR",
        -6 => "SPI_ERROR_ARGUMENT",
        -7 => "SPI_ERROR_PARAM",
        -8 => "SPI_ERROR_TRANSACTION",
        -9 => "SPI_ERROR_NOATTRIBUTE",
        -10 => "SPI_ERROR_NOOUTFUNC",
        -11 => "SPI_ERROR_TYPUNKNOWN",
        -12 => "SPI_ERROR_REL_DUPLICATE",
        -13 => "SPI_ERROR_REL_NOT_FOUND",
        c if c >= 0 => "SPI_OK",
        _ => "SPI_ERROR",
    }
}

/// Map a negative SPI result code to an executor error.
pub fn check_result(code: i32, operation: &str) -> Result<i32> {
    if code < 0 {
        Err(Error::executor(
            code,
            format!("{} failed: {}", operation, result_code_name(code)),
        ))
    } else {
        Ok(code)
    }
}

/// Affected-row count from the result of an execute call: the count itself
/// when non-negative, an executor error otherwise.
pub fn affected_rows(code: i32, operation: &str) -> Result<u64> {
    check_result(code, operation).map(|count| count.unsigned_abs().into())
}

fn utc_from_micros(micros: i64) -> Option<DateTime<Utc>> {
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(micros.div_euclid(1_000_000), nanos)
}

fn out_of_range(oid: Oid) -> Error {
    Error::decode(oid, "value out of range")
}

/// Decode a by-value datum. `None` if `oid` is not passed by value.
pub fn decode_by_value(datum: Datum, oid: Oid) -> Option<Result<Value>> {
    let bits = datum.0 as u64;
    let value = match oid {
        oid::BOOL => Ok(Value::Bool(bits & 0xff != 0)),
        oid::INT2 => Ok(Value::Int2(bits as i16)),
        oid::INT4 => Ok(Value::Int4(bits as i32)),
        oid::INT8 => Ok(Value::Int8(bits as i64)),
        oid::OID | oid::XID | oid::CID => Ok(Value::Int8(i64::from(bits as u32))),
        oid::FLOAT4 => Ok(Value::Float4(f32::from_bits(bits as u32))),
        oid::FLOAT8 => Ok(Value::Float8(f64::from_bits(bits))),
        oid::DATE => (bits as i32)
            .checked_add(EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(Value::Date)
            .ok_or_else(|| out_of_range(oid)),
        oid::TIME => {
            let micros = bits as i64;
            u32::try_from(micros.div_euclid(1_000_000))
                .ok()
                .and_then(|secs| {
                    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
                    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
                })
                .map(Value::Time)
                .ok_or_else(|| out_of_range(oid))
        }
        oid::TIMESTAMP | oid::TIMESTAMPTZ => (bits as i64)
            .checked_add(EPOCH_OFFSET_MICROS)
            .and_then(utc_from_micros)
            .map(|ts| match oid {
                oid::TIMESTAMP => Value::Timestamp(ts.naive_utc()),
                _ => Value::TimestampTz(ts),
            })
            .ok_or_else(|| out_of_range(oid)),
        _ => return None,
    };
    Some(value)
}

/// Encode a value as a by-value datum of type `oid`. `None` if the pair has
/// no by-value representation.
pub fn encode_by_value(value: &Value, oid: Oid) -> Option<Result<Datum>> {
    let signed = |v: i64| Some(Ok(Datum(v as usize)));
    match (oid, value) {
        (oid::BOOL, Value::Bool(b)) => Some(Ok(Datum(usize::from(*b)))),
        (oid::INT2, Value::Int2(v)) => signed(i64::from(*v)),
        (oid::INT4, Value::Int2(v)) => signed(i64::from(*v)),
        (oid::INT4, Value::Int4(v)) => signed(i64::from(*v)),
        (oid::INT8, Value::Int2(v)) => signed(i64::from(*v)),
        (oid::INT8, Value::Int4(v)) => signed(i64::from(*v)),
        (oid::INT8, Value::Int8(v)) => signed(*v),
        (oid::OID | oid::XID | oid::CID, Value::Int8(v)) => Some(
            u32::try_from(*v)
                .map(|v| Datum(v as usize))
                .map_err(|_| out_of_range(oid)),
        ),
        (oid::FLOAT4, Value::Float4(v)) => Some(Ok(Datum(v.to_bits() as usize))),
        (oid::FLOAT8, Value::Float4(v)) => Some(Ok(Datum(f64::from(*v).to_bits() as usize))),
        (oid::FLOAT8, Value::Float8(v)) => Some(Ok(Datum(v.to_bits() as usize))),
        (oid::DATE, Value::Date(d)) => signed(i64::from(d.num_days_from_ce() - EPOCH_DAYS_FROM_CE)),
        (oid::TIME, Value::Time(t)) => signed(
            i64::from(t.num_seconds_from_midnight()) * 1_000_000
                + i64::from(t.nanosecond() / 1_000),
        ),
        (oid::TIMESTAMP, Value::Timestamp(ts)) => {
            signed(ts.and_utc().timestamp_micros() - EPOCH_OFFSET_MICROS)
        }
        (oid::TIMESTAMPTZ, Value::TimestampTz(ts)) => {
            signed(ts.timestamp_micros() - EPOCH_OFFSET_MICROS)
        }
        _ => None,
    }
}

#[cfg(feature = "spi")]
pub use native::{SpiCursor, SpiExecutor, SpiStatement};

#[cfg(feature = "spi")]
mod native {
    use std::ffi::{c_char, c_int, c_long, c_void, CStr, CString};
    use std::marker::PhantomData;
    use std::ptr::{self, NonNull};

    use tracing::trace;

    use super::{affected_rows, check_result, decode_by_value, encode_by_value};
    use crate::error::{Error, Result};
    use crate::executor::{Datum, Executor};
    use crate::types::{text, Column, Oid, Value};

    #[link(name = "pldotnet")]
    extern "C" {
        fn pldotnet_SPIReady() -> bool;
        fn pldotnet_SPIPrepare(
            command: *const c_char,
            nargs: c_int,
            arg_types: *const Oid,
            cmd_pointer: *mut *mut c_void,
        ) -> c_int;
        fn pldotnet_SPIExecute(command: *const c_char, read_only: bool, count: c_long) -> c_int;
        fn pldotnet_SPIExecutePlan(
            cmd_pointer: *mut c_void,
            values: *const usize,
            nulls: *const c_char,
            read_only: bool,
            count: c_long,
        ) -> c_int;
        fn pldotnet_SPICursorOpen(
            cmd_pointer: *mut c_void,
            values: *const usize,
            nulls: *const c_char,
            cursor_pointer: *mut *mut c_void,
        ) -> c_int;
        fn pldotnet_SPICursorFetch(cursor_pointer: *mut c_void);
        fn pldotnet_GetTableDimensions(nrows: *mut c_int, ncols: *mut c_int);
        fn pldotnet_GetColProps(column_types: *mut c_int, column_names: *mut *const c_char);
        fn pldotnet_GetTable(datums: *mut usize, is_null: *mut bool);
        fn pldotnet_SPIFinish();
        fn pldotnet_DatumToCString(datum: usize, type_oid: Oid) -> *const c_char;
        fn pldotnet_CStringToDatum(value: *const c_char, type_oid: Oid) -> usize;
    }

    /// Prepared plan. Valid until the executor context is finished.
    #[derive(Debug)]
    pub struct SpiStatement(NonNull<c_void>);

    /// Open portal. Valid until the executor context is finished.
    #[derive(Debug)]
    pub struct SpiCursor(NonNull<c_void>);

    /// [`Executor`] backed by the in-process SPI entry points.
    ///
    /// Raw pointers make this type `!Send` and `!Sync`: the executor is not
    /// reentrant and must only be driven from its own thread.
    #[derive(Debug, Default)]
    pub struct SpiExecutor {
        _not_send: PhantomData<*mut ()>,
    }

    impl SpiExecutor {
        pub fn new() -> Self {
            Self::default()
        }
    }

    /// SPI null flags: `'n'` for NULL, `' '` otherwise.
    fn null_flags(nulls: &[bool]) -> Vec<c_char> {
        nulls
            .iter()
            .map(|&n| if n { b'n' as c_char } else { b' ' as c_char })
            .collect()
    }

    fn datum_bits(values: &[Datum]) -> Vec<usize> {
        values.iter().map(|d| d.0).collect()
    }

    impl Executor for SpiExecutor {
        type Statement = SpiStatement;
        type Cursor = SpiCursor;

        fn ready(&mut self) -> bool {
            // SAFETY: no arguments; connects SPI if not yet connected.
            unsafe { pldotnet_SPIReady() }
        }

        fn prepare(&mut self, sql: &str, param_oids: &[Oid]) -> Result<SpiStatement> {
            let command = CString::new(sql)?;
            let nargs = c_int::try_from(param_oids.len())
                .map_err(|_| Error::executor(-7, "too many parameters"))?;
            let mut plan = ptr::null_mut();

            // SAFETY: `command` and `param_oids` outlive the call; `plan` is
            // written by the callee.
            let code = unsafe {
                pldotnet_SPIPrepare(command.as_ptr(), nargs, param_oids.as_ptr(), &mut plan)
            };
            check_result(code, "prepare")?;

            NonNull::new(plan)
                .map(SpiStatement)
                .ok_or_else(|| Error::executor(code, "prepare returned no plan"))
        }

        fn execute(&mut self, sql: &str, read_only: bool, count: i64) -> Result<u64> {
            let command = CString::new(sql)?;
            // SAFETY: `command` outlives the call.
            let code = unsafe { pldotnet_SPIExecute(command.as_ptr(), read_only, count as c_long) };
            affected_rows(code, "execute")
        }

        fn execute_prepared(
            &mut self,
            statement: &SpiStatement,
            values: &[Datum],
            nulls: &[bool],
            read_only: bool,
            count: i64,
        ) -> Result<u64> {
            let values = datum_bits(values);
            let nulls = null_flags(nulls);
            // SAFETY: the plan is live for the current context; the arrays
            // have one entry per prepared parameter.
            let code = unsafe {
                pldotnet_SPIExecutePlan(
                    statement.0.as_ptr(),
                    values.as_ptr(),
                    nulls.as_ptr(),
                    read_only,
                    count as c_long,
                )
            };
            affected_rows(code, "execute plan")
        }

        fn cursor_open(
            &mut self,
            statement: &SpiStatement,
            values: &[Datum],
            nulls: &[bool],
        ) -> Result<SpiCursor> {
            let values = datum_bits(values);
            let nulls = null_flags(nulls);
            let mut portal = ptr::null_mut();
            // SAFETY: as for `execute_prepared`; `portal` is written by the callee.
            let code = unsafe {
                pldotnet_SPICursorOpen(
                    statement.0.as_ptr(),
                    values.as_ptr(),
                    nulls.as_ptr(),
                    &mut portal,
                )
            };
            check_result(code, "cursor open")?;

            NonNull::new(portal)
                .map(SpiCursor)
                .ok_or_else(|| Error::executor(-5, "cursor open returned no portal"))
        }

        fn cursor_fetch(&mut self, cursor: &mut SpiCursor) -> Result<()> {
            // SAFETY: the portal is live for the current context.
            unsafe { pldotnet_SPICursorFetch(cursor.0.as_ptr()) };
            Ok(())
        }

        fn table_dimensions(&mut self) -> (usize, usize) {
            let (mut nrows, mut ncols) = (0, 0);
            // SAFETY: both out-parameters are valid for writes.
            unsafe { pldotnet_GetTableDimensions(&mut nrows, &mut ncols) };
            (
                usize::try_from(nrows).unwrap_or(0),
                usize::try_from(ncols).unwrap_or(0),
            )
        }

        fn column_properties(&mut self, column_count: usize) -> Result<Vec<Column>> {
            let mut types: Vec<c_int> = vec![0; column_count];
            let mut names: Vec<*const c_char> = vec![ptr::null(); column_count];
            // SAFETY: both arrays hold `column_count` entries, the column
            // count of the last fetch.
            unsafe { pldotnet_GetColProps(types.as_mut_ptr(), names.as_mut_ptr()) };

            Ok(types
                .into_iter()
                .zip(names)
                .map(|(oid, name)| {
                    let name = if name.is_null() {
                        String::new()
                    } else {
                        // SAFETY: non-null names are NUL-terminated strings
                        // owned by the executor; copied immediately.
                        unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
                    };
                    Column::new(name, oid as Oid)
                })
                .collect())
        }

        fn current_row(&mut self, values: &mut [Datum], nulls: &mut [bool]) {
            let mut raw = vec![0usize; values.len()];
            // SAFETY: both arrays hold one entry per column of the last fetch.
            unsafe { pldotnet_GetTable(raw.as_mut_ptr(), nulls.as_mut_ptr()) };
            for (slot, bits) in values.iter_mut().zip(raw) {
                *slot = Datum(bits);
            }
        }

        fn finish(&mut self) {
            // SAFETY: releases the current context; handles issued in it are
            // not used afterwards.
            unsafe { pldotnet_SPIFinish() };
        }

        fn datum_to_value(&mut self, datum: Datum, oid: Oid) -> Result<Value> {
            if let Some(value) = decode_by_value(datum, oid) {
                return value;
            }

            // SAFETY: `datum` is a live non-null datum of type `oid`.
            let out = unsafe { pldotnet_DatumToCString(datum.0, oid) };
            if out.is_null() {
                return Err(Error::decode(oid, "no output function"));
            }
            // SAFETY: NUL-terminated string allocated in the executor context.
            let out = unsafe { CStr::from_ptr(out) }.to_string_lossy();
            trace!(oid, text = %out, "decoding datum through text output");
            text::decode(oid, &out)
        }

        fn value_to_datum(&mut self, value: &Value, oid: Oid) -> Result<Datum> {
            if let Some(datum) = encode_by_value(value, oid) {
                return datum;
            }

            let input = CString::new(text::encode(value))?;
            // SAFETY: `input` outlives the call; the executor copies it into
            // its own memory.
            let bits = unsafe { pldotnet_CStringToDatum(input.as_ptr(), oid) };
            Ok(Datum(bits))
        }
    }
}
