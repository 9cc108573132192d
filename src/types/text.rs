//! Text-format codec.
//!
//! Values without a by-value native representation cross the boundary in the
//! executor's text I/O format. This module parses that text into [`Value`]s
//! and renders outbound values in a form the input functions accept.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt::Write;

use crate::error::{Error, Result};

use super::oid::{self, Oid};
use super::value::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIMESTAMPTZ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%#z";

/// Parse the text output of a value of type `oid`.
pub fn decode(oid: Oid, text: &str) -> Result<Value> {
    let bad = |e: &dyn std::fmt::Display| Error::decode(oid, format!("{}: {:?}", e, text));

    match oid {
        oid::BOOL => match text {
            "t" | "true" => Ok(Value::Bool(true)),
            "f" | "false" => Ok(Value::Bool(false)),
            _ => Err(bad(&"invalid boolean")),
        },
        oid::INT2 => text.parse().map(Value::Int2).map_err(|e| bad(&e)),
        oid::INT4 => text.parse().map(Value::Int4).map_err(|e| bad(&e)),
        oid::INT8 | oid::OID | oid::XID | oid::CID => {
            text.parse().map(Value::Int8).map_err(|e| bad(&e))
        }
        oid::FLOAT4 => text.parse().map(Value::Float4).map_err(|e| bad(&e)),
        oid::FLOAT8 => text.parse().map(Value::Float8).map_err(|e| bad(&e)),
        oid::NUMERIC => Ok(Value::Numeric(text.to_string())),
        oid::BYTEA => decode_hex(text).map(Value::Bytea).map_err(|e| bad(&e)),
        oid::DATE => NaiveDate::parse_from_str(text, DATE_FORMAT)
            .map(Value::Date)
            .map_err(|e| bad(&e)),
        oid::TIME => NaiveTime::parse_from_str(text, TIME_FORMAT)
            .map(Value::Time)
            .map_err(|e| bad(&e)),
        oid::TIMESTAMP => NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
            .map(Value::Timestamp)
            .map_err(|e| bad(&e)),
        oid::TIMESTAMPTZ => DateTime::parse_from_str(text, TIMESTAMPTZ_FORMAT)
            .map(|ts| Value::TimestampTz(ts.with_timezone(&Utc)))
            .map_err(|e| bad(&e)),
        _ => match oid::element_oid(oid) {
            Some(element) => decode_array(element, text).map_err(|e| match e {
                Error::Decode { message, .. } => Error::decode(oid, message),
                e => e,
            }),
            None => Ok(Value::Text(text.to_string())),
        },
    }
}

/// Render a value in text input format.
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut String) {
    // Writing into a String cannot fail.
    let _ = match value {
        Value::Null => write!(out, "NULL"),
        Value::Bool(b) => write!(out, "{}", if *b { "t" } else { "f" }),
        Value::Int2(v) => write!(out, "{}", v),
        Value::Int4(v) => write!(out, "{}", v),
        Value::Int8(v) => write!(out, "{}", v),
        Value::Float4(v) => write_float(out, f64::from(*v)),
        Value::Float8(v) => write_float(out, *v),
        Value::Numeric(s) | Value::Text(s) => write!(out, "{}", s),
        Value::Bytea(bytes) => {
            out.push_str("\\x");
            for b in bytes.iter() {
                let _ = write!(out, "{:02x}", b);
            }
            Ok(())
        }
        Value::Date(d) => write!(out, "{}", d.format(DATE_FORMAT)),
        Value::Time(t) => write!(out, "{}", t.format(TIME_FORMAT)),
        Value::Timestamp(ts) => write!(out, "{}", ts.format(TIMESTAMP_FORMAT)),
        Value::TimestampTz(ts) => write!(out, "{}+00", ts.format(TIMESTAMP_FORMAT)),
        Value::Array(items) => {
            out.push('{');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                match item {
                    Value::Null => out.push_str("NULL"),
                    item => write_array_element(out, &encode(item)),
                }
            }
            out.push('}');
            Ok(())
        }
    };
}

fn write_float(out: &mut String, v: f64) -> std::fmt::Result {
    if v.is_nan() {
        write!(out, "NaN")
    } else if v.is_infinite() {
        write!(out, "{}Infinity", if v < 0.0 { "-" } else { "" })
    } else {
        write!(out, "{}", v)
    }
}

fn write_array_element(out: &mut String, text: &str) {
    let needs_quotes = text.is_empty()
        || text.eq_ignore_ascii_case("NULL")
        || text
            .chars()
            .any(|c| matches!(c, '{' | '}' | ',' | '"' | '\\') || c.is_whitespace());

    if !needs_quotes {
        out.push_str(text);
        return;
    }

    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

fn decode_hex(text: &str) -> std::result::Result<Bytes, String> {
    let hex = text
        .strip_prefix("\\x")
        .ok_or_else(|| "only hex bytea output is supported".to_string())?;
    if hex.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }

    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            let digits = std::str::from_utf8(pair).map_err(|e| e.to_string())?;
            u8::from_str_radix(digits, 16).map_err(|e| e.to_string())
        })
        .collect::<std::result::Result<Vec<u8>, String>>()
        .map(Bytes::from)
}

/// Parse a one-dimensional array literal such as `{1,NULL,"a b"}`.
fn decode_array(element: Oid, text: &str) -> Result<Value> {
    let body = text
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| Error::decode(element, format!("malformed array literal: {:?}", text)))?;

    let mut items = Vec::new();
    if body.is_empty() {
        return Ok(Value::Array(items));
    }

    let mut chars = body.chars().peekable();
    loop {
        let mut item = String::new();
        let mut quoted = false;

        if chars.peek() == Some(&'"') {
            quoted = true;
            chars.next();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(c) => item.push(c),
                        None => break,
                    },
                    Some('"') => break,
                    Some(c) => item.push(c),
                    None => {
                        return Err(Error::decode(element, "unterminated quoted array element"))
                    }
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                if c == '{' {
                    return Err(Error::decode(
                        element,
                        "multidimensional arrays are not supported",
                    ));
                }
                item.push(c);
                chars.next();
            }
        }

        if !quoted && item.eq_ignore_ascii_case("NULL") {
            items.push(Value::Null);
        } else {
            items.push(decode(element, &item)?);
        }

        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(c) => {
                return Err(Error::decode(
                    element,
                    format!("unexpected {:?} after array element", c),
                ))
            }
        }
    }

    Ok(Value::Array(items))
}
