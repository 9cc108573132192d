//! Parameter binding: placeholder rewrite, OID resolution and datum
//! conversion.
//!
//! Binding runs in two phases. [`plan`] is pure: it checks the parameter
//! style, rewrites named placeholders to `$1..$n` and resolves every
//! parameter's OID. [`bind_values`] then converts values into executor datums
//! using the resolved OIDs.

use tracing::trace;

use crate::error::Result;
use crate::executor::{Datum, Executor};
use crate::parameter::{ParameterStyle, Parameters};
use crate::types::{resolve, DbType, Oid};

/// Rewritten text and resolved parameter types of a command.
#[derive(Debug, Clone, PartialEq)]
pub struct BindPlan {
    /// Command text with named placeholders replaced by `$1..$n`.
    pub sql: String,
    /// Type of each parameter, explicit or inferred.
    pub types: Vec<DbType>,
    /// Native OID of each parameter.
    pub oids: Vec<Oid>,
}

/// A fully bound command, ready for prepare and execution.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub oids: Vec<Oid>,
    pub datums: Vec<Datum>,
    pub nulls: Vec<bool>,
}

/// Check parameter style, rewrite placeholders and resolve OIDs.
pub fn plan(sql: &str, parameters: &Parameters) -> Result<BindPlan> {
    let sql = match parameters.style()? {
        Some(ParameterStyle::Named) => {
            let names: Vec<&str> = parameters.iter().filter_map(|p| p.name()).collect();
            rewrite_placeholders(sql, &names)
        }
        _ => sql.to_string(),
    };

    let types: Vec<DbType> = parameters.iter().map(|p| p.db_type()).collect();
    let oids = types.iter().map(|ty| resolve(*ty)).collect::<Result<Vec<_>>>()?;

    trace!(sql = %sql, parameters = oids.len(), "planned parameter binding");
    Ok(BindPlan { sql, types, oids })
}

/// Convert parameter values into datums and null flags.
///
/// NULL values produce [`Datum::NULL`] with the null flag set; the executor
/// is not asked to convert them.
pub fn bind_values<E: Executor>(
    parameters: &Parameters,
    oids: &[Oid],
    executor: &mut E,
) -> Result<(Vec<Datum>, Vec<bool>)> {
    let mut datums = Vec::with_capacity(oids.len());
    let mut nulls = Vec::with_capacity(oids.len());

    for (parameter, oid) in parameters.iter().zip(oids) {
        let value = parameter.value();
        if value.is_null() {
            datums.push(Datum::NULL);
            nulls.push(true);
        } else {
            datums.push(executor.value_to_datum(value, *oid)?);
            nulls.push(false);
        }
    }

    Ok((datums, nulls))
}

/// Plan and convert in one step.
pub fn bind<E: Executor>(
    sql: &str,
    parameters: &Parameters,
    executor: &mut E,
) -> Result<BoundStatement> {
    let BindPlan { sql, oids, .. } = plan(sql, parameters)?;
    let (datums, nulls) = bind_values(parameters, &oids, executor)?;
    Ok(BoundStatement {
        sql,
        oids,
        datums,
        nulls,
    })
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

/// Replace `@name` placeholders with `$k`, where `k` is the 1-based
/// position of `name` in `names`.
///
/// Names may carry the `@` and match ASCII case-insensitively against the
/// whole identifier after it. String literals, quoted identifiers,
/// dollar-quoted bodies and comments are copied unchanged, as are
/// placeholders with no matching name. `:` is never a prefix, so casts and
/// array slices such as `arr[:n]` keep their meaning.
pub fn rewrite_placeholders<S: AsRef<str>>(sql: &str, names: &[S]) -> String {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut out = String::with_capacity(len);
    let mut copied = 0;
    let mut i = 0;

    let position_of = |ident: &str| {
        names.iter().position(|name| {
            let name = name.as_ref();
            let name = name.strip_prefix('@').unwrap_or(name);
            name.eq_ignore_ascii_case(ident)
        })
    };

    while i < len {
        let next = bytes.get(i + 1).copied();
        match bytes[i] {
            b'\'' => {
                let backslash_escapes = i > 0
                    && matches!(bytes[i - 1], b'E' | b'e')
                    && (i < 2 || !is_ident_byte(bytes[i - 2]));
                i = skip_quoted(bytes, i, b'\'', backslash_escapes);
            }
            b'"' => i = skip_quoted(bytes, i, b'"', false),
            b'-' if next == Some(b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(len, |p| i + p + 1);
            }
            b'/' if next == Some(b'*') => i = skip_block_comment(bytes, i),
            b'$' => i = skip_dollar(bytes, i),
            b'@' => {
                let start = i + 1;
                let end = start
                    + bytes[start..]
                        .iter()
                        .take_while(|&&b| is_ident_byte(b))
                        .count();
                let starts_ident = bytes.get(start).is_some_and(|&b| is_ident_start(b));
                let after_ident = i > 0 && is_ident_byte(bytes[i - 1]);

                if starts_ident && !after_ident {
                    if let Some(k) = position_of(&sql[start..end]) {
                        out.push_str(&sql[copied..i]);
                        out.push('$');
                        out.push_str(&(k + 1).to_string());
                        copied = end;
                    }
                }
                i = end.max(i + 1);
            }
            b if is_ident_start(b) => {
                i += 1;
                while i < len && (is_ident_byte(bytes[i]) || bytes[i] == b'$') {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    out.push_str(&sql[copied..]);
    out
}

/// Index just past a quoted section opened at `start`. Doubled quotes are
/// escapes; unterminated sections run to the end.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if backslash_escapes => i += 2,
            b if b == quote => {
                if bytes.get(i + 1) == Some(&quote) {
                    i += 2;
                } else {
                    return i + 1;
                }
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Index just past a (possibly nested) block comment opened at `start`.
fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1).copied()) {
            (b'/', Some(b'*')) => {
                depth += 1;
                i += 2;
            }
            (b'*', Some(b'/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Index just past the `$` construct at `start`: a positional parameter, a
/// dollar-quoted body, or the bare `$` when the quote is unterminated.
fn skip_dollar(bytes: &[u8], start: usize) -> usize {
    let rest = &bytes[start + 1..];

    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits > 0 {
        return start + 1 + digits;
    }

    let tag_len = match rest.first() {
        Some(&b) if is_ident_start(b) => rest.iter().take_while(|&&b| is_ident_byte(b)).count(),
        _ => 0,
    };
    if rest.get(tag_len) != Some(&b'$') {
        return start + 1;
    }

    let delimiter = &bytes[start..start + tag_len + 2];
    let body = start + delimiter.len();
    bytes[body..]
        .windows(delimiter.len())
        .position(|w| w == delimiter)
        .map_or(start + 1, |p| body + p + delimiter.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::MockExecutor;
    use crate::types::{oid, BaseType, Value};

    fn named(pairs: &[(&str, Value)]) -> Parameters {
        let mut params = Parameters::new();
        for (name, value) in pairs {
            params.add_with_value(name, value.clone());
        }
        params
    }

    #[test]
    fn test_rewrite_in_parameter_order() {
        let sql = rewrite_placeholders("select @b + @a, @a", &["@a", "@b"]);
        assert_eq!(sql, "select $2 + $1, $1");
    }

    #[test]
    fn test_rewrite_whole_identifiers_only() {
        let sql = rewrite_placeholders("select @id, @id2, @ID", &["id", "id2"]);
        assert_eq!(sql, "select $1, $2, $1");

        // `@id` alone must not eat the prefix of `@id2`.
        let sql = rewrite_placeholders("select @id2, @id", &["id"]);
        assert_eq!(sql, "select @id2, $1");
    }

    #[test]
    fn test_colon_is_not_a_placeholder_prefix() {
        let sql = rewrite_placeholders("select @a::int, x::text from t where y = :b", &["a", "b"]);
        assert_eq!(sql, "select $1::int, x::text from t where y = :b");
    }

    #[test]
    fn test_array_slices_are_untouched() {
        let names = ["é", "a"];
        assert_eq!(
            rewrite_placeholders("select arr[:a], arr[1:a], arr[ :a], arr[a:] from t", &names),
            "select arr[:a], arr[1:a], arr[ :a], arr[a:] from t"
        );
        assert_eq!(
            rewrite_placeholders("select arr[@a:2], @é from t where x = :é", &names),
            "select arr[$2:2], $1 from t where x = :é"
        );
    }

    #[test]
    fn test_rewrite_skips_literals_and_comments() {
        let names = ["a"];
        assert_eq!(
            rewrite_placeholders("select '@a', \"@a\", @a", &names),
            "select '@a', \"@a\", $1"
        );
        assert_eq!(
            rewrite_placeholders("select 'it''s @a', @a", &names),
            "select 'it''s @a', $1"
        );
        assert_eq!(
            rewrite_placeholders("select E'\\'@a', @a", &names),
            "select E'\\'@a', $1"
        );
        assert_eq!(
            rewrite_placeholders("select @a -- @a\n, /* @a /* @a */ @a */ @a", &names),
            "select $1 -- @a\n, /* @a /* @a */ @a */ $1"
        );
        assert_eq!(
            rewrite_placeholders("select $q$ @a $q$, $$@a$$, @a", &names),
            "select $q$ @a $q$, $$@a$$, $1"
        );
    }

    #[test]
    fn test_unterminated_dollar_quote_is_text() {
        let sql = rewrite_placeholders("select $$ where x=@a and y=@b", &["a", "b"]);
        assert_eq!(sql, "select $$ where x=$1 and y=$2");
    }

    #[test]
    fn test_unmatched_placeholders_are_left() {
        let sql = rewrite_placeholders("select @a, @missing, a@b, $1", &["a", "b"]);
        assert_eq!(sql, "select $1, @missing, a@b, $1");
    }

    #[test]
    fn test_plan_rewrites_and_resolves() {
        let params = named(&[("@a", Value::Int4(1)), ("@b", Value::Int4(2))]);
        let plan = plan("select @a, @b", &params).unwrap();

        assert_eq!(plan.sql, "select $1, $2");
        assert_eq!(plan.types, vec![DbType::Base(BaseType::Integer); 2]);
        assert_eq!(plan.oids, vec![oid::INT4, oid::INT4]);
    }

    #[test]
    fn test_plan_is_idempotent() {
        let params = named(&[("@a", Value::Int4(1)), ("@b", Value::Int4(2))]);
        let first = plan("select @a, @b", &params).unwrap();
        let second = plan(&first.sql, &params).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_plan_positional_keeps_text() {
        let mut params = Parameters::new();
        params.push("x");
        let plan = plan("select $1", &params).unwrap();
        assert_eq!(plan.sql, "select $1");
        assert_eq!(plan.oids, vec![oid::TEXT]);
    }

    #[test]
    fn test_plan_rejects_mixed_style() {
        let mut params = Parameters::new();
        params.push(1);
        params.add_with_value("@a", 2);
        assert!(matches!(
            plan("select $1, @a", &params),
            Err(crate::Error::MixedParameterStyle)
        ));
    }

    #[test]
    fn test_plan_rejects_unsupported_type() {
        let mut params = Parameters::new();
        params.add_typed("@r", DbType::Range(BaseType::Text), "x");
        assert!(matches!(
            plan("select @r", &params),
            Err(crate::Error::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_bind_nulls_skip_conversion() {
        let mut mock = MockExecutor::new();
        let params = named(&[("@a", Value::Int4(1)), ("@b", Value::Null)]);

        let bound = bind("select @a, @b", &params, &mut mock).unwrap();
        assert_eq!(bound.sql, "select $1, $2");
        assert_eq!(bound.oids, vec![oid::INT4, oid::UNKNOWN]);
        assert_eq!(bound.nulls, vec![false, true]);
        assert_eq!(bound.datums[1], Datum::NULL);
        assert_eq!(
            mock.datum_to_value(bound.datums[0], oid::INT4).unwrap(),
            Value::Int4(1)
        );
    }
}
