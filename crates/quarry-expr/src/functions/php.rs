//! Codec for PHP-serialized associative arrays.
//!
//! Supports the subset of the PHP serialization format that appears in
//! database columns written by PHP applications: arrays (`a:N:{...}`) with
//! string or integer keys and boolean, integer, float, string, null, or
//! nested-array values. String lengths are byte counts.

use std::collections::BTreeSet;

use nom::branch::alt;
use nom::bytes::complete::{tag, take, take_while1};
use nom::combinator::{map, opt, value};
use nom::multi::count;
use nom::sequence::{delimited, pair, terminated};
use nom::IResult;

/// A decoded PHP value.
#[derive(Debug, Clone, PartialEq)]
pub enum PhpValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Null,
    /// Ordered key/value entries of an array.
    Array(Vec<(PhpValue, PhpValue)>),
}

fn usize_digits(i: &[u8]) -> IResult<&[u8], usize> {
    let (rest, digits) = take_while1(|c: u8| c.is_ascii_digit())(i)?;
    match std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
    {
        Some(n) => Ok((rest, n)),
        None => Err(nom::Err::Failure(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn i64_digits(i: &[u8]) -> IResult<&[u8], i64> {
    let (rest, (sign, digits)) =
        pair(opt(tag("-")), take_while1(|c: u8| c.is_ascii_digit()))(i)?;
    let text = std::str::from_utf8(digits).ok();
    match text.and_then(|s| s.parse::<i64>().ok()) {
        Some(n) => Ok((rest, if sign.is_some() { -n } else { n })),
        None => Err(nom::Err::Failure(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn float_digits(i: &[u8]) -> IResult<&[u8], f64> {
    let (rest, raw) = take_while1(|c: u8| {
        c.is_ascii_digit() || matches!(c, b'-' | b'+' | b'.' | b'e' | b'E')
    })(i)?;
    match std::str::from_utf8(raw).ok().and_then(|s| s.parse().ok()) {
        Some(f) => Ok((rest, f)),
        None => Err(nom::Err::Failure(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Float,
        ))),
    }
}

fn php_string(i: &[u8]) -> IResult<&[u8], String> {
    let (i, len) = delimited(tag("s:"), usize_digits, tag(":\""))(i)?;
    let (i, bytes) = take(len)(i)?;
    let (i, _) = tag("\";")(i)?;
    Ok((i, String::from_utf8_lossy(bytes).into_owned()))
}

fn php_bool(i: &[u8]) -> IResult<&[u8], PhpValue> {
    delimited(
        tag("b:"),
        alt((
            value(PhpValue::Bool(false), tag("0")),
            value(PhpValue::Bool(true), tag("1")),
        )),
        tag(";"),
    )(i)
}

fn php_int(i: &[u8]) -> IResult<&[u8], PhpValue> {
    map(delimited(tag("i:"), i64_digits, tag(";")), PhpValue::Int)(i)
}

fn php_float(i: &[u8]) -> IResult<&[u8], PhpValue> {
    map(delimited(tag("d:"), float_digits, tag(";")), PhpValue::Float)(i)
}

fn php_null(i: &[u8]) -> IResult<&[u8], PhpValue> {
    value(PhpValue::Null, tag("N;"))(i)
}

fn php_array(i: &[u8]) -> IResult<&[u8], PhpValue> {
    let (i, n) = delimited(tag("a:"), usize_digits, tag(":{"))(i)?;
    let (i, entries) = terminated(count(pair(php_value, php_value), n), tag("}"))(i)?;
    Ok((i, PhpValue::Array(entries)))
}

fn php_value(i: &[u8]) -> IResult<&[u8], PhpValue> {
    alt((
        map(php_string, PhpValue::Str),
        php_bool,
        php_int,
        php_float,
        php_null,
        php_array,
    ))(i)
}

/// Decode one PHP-serialized value. The whole input must be consumed.
pub fn php_deserialize(input: &str) -> Result<PhpValue, String> {
    match php_value(input.as_bytes()) {
        Ok((rest, parsed)) if rest.is_empty() => Ok(parsed),
        Ok((rest, _)) => Err(format!(
            "trailing data after serialized value: {:?}",
            String::from_utf8_lossy(rest)
        )),
        Err(e) => Err(format!("invalid serialized value: {e}")),
    }
}

/// Decode a serialized associative array and return its string keys,
/// deduplicated and sorted ascending.
pub fn php_deserialize_string_array(input: &str) -> Result<Vec<String>, String> {
    let entries = match php_deserialize(input)? {
        PhpValue::Array(entries) => entries,
        other => return Err(format!("expected a serialized array, got {other:?}")),
    };

    let keys: BTreeSet<String> = entries
        .into_iter()
        .filter_map(|(key, _)| match key {
            PhpValue::Str(s) => Some(s),
            _ => None,
        })
        .collect();

    Ok(keys.into_iter().collect())
}

/// Encode a list of strings as a serialized associative array where each
/// element is a key with a boolean-true value.
pub fn php_serialize_string_array(items: &[String]) -> String {
    let mut out = format!("a:{}:{{", items.len());
    for item in items {
        out.push_str(&format!("s:{}:\"{}\";b:1;", item.len(), item));
    }
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_single_key() {
        let keys = php_deserialize_string_array("a:1:{s:13:\"administrator\";b:1;}").unwrap();
        assert_eq!(keys, vec!["administrator".to_string()]);
    }

    #[test]
    fn test_deserialize_sorts_keys() {
        let keys =
            php_deserialize_string_array("a:2:{s:3:\"foo\";s:3:\"bar\";s:3:\"baz\";s:3:\"qux\";}")
                .unwrap();
        assert_eq!(keys, vec!["baz".to_string(), "foo".to_string()]);
    }

    #[test]
    fn test_deserialize_ignores_integer_keys() {
        let keys = php_deserialize_string_array("a:2:{i:0;s:1:\"a\";s:4:\"role\";b:1;}").unwrap();
        assert_eq!(keys, vec!["role".to_string()]);
    }

    #[test]
    fn test_deserialize_string_lengths_are_bytes() {
        // "grüße" is 7 bytes in UTF-8.
        let keys = php_deserialize_string_array("a:1:{s:7:\"gr\u{00fc}\u{00df}e\";b:1;}").unwrap();
        assert_eq!(keys, vec!["grüße".to_string()]);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(php_deserialize_string_array("not serialized").is_err());
        assert!(php_deserialize_string_array("a:2:{s:3:\"foo\";b:1;}").is_err());
        assert!(php_deserialize_string_array("s:3:\"foo\";").is_err());
    }

    #[test]
    fn test_serialize_single_element() {
        assert_eq!(
            php_serialize_string_array(&["administrator".to_string()]),
            "a:1:{s:13:\"administrator\";b:1;}"
        );
        assert_eq!(
            php_serialize_string_array(&["subscriber".to_string()]),
            "a:1:{s:10:\"subscriber\";b:1;}"
        );
    }

    #[test]
    fn test_round_trip_is_sorted_unique() {
        let input = vec![
            "editor".to_string(),
            "admin".to_string(),
            "editor".to_string(),
        ];
        let serialized = php_serialize_string_array(&input);
        let keys = php_deserialize_string_array(&serialized).unwrap();
        assert_eq!(keys, vec!["admin".to_string(), "editor".to_string()]);
    }

    #[test]
    fn test_deserialize_nested_array_value() {
        let parsed =
            php_deserialize("a:1:{s:5:\"perms\";a:1:{s:4:\"read\";b:1;}}").unwrap();
        match parsed {
            PhpValue::Array(entries) => {
                assert_eq!(entries.len(), 1);
                assert!(matches!(entries[0].1, PhpValue::Array(_)));
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_deserialize_scalar_values() {
        assert_eq!(php_deserialize("i:-42;").unwrap(), PhpValue::Int(-42));
        assert_eq!(php_deserialize("b:0;").unwrap(), PhpValue::Bool(false));
        assert_eq!(php_deserialize("N;").unwrap(), PhpValue::Null);
        assert_eq!(php_deserialize("d:1.5;").unwrap(), PhpValue::Float(1.5));
    }
}
