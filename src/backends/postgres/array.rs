//! PostgreSQL array literal parser.
//!
//! Parses the text form of an array, e.g.
//!
//! ```text
//! {{meeting,lunch},{ training , "presentation"},"{}","\"",NULL}
//! ```
//!
//! Unquoted elements are trimmed, an unquoted `NULL` is a null, and quoted
//! elements keep their content with backslash escapes resolved.

use crate::error::{SquallError, SquallResult};
use crate::value::Value;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not},
    character::complete::{anychar, char, multispace0, none_of},
    combinator::{map, opt},
    multi::separated_list0,
    sequence::delimited,
    IResult,
};

/// Parse an array literal into a (possibly nested) [`Value::List`].
pub fn parse_array(input: &str) -> SquallResult<Value> {
    let input = input.trim();

    match parse_list(input) {
        Ok(("", list)) => Ok(list),
        Ok((remaining, _)) => Err(SquallError::TypeMismatch(format!(
            "unexpected trailing content in array literal: '{remaining}'"
        ))),
        Err(e) => Err(SquallError::TypeMismatch(format!(
            "invalid array literal '{input}': {e:?}"
        ))),
    }
}

fn parse_list(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('{')(input)?;
    let (input, items) = separated_list0(char(','), delimited(multispace0, parse_element, multispace0))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('}')(input)?;
    Ok((input, Value::List(items)))
}

fn parse_element(input: &str) -> IResult<&str, Value> {
    alt((parse_list, parse_quoted, parse_bare))(input)
}

/// `"..."` with `\` escapes.
fn parse_quoted(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('"')(input)?;
    let (input, text) = opt(escaped_transform(none_of("\\\""), '\\', anychar))(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, Value::Text(text.unwrap_or_default())))
}

fn parse_bare(input: &str) -> IResult<&str, Value> {
    map(is_not(",{}\""), |raw: &str| {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("NULL") {
            Value::Null
        } else {
            Value::Text(raw.to_string())
        }
    })(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_nested_quoted_and_null() {
        let parsed =
            parse_array(r#"{{meeting,lunch},{ training , "presentation"},"{}","\"",NULL}"#)
                .unwrap();
        assert_eq!(
            parsed,
            Value::List(vec![
                Value::List(vec![text("meeting"), text("lunch")]),
                Value::List(vec![text("training"), text("presentation")]),
                text("{}"),
                text("\""),
                Value::Null,
            ])
        );
    }

    #[test]
    fn test_empty_and_flat() {
        assert_eq!(parse_array("{}").unwrap(), Value::List(vec![]));
        assert_eq!(
            parse_array("{1, 2,3}").unwrap(),
            Value::List(vec![text("1"), text("2"), text("3")])
        );
        assert_eq!(parse_array(r#"{"", "a\\b"}"#).unwrap(), Value::List(vec![text(""), text("a\\b")]));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_array("{a,b").is_err());
        assert!(parse_array("{a} tail").is_err());
        assert!(parse_array("a,b").is_err());
    }
}
