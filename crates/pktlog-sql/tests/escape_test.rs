//! Escaping round-trip properties for pktlog-sql

use pktlog_sql::security::{escape_mysql_string, escape_mysql_string_quotes_only};
use proptest::prelude::*;

/// Read a single-quoted MySQL literal back, failing if it ends early
fn parse_literal(literal: &str) -> Result<String, String> {
    let inner = literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .ok_or_else(|| format!("not quoted: {}", literal))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('0') => out.push('\0'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('Z') => out.push('\x1a'),
                Some(other) => out.push(other),
                None => return Err("dangling backslash escapes the closing quote".into()),
            },
            '\'' => return Err("unescaped quote terminates the literal early".into()),
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Read a literal back under `NO_BACKSLASH_ESCAPES`, where only `''` escapes
fn parse_literal_quotes_only(literal: &str) -> Result<String, String> {
    let inner = literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .ok_or_else(|| format!("not quoted: {}", literal))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => match chars.next() {
                Some('\'') => out.push('\''),
                _ => return Err("lone quote terminates the literal early".into()),
            },
            other => out.push(other),
        }
    }
    Ok(out)
}

#[test]
fn test_known_literals() {
    assert_eq!(
        format!("'{}'", escape_mysql_string("O'Brien")),
        "'O\\'Brien'"
    );
    assert_eq!(parse_literal("'O\\'Brien'").unwrap(), "O'Brien");
    assert!(parse_literal("'O'Brien'").is_err());
    assert!(parse_literal("'trailing\\'").is_err());
}

proptest! {
    #[test]
    fn prop_escape_round_trips(s in any::<String>()) {
        let literal = format!("'{}'", escape_mysql_string(&s));
        prop_assert_eq!(parse_literal(&literal), Ok(s));
    }

    #[test]
    fn prop_quote_doubling_round_trips(s in "[\\\\'\"\\x00\\n a-z]{0,64}") {
        let literal = format!("'{}'", escape_mysql_string_quotes_only(&s));
        prop_assert_eq!(parse_literal_quotes_only(&literal), Ok(s));
    }

    #[test]
    fn prop_escape_round_trips_specials(s in "[\\\\'\"\\x00\\n\\r\\x1a a-z]{0,64}") {
        let escaped = escape_mysql_string(&s);
        prop_assert!(escaped.len() <= 2 * s.len());
        prop_assert!(!escaped.contains('\n'));
        prop_assert!(!escaped.contains('\0'));
        let literal = format!("'{}'", escaped);
        prop_assert_eq!(parse_literal(&literal), Ok(s));
    }
}
