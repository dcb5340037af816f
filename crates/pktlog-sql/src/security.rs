//! SQL injection prevention for pktlog-sql.
//!
//! Provides:
//! - Identifier validation for the configured table name
//! - MySQL string literal escaping for values and metadata queries, in
//!   backslash or quote-doubling form depending on the server's SQL mode
//!
//! Every statement this crate sends is literal SQL text, so all string data
//! passes through [`escape_for_sql_mode`] before it is quoted.

use crate::error::Error;

/// Validate a SQL identifier (table name).
///
/// Enforces strict character rules:
/// - Must not be empty
/// - Maximum 64 characters (MySQL identifier limit)
/// - Must start with ASCII letter or underscore
/// - May only contain ASCII alphanumeric characters and underscores
///
/// # Examples
///
/// ```
/// use pktlog_sql::security::validate_sql_identifier;
///
/// assert!(validate_sql_identifier("ulog").is_ok());
/// assert!(validate_sql_identifier("ulog_2024").is_ok());
/// assert!(validate_sql_identifier("_staging").is_ok());
///
/// assert!(validate_sql_identifier("x; DROP TABLE ulog--").is_err());
/// assert!(validate_sql_identifier("").is_err());
/// assert!(validate_sql_identifier("1ulog").is_err());
/// ```
pub fn validate_sql_identifier(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(Error::config("SQL identifier cannot be empty"));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::config(format!(
            "SQL identifier too long: {} chars (max {})",
            name.len(),
            MAX_IDENTIFIER_LEN
        )));
    }

    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => {
            return Err(Error::config(format!(
                "Invalid SQL identifier '{}': must start with a letter or underscore",
                name
            )));
        }
    }

    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(Error::config(format!(
                "Invalid SQL identifier '{}': contains invalid character '{}'",
                name, c
            )));
        }
    }

    Ok(())
}

/// Maximum identifier length accepted by MySQL
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Escape a string for interpolation into a single-quoted MySQL literal.
///
/// Applies the same substitutions as the client library's
/// `mysql_real_escape_string` for single-byte-safe charsets:
/// NUL, newline, carriage return, backslash, both quote characters and
/// Control-Z are prefixed with a backslash (NUL, LF, CR and ^Z become
/// `\0`, `\n`, `\r`, `\Z`).
///
/// The output is at most twice the input length.
///
/// # Examples
///
/// ```
/// use pktlog_sql::security::escape_mysql_string;
///
/// assert_eq!(escape_mysql_string("eth0"), "eth0");
/// assert_eq!(escape_mysql_string("O'Brien"), "O\\'Brien");
/// assert_eq!(escape_mysql_string("a\nb"), "a\\nb");
/// ```
pub fn escape_mysql_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    escape_mysql_string_into(value, &mut out);
    out
}

/// Escape `value` like [`escape_mysql_string`], appending to `out`.
pub fn escape_mysql_string_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            other => out.push(other),
        }
    }
}

/// Escape a string for a single-quoted literal on a server running with
/// `NO_BACKSLASH_ESCAPES`.
///
/// Backslashes are ordinary characters in that SQL mode, so the only
/// character to neutralize is the quote itself, which is doubled.
///
/// # Examples
///
/// ```
/// use pktlog_sql::security::escape_mysql_string_quotes_only;
///
/// assert_eq!(escape_mysql_string_quotes_only("eth0"), "eth0");
/// assert_eq!(escape_mysql_string_quotes_only("O'Brien"), "O''Brien");
/// assert_eq!(escape_mysql_string_quotes_only("x\\' OR 1=1"), "x\\'' OR 1=1");
/// ```
pub fn escape_mysql_string_quotes_only(value: &str) -> String {
    // Fast path: no escaping needed (common case)
    if !value.contains('\'') {
        return value.to_string();
    }
    value.replace('\'', "''")
}

/// Escape `value` for the server's current SQL mode
pub fn escape_for_sql_mode(value: &str, no_backslash_escapes: bool) -> String {
    if no_backslash_escapes {
        escape_mysql_string_quotes_only(value)
    } else {
        escape_mysql_string(value)
    }
}

/// Worst-case length of a quoted, escaped literal for `raw_len` input bytes.
///
/// Every byte may double; two quotes, the separator and one spare byte are
/// added on top.
#[inline]
pub const fn escaped_literal_bound(raw_len: usize) -> usize {
    raw_len.saturating_mul(2).saturating_add(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_sql_identifier("ulog").is_ok());
        assert!(validate_sql_identifier("ULOG_PKTS").is_ok());
        assert!(validate_sql_identifier("a").is_ok());
        assert!(validate_sql_identifier(&"t".repeat(64)).is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_sql_identifier("").is_err());
        assert!(validate_sql_identifier(&"t".repeat(65)).is_err());
        assert!(validate_sql_identifier("9lives").is_err());
        assert!(validate_sql_identifier("ulog pkts").is_err());
        assert!(validate_sql_identifier("ulog`; DROP").is_err());
        assert!(validate_sql_identifier("db.ulog").is_err());
    }

    #[test]
    fn test_escape_all_specials() {
        assert_eq!(
            escape_mysql_string("\0\n\r\\'\"\x1a"),
            "\\0\\n\\r\\\\\\'\\\"\\Z"
        );
    }

    #[test]
    fn test_escape_passthrough() {
        assert_eq!(escape_mysql_string(""), "");
        assert_eq!(escape_mysql_string("IN=eth0 OUT="), "IN=eth0 OUT=");
        assert_eq!(escape_mysql_string("grüße"), "grüße");
    }

    #[test]
    fn test_quotes_only_doubles_quotes() {
        assert_eq!(escape_mysql_string_quotes_only("it's"), "it''s");
        assert_eq!(escape_mysql_string_quotes_only("''"), "''''");
        // backslashes and control characters are literal in this mode
        assert_eq!(escape_mysql_string_quotes_only("a\\b\n"), "a\\b\n");
    }

    #[test]
    fn test_backslash_cannot_free_quote_without_backslash_escapes() {
        let hostile = "x\\' OR 1=1 -- ";
        let escaped = escape_for_sql_mode(hostile, true);
        assert_eq!(escaped, "x\\'' OR 1=1 -- ");
        // every quote in the literal body is part of a doubled pair
        assert!(escaped.replace("''", "").find('\'').is_none());
    }

    #[test]
    fn test_escape_for_sql_mode_default() {
        assert_eq!(escape_for_sql_mode("O'Brien", false), "O\\'Brien");
        assert_eq!(escape_for_sql_mode("O'Brien", true), "O''Brien");
    }

    #[test]
    fn test_escape_within_bound() {
        let nasty = "'\\'\\\0\0";
        let escaped = escape_mysql_string(nasty);
        assert!(escaped.len() + 3 <= escaped_literal_bound(nasty.len()));
        let doubled = escape_mysql_string_quotes_only(nasty);
        assert!(doubled.len() + 3 <= escaped_literal_bound(nasty.len()));
    }
}
