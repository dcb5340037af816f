//! Value to SQL literal encoding
//!
//! | value                    | literal                          |
//! |--------------------------|----------------------------------|
//! | absent / invalid         | `NULL`                           |
//! | signed/unsigned integer  | `42`                             |
//! | boolean                  | `'0'` / `'1'`                    |
//! | IPv4 address             | `167772161` or `'10.0.0.1'`      |
//! | string                   | `'escaped text'`                 |
//! | raw bytes, unknown types | per [`UnsupportedValuePolicy`]   |
//!
//! Every literal is followed by a `,`; the statement replaces the last one.

use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::warn;

use crate::config::{IpEncoding, UnsupportedValuePolicy};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::schema::Field;
use crate::security::escaped_literal_bound;
use crate::stats::AtomicSinkStats;
use crate::statement::StatementBuffer;
use crate::types::{KeyResult, Value};

/// Encodes typed values into an INSERT value list
#[derive(Debug, Clone)]
pub struct ValueEncoder {
    ip_encoding: IpEncoding,
    unsupported: UnsupportedValuePolicy,
    stats: Arc<AtomicSinkStats>,
}

impl ValueEncoder {
    /// Create an encoder reporting degradations to `stats`
    pub fn new(
        ip_encoding: IpEncoding,
        unsupported: UnsupportedValuePolicy,
        stats: Arc<AtomicSinkStats>,
    ) -> Self {
        Self {
            ip_encoding,
            unsupported,
            stats,
        }
    }

    /// IPv4 encoding in use
    pub fn ip_encoding(&self) -> IpEncoding {
        self.ip_encoding
    }

    /// Unsupported value policy in use
    pub fn unsupported_policy(&self) -> UnsupportedValuePolicy {
        self.unsupported
    }

    /// Append the literal for `result` followed by a comma.
    ///
    /// `reserve_after` bytes of `buf` are kept free for the fields that
    /// follow; string values that would eat into them are written as `''`.
    pub fn encode(
        &self,
        field: &Field,
        result: Option<&KeyResult>,
        conn: &dyn Connection,
        buf: &mut StatementBuffer,
        reserve_after: usize,
    ) -> Result<()> {
        let Some(value) = result.and_then(|r| r.value.as_ref()) else {
            return buf.push_str("NULL,");
        };

        match value {
            Value::Int8(n) => buf.push_str(&format!("{},", n)),
            Value::Int16(n) => buf.push_str(&format!("{},", n)),
            Value::Int32(n) => buf.push_str(&format!("{},", n)),
            Value::Int64(n) => buf.push_str(&format!("{},", n)),
            Value::UInt8(n) => buf.push_str(&format!("{},", n)),
            Value::UInt16(n) => buf.push_str(&format!("{},", n)),
            Value::UInt32(n) => buf.push_str(&format!("{},", n)),
            Value::UInt64(n) => buf.push_str(&format!("{},", n)),
            Value::Bool(b) => buf.push_str(if *b { "'1'," } else { "'0'," }),
            Value::IpAddr(addr) => {
                if self.ip_encoding == IpEncoding::String && field.is_string {
                    let dotted = Ipv4Addr::from(*addr).to_string();
                    self.quoted(field, &dotted, conn, buf, reserve_after)
                } else {
                    buf.push_str(&format!("{},", addr))
                }
            }
            Value::String(s) => self.quoted(field, s, conn, buf, reserve_after),
            Value::Raw(_) | Value::Unknown { .. } => self.unsupported(field, value, buf),
        }
    }

    fn quoted(
        &self,
        field: &Field,
        raw: &str,
        conn: &dyn Connection,
        buf: &mut StatementBuffer,
        reserve_after: usize,
    ) -> Result<()> {
        let needed = escaped_literal_bound(raw.len());
        let available = buf.remaining().saturating_sub(reserve_after);
        if needed > available {
            self.stats.record_overflow();
            warn!(
                key = %field.name,
                len = raw.len(),
                available,
                "string value too long for statement, writing empty string"
            );
            return buf.push_str("'',");
        }

        let escaped = conn.escape(raw);
        buf.push_str(&format!("'{}',", escaped))
    }

    fn unsupported(&self, field: &Field, value: &Value, buf: &mut StatementBuffer) -> Result<()> {
        self.stats.record_unsupported();
        let kind = value.type_name();
        match self.unsupported {
            UnsupportedValuePolicy::Omit => {
                warn!(key = %field.name, kind = %kind, "unsupported value type, omitting column value");
                Ok(())
            }
            UnsupportedValuePolicy::Null => {
                warn!(key = %field.name, kind = %kind, "unsupported value type, writing NULL");
                buf.push_str("NULL,")
            }
            UnsupportedValuePolicy::Reject => {
                warn!(key = %field.name, kind = %kind, "unsupported value type, rejecting record");
                Err(Error::unsupported_value(&field.name, kind))
            }
        }
    }
}
