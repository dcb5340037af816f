//! Value types for pktlog-sql
//!
//! Typed key values as delivered by the host pipeline:
//! - Signed and unsigned integers of every width
//! - Booleans and IPv4 addresses
//! - Text strings
//! - Raw byte blobs and unrecognized type tags (not encodable as SQL)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::Error;

/// Typed value of one key in a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// 8-bit signed integer
    Int8(i8),
    /// 16-bit signed integer
    Int16(i16),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 8-bit unsigned integer
    UInt8(u8),
    /// 16-bit unsigned integer
    UInt16(u16),
    /// 32-bit unsigned integer
    UInt32(u32),
    /// 64-bit unsigned integer
    UInt64(u64),
    /// Boolean flag
    Bool(bool),
    /// IPv4 address in host byte order
    IpAddr(u32),
    /// Text string
    String(String),
    /// Raw bytes (not representable as an SQL literal)
    Raw(Vec<u8>),
    /// Value with a type tag this crate does not know
    Unknown { type_tag: u16 },
}

impl Value {
    /// Kind of this value, `None` for unrecognized type tags
    pub fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            Self::Int8(_) => ValueKind::Int8,
            Self::Int16(_) => ValueKind::Int16,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::UInt8(_) => ValueKind::UInt8,
            Self::UInt16(_) => ValueKind::UInt16,
            Self::UInt32(_) => ValueKind::UInt32,
            Self::UInt64(_) => ValueKind::UInt64,
            Self::Bool(_) => ValueKind::Bool,
            Self::IpAddr(_) => ValueKind::IpAddr,
            Self::String(_) => ValueKind::String,
            Self::Raw(_) => ValueKind::Raw,
            Self::Unknown { .. } => return None,
        })
    }

    /// Human readable type name used in diagnostics
    pub fn type_name(&self) -> String {
        match self {
            Self::Unknown { type_tag } => format!("unknown type {}", type_tag),
            other => other
                .kind()
                .map(|k| k.to_string())
                .unwrap_or_else(|| "unknown".into()),
        }
    }

    /// Convert an IPv4 address to the host-order representation
    pub fn ipv4(addr: Ipv4Addr) -> Self {
        Self::IpAddr(u32::from(addr))
    }

    /// Build a value of the given kind from a JSON value.
    ///
    /// Returns `None` for `null` and for JSON that does not fit the kind,
    /// which callers treat as an invalid (absent) value.
    pub fn from_json(kind: ValueKind, json: &serde_json::Value) -> Option<Self> {
        use serde_json::Value as Json;

        let signed = || json.as_i64();
        let unsigned = || json.as_u64();

        match kind {
            ValueKind::Int8 => signed().and_then(|n| i8::try_from(n).ok()).map(Self::Int8),
            ValueKind::Int16 => signed().and_then(|n| i16::try_from(n).ok()).map(Self::Int16),
            ValueKind::Int32 => signed().and_then(|n| i32::try_from(n).ok()).map(Self::Int32),
            ValueKind::Int64 => signed().map(Self::Int64),
            ValueKind::UInt8 => unsigned().and_then(|n| u8::try_from(n).ok()).map(Self::UInt8),
            ValueKind::UInt16 => unsigned()
                .and_then(|n| u16::try_from(n).ok())
                .map(Self::UInt16),
            ValueKind::UInt32 => unsigned()
                .and_then(|n| u32::try_from(n).ok())
                .map(Self::UInt32),
            ValueKind::UInt64 => unsigned().map(Self::UInt64),
            ValueKind::Bool => match json {
                Json::Bool(b) => Some(Self::Bool(*b)),
                Json::Number(n) => n.as_u64().map(|n| Self::Bool(n != 0)),
                _ => None,
            },
            ValueKind::IpAddr => match json {
                Json::String(s) => s.parse::<Ipv4Addr>().ok().map(Self::ipv4),
                Json::Number(n) => n
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .map(Self::IpAddr),
                _ => None,
            },
            ValueKind::String => match json {
                Json::String(s) => Some(Self::String(s.clone())),
                Json::Null => None,
                other => Some(Self::String(other.to_string())),
            },
            ValueKind::Raw => match json {
                Json::String(s) => Some(Self::Raw(s.as_bytes().to_vec())),
                Json::Array(items) => items
                    .iter()
                    .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
                    .collect::<Option<Vec<u8>>>()
                    .map(Self::Raw),
                _ => None,
            },
        }
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::Int8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::UInt8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::UInt16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Ipv4Addr> for Value {
    fn from(v: Ipv4Addr) -> Self {
        Self::ipv4(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Raw(v)
    }
}

/// Declared type of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit unsigned integer
    UInt64,
    /// Boolean
    Bool,
    /// IPv4 address
    #[serde(alias = "ip")]
    IpAddr,
    /// Text string
    String,
    /// Raw bytes
    Raw,
}

impl ValueKind {
    /// Name as used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Bool => "bool",
            Self::IpAddr => "ipaddr",
            Self::String => "string",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::UInt8,
            "uint16" => Self::UInt16,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "bool" => Self::Bool,
            "ipaddr" | "ip" => Self::IpAddr,
            "string" => Self::String,
            "raw" => Self::Raw,
            other => return Err(Error::config(format!("unknown value kind '{}'", other))),
        })
    }
}

/// Current result of one key: its name and, when valid, its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyResult {
    /// Dotted key name (e.g. `ip.saddr`)
    pub key: String,
    /// Value, `None` when the key carries no valid value for this record
    pub value: Option<Value>,
}

impl KeyResult {
    /// Create a result holding a valid value
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Create a result without a valid value
    pub fn invalid(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// Whether the result carries a usable value
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }
}

/// Column metadata as reported by the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    /// Column name
    pub name: String,
    /// SQL data type name (vendor-specific, lowercase)
    pub data_type: String,
    /// Whether the declared type is numeric
    pub numeric: bool,
    /// Column ordinal (1-based)
    pub ordinal: u32,
}

impl ColumnMetadata {
    /// Create column metadata
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, numeric: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            numeric,
            ordinal: 0,
        }
    }

    /// Set the ordinal position
    pub fn with_ordinal(mut self, ordinal: u32) -> Self {
        self.ordinal = ordinal;
        self
    }
}
