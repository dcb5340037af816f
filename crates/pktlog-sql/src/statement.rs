//! INSERT statement construction
//!
//! The statement for a table is built once per (re)connect:
//!
//! ```text
//! INSERT INTO ulog (ip_saddr,ip_daddr,oob_time_sec) VALUES (
//!                                                          ^ values offset
//! ```
//!
//! Each record truncates back to the values offset and appends one literal
//! per field. The buffer is sized up front and never grows.

use tracing::debug;

use crate::connection::Connection;
use crate::dialect::SqlDialect;
use crate::encoder::ValueEncoder;
use crate::error::{Error, Result};
use crate::registry::KeyRegistry;
use crate::schema::Field;

/// Bytes reserved per field for its value literal and separator
pub const VALUE_RESERVE: usize = 100;

/// Sizing template; its length covers the fixed keywords of the statement
pub const INSERT_TEMPLATE: &str = "insert into X (Y) values (Z)";

/// Capacity needed for the statement of `table` with `fields`
pub fn statement_capacity(table: &str, fields: &[Field]) -> usize {
    let per_field: usize = fields
        .iter()
        .map(|f| f.name.len() + 1 + VALUE_RESERVE)
        .sum();
    INSERT_TEMPLATE.len() + table.len() + 1 + per_field
}

/// Fixed-capacity text buffer with checked appends
#[derive(Debug)]
pub struct StatementBuffer {
    text: String,
    capacity: usize,
}

impl StatementBuffer {
    /// Reserve a buffer of exactly `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut text = String::new();
        text.try_reserve_exact(capacity)
            .map_err(|_| Error::OutOfMemory {
                requested: capacity,
            })?;
        Ok(Self { text, capacity })
    }

    /// Total capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written
    #[inline]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether nothing has been written
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Bytes still available
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.text.len()
    }

    /// Append text, failing without writing if it does not fit
    pub fn push_str(&mut self, s: &str) -> Result<()> {
        if s.len() > self.remaining() {
            return Err(Error::capacity(s.len(), self.remaining()));
        }
        self.text.push_str(s);
        Ok(())
    }

    /// Append one character
    pub fn push(&mut self, c: char) -> Result<()> {
        let mut tmp = [0u8; 4];
        self.push_str(c.encode_utf8(&mut tmp))
    }

    /// Cut the buffer back to `len` bytes
    pub fn truncate(&mut self, len: usize) {
        self.text.truncate(len);
    }

    /// Replace a trailing `from` character with `to`; false if absent
    pub fn replace_last(&mut self, from: char, to: char) -> bool {
        if self.text.ends_with(from) {
            self.text.pop();
            self.text.push(to);
            true
        } else {
            false
        }
    }

    /// Written text
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Builds the per-table INSERT statement
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementBuilder;

impl StatementBuilder {
    /// Size the buffer for `fields` and render the static prefix
    pub fn build(
        dialect: &dyn SqlDialect,
        fields: Vec<Field>,
        table: &str,
    ) -> Result<InsertStatement> {
        let capacity = statement_capacity(table, &fields);
        let mut buffer = StatementBuffer::with_capacity(capacity)?;

        let columns: Vec<String> = fields.iter().map(Field::column_name).collect();
        buffer.push_str(&dialect.insert_prefix(table, &columns))?;
        let values_offset = buffer.len();

        debug!(
            table = %table,
            capacity,
            prefix = %buffer.as_str(),
            "insert statement prepared"
        );

        Ok(InsertStatement {
            table: table.to_owned(),
            fields,
            buffer,
            values_offset,
        })
    }
}

/// INSERT statement for one table, rendered once per record
#[derive(Debug)]
pub struct InsertStatement {
    table: String,
    fields: Vec<Field>,
    buffer: StatementBuffer,
    values_offset: usize,
}

impl InsertStatement {
    /// Target table
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fields in column order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Static text up to and including `VALUES (`
    pub fn prefix(&self) -> &str {
        &self.buffer.as_str()[..self.values_offset]
    }

    /// Buffer capacity
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Render the statement for the registry's current record.
    ///
    /// On error the buffer holds partial text that the next render discards.
    pub fn render(
        &mut self,
        registry: &dyn KeyRegistry,
        encoder: &ValueEncoder,
        conn: &dyn Connection,
    ) -> Result<&str> {
        self.buffer.truncate(self.values_offset);

        let count = self.fields.len();
        for (idx, field) in self.fields.iter().enumerate() {
            // later fields keep their reserve, plus one byte for ')'
            let reserve_after = (count - idx - 1) * VALUE_RESERVE + 1;

            let result = registry.resolve_by_id(field.id);
            if result.is_none() {
                debug!(key = %field.name, id = %field.id, "no result for key");
            }
            encoder.encode(field, result, conn, &mut self.buffer, reserve_after)?;
        }

        if self.buffer.len() == self.values_offset || !self.buffer.replace_last(',', ')') {
            self.buffer.push(')')?;
        }

        Ok(self.buffer.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::MySqlDialect;
    use crate::registry::KeyId;

    fn fields(names: &[&str]) -> Vec<Field> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Field::new(*n, KeyId(i as u32), false))
            .collect()
    }

    #[test]
    fn test_template_length() {
        assert_eq!(INSERT_TEMPLATE.len(), 28);
    }

    #[test]
    fn test_capacity_formula() {
        let f = fields(&["ip.saddr", "ip.daddr"]);
        // 28 + 4 + 1 + (8+1+100) * 2
        assert_eq!(statement_capacity("ulog", &f), 251);
    }

    #[test]
    fn test_prefix() {
        let stmt = StatementBuilder::build(
            &MySqlDialect,
            fields(&["ip.saddr", "ip.daddr", "oob.time.sec"]),
            "T",
        )
        .unwrap();
        assert_eq!(
            stmt.prefix(),
            "INSERT INTO T (ip_saddr,ip_daddr,oob_time_sec) VALUES ("
        );
        assert_eq!(stmt.fields().len(), 3);
    }

    #[test]
    fn test_prefix_leaves_value_reserve() {
        let f = fields(&["a", "bb.cc", "d.e.f.g"]);
        let stmt = StatementBuilder::build(&MySqlDialect, f, "t").unwrap();
        assert!(stmt.capacity() - stmt.prefix().len() >= 3 * VALUE_RESERVE);
    }

    #[test]
    fn test_buffer_checked_append() {
        let mut buf = StatementBuffer::with_capacity(5).unwrap();
        buf.push_str("abc").unwrap();
        let err = buf.push_str("def").unwrap_err();
        assert!(matches!(err, Error::Capacity { needed: 3, remaining: 2 }));
        assert_eq!(buf.as_str(), "abc");
        buf.push_str("de").unwrap();
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_buffer_replace_last() {
        let mut buf = StatementBuffer::with_capacity(8).unwrap();
        buf.push_str("1,2,").unwrap();
        assert!(buf.replace_last(',', ')'));
        assert_eq!(buf.as_str(), "1,2)");
        assert!(!buf.replace_last(',', ')'));
    }

    #[test]
    fn test_out_of_memory() {
        let err = StatementBuffer::with_capacity(usize::MAX).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory { .. }));
    }
}
