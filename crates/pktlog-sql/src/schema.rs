//! Schema introspection
//!
//! Reconciles the target table's columns with the host's key registry.
//! A column `ip_saddr` is fed by the key `ip.saddr`; columns without a
//! matching key are left to their database default.

use tracing::debug;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::registry::{KeyId, KeyRegistry};
use crate::types::ColumnMetadata;

/// One column of the INSERT statement and the key feeding it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Dotted key name (`ip.saddr`)
    pub name: String,
    /// Registry handle of the key
    pub id: KeyId,
    /// Whether the column has a non-numeric type
    pub is_string: bool,
}

impl Field {
    /// Create a field
    pub fn new(name: impl Into<String>, id: KeyId, is_string: bool) -> Self {
        Self {
            name: name.into(),
            id,
            is_string,
        }
    }

    /// Column name as used in SQL (`ip_saddr`)
    pub fn column_name(&self) -> String {
        self.name.replace('.', "_")
    }
}

/// Discovers the ordered field list of a table
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Query the table's columns and reconcile them with the registry.
    ///
    /// Fields come back in the table's native column order. A table whose
    /// columns match no registered key is a schema error.
    pub async fn discover(
        conn: &dyn Connection,
        table: &str,
        registry: &dyn KeyRegistry,
    ) -> Result<Vec<Field>> {
        let columns = conn.list_columns(table).await?;
        let fields = Self::reconcile(&columns, registry);

        if fields.is_empty() {
            return Err(Error::schema(format!(
                "table '{}' has {} columns but none match a known key",
                table,
                columns.len()
            )));
        }

        debug!(
            table = %table,
            columns = columns.len(),
            fields = fields.len(),
            "schema discovered"
        );
        Ok(fields)
    }

    /// Map columns to fields, skipping columns unknown to the registry
    pub fn reconcile(columns: &[ColumnMetadata], registry: &dyn KeyRegistry) -> Vec<Field> {
        columns
            .iter()
            .filter_map(|column| {
                let key = column.name.replace('_', ".");
                match registry.resolve_by_name(&key) {
                    Some(id) => Some(Field::new(key, id, !column.numeric)),
                    None => {
                        debug!(column = %column.name, key = %key, "no key for column, skipping");
                        None
                    }
                }
            })
            .collect()
    }
}
