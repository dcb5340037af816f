//! SQL dialect abstraction for pktlog-sql
//!
//! The sink builds literal SQL text, so a dialect supplies:
//! - String literal escaping
//! - The column-listing metadata query
//! - Classification of declared column types as numeric or string

use crate::security::{escape_mysql_string, validate_sql_identifier};

/// SQL dialect for vendor-specific SQL generation
pub trait SqlDialect: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Escape a string for a single-quoted literal (quotes not included)
    fn escape_string(&self, value: &str) -> String;

    /// Get the SQL listing `(column_name, data_type)` of a table in the
    /// current database, in native ordinal order
    fn list_columns_sql(&self, table: &str) -> String;

    /// Whether a declared data type is numeric (values rendered unquoted)
    fn is_numeric_type(&self, data_type: &str) -> bool;

    /// Render the static part of an INSERT statement, up to and including
    /// the opening parenthesis of the value list
    fn insert_prefix(&self, table: &str, columns: &[String]) -> String {
        format!("INSERT INTO {} ({}) VALUES (", table, columns.join(","))
    }

    /// Check that a table name is safe to interpolate
    fn validate_table(&self, table: &str) -> crate::Result<()> {
        validate_sql_identifier(table)
    }
}

/// Declared data types MySQL treats as numeric
const MYSQL_NUMERIC_TYPES: &[&str] = &[
    "tinyint",
    "smallint",
    "mediumint",
    "int",
    "integer",
    "bigint",
    "decimal",
    "numeric",
    "float",
    "double",
    "real",
    "year",
];

/// MySQL dialect
#[derive(Debug, Clone, Default)]
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn escape_string(&self, value: &str) -> String {
        escape_mysql_string(value)
    }

    fn list_columns_sql(&self, table: &str) -> String {
        format!(
            "SELECT column_name, data_type \
             FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = '{}' \
             ORDER BY ordinal_position",
            escape_mysql_string(table)
        )
    }

    fn is_numeric_type(&self, data_type: &str) -> bool {
        // information_schema reports the bare type; COLUMN_TYPE style input
        // ("int(10) unsigned") is reduced to its leading word
        let base = data_type
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();
        MYSQL_NUMERIC_TYPES
            .iter()
            .any(|t| t.eq_ignore_ascii_case(base))
    }
}

/// Get a dialect by name
pub fn dialect_for(name: &str) -> Option<Box<dyn SqlDialect>> {
    match name.to_lowercase().as_str() {
        "mysql" | "mariadb" => Some(Box::new(MySqlDialect)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_numeric_types() {
        let d = MySqlDialect;
        for t in MYSQL_NUMERIC_TYPES {
            assert!(d.is_numeric_type(t), "{} should be numeric", t);
        }
        assert!(d.is_numeric_type("INT"));
        assert!(d.is_numeric_type("int(10) unsigned"));
        assert!(d.is_numeric_type("decimal(10,2)"));

        assert!(!d.is_numeric_type("varchar"));
        assert!(!d.is_numeric_type("char"));
        assert!(!d.is_numeric_type("text"));
        assert!(!d.is_numeric_type("datetime"));
        assert!(!d.is_numeric_type("bit"));
        assert!(!d.is_numeric_type(""));
    }

    #[test]
    fn test_list_columns_sql_escapes_table() {
        let sql = MySqlDialect.list_columns_sql("ul'og");
        assert!(sql.contains("table_name = 'ul\\'og'"));
        assert!(sql.contains("table_schema = DATABASE()"));
        assert!(sql.ends_with("ORDER BY ordinal_position"));
    }

    #[test]
    fn test_insert_prefix() {
        let cols = vec!["ip_saddr".to_string(), "ip_daddr".to_string()];
        assert_eq!(
            MySqlDialect.insert_prefix("ulog", &cols),
            "INSERT INTO ulog (ip_saddr,ip_daddr) VALUES ("
        );
    }

    #[test]
    fn test_dialect_for() {
        assert_eq!(dialect_for("MySQL").map(|d| d.name()), Some("MySQL"));
        assert_eq!(dialect_for("mariadb").map(|d| d.name()), Some("MySQL"));
        assert!(dialect_for("postgres").is_none());
    }
}
