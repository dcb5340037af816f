//! Unit tests for pktlog-sql error module

use pktlog_sql::error::{Error, ErrorCategory};

#[test]
fn test_error_connection() {
    let err = Error::connection("Failed to connect");

    assert_eq!(err.category(), ErrorCategory::Connection);
    assert!(err.to_string().contains("Failed to connect"));
    assert!(err.is_retriable());
}

#[test]
fn test_error_connection_with_source() {
    let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
    let err = Error::connection_with_source("Failed to connect to MySQL", io);

    assert_eq!(err.category(), ErrorCategory::Connection);
    let source = std::error::Error::source(&err).expect("source kept");
    assert!(source.to_string().contains("refused"));
}

#[test]
fn test_error_config() {
    let err = Error::config("table is required");

    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(err.to_string().contains("table is required"));
    assert!(!err.is_retriable());
}

#[test]
fn test_error_timeout() {
    let err = Error::timeout("connect did not complete within 5s");

    assert_eq!(err.category(), ErrorCategory::Timeout);
    assert!(err.is_retriable());
}

#[test]
fn test_error_schema() {
    let err = Error::schema("no usable columns");
    assert_eq!(err.category(), ErrorCategory::Schema);
    assert!(err.is_retriable());

    let err = Error::table_not_found("nulog.ulog");
    assert_eq!(err.category(), ErrorCategory::Schema);
    assert!(err.to_string().contains("nulog.ulog"));
}

#[test]
fn test_error_capacity() {
    let err = Error::capacity(120, 80);

    assert_eq!(err.category(), ErrorCategory::Capacity);
    assert!(err.to_string().contains("120"));
    assert!(err.to_string().contains("80"));
}

#[test]
fn test_error_execution_keeps_sql() {
    let err = Error::execution_with_sql("Unknown column", "INSERT INTO ulog (x) VALUES (1)");

    assert_eq!(err.category(), ErrorCategory::Execution);
    match err {
        Error::Execution { sql, .. } => {
            assert_eq!(sql.as_deref(), Some("INSERT INTO ulog (x) VALUES (1)"))
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_error_unsupported_value() {
    let err = Error::unsupported_value("raw.mac", "raw");

    assert_eq!(err.category(), ErrorCategory::Value);
    assert!(!err.is_retriable());
    assert!(err.to_string().contains("raw.mac"));
}

#[test]
fn test_error_internal() {
    let err = Error::internal("no open session");
    assert_eq!(err.category(), ErrorCategory::Other);
    assert!(!err.is_retriable());
}

#[test]
fn test_category_display() {
    assert_eq!(ErrorCategory::Connection.to_string(), "connection");
    assert_eq!(ErrorCategory::Capacity.to_string(), "capacity");
    assert_eq!(ErrorCategory::Value.to_string(), "value");
}
