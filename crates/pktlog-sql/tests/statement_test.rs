//! Statement rendering tests for pktlog-sql

use pktlog_sql::config::{IpEncoding, UnsupportedValuePolicy};
use pktlog_sql::dialect::MySqlDialect;
use pktlog_sql::encoder::ValueEncoder;
use pktlog_sql::registry::{KeyRegistry, KeyTable};
use pktlog_sql::schema::Field;
use pktlog_sql::statement::{statement_capacity, InsertStatement, StatementBuilder, VALUE_RESERVE};
use pktlog_sql::stats::AtomicSinkStats;
use pktlog_sql::testing::MockDatabase;
use pktlog_sql::types::{Value, ValueKind};
use proptest::prelude::*;
use std::sync::Arc;

fn encoder() -> (ValueEncoder, Arc<AtomicSinkStats>) {
    let stats = Arc::new(AtomicSinkStats::default());
    let enc = ValueEncoder::new(
        IpEncoding::Integer,
        UnsupportedValuePolicy::Reject,
        stats.clone(),
    );
    (enc, stats)
}

fn statement(keys: &KeyTable, columns: &[(&str, bool)]) -> InsertStatement {
    let fields = columns
        .iter()
        .map(|(name, is_string)| {
            let id = keys.resolve_by_name(name).expect("key registered");
            Field::new(*name, id, *is_string)
        })
        .collect();
    StatementBuilder::build(&MySqlDialect, fields, "T").unwrap()
}

fn packet_keys() -> KeyTable {
    let mut keys = KeyTable::new();
    keys.register("ip.saddr", ValueKind::IpAddr);
    keys.register("ip.daddr", ValueKind::IpAddr);
    keys.register("oob.time.sec", ValueKind::UInt32);
    keys.register("oob.prefix", ValueKind::String);
    keys
}

#[test]
fn test_numeric_record() {
    let mut keys = packet_keys();
    keys.set_by_name("ip.saddr", Some(Value::IpAddr(167_772_161))).unwrap();
    keys.set_by_name("ip.daddr", Some(Value::IpAddr(167_772_162))).unwrap();
    keys.set_by_name("oob.time.sec", Some(Value::UInt32(1_620_000_000))).unwrap();

    let mut stmt = statement(
        &keys,
        &[("ip.saddr", false), ("ip.daddr", false), ("oob.time.sec", false)],
    );
    let (enc, _) = encoder();
    let conn = MockDatabase::default().connection();

    assert_eq!(
        stmt.render(&keys, &enc, &conn).unwrap(),
        "INSERT INTO T (ip_saddr,ip_daddr,oob_time_sec) VALUES (167772161,167772162,1620000000)"
    );
}

#[test]
fn test_absent_middle_value() {
    let mut keys = packet_keys();
    keys.set_by_name("ip.saddr", Some(Value::IpAddr(167_772_161))).unwrap();
    keys.set_by_name("oob.time.sec", Some(Value::UInt32(1_620_000_000))).unwrap();

    let mut stmt = statement(
        &keys,
        &[("ip.saddr", false), ("ip.daddr", false), ("oob.time.sec", false)],
    );
    let (enc, _) = encoder();
    let conn = MockDatabase::default().connection();

    assert_eq!(
        stmt.render(&keys, &enc, &conn).unwrap(),
        "INSERT INTO T (ip_saddr,ip_daddr,oob_time_sec) VALUES (167772161,NULL,1620000000)"
    );
}

#[test]
fn test_quoted_string() {
    let mut keys = packet_keys();
    keys.set_by_name("oob.prefix", Some(Value::from("O'Brien"))).unwrap();

    let mut stmt = statement(&keys, &[("oob.prefix", true)]);
    let (enc, _) = encoder();
    let conn = MockDatabase::default().connection();

    assert_eq!(
        stmt.render(&keys, &enc, &conn).unwrap(),
        "INSERT INTO T (oob_prefix) VALUES ('O\\'Brien')"
    );
}

#[test]
fn test_render_resets_between_records() {
    let mut keys = packet_keys();
    let mut stmt = statement(&keys, &[("oob.time.sec", false), ("oob.prefix", true)]);
    let (enc, _) = encoder();
    let conn = MockDatabase::default().connection();

    keys.set_by_name("oob.time.sec", Some(Value::UInt32(1))).unwrap();
    keys.set_by_name("oob.prefix", Some(Value::from("a long prefix value"))).unwrap();
    stmt.render(&keys, &enc, &conn).unwrap();

    keys.invalidate_all();
    keys.set_by_name("oob.time.sec", Some(Value::UInt32(2))).unwrap();
    assert_eq!(
        stmt.render(&keys, &enc, &conn).unwrap(),
        "INSERT INTO T (oob_time_sec,oob_prefix) VALUES (2,NULL)"
    );
}

#[test]
fn test_omitted_only_value_still_closes() {
    let mut keys = KeyTable::new();
    keys.register("raw.mac", ValueKind::Raw);
    keys.set_by_name("raw.mac", Some(Value::Raw(vec![0, 1]))).unwrap();

    let mut stmt = statement(&keys, &[("raw.mac", true)]);
    let stats = Arc::new(AtomicSinkStats::default());
    let enc = ValueEncoder::new(IpEncoding::Integer, UnsupportedValuePolicy::Omit, stats.clone());
    let conn = MockDatabase::default().connection();

    assert_eq!(
        stmt.render(&keys, &enc, &conn).unwrap(),
        "INSERT INTO T (raw_mac) VALUES ()"
    );
    assert_eq!(stats.snapshot().unsupported_values, 1);
}

#[test]
fn test_oversized_string_degrades() {
    let mut keys = packet_keys();
    keys.set_by_name("oob.prefix", Some(Value::from("'".repeat(400)))).unwrap();
    keys.set_by_name("oob.time.sec", Some(Value::UInt32(7))).unwrap();

    let mut stmt = statement(&keys, &[("oob.prefix", true), ("oob.time.sec", false)]);
    let (enc, stats) = encoder();
    let conn = MockDatabase::default().connection();

    assert_eq!(
        stmt.render(&keys, &enc, &conn).unwrap(),
        "INSERT INTO T (oob_prefix,oob_time_sec) VALUES ('',7)"
    );
    assert_eq!(stats.snapshot().encoding_overflows, 1);
}

fn key_name() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(\\.[a-z]{1,8}){0,2}"
}

#[derive(Debug, Clone)]
enum Cell {
    Absent,
    Number(i64),
    Text(String),
}

fn cell(max_text: usize) -> impl Strategy<Value = Cell> {
    prop_oneof![
        Just(Cell::Absent),
        any::<i64>().prop_map(Cell::Number),
        proptest::collection::vec(any::<char>(), 0..max_text)
            .prop_map(|chars| Cell::Text(chars.into_iter().collect())),
    ]
}

fn render_cells(cells: &[(String, Cell)]) -> (String, String, usize, u64) {
    let mut keys = KeyTable::new();
    let mut fields = Vec::new();
    for (name, cell) in cells {
        let id = match cell {
            Cell::Text(_) => keys.register(name.clone(), ValueKind::String),
            _ => keys.register(name.clone(), ValueKind::Int64),
        };
        let value = match cell {
            Cell::Absent => None,
            Cell::Number(n) => Some(Value::Int64(*n)),
            Cell::Text(s) => Some(Value::String(s.clone())),
        };
        keys.set(id, value).unwrap();
        fields.push(Field::new(name.clone(), id, matches!(cell, Cell::Text(_))));
    }

    let capacity = statement_capacity("T", &fields);
    let mut stmt = StatementBuilder::build(&MySqlDialect, fields, "T").unwrap();
    let prefix = stmt.prefix().to_owned();
    let (enc, stats) = encoder();
    let conn = MockDatabase::default().connection();
    let sql = stmt.render(&keys, &enc, &conn).unwrap().to_owned();
    (prefix, sql, capacity, stats.snapshot().encoding_overflows)
}

fn unique_cells(max_text: usize) -> impl Strategy<Value = Vec<(String, Cell)>> {
    proptest::collection::btree_map(key_name(), cell(max_text), 1..12)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    #[test]
    fn prop_render_is_balanced(cells in unique_cells(40)) {
        let (prefix, sql, capacity, _) = render_cells(&cells);
        prop_assert!(sql.starts_with(&prefix));
        prop_assert!(sql.ends_with(')'));
        prop_assert!(!sql.ends_with(",)"));
        prop_assert!(sql.len() <= capacity);
    }

    #[test]
    fn prop_bounded_strings_never_degrade(cells in unique_cells(24)) {
        // multi-byte chars can push a 24-char string past the reserve
        let obeys = cells.iter().all(|(_, c)| match c {
            Cell::Text(s) => 2 * s.len() + 4 <= VALUE_RESERVE,
            _ => true,
        });
        let (_, _, _, overflows) = render_cells(&cells);
        if obeys {
            prop_assert_eq!(overflows, 0);
        }
    }

    #[test]
    fn prop_oversized_strings_never_overflow(cells in unique_cells(600)) {
        let (_, sql, capacity, _) = render_cells(&cells);
        prop_assert!(sql.len() <= capacity);
        prop_assert!(sql.ends_with(')'));
    }
}
