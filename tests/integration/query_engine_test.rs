//! Exercises the query grammar end to end and the virtual table registry's
//! wiring (names, required filters) without needing a live session.

use dbgd::error::Error;
use dbgd::query::parser::{parse, CmpOp, Expr, Projection, SortDir};
use dbgd::query::TableRegistry;
use dbgd::store::EventStore;

#[test]
fn projection_with_explicit_columns_and_like_filter() {
    let q = parse("SELECT file, line FROM breakpoints WHERE file LIKE '%.js'").unwrap();
    assert_eq!(q.projection, Projection::Columns(vec!["file".to_string(), "line".to_string()]));
    assert_eq!(q.table, "breakpoints");
    assert!(matches!(q.filter, Some(Expr::Comparison { op: CmpOp::Like, .. })));
    assert!(!q.json_output);
}

#[test]
fn order_by_asc_is_the_default_direction() {
    let q = parse("SELECT * FROM console ORDER BY ts").unwrap();
    assert_eq!(q.order_by, Some(("ts".to_string(), SortDir::Asc)));
}

#[test]
fn unterminated_string_literal_is_a_parse_error() {
    let err = parse("SELECT * FROM events WHERE method = 'unterminated").unwrap_err();
    assert!(matches!(err, Error::QueryParseError(_)));
}

#[test]
fn missing_from_clause_is_a_parse_error() {
    assert!(parse("SELECT *").is_err());
}

#[test]
fn comparison_operators_cover_the_full_set() {
    for (op_str, expected) in [
        ("=", CmpOp::Eq),
        ("!=", CmpOp::Ne),
        ("<", CmpOp::Lt),
        (">", CmpOp::Gt),
        ("<=", CmpOp::Le),
        (">=", CmpOp::Ge),
    ] {
        let sql = format!("SELECT * FROM events WHERE id {op_str} 1");
        let q = parse(&sql).unwrap();
        assert!(matches!(q.filter, Some(Expr::Comparison { op, .. }) if op == expected), "failed for {op_str}");
    }
}

#[tokio::test]
async fn table_registry_exposes_every_documented_table_with_its_required_filters() {
    let store = std::sync::Arc::new(EventStore::open_in_memory().await.unwrap());
    let registry = TableRegistry::new(store);

    let expectations: &[(&str, &[&str])] = &[
        ("frames", &[]),
        ("scopes", &[]),
        ("vars", &[]),
        ("this", &[]),
        ("breakpoints", &[]),
        ("scripts", &[]),
        ("console", &[]),
        ("exceptions", &[]),
        ("async_frames", &[]),
        ("threads", &[]),
        ("props", &["object_id"]),
        ("proto", &["object_id"]),
        ("listeners", &["object_id"]),
        ("dom", &["selector"]),
        ("styles", &["node_id"]),
        ("cookies", &[]),
        ("performance", &[]),
        ("storage", &["type"]),
        ("network_body", &["request_id"]),
        ("network_headers", &["request_id"]),
        ("events", &[]),
        ("cdp", &[]),
        ("cdp_messages", &[]),
        ("connections", &[]),
        ("timeline", &[]),
    ];

    for (name, required) in expectations {
        let table = registry.get(name).unwrap_or_else(|| panic!("table {name} not registered"));
        assert_eq!(table.name(), *name);
        assert_eq!(table.required_filters(), *required, "required filters mismatch for {name}");
    }

    assert!(registry.get("not_a_real_table").is_none());
}
