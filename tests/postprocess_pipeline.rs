//! Post-processing pipeline properties: the per-row deferred-filter
//! guarantee, provenance, and workboard definition round trips.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use workboard_api::formula::PostFetchContext;
use workboard_api::postprocess;
use workboard_api::types::EntityKind;
use workboard_api::vocab::FilterOp;
use workboard_api::workboard::model::{ColumnSpec, FilterSpec};

fn deal_row(title: &str, populated_fields: usize) -> Map<String, Value> {
    let fields = ["notes", "next_step", "pain_points", "decision_process"];
    let mut row = Map::new();
    row.insert("id".into(), json!(Uuid::new_v4().to_string()));
    row.insert("title".into(), json!(title));
    for (i, field) in fields.iter().enumerate() {
        let value = if i < populated_fields { json!("filled") } else { json!("") };
        row.insert((*field).to_string(), value);
    }
    row
}

#[test]
fn every_surviving_row_satisfies_the_deferred_filter() {
    let ctx = PostFetchContext::new(Utc::now());
    let rows = vec![
        deal_row("a", 4),
        deal_row("b", 1),
        deal_row("c", 3),
        deal_row("d", 0),
        deal_row("e", 2),
    ];
    let names = vec!["completion_score".to_string()];
    let deferred = vec![FilterSpec {
        field: "completion_score".into(),
        operator: FilterOp::Gte,
        value: Some(json!(50)),
    }];

    let out = postprocess::finish(rows, &names, &deferred, EntityKind::Deals, &ctx);

    // The per-row guarantee: every returned row satisfies the filter. The
    // SQL-level total (5 here) legitimately exceeds the survivor count.
    assert_eq!(out.len(), 3);
    for row in &out {
        assert!(row["completion_score"].as_i64().unwrap() >= 50);
    }
    // Survivors keep their SQL order.
    let titles: Vec<&str> = out.iter().map(|r| r["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["a", "c", "e"]);
}

#[test]
fn no_deferred_filters_means_no_rows_dropped() {
    let ctx = PostFetchContext::new(Utc::now());
    let rows = vec![deal_row("a", 0), deal_row("b", 4)];
    let out = postprocess::finish(rows, &[], &[], EntityKind::Deals, &ctx);
    assert_eq!(out.len(), 2);
}

#[test]
fn provenance_records_source_kind_and_fetch_time() {
    let fetched_at = Utc::now();
    let ctx = PostFetchContext::new(fetched_at);
    let out = postprocess::finish(vec![deal_row("a", 0)], &[], &[], EntityKind::Deals, &ctx);
    let prov = out[0]["_provenance"].as_object().unwrap();
    assert_eq!(prov["source"], json!("deals"));
    assert_eq!(prov["fetched_at"], json!(fetched_at.to_rfc3339()));
}

#[test]
fn activity_recency_filter_uses_the_prefetched_lookup() {
    let now = Utc::now();
    let mut ctx = PostFetchContext::new(now);

    let recent = deal_row("recent", 0);
    let stale = deal_row("stale", 0);
    let recent_id = Uuid::parse_str(recent["id"].as_str().unwrap()).unwrap();
    let stale_id = Uuid::parse_str(stale["id"].as_str().unwrap()).unwrap();
    ctx.last_activity_at.insert(recent_id, now - Duration::days(2));
    ctx.last_activity_at.insert(stale_id, now - Duration::days(45));

    let names = vec!["days_since_last_activity".to_string()];
    let deferred = vec![FilterSpec {
        field: "days_since_last_activity".into(),
        operator: FilterOp::Lte,
        value: Some(json!(7)),
    }];
    let out = postprocess::finish(vec![recent, stale], &names, &deferred, EntityKind::Deals, &ctx);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["title"], json!("recent"));
    assert_eq!(out[0]["days_since_last_activity"], json!(2));
}

#[test]
fn workboard_definition_arrays_round_trip_in_order() {
    let columns: Vec<ColumnSpec> = serde_json::from_value(json!([
        {"id": "c1", "field": "title", "label": "Title", "type": "raw", "width": 200},
        {"id": "c2", "field": "completion_score", "label": "Score", "type": "formula", "formula": "completion_score"},
        {"id": "c3", "field": "stage", "label": "Stage", "type": "raw", "format": "badge"},
    ]))
    .unwrap();
    let filters: Vec<FilterSpec> = serde_json::from_value(json!([
        {"field": "stage", "operator": "eq", "value": "proposal"},
        {"field": "value", "operator": "gte", "value": 50000},
        {"field": "notes", "operator": "is_not_null"},
    ]))
    .unwrap();

    // Persisted as JSONB and read back: content and order must be identical.
    let stored_columns = serde_json::to_value(&columns).unwrap();
    let stored_filters = serde_json::to_value(&filters).unwrap();
    let reread_columns: Vec<ColumnSpec> = serde_json::from_value(stored_columns).unwrap();
    let reread_filters: Vec<FilterSpec> = serde_json::from_value(stored_filters).unwrap();

    assert_eq!(reread_columns, columns);
    assert_eq!(reread_filters, filters);
    assert_eq!(reread_columns[1].formula.as_deref(), Some("completion_score"));
}
