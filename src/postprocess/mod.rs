//! Result post-processor: computes post-fetch formulas, applies deferred
//! filters in memory, and stamps provenance metadata. A pure transform over
//! already-fetched rows; row order is whatever the SQL ORDER BY established
//! and is never changed here.

use serde_json::{json, Map, Value};

use crate::formula::{self, PostFetchContext};
use crate::types::EntityKind;
use crate::vocab::FilterOp;
use crate::workboard::model::FilterSpec;

/// Finish a fetched page: (1) compute each post-fetch formula per row,
/// (2) drop rows failing deferred filters without reordering survivors,
/// (3) attach a `_provenance` block recording source kind and fetch time.
pub fn finish(
    rows: Vec<Map<String, Value>>,
    formula_names: &[String],
    deferred: &[FilterSpec],
    kind: EntityKind,
    ctx: &PostFetchContext,
) -> Vec<Map<String, Value>> {
    let post_fetch: Vec<&String> = formula_names
        .iter()
        .filter(|name| formula::is_post_fetch(name, kind))
        .collect();

    let mut out = Vec::with_capacity(rows.len());
    for mut row in rows {
        for name in &post_fetch {
            if let Some(value) = formula::evaluate_post_fetch(name, &row, kind, ctx) {
                row.insert((*name).clone(), value);
            }
        }

        if !deferred.iter().all(|f| row_matches(&row, f)) {
            continue;
        }

        row.insert(
            "_provenance".to_string(),
            json!({
                "source": kind.as_str(),
                "fetched_at": ctx.fetched_at.to_rfc3339(),
            }),
        );
        out.push(row);
    }
    out
}

/// In-memory operator semantics mirroring the SQL compiler: comparisons with
/// an absent value are false (SQL three-valued logic collapses to "no match"),
/// null checks inspect presence, patterns are case-insensitive.
fn row_matches(row: &Map<String, Value>, filter: &FilterSpec) -> bool {
    let actual = row.get(&filter.field).unwrap_or(&Value::Null);
    let expected = filter.value.as_ref().unwrap_or(&Value::Null);

    match filter.operator {
        FilterOp::IsNull => actual.is_null(),
        FilterOp::IsNotNull => !actual.is_null(),
        FilterOp::Eq => !actual.is_null() && values_equal(actual, expected),
        FilterOp::Neq => !actual.is_null() && !values_equal(actual, expected),
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            match compare(actual, expected) {
                Some(ord) => match filter.operator {
                    FilterOp::Gt => ord.is_gt(),
                    FilterOp::Gte => ord.is_ge(),
                    FilterOp::Lt => ord.is_lt(),
                    FilterOp::Lte => ord.is_le(),
                    _ => unreachable!(),
                },
                None => false,
            }
        }
        FilterOp::Contains | FilterOp::NotContains | FilterOp::StartsWith | FilterOp::EndsWith => {
            let (Some(haystack), Some(needle)) = (actual.as_str(), expected.as_str()) else {
                return false;
            };
            let haystack = haystack.to_lowercase();
            let needle = needle.to_lowercase();
            match filter.operator {
                FilterOp::Contains => haystack.contains(&needle),
                FilterOp::NotContains => !haystack.contains(&needle),
                FilterOp::StartsWith => haystack.starts_with(&needle),
                FilterOp::EndsWith => haystack.ends_with(&needle),
                _ => unreachable!(),
            }
        }
        FilterOp::In | FilterOp::NotIn => {
            let Some(options) = expected.as_array() else { return false };
            // Empty membership lists were already dropped by the compiler;
            // mirror the same "no preference" reading here.
            if options.is_empty() {
                return true;
            }
            let found = options.iter().any(|o| values_equal(actual, o));
            if filter.operator == FilterOp::In {
                found
            } else {
                !actual.is_null() && !found
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Some(x.cmp(y));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn rows(values: Vec<Value>) -> Vec<Map<String, Value>> {
        values
            .into_iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn deferred_filters_keep_order_of_survivors() {
        let ctx = PostFetchContext::new(Utc::now());
        let input = rows(vec![
            json!({"id": Uuid::new_v4().to_string(), "title": "a", "notes": "x", "next_step": "y", "pain_points": "z", "decision_process": "w"}),
            json!({"id": Uuid::new_v4().to_string(), "title": "b", "notes": "x", "next_step": "", "pain_points": "", "decision_process": ""}),
            json!({"id": Uuid::new_v4().to_string(), "title": "c", "notes": "x", "next_step": "y", "pain_points": "z", "decision_process": ""}),
        ]);
        let names = vec!["completion_score".to_string()];
        let deferred = vec![FilterSpec {
            field: "completion_score".into(),
            operator: FilterOp::Gte,
            value: Some(json!(75)),
        }];
        let out = finish(input, &names, &deferred, EntityKind::Deals, &ctx);
        let titles: Vec<&str> = out.iter().map(|r| r["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["a", "c"]);
        assert_eq!(out[0]["completion_score"], json!(100));
    }

    #[test]
    fn provenance_is_attached_to_every_row() {
        let now = Utc::now();
        let ctx = PostFetchContext::new(now);
        let out = finish(
            rows(vec![json!({"id": Uuid::new_v4().to_string()})]),
            &[],
            &[],
            EntityKind::Companies,
            &ctx,
        );
        let prov = &out[0]["_provenance"];
        assert_eq!(prov["source"], json!("companies"));
        assert_eq!(prov["fetched_at"], json!(now.to_rfc3339()));
    }

    #[test]
    fn null_formula_values_fail_threshold_filters() {
        let ctx = PostFetchContext::new(Utc::now());
        let input = rows(vec![json!({"id": Uuid::new_v4().to_string(), "title": "quiet"})]);
        let names = vec!["days_since_last_activity".to_string()];
        let deferred = vec![FilterSpec {
            field: "days_since_last_activity".into(),
            operator: FilterOp::Lte,
            value: Some(json!(7)),
        }];
        let out = finish(input, &names, &deferred, EntityKind::Deals, &ctx);
        assert!(out.is_empty());
    }

    #[test]
    fn activity_lookup_feeds_the_day_count() {
        let now = Utc::now();
        let mut ctx = PostFetchContext::new(now);
        let id = Uuid::new_v4();
        ctx.last_activity_at.insert(id, now - chrono::Duration::days(9));
        let input = rows(vec![json!({"id": id.to_string()})]);
        let names = vec!["days_since_last_activity".to_string()];
        let out = finish(input, &names, &[], EntityKind::Deals, &ctx);
        assert_eq!(out[0]["days_since_last_activity"], json!(9));
    }

    #[test]
    fn in_memory_membership_matches_sql_semantics() {
        let row = json!({"score": 50}).as_object().unwrap().clone();
        let matches = |op: FilterOp, value: Value| {
            row_matches(&row, &FilterSpec { field: "score".into(), operator: op, value: Some(value) })
        };
        assert!(matches(FilterOp::In, json!([25, 50])));
        assert!(!matches(FilterOp::NotIn, json!([25, 50])));
        assert!(matches(FilterOp::In, json!([])));
        assert!(matches(FilterOp::NotIn, json!([])));
    }
}
