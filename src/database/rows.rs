//! Positional parameter binding for JSON-typed values, and row-to-JSON
//! conversion for the dynamic projections the assembler produces.

use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Column, Row};

/// Bind one JSON value as a positional parameter on a plain query.
pub fn bind_value<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres has no u64; cast down if safe
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) => {
            // Membership lists are expanded into one placeholder per element
            // before binding; an array here is a compiler bug.
            q
        }
        Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}

/// Same binding rules for scalar queries (EXISTS / COUNT fetches).
pub fn bind_scalar<'q, O>(
    q: sqlx::query::QueryScalar<'q, sqlx::Postgres, O, PgArguments>,
    v: &'q Value,
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, O, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) => q,
        Value::Object(_) => q.bind(v.clone()),
    }
}

/// Convert fetched rows to JSON maps, column by column. Types without a
/// direct JSON representation fall through a small ladder of decodes.
pub fn rows_to_json(rows: Vec<PgRow>) -> Vec<Map<String, Value>> {
    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        let mut map = Map::new();
        for i in 0..row.len() {
            let column_name = row.column(i).name();
            let value: Result<Option<Value>, _> = row.try_get(i);

            let json_value = match value {
                Ok(Some(v)) => v,
                Ok(None) => Value::Null,
                Err(_) => {
                    if let Ok(s) = row.try_get::<String, _>(i) {
                        Value::String(s)
                    } else if let Ok(id) = row.try_get::<uuid::Uuid, _>(i) {
                        Value::String(id.to_string())
                    } else if let Ok(ts) = row.try_get::<chrono::DateTime<chrono::Utc>, _>(i) {
                        Value::String(ts.to_rfc3339())
                    } else if let Ok(i64_val) = row.try_get::<i64, _>(i) {
                        Value::Number(i64_val.into())
                    } else if let Ok(f64_val) = row.try_get::<f64, _>(i) {
                        Value::Number(
                            serde_json::Number::from_f64(f64_val).unwrap_or_else(|| 0.into()),
                        )
                    } else if let Ok(bool_val) = row.try_get::<bool, _>(i) {
                        Value::Bool(bool_val)
                    } else {
                        Value::Null
                    }
                }
            };

            map.insert(column_name.to_string(), json_value);
        }
        results.push(map);
    }
    results
}
