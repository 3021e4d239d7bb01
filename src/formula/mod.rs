//! Formula registry: named computed fields over workboard entities.
//!
//! Pushdown formulas carry a SQL expression over the base alias `e` and join
//! the projection, so they can be filtered and sorted at the query level.
//! Post-fetch formulas run in application code on fetched rows; filters on
//! them are deferred to the post-processor.

pub mod scoring;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::types::EntityKind;

const ALL_KINDS: &[EntityKind] = &[EntityKind::Deals, EntityKind::Contacts, EntityKind::Companies];
const DEALS_ONLY: &[EntityKind] = &[EntityKind::Deals];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaKind {
    /// Evaluable by the store per row; `expression` references only the base
    /// alias `e` and constants.
    Pushdown { expression: &'static str },
    /// Computed in the post-processor from the fetched row and request-scoped
    /// context.
    PostFetch,
}

#[derive(Debug, Clone, Copy)]
pub struct Formula {
    pub name: &'static str,
    pub applies_to: &'static [EntityKind],
    pub kind: FormulaKind,
}

/// Engine-defined, immutable. Not user-editable.
pub const FORMULAS: &[Formula] = &[
    Formula {
        name: "age_days",
        applies_to: ALL_KINDS,
        kind: FormulaKind::Pushdown {
            expression: "FLOOR(EXTRACT(EPOCH FROM (NOW() - e.\"created_at\")) / 86400)",
        },
    },
    Formula {
        name: "days_in_stage",
        applies_to: DEALS_ONLY,
        kind: FormulaKind::Pushdown {
            expression: "FLOOR(EXTRACT(EPOCH FROM (NOW() - e.\"stage_changed_at\")) / 86400)",
        },
    },
    Formula {
        name: "is_stale",
        applies_to: ALL_KINDS,
        kind: FormulaKind::Pushdown {
            expression: "(e.\"updated_at\" < NOW() - INTERVAL '30 days')",
        },
    },
    Formula {
        name: "completion_score",
        applies_to: DEALS_ONLY,
        kind: FormulaKind::PostFetch,
    },
    Formula {
        name: "days_since_last_activity",
        applies_to: DEALS_ONLY,
        kind: FormulaKind::PostFetch,
    },
];

pub fn lookup(name: &str) -> Option<&'static Formula> {
    FORMULAS.iter().find(|f| f.name == name)
}

fn applicable(name: &str, kind: EntityKind) -> Option<&'static Formula> {
    lookup(name).filter(|f| f.applies_to.contains(&kind))
}

/// Pushdown expression for `name` if it exists and applies to `kind`.
pub fn pushdown_expression(name: &str, kind: EntityKind) -> Option<&'static str> {
    match applicable(name, kind)?.kind {
        FormulaKind::Pushdown { expression } => Some(expression),
        FormulaKind::PostFetch => None,
    }
}

pub fn is_post_fetch(name: &str, kind: EntityKind) -> bool {
    matches!(applicable(name, kind), Some(f) if f.kind == FormulaKind::PostFetch)
}

/// Projection fragments for the requested formula names. Names that are
/// unknown, post-fetch, or not applicable to `kind` are silently skipped so a
/// column configuration can be reused loosely across entity kinds.
pub fn select_fragments<'a>(names: &'a [String], kind: EntityKind) -> Vec<(&'static str, &'a str)> {
    names
        .iter()
        .filter_map(|name| pushdown_expression(name, kind).map(|expr| (expr, name.as_str())))
        .collect()
}

/// Request-scoped inputs for post-fetch formulas. The service prefetches the
/// last-activity timestamps for the page in one query so the post-processor
/// stays a pure transform.
#[derive(Debug, Clone)]
pub struct PostFetchContext {
    pub last_activity_at: HashMap<Uuid, DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

impl PostFetchContext {
    pub fn new(fetched_at: DateTime<Utc>) -> Self {
        Self { last_activity_at: HashMap::new(), fetched_at }
    }
}

/// Any post-fetch formula named by the request that the context must be able
/// to answer via the activity lookup.
pub fn needs_activity_lookup(names: &[String], kind: EntityKind) -> bool {
    names
        .iter()
        .any(|n| n == "days_since_last_activity" && is_post_fetch(n, kind))
}

/// Compute one post-fetch formula for one row. Returns `None` when the name
/// is unknown or does not apply to `kind`; a known formula that cannot be
/// answered for this row yields an explicit `Value::Null`.
pub fn evaluate_post_fetch(
    name: &str,
    row: &Map<String, Value>,
    kind: EntityKind,
    ctx: &PostFetchContext,
) -> Option<Value> {
    if !is_post_fetch(name, kind) {
        return None;
    }
    match name {
        "completion_score" => {
            let text = |field: &str| row.get(field).and_then(Value::as_str).unwrap_or("");
            let score = scoring::completion_score(
                text("notes"),
                text("next_step"),
                text("pain_points"),
                text("decision_process"),
            );
            Some(Value::from(score))
        }
        "days_since_last_activity" => {
            let id = row
                .get("id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok());
            let days = id
                .and_then(|id| ctx.last_activity_at.get(&id))
                .map(|last| (ctx.fetched_at - *last).num_days());
            Some(days.map(Value::from).unwrap_or(Value::Null))
        }
        _ => None,
    }
}
