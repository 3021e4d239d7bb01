use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{EntityKind, SortDirection};
use crate::vocab::FilterOp;

/// One workboard column: either a raw entity field or a named formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub id: String,
    pub field: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Raw,
    Formula,
}

/// One workboard filter. `value` is absent for null checks, a scalar for
/// comparisons and patterns, an array for set membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub field: String,
    pub operator: FilterOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// A saved report definition. Columns and filters persist as JSONB and are
/// replaced wholesale on update, so order round-trips exactly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Workboard {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub entity_type: String,
    pub user_id: Uuid,
    pub is_shared: bool,
    pub is_default: bool,
    pub columns: Json<Vec<ColumnSpec>>,
    pub filters: Json<Vec<FilterSpec>>,
    pub sort_column: Option<String>,
    pub sort_direction: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workboard {
    /// Persisted entity type; `None` when a row predates a vocabulary change.
    pub fn entity_kind(&self) -> Option<EntityKind> {
        EntityKind::parse(&self.entity_type)
    }

    pub fn sort_dir(&self) -> SortDirection {
        SortDirection::parse(&self.sort_direction)
    }
}

/// One result page. `total` reflects the SQL-level count; with deferred
/// post-fetch filters the page can hold fewer surviving rows (see the
/// execution service docs).
#[derive(Debug, Clone, Serialize)]
pub struct WorkboardPage {
    pub items: Vec<serde_json::Map<String, Value>>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub has_more: bool,
}
