//! Workboard routes: CRUD over saved boards plus the data endpoint that
//! executes one. Validation of board definitions happens here, at the
//! boundary; the engine re-validates defensively on execution.

use std::collections::HashMap;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::CONFIG;
use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::formula;
use crate::query::assembler::PageBounds;
use crate::types::{EntityKind, Principal, SortDirection};
use crate::vocab;
use crate::workboard::model::{ColumnKind, ColumnSpec, FilterSpec};
use crate::workboard::{WorkboardInput, WorkboardService};

#[derive(Debug, Deserialize)]
pub struct WorkboardRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub entity_type: String,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub sort_column: Option<String>,
    #[serde(default)]
    pub sort_direction: Option<String>,
}

impl WorkboardRequest {
    /// Boundary validation. Column specs must satisfy the allowlist/registry
    /// invariant so invalid specs are never stored; unknown filter and sort
    /// fields are accepted here and silently dropped by the engine.
    fn validate(self) -> Result<WorkboardInput, ApiError> {
        let mut field_errors = HashMap::new();

        if self.name.trim().is_empty() {
            field_errors.insert("name".to_string(), "Name is required".to_string());
        }

        let kind = EntityKind::parse(&self.entity_type);
        if kind.is_none() {
            field_errors.insert(
                "entity_type".to_string(),
                format!("Unknown entity type: {}", self.entity_type),
            );
        }

        if self.columns.len() > CONFIG.query.max_columns {
            field_errors.insert(
                "columns".to_string(),
                format!("At most {} columns allowed", CONFIG.query.max_columns),
            );
        }
        if self.filters.len() > CONFIG.query.max_filters {
            field_errors.insert(
                "filters".to_string(),
                format!("At most {} filters allowed", CONFIG.query.max_filters),
            );
        }

        if let Some(kind) = kind {
            for (i, column) in self.columns.iter().enumerate() {
                match column.kind {
                    ColumnKind::Raw => {
                        if !vocab::is_raw_field(kind, &column.field) {
                            field_errors.insert(
                                format!("columns[{}].field", i),
                                format!("Unknown field: {}", column.field),
                            );
                        }
                    }
                    ColumnKind::Formula => {
                        let valid = column
                            .formula
                            .as_deref()
                            .and_then(formula::lookup)
                            .map(|f| f.applies_to.contains(&kind))
                            .unwrap_or(false);
                        if !valid {
                            field_errors.insert(
                                format!("columns[{}].formula", i),
                                format!(
                                    "Unknown or inapplicable formula: {}",
                                    column.formula.as_deref().unwrap_or("")
                                ),
                            );
                        }
                    }
                }
            }
        }

        if !field_errors.is_empty() {
            return Err(ApiError::validation_error("Invalid workboard definition", Some(field_errors)));
        }

        Ok(WorkboardInput {
            name: self.name,
            description: self.description,
            entity_type: kind.expect("validated above"),
            is_shared: self.is_shared,
            is_default: self.is_default,
            columns: self.columns,
            filters: self.filters,
            sort_column: self.sort_column,
            sort_direction: self
                .sort_direction
                .as_deref()
                .map(SortDirection::parse)
                .unwrap_or(SortDirection::Asc),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    /// Clamp before anything reaches the engine: page >= 1, limit within
    /// [1, max_limit]. The assembler trusts these integers.
    fn bounds(&self) -> PageBounds {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(CONFIG.query.default_limit)
            .clamp(1, CONFIG.query.max_limit);
        PageBounds { page, limit }
    }
}

async fn service() -> Result<WorkboardService, ApiError> {
    let pool = DatabaseManager::main_pool().await?;
    Ok(WorkboardService::new(pool))
}

/// GET /api/workboards
pub async fn list(Extension(principal): Extension<Principal>) -> Result<Json<Value>, ApiError> {
    let service = service().await?;
    let boards = service.repository().list_visible(&principal).await?;
    Ok(Json(json!({ "success": true, "data": boards })))
}

/// POST /api/workboards
pub async fn create(
    Extension(principal): Extension<Principal>,
    Json(request): Json<WorkboardRequest>,
) -> Result<Json<Value>, ApiError> {
    let input = request.validate()?;
    let service = service().await?;
    let board = service.create(&principal, input).await?;
    Ok(Json(json!({ "success": true, "data": board })))
}

/// GET /api/workboards/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Value>, ApiError> {
    let service = service().await?;
    let board = service.get_readable(id, &principal).await?;
    Ok(Json(json!({ "success": true, "data": board })))
}

/// PUT /api/workboards/:id
pub async fn update(
    Path(id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<WorkboardRequest>,
) -> Result<Json<Value>, ApiError> {
    let input = request.validate()?;
    let service = service().await?;
    let board = service.update(id, &principal, input).await?;
    Ok(Json(json!({ "success": true, "data": board })))
}

/// DELETE /api/workboards/:id
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Value>, ApiError> {
    let service = service().await?;
    service.delete(id, &principal).await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/workboards/:id/data
pub async fn data(
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Value>, ApiError> {
    let service = service().await?;
    let board = service.get_readable(id, &principal).await?;
    let page = service.execute(&board, &principal, query.bounds()).await?;
    Ok(Json(json!({ "success": true, "data": page })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> WorkboardRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn rejects_unknown_raw_column_at_the_boundary() {
        let req = request(json!({
            "name": "Pipeline",
            "entity_type": "deals",
            "columns": [{"id": "c1", "field": "password", "label": "P", "type": "raw"}],
        }));
        let err = req.validate().unwrap_err();
        assert!(matches!(err, ApiError::ValidationError { .. }));
    }

    #[test]
    fn accepts_unknown_filter_fields_for_silent_drop() {
        let req = request(json!({
            "name": "Pipeline",
            "entity_type": "deals",
            "filters": [{"field": "no_such", "operator": "eq", "value": 1}],
        }));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn clamps_page_bounds() {
        let bounds = PageQuery { page: Some(0), limit: Some(100_000) }.bounds();
        assert_eq!(bounds.page, 1);
        assert_eq!(bounds.limit, CONFIG.query.max_limit);
        let bounds = PageQuery { page: None, limit: None }.bounds();
        assert_eq!(bounds.limit, CONFIG.query.default_limit);
    }
}
