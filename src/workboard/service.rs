//! Workboard execution: wires the access predicate, filter compiler, query
//! assembler and post-processor together and runs the paired queries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::access;
use crate::database::rows;
use crate::error::ApiError;
use crate::formula::{self, PostFetchContext};
use crate::postprocess;
use crate::query::assembler::{self, PageBounds};
use crate::query::compiler;
use crate::types::Principal;

use super::model::{Workboard, WorkboardPage};
use super::repository::{WorkboardInput, WorkboardRepository};

pub struct WorkboardService {
    pool: PgPool,
    repository: WorkboardRepository,
}

impl WorkboardService {
    pub fn new(pool: PgPool) -> Self {
        let repository = WorkboardRepository::new(pool.clone());
        Self { pool, repository }
    }

    pub fn repository(&self) -> &WorkboardRepository {
        &self.repository
    }

    /// Fetch a board the principal may read. Absent boards are NotFound;
    /// present but invisible boards are Forbidden - the two stay distinct.
    pub async fn get_readable(&self, id: Uuid, principal: &Principal) -> Result<Workboard, ApiError> {
        let board = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Workboard not found"))?;
        if board.user_id == principal.id {
            return Ok(board);
        }
        if board.is_shared {
            if let Some(org_id) = principal.organization_id {
                if self.repository.owner_in_org(board.user_id, org_id).await? {
                    return Ok(board);
                }
            }
        }
        Err(ApiError::forbidden("You do not have access to this workboard"))
    }

    /// Fetch a board the principal may modify: owner only.
    pub async fn get_owned(&self, id: Uuid, principal: &Principal) -> Result<Workboard, ApiError> {
        let board = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Workboard not found"))?;
        if board.user_id != principal.id {
            return Err(ApiError::forbidden("Only the owner can modify this workboard"));
        }
        Ok(board)
    }

    pub async fn create(&self, principal: &Principal, input: WorkboardInput) -> Result<Workboard, ApiError> {
        Ok(self.repository.create(principal.id, input).await?)
    }

    pub async fn update(&self, id: Uuid, principal: &Principal, input: WorkboardInput) -> Result<Workboard, ApiError> {
        self.get_owned(id, principal).await?;
        Ok(self.repository.update(id, input).await?)
    }

    pub async fn delete(&self, id: Uuid, principal: &Principal) -> Result<(), ApiError> {
        self.get_owned(id, principal).await?;
        Ok(self.repository.delete(id).await?)
    }

    /// Run a workboard page request.
    ///
    /// The count and data queries are issued sequentially and are not wrapped
    /// in one transaction; under concurrent writes `total` and the page can
    /// drift slightly. Filters on post-fetch formulas are applied after
    /// LIMIT/OFFSET, so a page can return fewer than `limit` rows even when
    /// more matching rows exist further on; `total` reflects the SQL-level
    /// count either way.
    pub async fn execute(
        &self,
        board: &Workboard,
        principal: &Principal,
        bounds: PageBounds,
    ) -> Result<WorkboardPage, ApiError> {
        let kind = board
            .entity_kind()
            .ok_or_else(|| ApiError::bad_request(format!("Unknown entity type: {}", board.entity_type)))?;

        let access = access::predicate_for(principal, kind.into(), 0);
        let compiled = compiler::compile(&board.filters.0, kind, access.params.len());
        let built = assembler::build(
            kind,
            &board.columns.0,
            board.sort_column.as_deref(),
            board.sort_dir(),
            bounds,
            &access,
            &compiled.fragment,
        );

        if crate::config::CONFIG.query.debug_logging {
            debug!(count = %built.count.sql, data = %built.data.sql, "workboard queries");
        }

        let mut count_query = sqlx::query_scalar::<_, i64>(&built.count.sql);
        for param in &built.count.params {
            count_query = rows::bind_scalar(count_query, param);
        }
        let total = count_query.fetch_one(&self.pool).await.map_err(ApiError::from)?;

        let mut data_query = sqlx::query(&built.data.sql);
        for param in &built.data.params {
            data_query = rows::bind_value(data_query, param);
        }
        let fetched = data_query.fetch_all(&self.pool).await.map_err(ApiError::from)?;
        let fetched_at = Utc::now();
        let items = rows::rows_to_json(fetched);

        // Post-fetch formulas come from columns plus any deferred filters
        // that reference one without a matching column.
        let mut post_names = built.formula_names.clone();
        for filter in &compiled.deferred {
            if formula::is_post_fetch(&filter.field, kind) && !post_names.contains(&filter.field) {
                post_names.push(filter.field.clone());
            }
        }

        let mut ctx = PostFetchContext::new(fetched_at);
        if formula::needs_activity_lookup(&post_names, kind) {
            ctx.last_activity_at = self.fetch_last_activity(&items).await?;
        }

        let items = postprocess::finish(items, &post_names, &compiled.deferred, kind, &ctx);
        let has_more = bounds.page * bounds.limit < total;

        Ok(WorkboardPage { items, page: bounds.page, limit: bounds.limit, total, has_more })
    }

    /// One scoped lookup for the page: most recent activity per fetched deal.
    async fn fetch_last_activity(
        &self,
        items: &[serde_json::Map<String, Value>],
    ) -> Result<HashMap<Uuid, DateTime<Utc>>, ApiError> {
        let ids: Vec<Uuid> = items
            .iter()
            .filter_map(|row| row.get("id"))
            .filter_map(Value::as_str)
            .filter_map(|s| Uuid::parse_str(s).ok())
            .collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            r#"SELECT "deal_id", MAX("occurred_at") AS "last_activity_at"
               FROM "activities" WHERE "deal_id" = ANY($1) GROUP BY "deal_id""#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::from)?;

        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            let deal_id: Uuid = row.try_get("deal_id").map_err(ApiError::from)?;
            let last: DateTime<Utc> = row.try_get("last_activity_at").map_err(ApiError::from)?;
            map.insert(deal_id, last);
        }
        Ok(map)
    }
}
