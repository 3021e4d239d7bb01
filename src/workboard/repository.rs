use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::types::{EntityKind, Principal, SortDirection};

use super::model::{ColumnSpec, FilterSpec, Workboard};

/// Incoming workboard definition, already validated at the HTTP boundary
/// (entity type parses, column/filter counts within caps).
#[derive(Debug, Clone)]
pub struct WorkboardInput {
    pub name: String,
    pub description: Option<String>,
    pub entity_type: EntityKind,
    pub is_shared: bool,
    pub is_default: bool,
    pub columns: Vec<ColumnSpec>,
    pub filters: Vec<FilterSpec>,
    pub sort_column: Option<String>,
    pub sort_direction: SortDirection,
}

pub struct WorkboardRepository {
    pool: PgPool,
}

impl WorkboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, owner: Uuid, input: WorkboardInput) -> Result<Workboard, DatabaseError> {
        let board = sqlx::query_as::<_, Workboard>(
            r#"INSERT INTO "workboards"
               (id, name, description, entity_type, user_id, is_shared, is_default,
                columns, filters, sort_column, sort_direction, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.entity_type.as_str())
        .bind(owner)
        .bind(input.is_shared)
        .bind(input.is_default)
        .bind(Json(&input.columns))
        .bind(Json(&input.filters))
        .bind(&input.sort_column)
        .bind(match input.sort_direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        })
        .fetch_one(&self.pool)
        .await?;
        Ok(board)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Workboard>, DatabaseError> {
        let board = sqlx::query_as::<_, Workboard>(r#"SELECT * FROM "workboards" WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(board)
    }

    /// Boards the principal can see: their own, plus shared boards owned
    /// inside their organization.
    pub async fn list_visible(&self, principal: &Principal) -> Result<Vec<Workboard>, DatabaseError> {
        let boards = match principal.organization_id {
            Some(org_id) => {
                sqlx::query_as::<_, Workboard>(
                    r#"SELECT * FROM "workboards"
                       WHERE user_id = $1
                          OR (is_shared AND user_id IN
                              (SELECT id FROM "users" WHERE organization_id = $2))
                       ORDER BY created_at DESC"#,
                )
                .bind(principal.id)
                .bind(org_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Workboard>(
                    r#"SELECT * FROM "workboards" WHERE user_id = $1 ORDER BY created_at DESC"#,
                )
                .bind(principal.id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(boards)
    }

    /// Column, filter and sort arrays are replaced wholesale.
    pub async fn update(&self, id: Uuid, input: WorkboardInput) -> Result<Workboard, DatabaseError> {
        let board = sqlx::query_as::<_, Workboard>(
            r#"UPDATE "workboards"
               SET name = $2, description = $3, entity_type = $4, is_shared = $5,
                   is_default = $6, columns = $7, filters = $8, sort_column = $9,
                   sort_direction = $10, updated_at = NOW()
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.entity_type.as_str())
        .bind(input.is_shared)
        .bind(input.is_default)
        .bind(Json(&input.columns))
        .bind(Json(&input.filters))
        .bind(&input.sort_column)
        .bind(match input.sort_direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        })
        .fetch_one(&self.pool)
        .await?;
        Ok(board)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query(r#"DELETE FROM "workboards" WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Whether `owner` belongs to `org_id`. Used for shared-board visibility.
    pub async fn owner_in_org(&self, owner: Uuid, org_id: Uuid) -> Result<bool, DatabaseError> {
        let found = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM "users" WHERE id = $1 AND organization_id = $2)"#,
        )
        .bind(owner)
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }
}
