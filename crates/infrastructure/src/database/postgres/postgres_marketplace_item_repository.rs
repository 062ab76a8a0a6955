use async_trait::async_trait;
use chrono::Utc;
use marketplace_domain::{
    DeletedItem, ItemFilter, ItemInput, ItemPatch, ItemQueryBuilder, ItemQueryParam, ItemStatus,
    MarketplaceItem, MarketplaceItemRepository, User,
};
use marketplace_errors::MarketplaceResult;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    database::mapping::MappingHelpers,
    error_handling::{storage_boundary, OperationContext, RepositoryErrorHelpers, RepositoryOperation},
    item_context, star_context,
};

pub struct PostgresMarketplaceItemRepository {
    pool: PgPool,
}

impl PostgresMarketplaceItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_param(builder: &mut QueryBuilder<'_, Postgres>, param: ItemQueryParam) {
        match param {
            ItemQueryParam::Text(value) => builder.push_bind(value),
            ItemQueryParam::Tags(tags) => builder.push_bind(tags),
            ItemQueryParam::Json(value) => builder.push_bind(value),
            ItemQueryParam::Status(status) => builder.push_bind(status.as_str()),
            ItemQueryParam::Null => builder.push("NULL"),
        };
    }

    async fn item_exists(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM marketplace_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    fn log_lookup(context: &OperationContext, item: &Option<MarketplaceItem>) {
        match item {
            Some(item) => {
                RepositoryErrorHelpers::log_operation_success(context, Some(&item.entity_description()))
            }
            None => RepositoryErrorHelpers::log_not_found(context),
        }
    }
}

#[async_trait]
impl MarketplaceItemRepository for PostgresMarketplaceItemRepository {
    #[instrument(skip(self, filter))]
    async fn list(&self, filter: &ItemFilter) -> MarketplaceResult<Vec<MarketplaceItem>> {
        let context = item_context!(RepositoryOperation::Query);

        let items = storage_boundary(context.clone(), async {
            let mut builder = QueryBuilder::<Postgres>::new(ItemQueryBuilder::select_prefix());
            for (index, (column, param)) in ItemQueryBuilder::filter_conditions(filter)
                .into_iter()
                .enumerate()
            {
                builder.push(if index == 0 { " WHERE " } else { " AND " });
                builder.push(column).push(" = ");
                Self::push_param(&mut builder, param);
            }

            let rows = builder.build().fetch_all(&self.pool).await?;
            rows.iter()
                .map(MappingHelpers::item_from_pg_row)
                .collect::<Result<Vec<_>, sqlx::Error>>()
        })
        .await?;

        RepositoryErrorHelpers::log_operation_success(&context, Some(&format!("共 {} 条", items.len())));
        Ok(items)
    }

    #[instrument(skip(self, input), fields(item_name = ?input.name))]
    async fn create(&self, input: &ItemInput) -> MarketplaceResult<Uuid> {
        let id = Uuid::new_v4();
        let context = item_context!(RepositoryOperation::Create, item_id = id);
        let now = Utc::now();

        let id = storage_boundary(context.clone(), async {
            let row = sqlx::query(
                r#"
                INSERT INTO marketplace_items (id, name, author, category, tags, introduction, description, job_config, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
                RETURNING id
                "#,
            )
            .bind(id)
            .bind(&input.name)
            .bind(&input.author)
            .bind(&input.category)
            .bind(&input.tags)
            .bind(&input.introduction)
            .bind(&input.description)
            .bind(&input.job_config)
            .bind(input.status.map(|status| status.as_str()))
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
            row.try_get::<Uuid, _>("id")
        })
        .await?;

        RepositoryErrorHelpers::log_operation_success(&context, input.name.as_deref());
        Ok(id)
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn get(&self, id: Uuid) -> MarketplaceResult<Option<MarketplaceItem>> {
        let context = item_context!(RepositoryOperation::Read, item_id = id);

        let item = storage_boundary(context.clone(), async {
            let sql = format!("{} WHERE id = $1", ItemQueryBuilder::select_prefix());
            let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
            row.as_ref().map(MappingHelpers::item_from_pg_row).transpose()
        })
        .await?;

        Self::log_lookup(&context, &item);
        Ok(item)
    }

    #[instrument(skip(self, patch), fields(item_id = %id))]
    async fn update(&self, id: Uuid, patch: &ItemPatch) -> MarketplaceResult<Option<MarketplaceItem>> {
        if patch.is_empty() {
            return self.get(id).await;
        }
        let context = item_context!(RepositoryOperation::Update, item_id = id);

        let item = storage_boundary(context.clone(), async {
            let mut builder = QueryBuilder::<Postgres>::new("UPDATE marketplace_items SET ");
            for (column, param) in ItemQueryBuilder::patch_assignments(patch) {
                builder.push(column).push(" = ");
                Self::push_param(&mut builder, param);
                builder.push(", ");
            }
            builder.push("updated_at = ").push_bind(Utc::now());
            builder.push(" WHERE id = ").push_bind(id);
            builder.push(" RETURNING ").push(ItemQueryBuilder::COLUMNS);

            let row = builder.build().fetch_optional(&self.pool).await?;
            row.as_ref().map(MappingHelpers::item_from_pg_row).transpose()
        })
        .await?;

        Self::log_lookup(&context, &item);
        Ok(item)
    }

    #[instrument(skip(self, description), fields(item_id = %id))]
    async fn update_description(
        &self,
        id: Uuid,
        description: &str,
    ) -> MarketplaceResult<Option<MarketplaceItem>> {
        let context = item_context!(RepositoryOperation::Update, item_id = id)
            .with_additional_info("description".to_string());

        let item = storage_boundary(context.clone(), async {
            let sql = format!(
                "UPDATE marketplace_items SET description = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
                ItemQueryBuilder::COLUMNS
            );
            let row = sqlx::query(&sql)
                .bind(id)
                .bind(description)
                .bind(Utc::now())
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(MappingHelpers::item_from_pg_row).transpose()
        })
        .await?;

        Self::log_lookup(&context, &item);
        Ok(item)
    }

    #[instrument(skip(self), fields(item_id = %id, status = %status))]
    async fn update_status(
        &self,
        id: Uuid,
        status: ItemStatus,
    ) -> MarketplaceResult<Option<MarketplaceItem>> {
        let context = item_context!(RepositoryOperation::Update, item_id = id)
            .with_additional_info(format!("status -> {status}"));

        let item = storage_boundary(context.clone(), async {
            let sql = format!(
                "UPDATE marketplace_items SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
                ItemQueryBuilder::COLUMNS
            );
            let row = sqlx::query(&sql)
                .bind(id)
                .bind(status.as_str())
                .bind(Utc::now())
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(MappingHelpers::item_from_pg_row).transpose()
        })
        .await?;

        Self::log_lookup(&context, &item);
        Ok(item)
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn update_submits(&self, id: Uuid) -> MarketplaceResult<Option<MarketplaceItem>> {
        let context = item_context!(RepositoryOperation::Increment, item_id = id);

        let item = storage_boundary(context.clone(), async {
            let sql = format!(
                "UPDATE marketplace_items SET submits = submits + 1, updated_at = $2 WHERE id = $1 RETURNING {}",
                ItemQueryBuilder::COLUMNS
            );
            let row = sqlx::query(&sql)
                .bind(id)
                .bind(Utc::now())
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(MappingHelpers::item_from_pg_row).transpose()
        })
        .await?;

        Self::log_lookup(&context, &item);
        Ok(item)
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn delete(&self, id: Uuid) -> MarketplaceResult<Option<DeletedItem>> {
        let context = item_context!(RepositoryOperation::Delete, item_id = id);

        let deleted = storage_boundary(context.clone(), async {
            let row = sqlx::query("DELETE FROM marketplace_items WHERE id = $1 RETURNING id")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(|row| row.try_get::<Uuid, _>("id").map(|id| DeletedItem { id }))
                .transpose()
        })
        .await?;

        match deleted {
            Some(_) => RepositoryErrorHelpers::log_operation_success(&context, None),
            None => RepositoryErrorHelpers::log_not_found(&context),
        }
        Ok(deleted)
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn list_star_users(&self, id: Uuid) -> MarketplaceResult<Option<Vec<User>>> {
        let context = star_context!(RepositoryOperation::Read, item_id = id);

        let users = storage_boundary(context.clone(), async {
            let rows = sqlx::query(
                r#"
                SELECT u.id AS user_id, u.username, u.email, u.created_at AS user_created_at
                FROM marketplace_items i
                LEFT JOIN star_relations s ON s.item_id = i.id
                LEFT JOIN users u ON u.id = s.user_id
                WHERE i.id = $1
                ORDER BY s.created_at, u.username
                "#,
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

            if rows.is_empty() {
                return Ok(None);
            }

            let mut users = Vec::with_capacity(rows.len());
            for row in &rows {
                let Some(user_id) = row.try_get::<Option<Uuid>, _>("user_id")? else {
                    continue;
                };
                users.push(User {
                    id: user_id,
                    username: row.try_get("username")?,
                    email: row.try_get("email")?,
                    created_at: row.try_get("user_created_at")?,
                });
            }
            Ok::<_, sqlx::Error>(Some(users))
        })
        .await?;

        match &users {
            Some(users) => RepositoryErrorHelpers::log_operation_success(
                &context,
                Some(&format!("{} 个收藏用户", users.len())),
            ),
            None => RepositoryErrorHelpers::log_not_found(&context),
        }
        Ok(users)
    }

    #[instrument(skip(self), fields(item_id = %item_id, user_id = %user_id))]
    async fn add_star(&self, item_id: Uuid, user_id: Uuid) -> MarketplaceResult<Option<bool>> {
        let context = star_context!(RepositoryOperation::Associate, item_id = item_id, user_id = user_id);

        let added = storage_boundary(context.clone(), async {
            if !self.item_exists(item_id).await? {
                return Ok(None);
            }
            let result = sqlx::query(
                r#"
                INSERT INTO star_relations (item_id, user_id, created_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (item_id, user_id) DO NOTHING
                "#,
            )
            .bind(item_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
            Ok::<_, sqlx::Error>(Some(result.rows_affected() > 0))
        })
        .await?;

        match added {
            Some(true) => RepositoryErrorHelpers::log_operation_success(&context, Some("新增收藏")),
            Some(false) => RepositoryErrorHelpers::log_operation_success(&context, Some("已收藏")),
            None => RepositoryErrorHelpers::log_not_found(&context),
        }
        Ok(added)
    }

    #[instrument(skip(self), fields(item_id = %item_id, user_id = %user_id))]
    async fn remove_star(&self, item_id: Uuid, user_id: Uuid) -> MarketplaceResult<Option<bool>> {
        let context = star_context!(RepositoryOperation::Associate, item_id = item_id, user_id = user_id);

        let removed = storage_boundary(context.clone(), async {
            if !self.item_exists(item_id).await? {
                return Ok(None);
            }
            let result = sqlx::query("DELETE FROM star_relations WHERE item_id = $1 AND user_id = $2")
                .bind(item_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok::<_, sqlx::Error>(Some(result.rows_affected() > 0))
        })
        .await?;

        match removed {
            Some(_) => RepositoryErrorHelpers::log_operation_success(&context, None),
            None => RepositoryErrorHelpers::log_not_found(&context),
        }
        Ok(removed)
    }
}
