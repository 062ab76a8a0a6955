use async_trait::async_trait;
use chrono::Utc;
use marketplace_domain::{NewUser, User, UserRepository};
use marketplace_errors::MarketplaceResult;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    database::mapping::MappingHelpers,
    error_handling::{storage_boundary, RepositoryErrorHelpers, RepositoryOperation},
    user_context,
};

/// PostgreSQL implementation of UserRepository
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create(&self, user: &NewUser) -> MarketplaceResult<User> {
        let context = user_context!(RepositoryOperation::Create, name = &user.username);

        let created = storage_boundary(context.clone(), async {
            let row = sqlx::query(
                r#"
                INSERT INTO users (id, username, email, created_at)
                VALUES ($1, $2, $3, $4)
                RETURNING id, username, email, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
            MappingHelpers::user_from_pg_row(&row)
        })
        .await?;

        RepositoryErrorHelpers::log_operation_success(&context, Some(&format!("ID: {}", created.id)));
        Ok(created)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get_by_id(&self, user_id: Uuid) -> MarketplaceResult<Option<User>> {
        let context = user_context!(RepositoryOperation::Read, user_id = user_id);

        storage_boundary(context, async {
            let row = sqlx::query("SELECT id, username, email, created_at FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(MappingHelpers::user_from_pg_row).transpose()
        })
        .await
    }

    #[instrument(skip(self))]
    async fn get_by_username(&self, username: &str) -> MarketplaceResult<Option<User>> {
        let context = user_context!(RepositoryOperation::Read, name = username);

        storage_boundary(context, async {
            let row =
                sqlx::query("SELECT id, username, email, created_at FROM users WHERE username = $1")
                    .bind(username)
                    .fetch_optional(&self.pool)
                    .await?;
            row.as_ref().map(MappingHelpers::user_from_pg_row).transpose()
        })
        .await
    }
}
