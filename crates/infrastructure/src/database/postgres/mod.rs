pub mod postgres_marketplace_item_repository;
pub mod postgres_user_repository;

pub use postgres_marketplace_item_repository::PostgresMarketplaceItemRepository;
pub use postgres_user_repository::PostgresUserRepository;

use marketplace_errors::MarketplaceResult;
use sqlx::PgPool;
use tracing::debug;

use crate::error_handling::{
    storage_boundary, EntityKind, OperationContext, RepositoryErrorHelpers, RepositoryOperation,
};

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username VARCHAR(255) NOT NULL UNIQUE,
        email VARCHAR(255),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS marketplace_items (
        id UUID PRIMARY KEY,
        name VARCHAR(255),
        author VARCHAR(255),
        category VARCHAR(255),
        tags TEXT[] NOT NULL DEFAULT '{}',
        introduction VARCHAR(255),
        description TEXT,
        job_config JSONB,
        submits INTEGER NOT NULL DEFAULT 0 CHECK (submits >= 0),
        star_number INTEGER NOT NULL DEFAULT 0 CHECK (star_number >= 0),
        status VARCHAR(20) CHECK (status IN ('pending', 'approved', 'rejected')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS star_relations (
        item_id UUID NOT NULL REFERENCES marketplace_items(id) ON DELETE CASCADE,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (item_id, user_id)
    )
    "#,
];

const INDEXES: [&str; 5] = [
    "CREATE INDEX IF NOT EXISTS idx_marketplace_items_name ON marketplace_items(name)",
    "CREATE INDEX IF NOT EXISTS idx_marketplace_items_author ON marketplace_items(author)",
    "CREATE INDEX IF NOT EXISTS idx_marketplace_items_category ON marketplace_items(category)",
    "CREATE INDEX IF NOT EXISTS idx_marketplace_items_status ON marketplace_items(status)",
    "CREATE INDEX IF NOT EXISTS idx_star_relations_user_id ON star_relations(user_id)",
];

/// 创建表结构（幂等），版本化迁移由运维负责
pub async fn run_migrations(pool: &PgPool) -> MarketplaceResult<()> {
    let context = OperationContext::new(RepositoryOperation::Migrate, EntityKind::Database)
        .with_additional_info("PostgreSQL".to_string());
    debug!("Running PostgreSQL schema bootstrap");

    storage_boundary(context.clone(), async {
        for statement in SCHEMA.iter().chain(INDEXES.iter()) {
            sqlx::query(statement).execute(pool).await?;
        }
        Ok::<_, sqlx::Error>(())
    })
    .await?;

    RepositoryErrorHelpers::log_operation_success(&context, None);
    Ok(())
}
