pub mod sqlite_marketplace_item_repository;
pub mod sqlite_user_repository;

pub use sqlite_marketplace_item_repository::SqliteMarketplaceItemRepository;
pub use sqlite_user_repository::SqliteUserRepository;

use marketplace_errors::MarketplaceResult;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error_handling::{
    storage_boundary, EntityKind, OperationContext, RepositoryErrorHelpers, RepositoryOperation,
};

// SQLite 没有原生 UUID/数组/JSON 类型：id 存为文本，tags 与 job_config 存为 JSON 文本
const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS marketplace_items (
        id TEXT PRIMARY KEY,
        name TEXT,
        author TEXT,
        category TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        introduction TEXT,
        description TEXT,
        job_config TEXT,
        submits INTEGER NOT NULL DEFAULT 0 CHECK (submits >= 0),
        star_number INTEGER NOT NULL DEFAULT 0 CHECK (star_number >= 0),
        status TEXT CHECK (status IN ('pending', 'approved', 'rejected')),
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS star_relations (
        item_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (item_id, user_id),
        FOREIGN KEY (item_id) REFERENCES marketplace_items(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
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

/// 创建表结构（幂等）
pub async fn run_migrations(pool: &SqlitePool) -> MarketplaceResult<()> {
    let context = OperationContext::new(RepositoryOperation::Migrate, EntityKind::Database)
        .with_additional_info("SQLite".to_string());
    debug!("Running SQLite schema bootstrap");

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
