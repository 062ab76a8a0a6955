//! Error normalization boundary for repository operations
//!
//! Every repository method runs its storage calls, row decoding included,
//! inside [`storage_boundary`]. It is the only place where a raw
//! [`sqlx::Error`] is turned into a [`MarketplaceError`]: constraint
//! violations become `Validation`, everything else becomes `Storage`, and
//! the original error is kept as the source in both cases.

use chrono::{DateTime, Utc};
use marketplace_errors::{MarketplaceError, MarketplaceResult};
use sqlx::error::ErrorKind;
use sqlx::Error as SqlxError;
use std::fmt;
use std::future::Future;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Operation context for repository operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Create,
    Read,
    Query,
    Update,
    Increment,
    Delete,
    Associate,
    Migrate,
    Connect,
}

impl RepositoryOperation {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            RepositoryOperation::Create
                | RepositoryOperation::Update
                | RepositoryOperation::Increment
                | RepositoryOperation::Delete
                | RepositoryOperation::Associate
        )
    }
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Query => write!(f, "列表查询"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Increment => write!(f, "递增"),
            RepositoryOperation::Delete => write!(f, "删除"),
            RepositoryOperation::Associate => write!(f, "维护收藏关系"),
            RepositoryOperation::Migrate => write!(f, "初始化表结构"),
            RepositoryOperation::Connect => write!(f, "连接"),
        }
    }
}

/// Which kind of record an operation touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    MarketplaceItem,
    User,
    StarRelation,
    Database,
}

/// Context information carried into the boundary for logging and error messages
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: RepositoryOperation,
    pub entity: EntityKind,
    pub item_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub additional_info: Option<String>,
}

impl OperationContext {
    pub fn new(operation: RepositoryOperation, entity: EntityKind) -> Self {
        Self {
            operation,
            entity,
            item_id: None,
            user_id: None,
            name: None,
            timestamp: Utc::now(),
            additional_info: None,
        }
    }

    pub fn with_item_id(mut self, item_id: Uuid) -> Self {
        self.item_id = Some(item_id);
        self
    }

    pub fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_additional_info(mut self, info: String) -> Self {
        self.additional_info = Some(info);
        self
    }

    pub fn entity_description(&self) -> String {
        match self.entity {
            EntityKind::MarketplaceItem => match (&self.item_id, &self.name) {
                (Some(id), Some(name)) => format!("市场条目 '{}' (ID: {})", name, id),
                (Some(id), None) => format!("市场条目 (ID: {})", id),
                (None, Some(name)) => format!("市场条目 '{}'", name),
                (None, None) => "市场条目".to_string(),
            },
            EntityKind::User => match (&self.user_id, &self.name) {
                (Some(id), _) => format!("用户 (ID: {})", id),
                (None, Some(name)) => format!("用户 '{}'", name),
                (None, None) => "用户".to_string(),
            },
            EntityKind::StarRelation => match (&self.item_id, &self.user_id) {
                (Some(item_id), Some(user_id)) => {
                    format!("收藏关系 (条目ID: {}, 用户ID: {})", item_id, user_id)
                }
                (Some(item_id), None) => format!("收藏关系 (条目ID: {})", item_id),
                _ => "收藏关系".to_string(),
            },
            EntityKind::Database => "数据库".to_string(),
        }
    }

    /// Short label stored in the resulting error, e.g. `创建市场条目 'demo'`
    pub fn describe(&self) -> String {
        format!("{}{}", self.operation, self.entity_description())
    }
}

/// Run `operation` and normalize any storage failure into a [`MarketplaceError`]
pub async fn storage_boundary<T, F>(context: OperationContext, operation: F) -> MarketplaceResult<T>
where
    F: Future<Output = Result<T, SqlxError>>,
{
    match operation.await {
        Ok(value) => Ok(value),
        Err(error) => Err(RepositoryErrorHelpers::normalize(&context, error)),
    }
}

/// Enhanced error helpers for repository operations
pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    /// Translate a raw storage error, logging it with the operation context
    #[instrument(skip_all, fields(
        operation = %context.operation,
        item_id = ?context.item_id,
        user_id = ?context.user_id,
        timestamp = %context.timestamp,
    ))]
    pub fn normalize(context: &OperationContext, error: SqlxError) -> MarketplaceError {
        let operation_desc = context.describe();

        let violation = error
            .as_database_error()
            .and_then(|db_error| Self::constraint_message(db_error.kind()));

        if let Some(message) = violation {
            let constraint = error
                .as_database_error()
                .and_then(|db_error| db_error.constraint())
                .unwrap_or("未知")
                .to_string();
            error!(error = %error, constraint = %constraint, "{}时发生约束冲突: {}", operation_desc, message);
            return MarketplaceError::constraint_violation(operation_desc, message, error);
        }

        let detail = match &error {
            SqlxError::PoolClosed => "数据库连接池已关闭".to_string(),
            SqlxError::PoolTimedOut => "数据库连接池超时".to_string(),
            SqlxError::Io(io_error) => format!("发生I/O错误: {}", io_error),
            SqlxError::ColumnDecode { index, .. } => format!("解析字段 {} 失败", index),
            other => format!("发生数据库错误: {}", other),
        };
        error!(error = %error, "{}时{}", operation_desc, detail);

        MarketplaceError::storage(operation_desc, error)
    }

    fn constraint_message(kind: ErrorKind) -> Option<&'static str> {
        match kind {
            ErrorKind::UniqueViolation => Some("记录已存在"),
            ErrorKind::ForeignKeyViolation => Some("引用的记录不存在"),
            ErrorKind::NotNullViolation => Some("必填字段缺失"),
            ErrorKind::CheckViolation => Some("字段取值不合法"),
            _ => None,
        }
    }

    /// Log successful repository operation; writes at info level, reads at debug
    pub fn log_operation_success(context: &OperationContext, additional_info: Option<&str>) {
        let base_msg = format!("{}成功", context.describe());
        let info_suffix = additional_info.or(context.additional_info.as_deref());

        match (context.operation.is_write(), info_suffix) {
            (true, Some(extra)) => info!("{}: {}", base_msg, extra),
            (true, None) => info!("{}", base_msg),
            (false, Some(extra)) => debug!("{}: {}", base_msg, extra),
            (false, None) => debug!("{}", base_msg),
        }
    }

    /// Log a lookup that found nothing; absence is not an error
    pub fn log_not_found(context: &OperationContext) {
        debug!("{}: 记录不存在", context.describe());
    }
}

/// Macro for creating marketplace item operation context easily
#[macro_export]
macro_rules! item_context {
    ($operation:expr) => {
        $crate::error_handling::OperationContext::new(
            $operation,
            $crate::error_handling::EntityKind::MarketplaceItem,
        )
    };
    ($operation:expr, item_id = $item_id:expr) => {
        $crate::error_handling::OperationContext::new(
            $operation,
            $crate::error_handling::EntityKind::MarketplaceItem,
        )
        .with_item_id($item_id)
    };
    ($operation:expr, name = $name:expr) => {
        $crate::error_handling::OperationContext::new(
            $operation,
            $crate::error_handling::EntityKind::MarketplaceItem,
        )
        .with_name($name.to_string())
    };
}

/// Macro for creating star relation operation context easily
#[macro_export]
macro_rules! star_context {
    ($operation:expr, item_id = $item_id:expr) => {
        $crate::error_handling::OperationContext::new(
            $operation,
            $crate::error_handling::EntityKind::StarRelation,
        )
        .with_item_id($item_id)
    };
    ($operation:expr, item_id = $item_id:expr, user_id = $user_id:expr) => {
        $crate::error_handling::OperationContext::new(
            $operation,
            $crate::error_handling::EntityKind::StarRelation,
        )
        .with_item_id($item_id)
        .with_user_id($user_id)
    };
}

/// Macro for creating user operation context easily
#[macro_export]
macro_rules! user_context {
    ($operation:expr, user_id = $user_id:expr) => {
        $crate::error_handling::OperationContext::new(
            $operation,
            $crate::error_handling::EntityKind::User,
        )
        .with_user_id($user_id)
    };
    ($operation:expr, name = $name:expr) => {
        $crate::error_handling::OperationContext::new(
            $operation,
            $crate::error_handling::EntityKind::User,
        )
        .with_name($name.to_string())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_description() {
        let id = Uuid::nil();
        let context = item_context!(RepositoryOperation::Read, item_id = id);
        assert_eq!(context.entity_description(), format!("市场条目 (ID: {})", id));
        assert_eq!(context.describe(), format!("查询市场条目 (ID: {})", id));

        let context = item_context!(RepositoryOperation::Create, name = "demo");
        assert_eq!(context.describe(), "创建市场条目 'demo'");

        let context = star_context!(RepositoryOperation::Associate, item_id = id, user_id = id);
        assert!(context.entity_description().starts_with("收藏关系 (条目ID:"));

        let context = user_context!(RepositoryOperation::Read, name = "alice");
        assert_eq!(context.entity_description(), "用户 'alice'");
    }

    #[test]
    fn test_operation_write_classification() {
        assert!(RepositoryOperation::Create.is_write());
        assert!(RepositoryOperation::Increment.is_write());
        assert!(RepositoryOperation::Associate.is_write());
        assert!(!RepositoryOperation::Read.is_write());
        assert!(!RepositoryOperation::Query.is_write());
    }

    #[test]
    fn test_normalize_non_constraint_error_is_storage() {
        let context = item_context!(RepositoryOperation::Read, item_id = Uuid::nil());
        let error = RepositoryErrorHelpers::normalize(&context, SqlxError::PoolClosed);
        match error {
            MarketplaceError::Storage { operation, source } => {
                assert_eq!(operation, context.describe());
                assert!(matches!(source, SqlxError::PoolClosed));
            }
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_storage_boundary_passes_values_through() {
        let context = item_context!(RepositoryOperation::Query);
        let value = storage_boundary(context, async { Ok::<_, SqlxError>(Some(7)) })
            .await
            .unwrap();
        assert_eq!(value, Some(7));

        let context = item_context!(RepositoryOperation::Read);
        let absent: Option<i32> = storage_boundary(context, async { Ok(None) }).await.unwrap();
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn test_storage_boundary_normalizes_failures() {
        let context = item_context!(RepositoryOperation::Delete, item_id = Uuid::nil());
        let result: MarketplaceResult<()> =
            storage_boundary(context, async { Err(SqlxError::PoolTimedOut) }).await;
        let error = result.unwrap_err();
        assert!(error.is_storage());
        assert!(error.is_retryable());
    }
}
