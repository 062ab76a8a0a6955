use thiserror::Error;

#[cfg(test)]
mod tests;

/// 市场条目存储层统一错误类型
///
/// "未找到" 不是错误：按 id 查询不到时各仓储方法返回 `Ok(None)`。
/// 这里的变体只表示存储引擎或调用方输入导致的失败。
#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("存储错误 ({operation}): {source}")]
    Storage {
        operation: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("数据验证失败 ({operation}): {message}")]
    Validation {
        operation: String,
        message: String,
        #[source]
        source: sqlx::Error,
    },
}

pub type MarketplaceResult<T> = Result<T, MarketplaceError>;

impl MarketplaceError {
    pub fn storage<S: Into<String>>(operation: S, source: sqlx::Error) -> Self {
        Self::Storage {
            operation: operation.into(),
            source,
        }
    }

    pub fn constraint_violation<S: Into<String>, M: Into<String>>(
        operation: S,
        message: M,
        source: sqlx::Error,
    ) -> Self {
        Self::Validation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, MarketplaceError::Storage { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, MarketplaceError::Validation { .. })
    }

    /// 是否值得由调用方重试；存储层自身从不重试
    pub fn is_retryable(&self) -> bool {
        match self {
            MarketplaceError::Storage { source, .. } => matches!(
                source,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed
            ),
            MarketplaceError::Validation { .. } => false,
        }
    }
}
