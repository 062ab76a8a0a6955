use crate::*;

fn foreign_key_violation() -> MarketplaceError {
    MarketplaceError::constraint_violation(
        "收藏市场条目",
        "引用的记录不存在",
        sqlx::Error::RowNotFound,
    )
}

#[test]
fn test_marketplace_error_display() {
    let storage_error = MarketplaceError::storage("查询市场条目", sqlx::Error::PoolClosed);
    assert!(storage_error
        .to_string()
        .starts_with("存储错误 (查询市场条目): "));

    assert_eq!(
        foreign_key_violation().to_string(),
        "数据验证失败 (收藏市场条目): 引用的记录不存在"
    );
}

#[test]
fn test_errors_keep_original_cause() {
    use std::error::Error;

    let error = MarketplaceError::storage("删除市场条目", sqlx::Error::PoolTimedOut);
    let source = error.source().expect("storage error must expose its cause");
    assert!(matches!(
        source.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::PoolTimedOut)
    ));

    let error = foreign_key_violation();
    let source = error.source().expect("constraint violation must expose its cause");
    assert!(matches!(
        source.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::RowNotFound)
    ));
}

#[test]
fn test_error_classification() {
    let storage = MarketplaceError::storage("查询", sqlx::Error::PoolClosed);
    assert!(storage.is_storage());
    assert!(!storage.is_validation());

    let validation = foreign_key_violation();
    assert!(validation.is_validation());
    assert!(!validation.is_storage());
}

#[test]
fn test_is_retryable() {
    assert!(MarketplaceError::storage("查询", sqlx::Error::PoolTimedOut).is_retryable());
    assert!(MarketplaceError::storage(
        "查询",
        sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset"
        ))
    )
    .is_retryable());

    assert!(!MarketplaceError::storage("查询", sqlx::Error::PoolClosed).is_retryable());
    assert!(!foreign_key_violation().is_retryable());
}
