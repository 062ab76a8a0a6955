//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则。
//! 按 id 操作的方法在记录不存在时返回 `Ok(None)`，错误只代表存储层故障。

use async_trait::async_trait;
use marketplace_errors::MarketplaceResult;
use uuid::Uuid;

use crate::entities::{
    DeletedItem, ItemFilter, ItemInput, ItemPatch, ItemStatus, MarketplaceItem, NewUser, User,
};

/// 市场条目仓储抽象
#[async_trait]
pub trait MarketplaceItemRepository: Send + Sync {
    async fn list(&self, filter: &ItemFilter) -> MarketplaceResult<Vec<MarketplaceItem>>;
    async fn create(&self, input: &ItemInput) -> MarketplaceResult<Uuid>;
    async fn get(&self, id: Uuid) -> MarketplaceResult<Option<MarketplaceItem>>;
    async fn update(&self, id: Uuid, patch: &ItemPatch)
        -> MarketplaceResult<Option<MarketplaceItem>>;
    async fn update_description(
        &self,
        id: Uuid,
        description: &str,
    ) -> MarketplaceResult<Option<MarketplaceItem>>;
    /// 不校验状态流转，任意枚举值都可以覆盖任意旧值
    async fn update_status(
        &self,
        id: Uuid,
        status: ItemStatus,
    ) -> MarketplaceResult<Option<MarketplaceItem>>;
    /// 单条语句原子地将 submits 加一
    async fn update_submits(&self, id: Uuid) -> MarketplaceResult<Option<MarketplaceItem>>;
    async fn delete(&self, id: Uuid) -> MarketplaceResult<Option<DeletedItem>>;
    async fn list_star_users(&self, id: Uuid) -> MarketplaceResult<Option<Vec<User>>>;
    /// 记录收藏；已收藏时返回 `Some(false)`。不会修改 star_number
    async fn add_star(&self, item_id: Uuid, user_id: Uuid) -> MarketplaceResult<Option<bool>>;
    async fn remove_star(&self, item_id: Uuid, user_id: Uuid) -> MarketplaceResult<Option<bool>>;
}

/// 用户仓储抽象（收藏关系的关联目标）
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &NewUser) -> MarketplaceResult<User>;
    async fn get_by_id(&self, id: Uuid) -> MarketplaceResult<Option<User>>;
    async fn get_by_username(&self, username: &str) -> MarketplaceResult<Option<User>>;
}
