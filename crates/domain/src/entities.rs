use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// 市场条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceItem {
    pub id: Uuid,
    pub name: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub introduction: Option<String>,
    pub description: Option<String>,
    /// 任务配置原样存储，不做任何协议校验
    pub job_config: Option<serde_json::Value>,
    pub submits: i32,
    /// 冗余的收藏计数，本层不会根据 star_relations 自动同步
    pub star_number: i32,
    pub status: Option<ItemStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MarketplaceItem {
    pub fn entity_description(&self) -> String {
        match &self.name {
            Some(name) => format!("市场条目 '{}' (ID: {})", name, self.id),
            None => format!("市场条目 (ID: {})", self.id),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Approved,
    Rejected,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 3] = [ItemStatus::Pending, ItemStatus::Approved, ItemStatus::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Approved => "approved",
            ItemStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "approved" => Ok(ItemStatus::Approved),
            "rejected" => Ok(ItemStatus::Rejected),
            _ => Err(format!(
                "Invalid item status: {s}. Valid values: pending, approved, rejected"
            )),
        }
    }
}

/// 创建市场条目时由调用方提供的字段
///
/// id、计数器和时间戳由存储层生成。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemInput {
    pub name: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub introduction: Option<String>,
    pub description: Option<String>,
    pub job_config: Option<serde_json::Value>,
    pub status: Option<ItemStatus>,
}

/// 部分更新
///
/// 外层 `None` 表示保持不变；可空字段的 `Some(None)` 表示清空为 NULL。
/// JSON 中缺省的键对应前者，显式的 `null` 对应后者。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemPatch {
    #[serde(deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    #[serde(deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub author: Option<Option<String>>,
    #[serde(deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
    /// 标签列不可空，只能整体替换
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub introduction: Option<Option<String>>,
    #[serde(deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub job_config: Option<Option<serde_json::Value>>,
    #[serde(deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub status: Option<Option<ItemStatus>>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self == &ItemPatch::default()
    }
}

/// 键存在时总是 `Some`，值为 `null` 时内层为 `None`
fn explicit_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// 列表查询的等值过滤条件，未设置的字段不做约束
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemFilter {
    pub name: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub status: Option<ItemStatus>,
}

/// 删除成功的确认
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedItem {
    pub id: Uuid,
}

/// 收藏关系的另一端：外部用户实体的最小投影
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
}
