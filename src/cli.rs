use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use marketplace_config::{AppConfig, ConfigResult, LogLevel, OutputFormat};
use marketplace_domain::{ItemFilter, ItemInput, ItemPatch, ItemStatus, NewUser};
use marketplace_infrastructure::DatabaseManager;
use serde_json::{json, Value};
use uuid::Uuid;

/// 市场条目管理工具
#[derive(Parser, Debug)]
#[command(name = "marketplace")]
#[command(version = "1.0.0")]
#[command(about = "市场条目存储 - 命令行管理工具")]
pub struct CliApp {
    #[command(subcommand)]
    pub command: Commands,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// 覆盖配置中的数据库连接串
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// 日志级别
    #[arg(short, long, global = true)]
    pub log_level: Option<LogLevel>,

    /// 日志格式 (json, text, pretty)
    #[arg(long, global = true)]
    pub log_format: Option<OutputFormat>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 创建缺失的表结构
    Migrate,
    /// 列出市场条目
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        status: Option<ItemStatus>,
    },
    /// 查看条目详情
    Get { id: Uuid },
    /// 创建市场条目
    Create {
        #[command(flatten)]
        fields: ItemFields,
    },
    /// 部分更新条目，只写入给出的字段
    Update {
        id: Uuid,
        #[command(flatten)]
        fields: ItemFields,
        /// 清空为 NULL 的字段，可重复 (name, author, category, introduction, description, job-config, status)
        #[arg(long)]
        clear: Vec<NullableField>,
    },
    /// 更新条目描述
    SetDescription { id: Uuid, description: String },
    /// 更新条目状态
    SetStatus { id: Uuid, status: ItemStatus },
    /// 提交次数加一
    Submit { id: Uuid },
    /// 删除条目
    Delete { id: Uuid },
    /// 列出收藏该条目的用户
    Stars { id: Uuid },
    /// 收藏条目
    Star { id: Uuid, user_id: Uuid },
    /// 取消收藏
    Unstar { id: Uuid, user_id: Uuid },
    /// 创建用户
    CreateUser {
        username: String,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct ItemFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub author: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    /// 可重复；更新时给出任意一个即整体替换标签
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    #[arg(long)]
    pub introduction: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// 任务配置 (JSON格式)
    #[arg(long, value_parser = parse_json)]
    pub job_config: Option<Value>,
    #[arg(long)]
    pub status: Option<ItemStatus>,
}

/// 可以被清空的条目字段
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NullableField {
    Name,
    Author,
    Category,
    Introduction,
    Description,
    JobConfig,
    Status,
}

impl std::str::FromStr for NullableField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(NullableField::Name),
            "author" => Ok(NullableField::Author),
            "category" => Ok(NullableField::Category),
            "introduction" => Ok(NullableField::Introduction),
            "description" => Ok(NullableField::Description),
            "job-config" | "jobConfig" => Ok(NullableField::JobConfig),
            "status" => Ok(NullableField::Status),
            _ => Err(format!("Invalid field: {s}. Tags cannot be cleared, only replaced")),
        }
    }
}

impl From<ItemFields> for ItemInput {
    fn from(fields: ItemFields) -> Self {
        Self {
            name: fields.name,
            author: fields.author,
            category: fields.category,
            tags: fields.tags,
            introduction: fields.introduction,
            description: fields.description,
            job_config: fields.job_config,
            status: fields.status,
        }
    }
}

impl From<ItemFields> for ItemPatch {
    fn from(fields: ItemFields) -> Self {
        let tags = (!fields.tags.is_empty()).then_some(fields.tags);
        Self {
            name: fields.name.map(Some),
            author: fields.author.map(Some),
            category: fields.category.map(Some),
            tags,
            introduction: fields.introduction.map(Some),
            description: fields.description.map(Some),
            job_config: fields.job_config.map(Some),
            status: fields.status.map(Some),
        }
    }
}

fn build_patch(fields: ItemFields, clear: &[NullableField]) -> Result<ItemPatch> {
    let mut patch = ItemPatch::from(fields);
    for field in clear {
        let slot_was_set = match field {
            NullableField::Name => patch.name.replace(None).is_some(),
            NullableField::Author => patch.author.replace(None).is_some(),
            NullableField::Category => patch.category.replace(None).is_some(),
            NullableField::Introduction => patch.introduction.replace(None).is_some(),
            NullableField::Description => patch.description.replace(None).is_some(),
            NullableField::JobConfig => patch.job_config.replace(None).is_some(),
            NullableField::Status => patch.status.replace(None).is_some(),
        };
        if slot_was_set {
            return Err(anyhow!("字段不能同时设置和清空: {field:?}"));
        }
    }
    Ok(patch)
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("解析JSON失败: {e}"))
}

impl CliApp {
    /// 命令行参数覆盖配置文件和环境变量，覆盖后重新校验
    pub fn apply_overrides(&self, config: &mut AppConfig) -> ConfigResult<()> {
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        config.validate()
    }
}

fn found<T: serde::Serialize>(value: Option<T>, id: Uuid) -> Result<Value> {
    let value = value.ok_or_else(|| anyhow!("市场条目不存在: {id}"))?;
    serde_json::to_value(value).context("序列化结果失败")
}

/// 执行子命令，结果以 JSON 返回
pub async fn execute(command: Commands, manager: &DatabaseManager) -> Result<Value> {
    let items = manager.item_repository();
    let users = manager.user_repository();

    match command {
        Commands::Migrate => {
            manager.migrate().await.context("初始化表结构失败")?;
            Ok(json!({ "migrated": true, "database": manager.database_type().to_string() }))
        }
        Commands::List {
            name,
            author,
            category,
            status,
        } => {
            let filter = ItemFilter {
                name,
                author,
                category,
                status,
            };
            let list = items.list(&filter).await.context("查询条目列表失败")?;
            Ok(serde_json::to_value(list)?)
        }
        Commands::Get { id } => found(items.get(id).await?, id),
        Commands::Create { fields } => {
            let id = items
                .create(&ItemInput::from(fields))
                .await
                .context("创建条目失败")?;
            Ok(json!({ "id": id }))
        }
        Commands::Update { id, fields, clear } => {
            let patch = build_patch(fields, &clear)?;
            found(items.update(id, &patch).await?, id)
        }
        Commands::SetDescription { id, description } => {
            found(items.update_description(id, &description).await?, id)
        }
        Commands::SetStatus { id, status } => found(items.update_status(id, status).await?, id),
        Commands::Submit { id } => found(items.update_submits(id).await?, id),
        Commands::Delete { id } => found(items.delete(id).await?, id),
        Commands::Stars { id } => found(items.list_star_users(id).await?, id),
        Commands::Star { id, user_id } => {
            let added = items
                .add_star(id, user_id)
                .await
                .context("收藏失败")?
                .ok_or_else(|| anyhow!("市场条目不存在: {id}"))?;
            Ok(json!({ "itemId": id, "userId": user_id, "added": added }))
        }
        Commands::Unstar { id, user_id } => {
            let removed = items
                .remove_star(id, user_id)
                .await
                .context("取消收藏失败")?
                .ok_or_else(|| anyhow!("市场条目不存在: {id}"))?;
            Ok(json!({ "itemId": id, "userId": user_id, "removed": removed }))
        }
        Commands::CreateUser { username, email } => {
            let user = users
                .create(&NewUser { username, email })
                .await
                .context("创建用户失败")?;
            Ok(serde_json::to_value(user)?)
        }
    }
}
