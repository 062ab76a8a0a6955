use anyhow::{Context, Result};
use clap::Parser;
use marketplace::cli::{self, CliApp};
use marketplace::logging::init_logging;
use marketplace_config::AppConfig;
use marketplace_infrastructure::DatabaseManager;
use tracing::{debug, error};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliApp::parse();

    // 加载配置
    let mut config = AppConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载配置失败".to_string(),
    })?;
    cli.apply_overrides(&mut config).context("命令行参数覆盖后的配置无效")?;

    // 初始化日志系统
    init_logging(&config.logging)?;
    debug!("数据库: {}", config.database.url);

    let manager = DatabaseManager::new(&config.database)
        .await
        .context("连接数据库失败")?;

    let result = cli::execute(cli.command, &manager).await;
    manager.close().await;

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!("命令执行失败: {e:#}");
            Err(e)
        }
    }
}
