pub mod app;
pub mod app_config;
pub mod error;
pub mod job;
pub mod time_util;
pub mod trading;

use dotenv::dotenv;

/// 初始化应用环境 (环境变量 + 日志)
pub async fn app_init() -> anyhow::Result<()> {
    dotenv().ok();
    app_config::log::setup_logging()?;
    Ok(())
}
