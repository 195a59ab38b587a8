use std::env;

use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, FmtSubscriber};

// 设置日志
pub fn setup_logging() -> anyhow::Result<()> {
    let app_env = env::var("APP_ENV").unwrap_or_else(|_| "LOCAL".to_string());
    if app_env == "LOCAL" {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let info_file = RollingFileAppender::new(Rotation::DAILY, "log_files", "info.log");
        let error_file = RollingFileAppender::new(Rotation::DAILY, "log_files", "error.log");

        let (info_non_blocking, _info_guard) = tracing_appender::non_blocking(info_file);
        let (error_non_blocking, _error_guard) = tracing_appender::non_blocking(error_file);

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(info_non_blocking)
                    .with_filter(EnvFilter::new("info")),
            )
            .with(
                fmt::layer()
                    .with_writer(error_non_blocking)
                    .with_filter(EnvFilter::new("error")),
            )
            .init();

        // guard 随进程存活, 避免丢日志
        std::mem::forget(_info_guard);
        std::mem::forget(_error_guard);
    }
    Ok(())
}
