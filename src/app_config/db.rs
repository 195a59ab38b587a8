use std::env;

use once_cell::sync::OnceCell;
use rbatis::RBatis;
use rbdc_mysql::MysqlDriver;

use crate::error::AppError;

static DB_CLIENT: OnceCell<RBatis> = OnceCell::new();

pub async fn init_db() -> Result<&'static RBatis, AppError> {
    let url = env::var("DB_HOST")
        .map_err(|_| AppError::ConfigError("DB_HOST 未配置".to_string()))?;
    let rb = RBatis::new();
    rb.link(MysqlDriver {}, &url)
        .await
        .map_err(|e| AppError::DbError(e.to_string()))?;
    if let Ok(pool) = rb.get_pool() {
        pool.set_max_open_conns(100).await;
    }

    DB_CLIENT
        .set(rb)
        .map_err(|_| AppError::ConfigError("DB_CLIENT 已初始化".to_string()))?;
    Ok(DB_CLIENT.get().expect("DB_CLIENT is not initialized"))
}

pub fn get_db_client() -> &'static RBatis {
    DB_CLIENT.get().expect("DB_CLIENT is not initialized")
}
