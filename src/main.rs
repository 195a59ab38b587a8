use std::sync::Arc;

use tracing::{error, info};

use trading_race::app::bootstrap;
use trading_race::app_config::env::{env_is_true, env_usize_or};
use trading_race::app_config::shutdown::ShutdownSignal;
use trading_race::app_config::db;
use trading_race::job::{agent_cycle_job, snapshot_job, TaskScheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    trading_race::app_init().await?;

    // 内存模式用于本地演练, 否则连接 MySQL
    if !env_is_true("USE_MEMORY_STORE", false) {
        db::init_db().await?;
    }

    let services = bootstrap::build_services().await?;
    let shutdown = Arc::new(ShutdownSignal::new());

    let mut symbols: Vec<String> = services.config.allowed_assets.iter().cloned().collect();
    symbols.sort();

    // 启动前先同步一次行情, 避免首轮周期无价可用
    if env_is_true("IS_RUN_SYNC_DATA_JOB", true) {
        if let Err(e) = services.ingest_service.ingest_all(&symbols, 24).await {
            error!("初始行情同步失败: {}", e);
        }
    }

    let mut scheduler = TaskScheduler::new();

    // 行情同步周期任务
    {
        let ingest = services.ingest_service.clone();
        let symbols = symbols.clone();
        let interval = env_usize_or("MARKET_SYNC_INTERVAL_MS", 300_000) as u64;
        scheduler.add_periodic_task("market_sync_job".to_string(), interval, move || {
            let ingest = Arc::clone(&ingest);
            let symbols = symbols.clone();
            async move {
                if let Err(e) = ingest.ingest_all(&symbols, 24).await {
                    error!("行情同步任务失败: {}", e);
                }
            }
        });
    }

    // 代理决策周期任务
    {
        let runner = services.runner.clone();
        let shutdown = Arc::clone(&shutdown);
        let interval = env_usize_or("AGENT_CYCLE_INTERVAL_MS", 300_000) as u64;
        scheduler.add_periodic_task("agent_cycle_job".to_string(), interval, move || {
            let runner = Arc::clone(&runner);
            let token = shutdown.token();
            async move {
                agent_cycle_job::run_agent_cycle_job(runner, token).await;
            }
        });
    }

    // 权益快照周期任务
    {
        let equity_service = services.equity_service.clone();
        let agents = services.agents.clone();
        let interval = env_usize_or("SNAPSHOT_INTERVAL_MS", 3_600_000) as u64;
        scheduler.add_periodic_task("snapshot_job".to_string(), interval, move || {
            let equity_service = Arc::clone(&equity_service);
            let agents = Arc::clone(&agents);
            async move {
                snapshot_job::run_snapshot_job(equity_service, agents).await;
            }
        });
    }

    // 捕捉Ctrl+C信号以平滑关闭
    tokio::signal::ctrl_c().await?;
    info!("收到退出信号, 开始平滑关闭");
    shutdown.cancel();
    scheduler.shutdown().await;

    Ok(())
}
