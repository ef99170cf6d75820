// ==========================================
// 热处理仿真核心 - 工作者进程入口
// ==========================================
// 职责: 初始化日志/数据库/配置, 启动单工作者作业队列, Ctrl-C 优雅停止
// ==========================================

use anyhow::Context;
use heat_treat_core::config::ConfigManager;
use heat_treat_core::db::{default_db_path, ensure_schema, open_sqlite_connection};
use heat_treat_core::domain::job::{SimulationId, WeldProjectId};
use heat_treat_core::repository::{JobStore, SimulationRepository, SqliteJobStore};
use heat_treat_core::services::{
    HeatTreatmentRunner, JobRunner, JobScheduler, RunnerRegistry, UnconfiguredRunner,
};
use std::sync::{Arc, Mutex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    heat_treat_core::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", heat_treat_core::APP_NAME, heat_treat_core::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args().nth(1).unwrap_or_else(default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let conn = open_sqlite_connection(&db_path)
        .with_context(|| format!("无法打开数据库: {}", db_path))?;
    ensure_schema(&conn).context("数据库建表失败")?;
    let conn = Arc::new(Mutex::new(conn));

    let config_manager = ConfigManager::from_connection(conn.clone())
        .map_err(|e| anyhow::anyhow!("配置管理器初始化失败: {}", e))?;
    let scheduler_config = config_manager
        .scheduler_config()
        .map_err(|e| anyhow::anyhow!("读取调度配置失败: {}", e))?;
    let kinetics_config = config_manager
        .kinetics_config()
        .map_err(|e| anyhow::anyhow!("读取动力学配置失败: {}", e))?;

    let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(conn.clone()));
    let simulations = Arc::new(SimulationRepository::new(conn.clone()));

    let simulation_runner: Arc<dyn JobRunner<SimulationId>> = Arc::new(
        HeatTreatmentRunner::new(store.clone(), simulations, kinetics_config),
    );
    let weld_runner: Arc<dyn JobRunner<WeldProjectId>> =
        Arc::new(UnconfiguredRunner::new("焊接仿真"));
    let registry = RunnerRegistry::new(simulation_runner, weld_runner);

    let scheduler = Arc::new(JobScheduler::new(store, registry, scheduler_config));
    scheduler.start();

    tokio::signal::ctrl_c().await.context("无法监听退出信号")?;
    tracing::info!("收到退出信号，正在停止作业队列...");
    scheduler.stop().await;

    Ok(())
}
