// ==========================================
// 专员排班与就绪引擎 - 后台任务主入口
// ==========================================
// 启动就绪确认循环与逾期扫描循环, Ctrl-C 后优雅退出
// 通知派发在本进程中使用空操作实现, 推送通道由嵌入方提供
// ==========================================

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use specialist_scheduling::app::{get_default_db_path, spawn_overdue_loop, spawn_readiness_loop};
use specialist_scheduling::engine::{NoOpNotificationDispatcher, SystemClock};
use specialist_scheduling::{logging, EngineState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", specialist_scheduling::APP_NAME);
    tracing::info!("系统版本: {}", specialist_scheduling::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = EngineState::open(
        db_path,
        Arc::new(SystemClock),
        Arc::new(NoOpNotificationDispatcher),
    )
    .map_err(anyhow::Error::msg)
    .context("无法初始化 EngineState")?;
    let state = Arc::new(state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let readiness = spawn_readiness_loop(state.clone(), shutdown_rx.clone());
    let overdue = spawn_overdue_loop(state, shutdown_rx);

    tokio::signal::ctrl_c()
        .await
        .context("无法监听 Ctrl-C")?;
    tracing::info!("收到退出信号, 正在停止周期任务");

    shutdown_tx.send(true).context("无法发送停止信号")?;
    readiness.await.context("就绪确认循环异常退出")?;
    overdue.await.context("逾期扫描循环异常退出")?;

    tracing::info!("已退出");
    Ok(())
}
