// ==========================================
// 专员排班与就绪引擎 - 周期任务
// ==========================================
// - 就绪循环: ReadinessOrchestrator::tick + QuoteExpiryNotifier::run_once
// - 逾期循环: OverdueEscalationMonitor::scan
// 引擎调用是同步的 (SQLite), 在 spawn_blocking 中执行
// 关停: watch 通道置 true 后, 循环在下一次等待点退出
// ==========================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::state::EngineState;

/// 就绪确认 + 报价截止通知循环
pub fn spawn_readiness_loop(
    state: Arc<EngineState>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = Duration::from_secs(state.config.readiness_tick_interval_secs);
    spawn_periodic("readiness", period, shutdown, move || {
        match state.readiness.tick() {
            Ok(report) => {
                for id in &report.stale_pending {
                    tracing::debug!(order_id = %id, "预约已开始仍未答复");
                }
            }
            Err(e) => tracing::error!(error = %e, "就绪确认 tick 失败"),
        }
        if let Err(e) = state.expiry.run_once() {
            tracing::error!(error = %e, "报价截止通知失败");
        }
    })
}

/// 逾期扫描循环
pub fn spawn_overdue_loop(
    state: Arc<EngineState>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = Duration::from_secs(state.config.overdue_scan_interval_secs);
    spawn_periodic("overdue", period, shutdown, move || {
        if let Err(e) = state.overdue.scan() {
            tracing::error!(error = %e, "逾期扫描失败");
        }
    })
}

fn spawn_periodic<F>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    job: F,
) -> JoinHandle<()>
where
    F: Fn() + Send + Sync + 'static,
{
    let job = Arc::new(job);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(worker = name, period_secs = period.as_secs(), "周期任务启动");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let job = job.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || (*job)()).await {
                        tracing::error!(worker = name, error = %e, "周期任务执行异常");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(worker = name, "周期任务已停止");
    })
}
