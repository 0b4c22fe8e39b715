// ==========================================
// 专员排班与就绪引擎 - 逾期升级监控 (OverdueEscalationMonitor)
// ==========================================
// 逾期条件:
// - 已确认 (status=upcoming 或 存在已接单专员), 且尚未开始/结束
// - 当前时刻已过预约日 (本地时区) 的 23:59:59
// - 未被静默
// 告警节奏: 首次发现立即告警, 此后按 max(重复间隔, 最小间距) 重复
// 告警计时与静默表一样只在进程内存中
// ==========================================

use crate::config::EngineConfig;
use crate::domain::notification::{NotificationKind, NotificationRequest};
use crate::domain::types::OrderStatus;
use crate::engine::clock::Clock;
use crate::engine::dispatch::NotificationDispatcher;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::readiness::ItemFailure;
use crate::engine::snooze::SnoozeRegistry;
use crate::repository::OrderRepository;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 逾期订单
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueOrder {
    pub order_id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub booking_date: NaiveDate,
    pub accepted_specialist_ids: Vec<String>,
    /// 预约日结束时刻 (本地次日 00:00)
    pub overdue_since: DateTime<Utc>,
}

/// 一次扫描的结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// 当前逾期且未静默的订单
    pub overdue: Vec<OverdueOrder>,
    /// 本次发出告警的订单 id
    pub alerted: Vec<String>,
    /// 满足逾期条件但处于静默期的订单 id
    pub snoozed: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

impl ScanReport {
    pub fn contains(&self, order_id: &str) -> bool {
        self.overdue.iter().any(|o| o.order_id == order_id)
    }
}

pub struct OverdueEscalationMonitor {
    order_repo: Arc<OrderRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
    snoozes: SnoozeRegistry,
    last_alert_at: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl OverdueEscalationMonitor {
    pub fn new(
        order_repo: Arc<OrderRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        config: Arc<EngineConfig>,
    ) -> Self {
        let snoozes = SnoozeRegistry::new(clock.clone());
        Self {
            order_repo,
            dispatcher,
            clock,
            config,
            snoozes,
            last_alert_at: Mutex::new(HashMap::new()),
        }
    }

    /// 按当前时钟扫描
    pub fn scan(&self) -> EngineResult<ScanReport> {
        self.scan_at(self.clock.now())
    }

    /// 扫描逾期订单并按节奏告警
    ///
    /// 已离开逾期集合的订单 (完成/取消/改约) 清除告警计时, 不再告警
    pub fn scan_at(&self, now: DateTime<Utc>) -> EngineResult<ScanReport> {
        let today = self.config.local_date(now);
        let candidates = self.order_repo.list_overdue_candidates(today)?;
        let realert = self.config.overdue_realert_interval();

        let mut report = ScanReport::default();
        let mut still_overdue: HashSet<String> = HashSet::with_capacity(candidates.len());

        for row in candidates {
            let order = match row {
                Ok(order) => order,
                Err(e) => {
                    let message = EngineError::from(e.error).to_string();
                    Self::record_failure(&mut report, &e.order_id, message);
                    continue;
                }
            };
            let Some(booking_date) = order.booking_date else {
                continue;
            };
            let Some(overdue_since) = self.config.end_of_local_day(booking_date) else {
                continue;
            };
            if now < overdue_since {
                continue;
            }
            still_overdue.insert(order.id.clone());

            if self.snoozes.is_snoozed_at(&order.id, now) {
                report.snoozed.push(order.id.clone());
                continue;
            }

            let accepted = match self.order_repo.accepted_specialist_ids(&order.id) {
                Ok(ids) => ids,
                Err(e) => {
                    let message = EngineError::from(e).to_string();
                    Self::record_failure(&mut report, &order.id, message);
                    continue;
                }
            };
            let overdue = OverdueOrder {
                order_id: order.id.clone(),
                order_number: order.order_number.clone(),
                status: order.status,
                booking_date,
                accepted_specialist_ids: accepted,
                overdue_since,
            };

            if self.alert_due(&order.id, now, realert) {
                match self.alert(&overdue, now) {
                    Ok(()) => report.alerted.push(order.id.clone()),
                    Err(e) => Self::record_failure(&mut report, &order.id, e.to_string()),
                }
            }
            report.overdue.push(overdue);
        }

        self.last_alert_at
            .lock()
            .retain(|order_id, _| still_overdue.contains(order_id));
        self.snoozes.purge_expired(now);

        if !report.alerted.is_empty() || !report.failures.is_empty() {
            tracing::info!(
                overdue = report.overdue.len(),
                alerted = report.alerted.len(),
                snoozed = report.snoozed.len(),
                failures = report.failures.len(),
                "逾期扫描完成"
            );
        }
        Ok(report)
    }

    fn alert_due(&self, order_id: &str, now: DateTime<Utc>, realert: Duration) -> bool {
        match self.last_alert_at.lock().get(order_id) {
            Some(last) => now - *last >= realert,
            None => true,
        }
    }

    fn alert(&self, order: &OverdueOrder, now: DateTime<Utc>) -> EngineResult<()> {
        let request = NotificationRequest::new(
            order.accepted_specialist_ids.clone(),
            NotificationKind::OverdueAlert,
            json!({
                "order_id": order.order_id,
                "order_number": order.order_number,
                "booking_date": order.booking_date.to_string(),
                "overdue_since": order.overdue_since.to_rfc3339(),
            }),
        );
        self.dispatcher
            .dispatch(&request)
            .map_err(|e| EngineError::DispatchFailed(format!("逾期告警: {}", e)))?;

        self.last_alert_at.lock().insert(order.order_id.clone(), now);
        tracing::warn!(
            order_id = %order.order_id,
            order_number = %order.order_number,
            booking_date = %order.booking_date,
            "订单逾期未开始"
        );
        Ok(())
    }

    fn record_failure(report: &mut ScanReport, order_id: &str, message: String) {
        tracing::warn!(
            order_id = %order_id,
            error = %message,
            "逾期处理失败, 跳过该订单"
        );
        report.failures.push(ItemFailure {
            order_id: order_id.to_string(),
            message,
        });
    }

    /// 静默订单的逾期告警; duration 为空时使用默认静默时长
    ///
    /// 只影响本进程内的告警, 不修改订单数据
    pub fn snooze(
        &self,
        order_id: &str,
        duration: Option<Duration>,
    ) -> EngineResult<DateTime<Utc>> {
        let duration = duration.unwrap_or_else(|| self.config.default_snooze());
        if duration <= Duration::zero() {
            return Err(EngineError::InvalidWindow(format!(
                "静默时长必须为正: {} 秒",
                duration.num_seconds()
            )));
        }
        let until = self.snoozes.snooze(order_id, duration);
        tracing::info!(order_id = %order_id, until = %until, "逾期告警已静默");
        Ok(until)
    }

    /// 提前解除静默
    pub fn unsnooze(&self, order_id: &str) -> bool {
        self.snoozes.unsnooze(order_id)
    }

    pub fn snoozes(&self) -> &SnoozeRegistry {
        &self.snoozes
    }
}
