// ==========================================
// 专员排班与就绪引擎 - 就绪确认编排 (ReadinessOrchestrator)
// ==========================================
// 状态机 (每个订单): none → pending → {ready | not_ready}
// - none → pending: tick() 在 [预约开始 - 提前量, 预约开始) 内发起确认
// - pending → ready / not_ready: 专员答复, 重复答复无效果, 冲突答复后写覆盖
// - pending 超过预约开始仍无答复: 不自动转移, 由 stale_pending 交给逾期路径
// 红线: 单个订单失败只记录, 不中断整批
// ==========================================

use crate::config::EngineConfig;
use crate::domain::notification::{NotificationKind, NotificationRequest};
use crate::domain::order::Order;
use crate::domain::types::{ReadinessOutcome, ReadinessStatus};
use crate::engine::clock::Clock;
use crate::engine::dispatch::NotificationDispatcher;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::locks::KeyedLocks;
use crate::repository::{OrderRepository, OrderRow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// 单个订单处理失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub order_id: String,
    pub message: String,
}

/// 一次 tick 的处理结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub checks_sent: Vec<String>,
    pub reminders_sent: Vec<String>,
    /// 预约开始后仍在等待答复的订单
    pub stale_pending: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

/// 专员答复的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResponseOutcome {
    /// 已写入
    Recorded,
    /// 与当前状态相同, 无变化
    Unchanged,
    /// 尚未发起确认, 答复被忽略
    NotPending,
}

pub struct ReadinessOrchestrator {
    order_repo: Arc<OrderRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
    order_locks: KeyedLocks,
}

impl ReadinessOrchestrator {
    pub fn new(
        order_repo: Arc<OrderRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            order_repo,
            dispatcher,
            clock,
            config,
            order_locks: KeyedLocks::new(),
        }
    }

    /// 执行一次周期处理: 发起确认 → 催办 → 汇总滞留订单
    ///
    /// 只有候选列表读取失败才返回错误; 单个订单的失败记录在报告中
    pub fn tick(&self) -> EngineResult<TickReport> {
        let now = self.clock.now();
        let mut report = TickReport::default();

        for row in self.order_repo.list_readiness_check_candidates()? {
            let Some(order) = Self::parsed(&mut report, row) else {
                continue;
            };
            match self.send_check_if_due(&order, now) {
                Ok(true) => report.checks_sent.push(order.id.clone()),
                Ok(false) => {}
                Err(e) => Self::record_failure(&mut report, &order.id, e.to_string()),
            }
        }

        for row in self.order_repo.list_pending_readiness()? {
            let Some(order) = Self::parsed(&mut report, row) else {
                continue;
            };
            if self.has_booking_started(&order, now) {
                report.stale_pending.push(order.id.clone());
            }
            match self.send_reminder_if_due(&order, now) {
                Ok(true) => report.reminders_sent.push(order.id.clone()),
                Ok(false) => {}
                Err(e) => Self::record_failure(&mut report, &order.id, e.to_string()),
            }
        }

        if !report.checks_sent.is_empty()
            || !report.reminders_sent.is_empty()
            || !report.failures.is_empty()
        {
            tracing::info!(
                checks_sent = report.checks_sent.len(),
                reminders_sent = report.reminders_sent.len(),
                stale_pending = report.stale_pending.len(),
                failures = report.failures.len(),
                "就绪确认 tick 完成"
            );
        }
        Ok(report)
    }

    fn record_failure(report: &mut TickReport, order_id: &str, message: String) {
        tracing::warn!(
            order_id = %order_id,
            error = %message,
            "就绪确认处理失败, 跳过该订单"
        );
        report.failures.push(ItemFailure {
            order_id: order_id.to_string(),
            message,
        });
    }

    /// 解析失败的订单行记为失败并跳过
    fn parsed(report: &mut TickReport, row: OrderRow) -> Option<Order> {
        match row {
            Ok(order) => Some(order),
            Err(e) => {
                let message = EngineError::from(e.error).to_string();
                Self::record_failure(report, &e.order_id, message);
                None
            }
        }
    }

    fn booking_start(&self, order: &Order) -> Option<DateTime<Utc>> {
        let date = order.booking_date?;
        let time = order.booking_time.as_deref()?;
        self.config.booking_start(date, time)
    }

    fn has_booking_started(&self, order: &Order, now: DateTime<Utc>) -> bool {
        self.booking_start(order).map_or(false, |start| now >= start)
    }

    /// none → pending
    fn send_check_if_due(&self, order: &Order, now: DateTime<Utc>) -> EngineResult<bool> {
        let Some(start) = self.booking_start(order) else {
            return Ok(false);
        };
        if now < start - self.config.readiness_lead() || now >= start {
            return Ok(false);
        }

        let recipients = self.order_repo.accepted_specialist_ids(&order.id)?;
        if recipients.is_empty() {
            tracing::debug!(order_id = %order.id, "无已接单专员, 暂不发起就绪确认");
            return Ok(false);
        }

        self.order_locks
            .with_lock(&order.id, || self.fire_check(order, start, recipients, now))
    }

    fn fire_check(
        &self,
        order: &Order,
        start: DateTime<Utc>,
        recipients: Vec<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<bool> {
        // 条件更新: 并发 tick 只有一方能发起
        if !self.order_repo.mark_readiness_check_sent(&order.id, now)? {
            return Ok(false);
        }
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            booking_start = %start,
            recipients = ?recipients,
            "已发起就绪确认"
        );

        let request = NotificationRequest::new(
            recipients,
            NotificationKind::ReadinessCheck,
            json!({
                "order_id": order.id,
                "order_number": order.order_number,
                "booking_start": start.to_rfc3339(),
            }),
        );
        self.dispatcher
            .dispatch(&request)
            .map_err(|e| EngineError::DispatchFailed(format!("就绪确认: {}", e)))?;
        Ok(true)
    }

    /// pending 状态下按间隔催办, 达到上限后不再催办 (状态保持 pending)
    fn send_reminder_if_due(&self, order: &Order, now: DateTime<Utc>) -> EngineResult<bool> {
        if order.readiness_reminder_count >= self.config.readiness_reminder_max {
            return Ok(false);
        }
        let Some(last) = order
            .readiness_last_reminder_at
            .or(order.readiness_check_sent_at)
        else {
            return Ok(false);
        };
        if now - last < self.config.readiness_reminder_interval() {
            return Ok(false);
        }

        let recipients = self.order_repo.accepted_specialist_ids(&order.id)?;
        if recipients.is_empty() {
            return Ok(false);
        }

        self.order_locks
            .with_lock(&order.id, || self.fire_reminder(order, recipients, now))
    }

    fn fire_reminder(
        &self,
        order: &Order,
        recipients: Vec<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<bool> {
        if !self
            .order_repo
            .record_readiness_reminder(&order.id, order.readiness_reminder_count, now)?
        {
            // 已被答复或被其他 tick 计数
            return Ok(false);
        }
        let reminder_count = order.readiness_reminder_count + 1;
        tracing::info!(order_id = %order.id, reminder_count, "已发送就绪催办");

        let request = NotificationRequest::new(
            recipients,
            NotificationKind::ReadinessReminder,
            json!({
                "order_id": order.id,
                "order_number": order.order_number,
                "reminder_count": reminder_count,
            }),
        );
        self.dispatcher
            .dispatch(&request)
            .map_err(|e| EngineError::DispatchFailed(format!("就绪催办: {}", e)))?;
        Ok(true)
    }

    /// 专员答复就绪结果
    ///
    /// # 参数
    /// - outcome: ready / not_ready
    /// - reason: 仅 not_ready 时保存
    pub fn respond_readiness(
        &self,
        order_id: &str,
        outcome: ReadinessOutcome,
        reason: Option<&str>,
    ) -> EngineResult<ResponseOutcome> {
        self.order_locks
            .with_lock(order_id, || self.record_response(order_id, outcome, reason))
    }

    fn record_response(
        &self,
        order_id: &str,
        outcome: ReadinessOutcome,
        reason: Option<&str>,
    ) -> EngineResult<ResponseOutcome> {
        let order = self
            .order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| EngineError::OrderNotFound(order_id.to_string()))?;

        if order.readiness_status == ReadinessStatus::None
            || order.readiness_check_sent_at.is_none()
        {
            tracing::debug!(order_id = %order_id, "尚未发起就绪确认, 忽略答复");
            return Ok(ResponseOutcome::NotPending);
        }

        let status = outcome.as_status();
        let reason = match outcome {
            ReadinessOutcome::NotReady => reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
            ReadinessOutcome::Ready => None,
        };
        if order.readiness_status == status && order.not_ready_reason == reason {
            return Ok(ResponseOutcome::Unchanged);
        }

        let now = self.clock.now();
        if !self
            .order_repo
            .record_readiness_response(order_id, status, reason.as_deref(), now)?
        {
            return Ok(ResponseOutcome::NotPending);
        }

        tracing::info!(
            order_id = %order_id,
            from = order.readiness_status.as_str(),
            to = status.as_str(),
            "已记录专员就绪答复"
        );
        Ok(ResponseOutcome::Recorded)
    }

    /// 改约/重新预约: 就绪状态回到 none
    pub fn reset_for_rebooking(&self, order_id: &str) -> EngineResult<()> {
        self.order_locks.with_lock(order_id, || {
            if !self.order_repo.reset_readiness(order_id)? {
                return Err(EngineError::OrderNotFound(order_id.to_string()));
            }
            tracing::info!(order_id = %order_id, "就绪状态已重置");
            Ok(())
        })
    }
}
