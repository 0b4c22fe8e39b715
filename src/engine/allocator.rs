// ==========================================
// 专员排班与就绪引擎 - 排班分配器 (ScheduleAllocator)
// ==========================================
// 职责: 预约写入 (检查 + 提交原子化)、空闲时段搜索、预约作废
// 红线: 同一专员的 "复查 + 写入" 必须串行 (专员锁 + IMMEDIATE 事务)
// 锁等待超时按不可用处理, 绝不在不确定时重复预约
// ==========================================

use crate::domain::schedule::{ScheduleEntry, TimeWindow};
use crate::engine::availability::{find_blocking, AvailabilityChecker};
use crate::engine::clock::Clock;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::locks::KeyedLocks;
use crate::repository::{InsertOutcome, OrderRepository};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// 空闲时段搜索结果
///
/// 搜索范围内找不到空闲时段是正常结果, 不是错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotSearch {
    Found(DateTime<Utc>),
    NotFound,
}

impl SlotSearch {
    pub fn found(&self) -> Option<DateTime<Utc>> {
        match self {
            SlotSearch::Found(t) => Some(*t),
            SlotSearch::NotFound => None,
        }
    }
}

// ==========================================
// ScheduleAllocator
// ==========================================
pub struct ScheduleAllocator {
    checker: Arc<AvailabilityChecker>,
    order_repo: Arc<OrderRepository>,
    clock: Arc<dyn Clock>,
    specialist_locks: KeyedLocks,
}

impl ScheduleAllocator {
    pub fn new(
        checker: Arc<AvailabilityChecker>,
        order_repo: Arc<OrderRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            checker,
            order_repo,
            clock,
            specialist_locks: KeyedLocks::new(),
        }
    }

    /// 仅检查, 不写入 (显式缓冲)
    pub fn check_availability(
        &self,
        specialist_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        buffer: Duration,
    ) -> EngineResult<bool> {
        self.checker
            .is_available_with_buffer(specialist_id, window_start, window_end, buffer)
    }

    /// 预约写入
    ///
    /// # 前置条件
    /// 调用方已确认该专员接受了此订单
    ///
    /// # 返回
    /// - Ok(ScheduleEntry): 写入成功的预约
    /// - Err(SlotUnavailable): 与已有预约冲突, 无任何写入
    /// - Err(LockTimeout): 专员锁等待超时
    /// - Err(OrderAlreadyReserved): 订单已有生效预约
    pub fn reserve(
        &self,
        specialist_id: &str,
        order_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        buffer: Duration,
    ) -> EngineResult<ScheduleEntry> {
        let window = AvailabilityChecker::validate_window(window_start, window_end)?;
        self.checker.validate_buffer(buffer)?;
        self.checker.ensure_active_specialist(specialist_id)?;
        if self.order_repo.find_by_id(order_id)?.is_none() {
            return Err(EngineError::OrderNotFound(order_id.to_string()));
        }

        let entry = ScheduleEntry {
            id: Uuid::new_v4().to_string(),
            specialist_id: specialist_id.to_string(),
            order_id: order_id.to_string(),
            start: window.start,
            end: window.end,
            travel_buffer_minutes: buffer.num_minutes(),
            created_at: self.clock.now(),
            released_at: None,
        };

        let timeout = self.checker.config().reserve_lock_timeout();
        let outcome = self
            .specialist_locks
            .try_with_lock_for(specialist_id, timeout, || {
                self.insert_if_unblocked(&entry, &window, buffer)
            })
            .ok_or_else(|| {
                tracing::warn!(
                    specialist_id = %specialist_id,
                    order_id = %order_id,
                    waited_ms = timeout.as_millis() as u64,
                    "专员锁等待超时"
                );
                EngineError::LockTimeout {
                    specialist_id: specialist_id.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                }
            })??;

        match outcome {
            InsertOutcome::Inserted => {
                tracing::info!(
                    entry_id = %entry.id,
                    specialist_id = %specialist_id,
                    order_id = %order_id,
                    start = %entry.start,
                    end = %entry.end,
                    buffer_minutes = entry.travel_buffer_minutes,
                    "预约已写入"
                );
                Ok(entry)
            }
            InsertOutcome::Rejected { blocking_entry_ids } => {
                tracing::info!(
                    specialist_id = %specialist_id,
                    order_id = %order_id,
                    blocking = ?blocking_entry_ids,
                    "时段冲突, 预约未写入"
                );
                Err(EngineError::SlotUnavailable {
                    specialist_id: specialist_id.to_string(),
                    blocking_entry_ids,
                })
            }
            InsertOutcome::OrderAlreadyScheduled { existing_entry_id } => {
                Err(EngineError::OrderAlreadyReserved {
                    order_id: order_id.to_string(),
                    entry_id: existing_entry_id,
                })
            }
        }
    }

    /// 复查冲突并写入 (调用方持有专员锁)
    fn insert_if_unblocked(
        &self,
        entry: &ScheduleEntry,
        window: &TimeWindow,
        buffer: Duration,
    ) -> EngineResult<InsertOutcome> {
        let (lower, upper) = self.checker.search_range(window, buffer);
        let outcome = self.checker.schedule_repo().insert_if_unblocked(
            entry,
            lower,
            upper,
            |existing| {
                find_blocking(existing, window, buffer)
                    .into_iter()
                    .map(|e| e.id.clone())
                    .collect()
            },
        )?;
        Ok(outcome)
    }

    /// 专员锁登记表
    pub fn specialist_locks(&self) -> &KeyedLocks {
        &self.specialist_locks
    }

    /// 按订单预约字段写入预约 (本地日期 + 时段钟点 + 计划时长, 默认路程缓冲)
    pub fn reserve_for_order(
        &self,
        specialist_id: &str,
        order_id: &str,
    ) -> EngineResult<ScheduleEntry> {
        let order = self
            .order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| EngineError::OrderNotFound(order_id.to_string()))?;

        let config = self.checker.config();
        let booking = (order.booking_date, order.booking_time.as_deref(), order.hours_count);
        let window = match booking {
            (Some(date), Some(time), Some(hours)) => config.booking_window(date, time, hours),
            _ => None,
        }
        .ok_or_else(|| EngineError::IncompleteBooking(order_id.to_string()))?;

        self.reserve(
            specialist_id,
            order_id,
            window.start,
            window.end,
            config.default_travel_buffer(),
        )
    }

    /// 搜索第一个空闲时段
    ///
    /// 从 search_from 起按固定步长探测 (步长 = 所需时长, 不低于 min_probe_step),
    /// 返回第一个满足 t + duration <= horizon 且空闲的 t
    /// 判定规则与 is_available 相同 (默认路程缓冲)
    pub fn next_available_slot(
        &self,
        specialist_id: &str,
        duration_needed: Duration,
        search_from: DateTime<Utc>,
        search_horizon: DateTime<Utc>,
    ) -> EngineResult<SlotSearch> {
        if duration_needed <= Duration::zero() {
            return Err(EngineError::InvalidWindow(format!(
                "所需时长必须为正: {} 分钟",
                duration_needed.num_minutes()
            )));
        }
        self.checker.ensure_active_specialist(specialist_id)?;

        let config = self.checker.config();
        let buffer = config.default_travel_buffer();
        let step = duration_needed.max(config.min_probe_step());

        let search_window = match TimeWindow::new(search_from, search_horizon) {
            Some(w) if w.duration() >= duration_needed => w,
            _ => return Ok(SlotSearch::NotFound),
        };

        // 一次性读取整个搜索范围内的预约, 逐个候选在内存中判定
        let (lower, upper) = self.checker.search_range(&search_window, buffer);
        let entries = self
            .checker
            .schedule_repo()
            .find_active_overlapping(specialist_id, lower, upper)?;

        let mut t = search_from;
        let mut probes = 0u32;
        while t + duration_needed <= search_horizon {
            probes += 1;
            let candidate = TimeWindow {
                start: t,
                end: t + duration_needed,
            };
            if find_blocking(&entries, &candidate, buffer).is_empty() {
                tracing::debug!(
                    specialist_id = %specialist_id,
                    slot = %t,
                    probes,
                    "找到空闲时段"
                );
                return Ok(SlotSearch::Found(t));
            }
            t = t + step;
        }

        tracing::debug!(specialist_id = %specialist_id, probes, "搜索范围内无空闲时段");
        Ok(SlotSearch::NotFound)
    }

    /// 作废预约 (幂等)
    ///
    /// # 返回
    /// - true: 本次调用作废了预约
    /// - false: 预约不存在或早已作废
    pub fn release(&self, entry_id: &str) -> EngineResult<bool> {
        let released = self
            .checker
            .schedule_repo()
            .release(entry_id, self.clock.now())?;
        if released {
            tracing::info!(entry_id = %entry_id, "预约已作废");
        } else {
            tracing::debug!(entry_id = %entry_id, "预约不存在或已作废, 忽略");
        }
        Ok(released)
    }
}
