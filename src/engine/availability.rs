// ==========================================
// 专员排班与就绪引擎 - 可用性检查 (AvailabilityChecker)
// ==========================================
// 职责: 判断专员在候选时间窗 (含尾随路程缓冲) 内是否空闲
// 红线: 只读; "有冲突" 以 false 返回, 不是错误
// ==========================================

use crate::config::EngineConfig;
use crate::domain::schedule::{ScheduleEntry, TimeWindow};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{ScheduleEntryRepository, SpecialistRepository};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// 纯冲突判定: 返回阻挡候选时间窗的预约
///
/// 双向缓冲: 已有预约按自身缓冲向后扩展, 候选时间窗按 `candidate_buffer` 向后扩展,
/// 两者严格相交才算冲突 (边界相接不冲突)
pub fn find_blocking<'a>(
    entries: &'a [ScheduleEntry],
    window: &TimeWindow,
    candidate_buffer: Duration,
) -> Vec<&'a ScheduleEntry> {
    entries
        .iter()
        .filter(|e| e.is_active() && e.conflicts_with(window, candidate_buffer))
        .collect()
}

pub struct AvailabilityChecker {
    specialist_repo: Arc<SpecialistRepository>,
    schedule_repo: Arc<ScheduleEntryRepository>,
    config: Arc<EngineConfig>,
}

impl AvailabilityChecker {
    pub fn new(
        specialist_repo: Arc<SpecialistRepository>,
        schedule_repo: Arc<ScheduleEntryRepository>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            specialist_repo,
            schedule_repo,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn schedule_repo(&self) -> &Arc<ScheduleEntryRepository> {
        &self.schedule_repo
    }

    /// 专员空闲检查 (候选方使用默认路程缓冲)
    pub fn is_available(
        &self,
        specialist_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> EngineResult<bool> {
        self.is_available_with_buffer(
            specialist_id,
            window_start,
            window_end,
            self.config.default_travel_buffer(),
        )
    }

    /// 专员空闲检查 (显式指定候选方缓冲)
    pub fn is_available_with_buffer(
        &self,
        specialist_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        candidate_buffer: Duration,
    ) -> EngineResult<bool> {
        let window = Self::validate_window(window_start, window_end)?;
        self.validate_buffer(candidate_buffer)?;
        self.ensure_active_specialist(specialist_id)?;

        let blocking = self.blocking_entries(specialist_id, &window, candidate_buffer)?;
        if !blocking.is_empty() {
            tracing::debug!(
                specialist_id = %specialist_id,
                start = %window.start,
                end = %window.end,
                blocking = blocking.len(),
                "候选时间窗被已有预约阻挡"
            );
        }
        Ok(blocking.is_empty())
    }

    /// 读取候选时间窗的阻挡预约 (不做参数校验)
    pub(crate) fn blocking_entries(
        &self,
        specialist_id: &str,
        window: &TimeWindow,
        candidate_buffer: Duration,
    ) -> EngineResult<Vec<ScheduleEntry>> {
        let (lower, upper) = self.search_range(window, candidate_buffer);
        let entries = self
            .schedule_repo
            .find_active_overlapping(specialist_id, lower, upper)?;
        Ok(find_blocking(&entries, window, candidate_buffer)
            .into_iter()
            .cloned()
            .collect())
    }

    /// 可能产生冲突的预约所在范围
    ///
    /// 已有预约的缓冲不超过 max_travel_buffer, 故其结束时刻必晚于 start - max_buffer
    pub(crate) fn search_range(
        &self,
        window: &TimeWindow,
        candidate_buffer: Duration,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            window.start - self.config.max_travel_buffer(),
            window.end_with_buffer(candidate_buffer),
        )
    }

    pub(crate) fn validate_window(
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> EngineResult<TimeWindow> {
        TimeWindow::new(window_start, window_end).ok_or_else(|| {
            EngineError::InvalidWindow(format!(
                "开始时刻必须早于结束时刻: start={}, end={}",
                window_start, window_end
            ))
        })
    }

    pub(crate) fn validate_buffer(&self, buffer: Duration) -> EngineResult<()> {
        if buffer < Duration::zero() || buffer > self.config.max_travel_buffer() {
            return Err(EngineError::InvalidWindow(format!(
                "路程缓冲必须在 [0, {}] 分钟内: {} 分钟",
                self.config.max_travel_buffer_minutes,
                buffer.num_minutes()
            )));
        }
        // 预约记录按整分钟保存缓冲, 不足一分钟的部分会在后续检查中丢失
        if buffer != Duration::minutes(buffer.num_minutes()) {
            return Err(EngineError::InvalidWindow(format!(
                "路程缓冲必须为整分钟: {} 秒",
                buffer.num_seconds()
            )));
        }
        Ok(())
    }

    /// 专员必须存在且处于启用状态
    pub(crate) fn ensure_active_specialist(&self, specialist_id: &str) -> EngineResult<()> {
        match self.specialist_repo.find_by_id(specialist_id)? {
            Some(s) if s.is_active => Ok(()),
            Some(_) => Err(EngineError::InvalidSpecialist {
                specialist_id: specialist_id.to_string(),
                reason: "专员已停用".to_string(),
            }),
            None => Err(EngineError::InvalidSpecialist {
                specialist_id: specialist_id.to_string(),
                reason: "专员不存在".to_string(),
            }),
        }
    }
}
