// ==========================================
// 专员排班与就绪引擎 - 排班领域模型
// ==========================================
// ScheduleEntry: 专员的一段已提交预约区间
// 红线: 同一专员的任意两段区间 (各自按对方缓冲扩展后) 不得重叠
// ==========================================

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// TimeWindow - 半开时间窗 [start, end)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// 创建时间窗; 要求 start < end
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// 结束时刻 + 尾随缓冲
    pub fn end_with_buffer(&self, buffer: Duration) -> DateTime<Utc> {
        self.end + buffer
    }
}

// ==========================================
// ScheduleEntry - 已提交预约
// ==========================================
// 创建后不可原地修改; 取消通过 released_at 作废
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: String,
    pub specialist_id: String,
    pub order_id: String, // 1:1, 每条预约只属于一个订单
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub travel_buffer_minutes: i64,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl ScheduleEntry {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start,
            end: self.end,
        }
    }

    pub fn travel_buffer(&self) -> Duration {
        Duration::minutes(self.travel_buffer_minutes)
    }

    /// 占用截止时刻 (end + 缓冲)
    pub fn blocked_until(&self) -> DateTime<Utc> {
        self.end + self.travel_buffer()
    }

    pub fn is_active(&self) -> bool {
        self.released_at.is_none()
    }

    /// 候选时间窗 (带候选方自己的缓冲) 是否与本预约冲突
    ///
    /// 冲突当且仅当两段按各自缓冲扩展后的区间相交:
    /// - candidate.start < self.end + self.buffer
    /// - self.start < candidate.end + candidate_buffer
    ///
    /// 边界相接 (扩展后 end == start) 不算冲突
    pub fn conflicts_with(&self, candidate: &TimeWindow, candidate_buffer: Duration) -> bool {
        candidate.start < self.blocked_until()
            && self.start < candidate.end_with_buffer(candidate_buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    fn entry(start: DateTime<Utc>, end: DateTime<Utc>, buffer_min: i64) -> ScheduleEntry {
        ScheduleEntry {
            id: "E1".to_string(),
            specialist_id: "S1".to_string(),
            order_id: "O1".to_string(),
            start,
            end,
            travel_buffer_minutes: buffer_min,
            created_at: start,
            released_at: None,
        }
    }

    #[test]
    fn test_time_window_rejects_empty_or_inverted() {
        assert!(TimeWindow::new(at(10, 0), at(10, 0)).is_none());
        assert!(TimeWindow::new(at(11, 0), at(10, 0)).is_none());
        assert!(TimeWindow::new(at(10, 0), at(11, 0)).is_some());
    }

    #[test]
    fn test_candidate_inside_trailing_buffer_conflicts() {
        let e = entry(at(14, 0), at(16, 0), 30);
        let w = TimeWindow::new(at(16, 15), at(17, 0)).unwrap();
        assert!(e.conflicts_with(&w, Duration::minutes(30)));
    }

    #[test]
    fn test_candidate_touching_buffer_end_is_free() {
        let e = entry(at(14, 0), at(16, 0), 30);
        let w = TimeWindow::new(at(16, 30), at(17, 30)).unwrap();
        assert!(!e.conflicts_with(&w, Duration::minutes(30)));
    }

    #[test]
    fn test_candidate_buffer_blocks_following_entry() {
        // 候选 12:00-13:45 + 30 分钟缓冲 → 14:15, 越过 14:00 开始的预约
        let e = entry(at(14, 0), at(16, 0), 0);
        let w = TimeWindow::new(at(12, 0), at(13, 45)).unwrap();
        assert!(e.conflicts_with(&w, Duration::minutes(30)));
        assert!(!e.conflicts_with(&w, Duration::minutes(15)));
    }

    #[test]
    fn test_touching_without_buffers_is_free() {
        let e = entry(at(14, 0), at(16, 0), 0);
        let before = TimeWindow::new(at(12, 0), at(14, 0)).unwrap();
        let after = TimeWindow::new(at(16, 0), at(17, 0)).unwrap();
        assert!(!e.conflicts_with(&before, Duration::zero()));
        assert!(!e.conflicts_with(&after, Duration::zero()));
    }
}
