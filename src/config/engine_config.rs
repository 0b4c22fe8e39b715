// ==========================================
// 专员排班与就绪引擎 - 引擎配置
// ==========================================
// 职责: 引擎全部可调参数 + 本地时区/时段换算
// 说明: 时段 (booking_time) 是查表得到的代表钟点, 不是连续时间
// ==========================================

use crate::domain::schedule::TimeWindow;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 默认时段表
pub fn default_daypart_hours() -> BTreeMap<String, u32> {
    let mut table = BTreeMap::new();
    table.insert("morning".to_string(), 9);
    table.insert("afternoon".to_string(), 15);
    table.insert("evening".to_string(), 20);
    table
}

// ==========================================
// EngineConfig
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // ===== 时区与时段 =====
    pub utc_offset_minutes: i32,
    pub daypart_hours: BTreeMap<String, u32>,
    pub fallback_daypart_hour: u32,

    // ===== 排班 =====
    pub default_travel_buffer_minutes: i64,
    pub max_travel_buffer_minutes: i64,
    pub min_probe_step_minutes: i64,
    pub reserve_lock_timeout_ms: u64,

    // ===== 就绪确认 =====
    pub readiness_lead_minutes: i64,
    pub readiness_tick_interval_secs: u64,
    pub readiness_reminder_max: u32,
    pub readiness_reminder_interval_minutes: i64,

    // ===== 逾期升级 =====
    pub overdue_scan_interval_secs: u64,
    pub overdue_realert_interval_secs: i64,
    pub overdue_min_alert_spacing_secs: i64,
    pub default_snooze_minutes: i64,

    // ===== 报价截止 =====
    pub quote_expiry_lookback_minutes: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            daypart_hours: default_daypart_hours(),
            fallback_daypart_hour: 12,
            default_travel_buffer_minutes: 120,
            max_travel_buffer_minutes: 24 * 60,
            min_probe_step_minutes: 30,
            reserve_lock_timeout_ms: 2_000,
            readiness_lead_minutes: 60,
            readiness_tick_interval_secs: 5,
            readiness_reminder_max: 3,
            readiness_reminder_interval_minutes: 5,
            overdue_scan_interval_secs: 30,
            overdue_realert_interval_secs: 15,
            overdue_min_alert_spacing_secs: 15,
            default_snooze_minutes: 3,
            quote_expiry_lookback_minutes: 2,
        }
    }
}

impl EngineConfig {
    /// 参数合法性检查
    pub fn validate(&self) -> Result<(), String> {
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(format!("utc_offset_minutes 超出范围: {}", self.utc_offset_minutes));
        }
        if let Some((name, hour)) = self.daypart_hours.iter().find(|(_, h)| **h > 23) {
            return Err(format!("时段 {} 的钟点超出范围: {}", name, hour));
        }
        if self.fallback_daypart_hour > 23 {
            return Err(format!("fallback_daypart_hour 超出范围: {}", self.fallback_daypart_hour));
        }
        if self.default_travel_buffer_minutes < 0
            || self.default_travel_buffer_minutes > self.max_travel_buffer_minutes
        {
            return Err(format!(
                "default_travel_buffer_minutes 必须在 [0, {}] 内: {}",
                self.max_travel_buffer_minutes, self.default_travel_buffer_minutes
            ));
        }

        let positive: [(&str, i64); 8] = [
            ("min_probe_step_minutes", self.min_probe_step_minutes),
            ("readiness_lead_minutes", self.readiness_lead_minutes),
            ("readiness_reminder_interval_minutes", self.readiness_reminder_interval_minutes),
            ("overdue_realert_interval_secs", self.overdue_realert_interval_secs),
            ("default_snooze_minutes", self.default_snooze_minutes),
            ("quote_expiry_lookback_minutes", self.quote_expiry_lookback_minutes),
            ("readiness_tick_interval_secs", self.readiness_tick_interval_secs as i64),
            ("overdue_scan_interval_secs", self.overdue_scan_interval_secs as i64),
        ];
        if let Some((key, value)) = positive.iter().find(|(_, v)| *v <= 0) {
            return Err(format!("{} 必须为正数: {}", key, value));
        }
        if self.overdue_min_alert_spacing_secs < 0 {
            return Err(format!(
                "overdue_min_alert_spacing_secs 不能为负: {}",
                self.overdue_min_alert_spacing_secs
            ));
        }
        Ok(())
    }

    // ==========================================
    // 时长换算
    // ==========================================

    pub fn default_travel_buffer(&self) -> Duration {
        Duration::minutes(self.default_travel_buffer_minutes)
    }

    pub fn max_travel_buffer(&self) -> Duration {
        Duration::minutes(self.max_travel_buffer_minutes)
    }

    pub fn min_probe_step(&self) -> Duration {
        Duration::minutes(self.min_probe_step_minutes)
    }

    pub fn reserve_lock_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.reserve_lock_timeout_ms)
    }

    pub fn readiness_lead(&self) -> Duration {
        Duration::minutes(self.readiness_lead_minutes)
    }

    pub fn readiness_reminder_interval(&self) -> Duration {
        Duration::minutes(self.readiness_reminder_interval_minutes)
    }

    /// 实际的重复告警间隔: 不低于最小告警间距
    pub fn overdue_realert_interval(&self) -> Duration {
        Duration::seconds(
            self.overdue_realert_interval_secs
                .max(self.overdue_min_alert_spacing_secs),
        )
    }

    pub fn default_snooze(&self) -> Duration {
        Duration::minutes(self.default_snooze_minutes)
    }

    pub fn quote_expiry_lookback(&self) -> Duration {
        Duration::minutes(self.quote_expiry_lookback_minutes)
    }

    // ==========================================
    // 本地时区 / 时段
    // ==========================================

    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// 时段 → 本地代表钟点; 未知时段使用 fallback
    pub fn daypart_hour(&self, booking_time: &str) -> u32 {
        let key = booking_time.trim().to_lowercase();
        match self.daypart_hours.get(&key) {
            Some(hour) => *hour,
            None => {
                tracing::debug!(booking_time = %booking_time, "未知时段, 使用默认钟点");
                self.fallback_daypart_hour
            }
        }
    }

    fn local_to_utc(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.local_offset()
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// 预约开始时刻 (UTC)
    pub fn booking_start(
        &self,
        booking_date: NaiveDate,
        booking_time: &str,
    ) -> Option<DateTime<Utc>> {
        let hour = self.daypart_hour(booking_time);
        self.local_to_utc(booking_date, NaiveTime::from_hms_opt(hour, 0, 0)?)
    }

    /// 预约时间窗 = 开始时刻 + 计划时长
    pub fn booking_window(
        &self,
        booking_date: NaiveDate,
        booking_time: &str,
        hours_count: f64,
    ) -> Option<TimeWindow> {
        if !hours_count.is_finite() || hours_count <= 0.0 {
            return None;
        }
        let start = self.booking_start(booking_date, booking_time)?;
        let minutes = (hours_count * 60.0).round() as i64;
        let end = start.checked_add_signed(Duration::try_minutes(minutes)?)?;
        TimeWindow::new(start, end)
    }

    /// 预约日在本地时区的结束时刻 (次日 00:00, UTC 表示)
    pub fn end_of_local_day(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.local_to_utc(date.succ_opt()?, NaiveTime::from_hms_opt(0, 0, 0)?)
    }

    /// UTC 时刻对应的本地日期
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.local_offset()).date_naive()
    }
}
