// ==========================================
// 专员排班与就绪引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::engine_config::EngineConfig;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// 全局作用域
const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 的配置值 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 读取并解析单个配置; 无法解析时告警并保留默认值
    fn apply_override<T>(&self, key: &str, target: &mut T) -> ConfigResult<()>
    where
        T: FromStr,
    {
        if let Some(raw) = self.get_global_config_value(key)? {
            match raw.trim().parse::<T>() {
                Ok(value) => *target = value,
                Err(_) => {
                    tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                }
            }
        }
        Ok(())
    }

    /// 加载引擎配置: 默认值 + config_kv 覆写
    pub fn load_engine_config(&self) -> ConfigResult<EngineConfig> {
        let mut cfg = EngineConfig::default();

        self.apply_override(config_keys::UTC_OFFSET_MINUTES, &mut cfg.utc_offset_minutes)?;
        self.apply_override(config_keys::FALLBACK_DAYPART_HOUR, &mut cfg.fallback_daypart_hour)?;
        self.apply_override(
            config_keys::DEFAULT_TRAVEL_BUFFER_MINUTES,
            &mut cfg.default_travel_buffer_minutes,
        )?;
        self.apply_override(
            config_keys::MAX_TRAVEL_BUFFER_MINUTES,
            &mut cfg.max_travel_buffer_minutes,
        )?;
        self.apply_override(config_keys::MIN_PROBE_STEP_MINUTES, &mut cfg.min_probe_step_minutes)?;
        self.apply_override(
            config_keys::RESERVE_LOCK_TIMEOUT_MS,
            &mut cfg.reserve_lock_timeout_ms,
        )?;
        self.apply_override(config_keys::READINESS_LEAD_MINUTES, &mut cfg.readiness_lead_minutes)?;
        self.apply_override(
            config_keys::READINESS_TICK_INTERVAL_SECS,
            &mut cfg.readiness_tick_interval_secs,
        )?;
        self.apply_override(config_keys::READINESS_REMINDER_MAX, &mut cfg.readiness_reminder_max)?;
        self.apply_override(
            config_keys::READINESS_REMINDER_INTERVAL_MINUTES,
            &mut cfg.readiness_reminder_interval_minutes,
        )?;
        self.apply_override(
            config_keys::OVERDUE_SCAN_INTERVAL_SECS,
            &mut cfg.overdue_scan_interval_secs,
        )?;
        self.apply_override(
            config_keys::OVERDUE_REALERT_INTERVAL_SECS,
            &mut cfg.overdue_realert_interval_secs,
        )?;
        self.apply_override(
            config_keys::OVERDUE_MIN_ALERT_SPACING_SECS,
            &mut cfg.overdue_min_alert_spacing_secs,
        )?;
        self.apply_override(config_keys::DEFAULT_SNOOZE_MINUTES, &mut cfg.default_snooze_minutes)?;
        self.apply_override(
            config_keys::QUOTE_EXPIRY_LOOKBACK_MINUTES,
            &mut cfg.quote_expiry_lookback_minutes,
        )?;

        // 时段表为 JSON: {"morning": 9, "afternoon": 15, "evening": 20}
        if let Some(raw) = self.get_global_config_value(config_keys::DAYPART_HOURS)? {
            match serde_json::from_str::<BTreeMap<String, u32>>(&raw) {
                Ok(table) if !table.is_empty() => {
                    cfg.daypart_hours = table
                        .into_iter()
                        .map(|(name, hour)| (name.trim().to_lowercase(), hour))
                        .collect();
                }
                _ => {
                    tracing::warn!(
                        config_key = config_keys::DAYPART_HOURS,
                        raw_value = %raw,
                        "时段表配置格式错误，使用默认时段表"
                    );
                }
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 时区与时段
    pub const UTC_OFFSET_MINUTES: &str = "utc_offset_minutes";
    pub const DAYPART_HOURS: &str = "daypart_hours"; // JSON
    pub const FALLBACK_DAYPART_HOUR: &str = "fallback_daypart_hour";

    // 排班
    pub const DEFAULT_TRAVEL_BUFFER_MINUTES: &str = "default_travel_buffer_minutes";
    pub const MAX_TRAVEL_BUFFER_MINUTES: &str = "max_travel_buffer_minutes";
    pub const MIN_PROBE_STEP_MINUTES: &str = "min_probe_step_minutes";
    pub const RESERVE_LOCK_TIMEOUT_MS: &str = "reserve_lock_timeout_ms";

    // 就绪确认
    pub const READINESS_LEAD_MINUTES: &str = "readiness_lead_minutes";
    pub const READINESS_TICK_INTERVAL_SECS: &str = "readiness_tick_interval_secs";
    pub const READINESS_REMINDER_MAX: &str = "readiness_reminder_max";
    pub const READINESS_REMINDER_INTERVAL_MINUTES: &str = "readiness_reminder_interval_minutes";

    // 逾期升级
    pub const OVERDUE_SCAN_INTERVAL_SECS: &str = "overdue_scan_interval_secs";
    pub const OVERDUE_REALERT_INTERVAL_SECS: &str = "overdue_realert_interval_secs";
    pub const OVERDUE_MIN_ALERT_SPACING_SECS: &str = "overdue_min_alert_spacing_secs";
    pub const DEFAULT_SNOOZE_MINUTES: &str = "default_snooze_minutes";

    // 报价截止
    pub const QUOTE_EXPIRY_LOOKBACK_MINUTES: &str = "quote_expiry_lookback_minutes";
}
