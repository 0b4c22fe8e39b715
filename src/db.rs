// ==========================================
// 专员排班与就绪引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout, 减少并发写入时的偶发 busy 错误
// - 统一时间戳的存储格式 (字典序 == 时间序)
// ==========================================

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：版本号只用于提示/告警（不做自动迁移）
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 日期列格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表 (幂等)
///
/// 表:
/// - specialists / order_specialists / orders: 外部协作方数据的本地视图
/// - specialist_schedules: 排班存储 (ScheduleStore)
/// - config_kv: 引擎配置
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS specialists (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            order_number TEXT NOT NULL,
            status TEXT NOT NULL,
            booking_date TEXT,
            booking_time TEXT,
            hours_count REAL,
            specialist_readiness_status TEXT,
            specialist_not_ready_reason TEXT,
            readiness_check_sent_at TEXT,
            readiness_response_at TEXT,
            readiness_reminder_count INTEGER NOT NULL DEFAULT 0,
            readiness_last_reminder_at TEXT,
            expires_at TEXT,
            notified_expiry INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_orders_status
          ON orders(status, booking_date);

        CREATE TABLE IF NOT EXISTS order_specialists (
            order_id TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            specialist_id TEXT NOT NULL REFERENCES specialists(id),
            is_accepted INTEGER NOT NULL DEFAULT 0,
            quoted_price REAL,
            PRIMARY KEY (order_id, specialist_id)
        );

        CREATE TABLE IF NOT EXISTS specialist_schedules (
            id TEXT PRIMARY KEY,
            specialist_id TEXT NOT NULL REFERENCES specialists(id),
            order_id TEXT NOT NULL REFERENCES orders(id),
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            travel_buffer_minutes INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            released_at TEXT,
            CHECK (start_time < end_time),
            CHECK (travel_buffer_minutes >= 0)
        );

        CREATE INDEX IF NOT EXISTS idx_schedules_specialist_time
          ON specialist_schedules(specialist_id, start_time)
          WHERE released_at IS NULL;

        CREATE UNIQUE INDEX IF NOT EXISTS uq_schedules_active_order
          ON specialist_schedules(order_id)
          WHERE released_at IS NULL;
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

// ==========================================
// 时间戳 / 日期 编解码
// ==========================================

/// 统一的 UTC 时间戳格式 (毫秒, `Z` 结尾)
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}
