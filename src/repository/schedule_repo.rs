// ==========================================
// 专员排班与就绪引擎 - 排班数据仓储 (ScheduleStore)
// ==========================================
// 红线: Repository 不含业务逻辑
// 冲突判定规则由引擎层以闭包形式传入, 仓储只保证 "查询 + 写入" 在同一事务内
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::schedule::ScheduleEntry;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};

const ENTRY_COLUMNS: &str = "id, specialist_id, order_id, start_time, end_time, \
                             travel_buffer_minutes, created_at, released_at";

/// 事务内写入的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// 已写入
    Inserted,
    /// 被已有预约阻挡, 未写入
    Rejected { blocking_entry_ids: Vec<String> },
    /// 订单已有生效预约, 未写入
    OrderAlreadyScheduled { existing_entry_id: String },
}

/// 排班仓储
/// 职责: specialist_schedules 表的 CRUD
pub struct ScheduleEntryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleEntryRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询专员在 (lower, upper) 内有交集的生效预约
    ///
    /// 条件: start_time < upper AND end_time > lower
    /// 调用方负责把缓冲折算进 lower/upper
    pub fn find_active_overlapping(
        &self,
        specialist_id: &str,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> RepositoryResult<Vec<ScheduleEntry>> {
        let conn = self.get_conn()?;
        Self::query_overlapping(&conn, specialist_id, lower, upper)
    }

    fn query_overlapping(
        conn: &Connection,
        specialist_id: &str,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> RepositoryResult<Vec<ScheduleEntry>> {
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM specialist_schedules
            WHERE specialist_id = ?1
              AND released_at IS NULL
              AND start_time < ?2
              AND end_time > ?3
            ORDER BY start_time
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(
                params![specialist_id, format_ts(&upper), format_ts(&lower)],
                map_entry,
            )?
            .collect::<rusqlite::Result<Vec<ScheduleEntry>>>()?;
        Ok(entries)
    }

    /// 在同一 IMMEDIATE 事务内: 复查阻挡预约 → 写入
    ///
    /// # 参数
    /// - entry: 待写入预约
    /// - lower/upper: 复查范围 (同 find_active_overlapping)
    /// - find_blocking: 冲突规则, 返回阻挡预约 id 列表 (空表示可写入)
    pub fn insert_if_unblocked<F>(
        &self,
        entry: &ScheduleEntry,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
        find_blocking: F,
    ) -> RepositoryResult<InsertOutcome>
    where
        F: FnOnce(&[ScheduleEntry]) -> Vec<String>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let existing_for_order: Option<String> = tx
            .query_row(
                "SELECT id FROM specialist_schedules WHERE order_id = ?1 AND released_at IS NULL",
                params![entry.order_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing_entry_id) = existing_for_order {
            return Ok(InsertOutcome::OrderAlreadyScheduled { existing_entry_id });
        }

        let candidates = Self::query_overlapping(&tx, &entry.specialist_id, lower, upper)?;
        let blocking_entry_ids = find_blocking(&candidates);
        if !blocking_entry_ids.is_empty() {
            // 未写入, 事务随 drop 回滚
            return Ok(InsertOutcome::Rejected { blocking_entry_ids });
        }

        tx.execute(
            r#"
            INSERT INTO specialist_schedules (
                id, specialist_id, order_id, start_time, end_time,
                travel_buffer_minutes, created_at, released_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)
            "#,
            params![
                entry.id,
                entry.specialist_id,
                entry.order_id,
                format_ts(&entry.start),
                format_ts(&entry.end),
                entry.travel_buffer_minutes,
                format_ts(&entry.created_at),
            ],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(InsertOutcome::Inserted)
    }

    /// 按 id 查询 (含已作废)
    pub fn find_by_id(&self, entry_id: &str) -> RepositoryResult<Option<ScheduleEntry>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM specialist_schedules WHERE id = ?1");
        let entry = conn
            .query_row(&sql, params![entry_id], map_entry)
            .optional()?;
        Ok(entry)
    }

    /// 查询订单的生效预约
    pub fn find_active_by_order(&self, order_id: &str) -> RepositoryResult<Option<ScheduleEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM specialist_schedules \
             WHERE order_id = ?1 AND released_at IS NULL"
        );
        let entry = conn
            .query_row(&sql, params![order_id], map_entry)
            .optional()?;
        Ok(entry)
    }

    /// 查询专员全部生效预约 (按开始时间排序)
    pub fn list_active_by_specialist(
        &self,
        specialist_id: &str,
    ) -> RepositoryResult<Vec<ScheduleEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM specialist_schedules \
             WHERE specialist_id = ?1 AND released_at IS NULL ORDER BY start_time"
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![specialist_id], map_entry)?
            .collect::<rusqlite::Result<Vec<ScheduleEntry>>>()?;
        Ok(entries)
    }

    /// 作废预约
    ///
    /// # 返回
    /// - Ok(true): 本次作废
    /// - Ok(false): 不存在或已作废
    pub fn release(&self, entry_id: &str, released_at: DateTime<Utc>) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE specialist_schedules SET released_at = ?2 \
             WHERE id = ?1 AND released_at IS NULL",
            params![entry_id, format_ts(&released_at)],
        )?;
        Ok(affected > 0)
    }
}

fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("无效时间戳: {}", raw).into(),
        )
    })
}

fn map_entry(row: &Row<'_>) -> rusqlite::Result<ScheduleEntry> {
    let released_at = match row.get::<_, Option<String>>(7)? {
        Some(_) => Some(ts_column(row, 7)?),
        None => None,
    };
    Ok(ScheduleEntry {
        id: row.get(0)?,
        specialist_id: row.get(1)?,
        order_id: row.get(2)?,
        start: ts_column(row, 3)?,
        end: ts_column(row, 4)?,
        travel_buffer_minutes: row.get(5)?,
        created_at: ts_column(row, 6)?,
        released_at,
    })
}
