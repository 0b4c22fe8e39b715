// ==========================================
// 专员排班与就绪引擎 - 订单数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 写入范围: 就绪相关字段与 notified_expiry
// (upsert/状态/预约字段写入仅供订单管理方与测试数据准备使用)
// ==========================================

use crate::db::{format_date, format_ts, parse_date, parse_ts};
use crate::domain::order::{Order, OrderAssignment};
use crate::domain::types::{OrderStatus, ReadinessStatus};
use crate::repository::error::{field_error, RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const ORDER_COLUMNS: &str = "o.id, o.order_number, o.status, o.booking_date, o.booking_time, \
     o.hours_count, o.specialist_readiness_status, o.specialist_not_ready_reason, \
     o.readiness_check_sent_at, o.readiness_response_at, o.readiness_reminder_count, \
     o.readiness_last_reminder_at, o.expires_at, o.notified_expiry";

/// 单行订单解析失败 (订单表由外部协作方维护, 可能出现未知取值)
#[derive(Debug)]
pub struct OrderRowError {
    pub order_id: String,
    pub error: RepositoryError,
}

/// 批量查询的单行结果
pub type OrderRow = Result<Order, OrderRowError>;

/// 订单仓储
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
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

    /// 批量读取订单, 逐行解析
    ///
    /// 单行解析失败不影响其他行, 失败行以原始 id 返回
    fn query_orders(
        &self,
        where_clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> RepositoryResult<Vec<OrderRow>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE {where_clause} ORDER BY o.id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, |row| {
                let id: String = row.get(0)?;
                Ok((id, RawOrder::from_row(row)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .map(|(order_id, raw)| {
                raw.map_err(RepositoryError::from)
                    .and_then(RawOrder::into_order)
                    .map_err(|error| OrderRowError { order_id, error })
            })
            .collect())
    }

    // ==========================================
    // 订单方写入 (数据准备)
    // ==========================================

    /// 插入或整体覆盖订单 (不删除行, 关联的指派与预约保持不变)
    pub fn upsert(&self, order: &Order) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO orders (
                id, order_number, status, booking_date, booking_time, hours_count,
                specialist_readiness_status, specialist_not_ready_reason,
                readiness_check_sent_at, readiness_response_at,
                readiness_reminder_count, readiness_last_reminder_at,
                expires_at, notified_expiry
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(id) DO UPDATE SET
                order_number = ?2, status = ?3, booking_date = ?4, booking_time = ?5,
                hours_count = ?6, specialist_readiness_status = ?7,
                specialist_not_ready_reason = ?8, readiness_check_sent_at = ?9,
                readiness_response_at = ?10, readiness_reminder_count = ?11,
                readiness_last_reminder_at = ?12, expires_at = ?13, notified_expiry = ?14
            "#,
            params![
                order.id,
                order.order_number,
                order.status.as_str(),
                order.booking_date.as_ref().map(format_date),
                order.booking_time,
                order.hours_count,
                readiness_to_db(order.readiness_status),
                order.not_ready_reason,
                order.readiness_check_sent_at.as_ref().map(format_ts),
                order.readiness_response_at.as_ref().map(format_ts),
                order.readiness_reminder_count,
                order.readiness_last_reminder_at.as_ref().map(format_ts),
                order.expires_at.as_ref().map(format_ts),
                if order.notified_expiry { 1 } else { 0 },
            ],
        )?;
        Ok(())
    }

    /// 更新订单生命周期状态
    pub fn update_status(&self, order_id: &str, status: OrderStatus) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE orders SET status = ?2 WHERE id = ?1",
            params![order_id, status.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// 改约: 更新预约字段
    pub fn update_booking(
        &self,
        order_id: &str,
        booking_date: NaiveDate,
        booking_time: &str,
        hours_count: f64,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE orders SET booking_date = ?2, booking_time = ?3, hours_count = ?4 \
             WHERE id = ?1",
            params![order_id, format_date(&booking_date), booking_time, hours_count],
        )?;
        Ok(affected > 0)
    }

    /// 写入指派关系 (存在则覆盖)
    pub fn upsert_assignment(&self, assignment: &OrderAssignment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO order_specialists (order_id, specialist_id, is_accepted, quoted_price)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(order_id, specialist_id)
            DO UPDATE SET is_accepted = ?3, quoted_price = ?4
            "#,
            params![
                assignment.order_id,
                assignment.specialist_id,
                if assignment.is_accepted { 1 } else { 0 },
                assignment.quoted_price,
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = ?1");
        let raw = conn
            .query_row(&sql, params![order_id], |row| Ok(RawOrder::from_row(row)))
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(raw?.into_order()?)),
            None => Ok(None),
        }
    }

    /// 已接单专员 id 列表
    pub fn accepted_specialist_ids(&self, order_id: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT specialist_id FROM order_specialists
            WHERE order_id = ?1 AND is_accepted = 1
            ORDER BY specialist_id
            "#,
        )?;
        let ids = stmt
            .query_map(params![order_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// 未报价专员 id 列表
    pub fn unquoted_specialist_ids(&self, order_id: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT specialist_id FROM order_specialists
            WHERE order_id = ?1 AND quoted_price IS NULL
            ORDER BY specialist_id
            "#,
        )?;
        let ids = stmt
            .query_map(params![order_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// 待发起就绪确认的订单
    ///
    /// 条件: status=upcoming, 预约日期/时段齐全, readiness_check_sent_at 为空
    pub fn list_readiness_check_candidates(&self) -> RepositoryResult<Vec<OrderRow>> {
        self.query_orders(
            "o.status = 'upcoming' \
             AND o.booking_date IS NOT NULL \
             AND o.booking_time IS NOT NULL \
             AND o.readiness_check_sent_at IS NULL",
            &[],
        )
    }

    /// 仍在等待专员答复的订单
    pub fn list_pending_readiness(&self) -> RepositoryResult<Vec<OrderRow>> {
        self.query_orders(
            "o.status = 'upcoming' AND o.specialist_readiness_status = 'pending'",
            &[],
        )
    }

    /// 逾期扫描候选
    ///
    /// 条件: 预约日期早于 `booking_date_before`, 未开始/未结束,
    /// 且 (status=upcoming 或 存在已接单专员)
    pub fn list_overdue_candidates(
        &self,
        booking_date_before: NaiveDate,
    ) -> RepositoryResult<Vec<OrderRow>> {
        let before = format_date(&booking_date_before);
        self.query_orders(
            "o.booking_date IS NOT NULL \
             AND o.booking_date < ?1 \
             AND o.status NOT IN ('in_progress', 'in-progress', 'completed', 'cancelled') \
             AND (o.status = 'upcoming' OR EXISTS ( \
                    SELECT 1 FROM order_specialists os \
                    WHERE os.order_id = o.id AND os.is_accepted = 1))",
            &[&before],
        )
    }

    /// 报价截止落在 (after, before) 内且未通知的订单
    pub fn list_expired_unnotified(
        &self,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> RepositoryResult<Vec<OrderRow>> {
        let after = format_ts(&after);
        let before = format_ts(&before);
        self.query_orders(
            "o.status IN ('pending', 'waiting_quotes') \
             AND o.expires_at IS NOT NULL \
             AND o.expires_at < ?1 \
             AND o.expires_at > ?2 \
             AND o.notified_expiry = 0",
            &[&before, &after],
        )
    }

    // ==========================================
    // 就绪字段写入
    // ==========================================

    /// 发起就绪确认 (仅当尚未发起)
    ///
    /// # 返回
    /// - Ok(true): 本次发起
    /// - Ok(false): 已被其他调用发起, 或订单不存在
    pub fn mark_readiness_check_sent(
        &self,
        order_id: &str,
        sent_at: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE orders
            SET readiness_check_sent_at = ?2,
                specialist_readiness_status = 'pending',
                specialist_not_ready_reason = NULL,
                readiness_response_at = NULL,
                readiness_reminder_count = 0,
                readiness_last_reminder_at = NULL
            WHERE id = ?1 AND readiness_check_sent_at IS NULL
            "#,
            params![order_id, format_ts(&sent_at)],
        )?;
        Ok(affected > 0)
    }

    /// 记录专员答复 (仅当已发起确认)
    pub fn record_readiness_response(
        &self,
        order_id: &str,
        status: ReadinessStatus,
        reason: Option<&str>,
        responded_at: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE orders
            SET specialist_readiness_status = ?2,
                specialist_not_ready_reason = ?3,
                readiness_response_at = ?4
            WHERE id = ?1 AND readiness_check_sent_at IS NOT NULL
            "#,
            params![order_id, status.as_str(), reason, format_ts(&responded_at)],
        )?;
        Ok(affected > 0)
    }

    /// 记录一次催办 (按期望的旧计数做条件更新, 防止重复计数)
    pub fn record_readiness_reminder(
        &self,
        order_id: &str,
        expected_count: u32,
        reminded_at: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE orders
            SET readiness_reminder_count = readiness_reminder_count + 1,
                readiness_last_reminder_at = ?3
            WHERE id = ?1
              AND readiness_reminder_count = ?2
              AND specialist_readiness_status = 'pending'
            "#,
            params![order_id, expected_count, format_ts(&reminded_at)],
        )?;
        Ok(affected > 0)
    }

    /// 改约/重新预约: 就绪字段回到初始值
    pub fn reset_readiness(&self, order_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE orders
            SET specialist_readiness_status = 'none',
                specialist_not_ready_reason = NULL,
                readiness_check_sent_at = NULL,
                readiness_response_at = NULL,
                readiness_reminder_count = 0,
                readiness_last_reminder_at = NULL
            WHERE id = ?1
            "#,
            params![order_id],
        )?;
        Ok(affected > 0)
    }

    /// 标记报价截止已通知
    pub fn mark_notified_expiry(&self, order_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE orders SET notified_expiry = 1 WHERE id = ?1 AND notified_expiry = 0",
            params![order_id],
        )?;
        Ok(affected > 0)
    }
}

fn readiness_to_db(status: ReadinessStatus) -> Option<&'static str> {
    match status {
        ReadinessStatus::None => None,
        other => Some(other.as_str()),
    }
}

// ==========================================
// 行映射: 先取原始列, 再做领域解析
// ==========================================
struct RawOrder {
    id: String,
    order_number: String,
    status: String,
    booking_date: Option<String>,
    booking_time: Option<String>,
    hours_count: Option<f64>,
    readiness_status: Option<String>,
    not_ready_reason: Option<String>,
    readiness_check_sent_at: Option<String>,
    readiness_response_at: Option<String>,
    readiness_reminder_count: u32,
    readiness_last_reminder_at: Option<String>,
    expires_at: Option<String>,
    notified_expiry: i64,
}

impl RawOrder {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            order_number: row.get(1)?,
            status: row.get(2)?,
            booking_date: row.get(3)?,
            booking_time: row.get(4)?,
            hours_count: row.get(5)?,
            readiness_status: row.get(6)?,
            not_ready_reason: row.get(7)?,
            readiness_check_sent_at: row.get(8)?,
            readiness_response_at: row.get(9)?,
            readiness_reminder_count: row.get(10)?,
            readiness_last_reminder_at: row.get(11)?,
            expires_at: row.get(12)?,
            notified_expiry: row.get::<_, Option<i64>>(13)?.unwrap_or(0),
        })
    }

    fn into_order(self) -> RepositoryResult<Order> {
        let status =
            OrderStatus::parse(&self.status).ok_or_else(|| field_error("status", &self.status))?;

        let booking_date = match self.booking_date {
            Some(raw) => {
                Some(parse_date(&raw).ok_or_else(|| field_error("booking_date", &raw))?)
            }
            None => None,
        };

        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            status,
            booking_date,
            booking_time: self.booking_time,
            hours_count: self.hours_count,
            readiness_status: ReadinessStatus::from_db(self.readiness_status.as_deref()),
            not_ready_reason: self.not_ready_reason,
            readiness_check_sent_at: opt_ts(
                "readiness_check_sent_at",
                self.readiness_check_sent_at,
            )?,
            readiness_response_at: opt_ts("readiness_response_at", self.readiness_response_at)?,
            readiness_reminder_count: self.readiness_reminder_count,
            readiness_last_reminder_at: opt_ts(
                "readiness_last_reminder_at",
                self.readiness_last_reminder_at,
            )?,
            expires_at: opt_ts("expires_at", self.expires_at)?,
            notified_expiry: self.notified_expiry != 0,
        })
    }
}

fn opt_ts(field: &str, raw: Option<String>) -> RepositoryResult<Option<DateTime<Utc>>> {
    match raw {
        Some(raw) => parse_ts(&raw).map(Some).ok_or_else(|| field_error(field, &raw)),
        None => Ok(None),
    }
}
