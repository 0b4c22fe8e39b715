// ==========================================
// 专员排班与就绪引擎 - 订单领域模型 (子集)
// ==========================================
// 订单归外部订单管理方所有
// 本引擎只读预约字段, 只写就绪相关字段与 notified_expiry
// ==========================================

use crate::domain::types::{OrderStatus, ReadinessStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Order - 订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: String, // 人类可读编号
    pub status: OrderStatus,

    // ===== 预约字段 (只读) =====
    pub booking_date: Option<NaiveDate>,
    pub booking_time: Option<String>, // 时段 (morning/afternoon/evening), 非具体钟点
    pub hours_count: Option<f64>,     // 计划服务时长 (小时)

    // ===== 就绪确认 (可写) =====
    pub readiness_status: ReadinessStatus,
    pub not_ready_reason: Option<String>,
    pub readiness_check_sent_at: Option<DateTime<Utc>>,
    pub readiness_response_at: Option<DateTime<Utc>>,
    pub readiness_reminder_count: u32,
    pub readiness_last_reminder_at: Option<DateTime<Utc>>,

    // ===== 报价截止 =====
    pub expires_at: Option<DateTime<Utc>>,
    pub notified_expiry: bool,
}

impl Order {
    /// 新建订单 (就绪字段为初始值), 供订单方与测试构造
    pub fn new(
        id: impl Into<String>,
        order_number: impl Into<String>,
        status: OrderStatus,
    ) -> Self {
        Self {
            id: id.into(),
            order_number: order_number.into(),
            status,
            booking_date: None,
            booking_time: None,
            hours_count: None,
            readiness_status: ReadinessStatus::None,
            not_ready_reason: None,
            readiness_check_sent_at: None,
            readiness_response_at: None,
            readiness_reminder_count: 0,
            readiness_last_reminder_at: None,
            expires_at: None,
            notified_expiry: false,
        }
    }

    pub fn with_booking(
        mut self,
        booking_date: NaiveDate,
        booking_time: impl Into<String>,
        hours_count: f64,
    ) -> Self {
        self.booking_date = Some(booking_date);
        self.booking_time = Some(booking_time.into());
        self.hours_count = Some(hours_count);
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

// ==========================================
// OrderAssignment - 订单与专员的指派关系
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAssignment {
    pub order_id: String,
    pub specialist_id: String,
    pub is_accepted: bool,
    pub quoted_price: Option<f64>, // None 表示未报价
}
