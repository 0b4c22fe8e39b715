// ==========================================
// 专员排班与就绪引擎 - 领域类型定义
// ==========================================
// 序列化格式: snake_case (与 orders 表取值一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 订单生命周期状态 (Order Status)
// ==========================================
// 由外部订单管理方维护,本引擎只读
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,       // 新建
    WaitingQuotes, // 收集报价中
    Upcoming,      // 已确认,待上门
    InProgress,    // 服务中
    Completed,     // 已完成
    Cancelled,     // 已取消
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::WaitingQuotes => "waiting_quotes",
            OrderStatus::Upcoming => "upcoming",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// 解析数据库取值; 兼容前端使用的 `in-progress` 写法
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "pending" => Some(OrderStatus::Pending),
            "waiting_quotes" => Some(OrderStatus::WaitingQuotes),
            "upcoming" => Some(OrderStatus::Upcoming),
            "in_progress" | "in-progress" => Some(OrderStatus::InProgress),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// 已开始或已结束的订单不再参与逾期判断
    pub fn is_started_or_closed(&self) -> bool {
        matches!(
            self,
            OrderStatus::InProgress | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }

    /// 仍在收集报价阶段 (报价截止提醒的适用范围)
    pub fn is_collecting_quotes(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::WaitingQuotes)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 专员就绪状态 (Readiness Status)
// ==========================================
// none → pending → {ready | not_ready}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    None,     // 尚未发起确认
    Pending,  // 已发起,等待专员答复
    Ready,    // 专员确认就绪
    NotReady, // 专员答复未就绪
}

impl ReadinessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadinessStatus::None => "none",
            ReadinessStatus::Pending => "pending",
            ReadinessStatus::Ready => "ready",
            ReadinessStatus::NotReady => "not_ready",
        }
    }

    /// 空值与未知取值一律视为 none
    pub fn from_db(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("pending") => ReadinessStatus::Pending,
            Some("ready") => ReadinessStatus::Ready,
            Some("not_ready") => ReadinessStatus::NotReady,
            _ => ReadinessStatus::None,
        }
    }
}

impl fmt::Display for ReadinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 专员答复 (Readiness Outcome)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessOutcome {
    Ready,
    NotReady,
}

impl ReadinessOutcome {
    pub fn as_status(&self) -> ReadinessStatus {
        match self {
            ReadinessOutcome::Ready => ReadinessStatus::Ready,
            ReadinessOutcome::NotReady => ReadinessStatus::NotReady,
        }
    }
}

impl fmt::Display for ReadinessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_status().as_str())
    }
}
