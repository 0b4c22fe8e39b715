// ==========================================
// 专员排班与就绪引擎 - 通知派发请求
// ==========================================
// 引擎只决定 "何时" 与 "发给谁", 传输与格式由外部协作方负责
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// 就绪确认请求
    ReadinessCheck,
    /// 就绪确认催办
    ReadinessReminder,
    /// 逾期告警
    OverdueAlert,
    /// 报价截止
    QuoteExpired,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ReadinessCheck => "readiness_check",
            NotificationKind::ReadinessReminder => "readiness_reminder",
            NotificationKind::OverdueAlert => "overdue_alert",
            NotificationKind::QuoteExpired => "quote_expired",
        }
    }
}

/// 通知派发请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub recipient_specialist_ids: Vec<String>,
    pub kind: NotificationKind,
    pub payload: Value,
}

impl NotificationRequest {
    pub fn new(
        recipient_specialist_ids: Vec<String>,
        kind: NotificationKind,
        payload: Value,
    ) -> Self {
        Self {
            recipient_specialist_ids,
            kind,
            payload,
        }
    }

    /// payload 中的 order_id (若有)
    pub fn order_id(&self) -> Option<&str> {
        self.payload.get("order_id").and_then(Value::as_str)
    }
}
