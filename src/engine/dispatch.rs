// ==========================================
// 专员排班与就绪引擎 - 通知派发
// ==========================================
// 职责: 定义通知派发 trait, 实现依赖倒置
// 说明: 引擎只决定何时、发给谁; 推送/WhatsApp 等传输由外部协作方实现
// ==========================================

use crate::domain::notification::NotificationRequest;
use std::error::Error;

pub type DispatchError = Box<dyn Error + Send + Sync>;

/// 通知派发者 Trait
///
/// # 实现说明
/// - 返回 Ok 表示协作方已受理; 送达保证由协作方负责
/// - 返回 Err 时引擎记录失败, 不中断批处理
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, request: &NotificationRequest) -> Result<(), DispatchError>;
}

/// 空操作派发者
///
/// 用于未接入推送通道的部署 (只记录日志)
#[derive(Debug, Clone, Default)]
pub struct NoOpNotificationDispatcher;

impl NotificationDispatcher for NoOpNotificationDispatcher {
    fn dispatch(&self, request: &NotificationRequest) -> Result<(), DispatchError> {
        tracing::debug!(
            kind = request.kind.as_str(),
            order_id = request.order_id().unwrap_or(""),
            recipients = request.recipient_specialist_ids.len(),
            "NoOpNotificationDispatcher: 跳过通知派发"
        );
        Ok(())
    }
}
