// ==========================================
// 专员排班与就绪引擎 - 引擎层错误类型
// ==========================================
// 分类:
// - InvalidSpecialist / InvalidWindow: 调用方错误, 不重试
// - SlotUnavailable: 预期的业务结果, 由调用方引导用户换时段/换专员
// - LockTimeout: 瞬时错误, 调用方可退避重试一次, 否则按 SlotUnavailable 处理
// - StoreUnavailable: 基础设施故障, 对外表现为可重试的 5xx
// - DispatchFailed: 通知协作方返回失败, 只出现在批处理报告中
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("专员无效: specialist_id={specialist_id}, 原因={reason}")]
    InvalidSpecialist { specialist_id: String, reason: String },

    #[error("时间窗无效: {0}")]
    InvalidWindow(String),

    #[error("时段不可用: specialist_id={specialist_id}, 冲突预约={blocking_entry_ids:?}")]
    SlotUnavailable {
        specialist_id: String,
        blocking_entry_ids: Vec<String>,
    },

    #[error("专员锁等待超时: specialist_id={specialist_id}, waited_ms={waited_ms}")]
    LockTimeout { specialist_id: String, waited_ms: u64 },

    #[error("订单未找到: order_id={0}")]
    OrderNotFound(String),

    #[error("订单已有生效预约: order_id={order_id}, entry_id={entry_id}")]
    OrderAlreadyReserved { order_id: String, entry_id: String },

    #[error("订单预约信息不完整: order_id={0}")]
    IncompleteBooking(String),

    #[error("存储不可用: {0}")]
    StoreUnavailable(String),

    #[error("通知发送失败: {0}")]
    DispatchFailed(String),
}

impl EngineError {
    /// 调用方可以退避后重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::LockTimeout { .. } | EngineError::StoreUnavailable(_)
        )
    }

    /// 按 "时段不可用" 处理 (锁超时保守地视为不可用, 绝不重复预约)
    pub fn is_slot_unavailable(&self) -> bool {
        matches!(
            self,
            EngineError::SlotUnavailable { .. } | EngineError::LockTimeout { .. }
        )
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        EngineError::StoreUnavailable(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
