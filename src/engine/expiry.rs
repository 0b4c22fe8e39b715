// ==========================================
// 专员排班与就绪引擎 - 报价截止通知
// ==========================================
// 报价截止刚过 (回看窗口内) 且尚未通知的订单:
// 通知从未报价的专员, 然后置 notified_expiry
// 通知失败时不置位, 下一轮重试
// ==========================================

use crate::config::EngineConfig;
use crate::domain::notification::{NotificationKind, NotificationRequest};
use crate::domain::order::Order;
use crate::engine::clock::Clock;
use crate::engine::dispatch::NotificationDispatcher;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::readiness::ItemFailure;
use crate::repository::OrderRepository;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpiryReport {
    /// 已处理 (含无人需要通知) 的订单
    pub notified: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

pub struct QuoteExpiryNotifier {
    order_repo: Arc<OrderRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl QuoteExpiryNotifier {
    pub fn new(
        order_repo: Arc<OrderRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            order_repo,
            dispatcher,
            clock,
            config,
        }
    }

    pub fn run_once(&self) -> EngineResult<ExpiryReport> {
        let now = self.clock.now();
        let after = now - self.config.quote_expiry_lookback();
        let mut report = ExpiryReport::default();

        for row in self.order_repo.list_expired_unnotified(after, now)? {
            let (order_id, result) = match row {
                Ok(order) => {
                    let result = self.notify(&order);
                    (order.id, result)
                }
                Err(e) => (e.order_id, Err(EngineError::from(e.error))),
            };
            match result {
                Ok(()) => report.notified.push(order_id),
                Err(e) => {
                    tracing::warn!(
                        order_id = %order_id,
                        error = %e,
                        "报价截止通知失败, 下一轮重试"
                    );
                    report.failures.push(ItemFailure {
                        order_id,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    fn notify(&self, order: &Order) -> EngineResult<()> {
        let recipients = self.order_repo.unquoted_specialist_ids(&order.id)?;
        if !recipients.is_empty() {
            let request = NotificationRequest::new(
                recipients,
                NotificationKind::QuoteExpired,
                json!({
                    "order_id": order.id,
                    "order_number": order.order_number,
                }),
            );
            self.dispatcher
                .dispatch(&request)
                .map_err(|e| EngineError::DispatchFailed(format!("报价截止: {}", e)))?;
        }
        self.order_repo.mark_notified_expiry(&order.id)?;
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            "报价截止已通知"
        );
        Ok(())
    }
}
