// ==========================================
// 专员排班与就绪引擎 - 逾期告警静默表
// ==========================================
// 订单 id → 静默截止时刻
// 仅存在于当前进程内存: 不落库, 重启即丢失, 多实例之间互不共享
// 静默只压制告警, 从不修改订单数据
// ==========================================

use crate::engine::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct SnoozeRegistry {
    clock: Arc<dyn Clock>,
    until: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SnoozeRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            until: Mutex::new(HashMap::new()),
        }
    }

    /// 静默到 now + duration, 覆盖已有的静默; 返回截止时刻
    pub fn snooze(&self, order_id: &str, duration: Duration) -> DateTime<Utc> {
        let until = self.clock.now() + duration;
        self.until.lock().insert(order_id.to_string(), until);
        until
    }

    /// 提前解除; 返回是否存在未过期的静默
    pub fn unsnooze(&self, order_id: &str) -> bool {
        let now = self.clock.now();
        self.until
            .lock()
            .remove(order_id)
            .map_or(false, |until| until > now)
    }

    pub fn is_snoozed_at(&self, order_id: &str, now: DateTime<Utc>) -> bool {
        self.until
            .lock()
            .get(order_id)
            .map_or(false, |until| *until > now)
    }

    pub fn is_snoozed(&self, order_id: &str) -> bool {
        self.is_snoozed_at(order_id, self.clock.now())
    }

    /// 未过期的静默截止时刻
    pub fn snoozed_until(&self, order_id: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        self.until
            .lock()
            .get(order_id)
            .copied()
            .filter(|until| *until > now)
    }

    /// 清理已过期条目, 返回清理数量
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut until = self.until.lock();
        let before = until.len();
        until.retain(|_, t| *t > now);
        before - until.len()
    }

    pub fn len(&self) -> usize {
        self.until.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
