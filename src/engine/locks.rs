// ==========================================
// 专员排班与就绪引擎 - 按键互斥锁
// ==========================================
// 每个键 (专员 id / 订单 id) 一把锁, 不同键之间互不阻塞
// 用法:
//   locks.with_lock(key, || ...)
//   locks.try_with_lock_for(key, timeout, || ...)  // 超时返回 None
// 临界区结束后无人持有的键立即移除, 登记表大小只取决于并发中的键
// ==========================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得键对应的锁 (不存在则登记)
    ///
    /// 直接持有句柄时, 键在下一次经由 with_lock / try_with_lock_for 的访问结束后才会移除
    pub fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 持锁执行 f (无限等待)
    pub fn with_lock<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        let lock = self.handle(key);
        let result = {
            let _guard = lock.lock();
            f()
        };
        self.release(key, lock);
        result
    }

    /// 在 timeout 内取得锁则执行 f; 超时返回 None, f 不执行
    pub fn try_with_lock_for<R>(
        &self,
        key: &str,
        timeout: Duration,
        f: impl FnOnce() -> R,
    ) -> Option<R> {
        let lock = self.handle(key);
        let result = match lock.try_lock_for(timeout) {
            Some(_guard) => Some(f()),
            None => None,
        };
        self.release(key, lock);
        result
    }

    /// 归还句柄; 登记表之外再无引用时移除该键
    fn release(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        drop(lock);
        if locks
            .get(key)
            .map_or(false, |registered| Arc::strong_count(registered) == 1)
        {
            locks.remove(key);
        }
    }

    /// 已登记的键数量
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
