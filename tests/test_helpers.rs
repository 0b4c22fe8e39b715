// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、引擎装配、测试数据准备、记录型通知派发者
// ==========================================

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex as PlMutex;
use rusqlite::Connection;
use specialist_scheduling::config::EngineConfig;
use specialist_scheduling::domain::{
    NotificationKind, NotificationRequest, Order, OrderAssignment, Specialist,
};
use specialist_scheduling::engine::{DispatchError, ManualClock, NotificationDispatcher};
use specialist_scheduling::EngineState;
use std::collections::HashSet;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = specialist_scheduling::db::open_sqlite_connection(&db_path)?;
    specialist_scheduling::db::ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

// ==========================================
// 记录型通知派发者
// ==========================================
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: PlMutex<Vec<NotificationRequest>>,
    failing: AtomicBool,
    failing_orders: PlMutex<HashSet<String>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().clone()
    }

    pub fn sent_of(&self, kind: NotificationKind) -> Vec<NotificationRequest> {
        self.sent
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    /// 置为 true 后所有派发返回错误 (不记录)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 只对指定订单的派发返回错误
    pub fn fail_for_order(&self, order_id: &str) {
        self.failing_orders.lock().insert(order_id.to_string());
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn dispatch(&self, request: &NotificationRequest) -> Result<(), DispatchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("推送通道不可用".into());
        }
        if let Some(order_id) = request.order_id() {
            if self.failing_orders.lock().contains(order_id) {
                return Err(format!("订单 {} 推送失败", order_id).into());
            }
        }
        self.sent.lock().push(request.clone());
        Ok(())
    }
}

// ==========================================
// 测试环境
// ==========================================
pub struct TestEnv {
    _temp_file: NamedTempFile,
    pub db_path: String,
    pub clock: Arc<ManualClock>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub state: EngineState,
}

pub fn setup_env(now: DateTime<Utc>) -> TestEnv {
    setup_env_with_config(now, EngineConfig::default())
}

pub fn setup_env_with_config(now: DateTime<Utc>, config: EngineConfig) -> TestEnv {
    specialist_scheduling::logging::init_test();
    let (temp_file, db_path) = create_test_db().unwrap();
    let conn = specialist_scheduling::db::open_sqlite_connection(&db_path).unwrap();
    let conn = Arc::new(Mutex::new(conn));

    let clock = Arc::new(ManualClock::new(now));
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let state = EngineState::from_connection(
        db_path.clone(),
        conn,
        config,
        clock.clone(),
        dispatcher.clone(),
    );

    TestEnv {
        _temp_file: temp_file,
        db_path,
        clock,
        dispatcher,
        state,
    }
}

// ==========================================
// 测试数据
// ==========================================

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn seed_specialist(env: &TestEnv, id: &str, is_active: bool) {
    env.state
        .specialist_repo
        .upsert(&Specialist {
            id: id.to_string(),
            name: format!("专员 {}", id),
            is_active,
        })
        .unwrap();
}

pub fn seed_order(env: &TestEnv, order: &Order) {
    env.state.order_repo.upsert(order).unwrap();
}

/// 指派并接单
pub fn accept(env: &TestEnv, order_id: &str, specialist_id: &str) {
    env.state
        .order_repo
        .upsert_assignment(&OrderAssignment {
            order_id: order_id.to_string(),
            specialist_id: specialist_id.to_string(),
            is_accepted: true,
            quoted_price: Some(100.0),
        })
        .unwrap();
}

/// 指派但未报价
pub fn invite(env: &TestEnv, order_id: &str, specialist_id: &str) {
    env.state
        .order_repo
        .upsert_assignment(&OrderAssignment {
            order_id: order_id.to_string(),
            specialist_id: specialist_id.to_string(),
            is_accepted: false,
            quoted_price: None,
        })
        .unwrap();
}

/// 打开独立连接 (用于直接核对库内数据)
pub fn open_conn(env: &TestEnv) -> Connection {
    specialist_scheduling::db::open_sqlite_connection(&env.db_path).unwrap()
}

/// 直接写入原始订单行 (外部协作方可能写入无法解析的取值)
pub fn insert_raw_order(env: &TestEnv, columns: &[(&str, &str)]) {
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO orders ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    );
    let values: Vec<&str> = columns.iter().map(|(_, value)| *value).collect();
    open_conn(env)
        .execute(&sql, rusqlite::params_from_iter(values))
        .unwrap();
}
