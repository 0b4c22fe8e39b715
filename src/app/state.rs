// ==========================================
// 专员排班与就绪引擎 - 应用状态
// ==========================================
// 职责: 打开数据库、加载配置, 把仓储与引擎装配成一个共享状态
// 所有仓储共用同一个 Arc<Mutex<Connection>>
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::{ConfigManager, EngineConfig};
use crate::engine::{
    AvailabilityChecker, Clock, NotificationDispatcher, OverdueEscalationMonitor,
    QuoteExpiryNotifier, ReadinessOrchestrator, ScheduleAllocator,
};
use crate::repository::{OrderRepository, ScheduleEntryRepository, SpecialistRepository};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "SPECIALIST_SCHEDULING_DB_PATH";

/// 引擎状态
///
/// 同步请求 (reserve / next_available_slot / respond_readiness) 与
/// 两个周期任务共享同一个实例
pub struct EngineState {
    pub db_path: String,
    pub config: Arc<EngineConfig>,
    pub clock: Arc<dyn Clock>,

    pub specialist_repo: Arc<SpecialistRepository>,
    pub schedule_repo: Arc<ScheduleEntryRepository>,
    pub order_repo: Arc<OrderRepository>,

    pub availability: Arc<AvailabilityChecker>,
    pub allocator: Arc<ScheduleAllocator>,
    pub readiness: Arc<ReadinessOrchestrator>,
    pub overdue: Arc<OverdueEscalationMonitor>,
    pub expiry: Arc<QuoteExpiryNotifier>,
}

impl EngineState {
    /// 打开数据库 (必要时建表) 并按 config_kv 加载配置
    pub fn open(
        db_path: String,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Result<Self, String> {
        tracing::info!("初始化 EngineState, 数据库路径: {}", db_path);

        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::ensure_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;
        match crate::db::read_schema_version(&conn) {
            Ok(Some(v)) if v != crate::db::CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    stored = v,
                    expected = crate::db::CURRENT_SCHEMA_VERSION,
                    "schema_version 不一致, 不做自动迁移"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("读取 schema_version 失败: {}", e),
        }
        let conn = Arc::new(Mutex::new(conn));

        let config = ConfigManager::from_connection(conn.clone())
            .and_then(|mgr| mgr.load_engine_config())
            .map_err(|e| format!("加载引擎配置失败: {}", e))?;

        Ok(Self::from_connection(db_path, conn, config, clock, dispatcher))
    }

    /// 从已有连接与配置装配 (测试与嵌入场景)
    pub fn from_connection(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let config = Arc::new(config);

        // ==========================================
        // Repository 层
        // ==========================================
        let specialist_repo = Arc::new(SpecialistRepository::from_connection(conn.clone()));
        let schedule_repo = Arc::new(ScheduleEntryRepository::from_connection(conn.clone()));
        let order_repo = Arc::new(OrderRepository::from_connection(conn));

        // ==========================================
        // Engine 层
        // ==========================================
        let availability = Arc::new(AvailabilityChecker::new(
            specialist_repo.clone(),
            schedule_repo.clone(),
            config.clone(),
        ));
        let allocator = Arc::new(ScheduleAllocator::new(
            availability.clone(),
            order_repo.clone(),
            clock.clone(),
        ));
        let readiness = Arc::new(ReadinessOrchestrator::new(
            order_repo.clone(),
            dispatcher.clone(),
            clock.clone(),
            config.clone(),
        ));
        let overdue = Arc::new(OverdueEscalationMonitor::new(
            order_repo.clone(),
            dispatcher.clone(),
            clock.clone(),
            config.clone(),
        ));
        let expiry = Arc::new(QuoteExpiryNotifier::new(
            order_repo.clone(),
            dispatcher,
            clock.clone(),
            config.clone(),
        ));

        tracing::info!("EngineState 初始化完成");

        Self {
            db_path,
            config,
            clock,
            specialist_repo,
            schedule_repo,
            order_repo,
            availability,
            allocator,
            readiness,
            overdue,
            expiry,
        }
    }

    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

/// 默认数据库路径
///
/// 优先使用环境变量, 其次为用户数据目录, 最后回退到当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./specialist_scheduling.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("specialist-scheduling");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("specialist_scheduling.db");
        }
    }

    path.to_string_lossy().to_string()
}
