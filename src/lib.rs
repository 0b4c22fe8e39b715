// ==========================================
// 专员排班与就绪引擎 - 核心库
// ==========================================
// 职责:
// - 专员排班: 空闲检查、原子预约、空闲时段搜索、预约作废
// - 就绪确认: 预约前发起确认、催办、记录专员答复
// - 逾期升级: 周期扫描逾期订单、重复告警、告警静默
// 技术栈: Rust + SQLite (rusqlite) + tokio 周期任务
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 引擎配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// 应用层 - 装配与周期任务
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{OrderStatus, ReadinessOutcome, ReadinessStatus};

// 领域实体
pub use domain::{
    NotificationKind, NotificationRequest, Order, OrderAssignment, ScheduleEntry, Specialist,
    TimeWindow,
};

// 引擎
pub use engine::{
    AvailabilityChecker, Clock, EngineError, EngineResult, ManualClock, NotificationDispatcher,
    OverdueEscalationMonitor, QuoteExpiryNotifier, ReadinessOrchestrator, ScheduleAllocator,
    SlotSearch, SystemClock,
};

// 配置
pub use config::{ConfigManager, EngineConfig};

// 应用
pub use app::EngineState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "专员排班与就绪引擎";
