// ==========================================
// 专员排班与就绪引擎 - 应用层
// ==========================================
// 职责: 装配仓储与引擎, 驱动周期任务
// ==========================================

pub mod state;
pub mod workers;

// 重导出
pub use state::{get_default_db_path, EngineState, DB_PATH_ENV};
pub use workers::{spawn_overdue_loop, spawn_readiness_loop};
