// ==========================================
// 专员排班与就绪引擎 - 配置层
// ==========================================
// 职责: 引擎配置管理, 默认值 + config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod engine_config;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager, ConfigResult};
pub use engine_config::{default_daypart_hours, EngineConfig};
