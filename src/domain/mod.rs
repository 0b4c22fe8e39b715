// ==========================================
// 专员排班与就绪引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体与类型
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

pub mod notification;
pub mod order;
pub mod schedule;
pub mod specialist;
pub mod types;

// 重导出核心类型
pub use notification::{NotificationKind, NotificationRequest};
pub use order::{Order, OrderAssignment};
pub use schedule::{ScheduleEntry, TimeWindow};
pub use specialist::Specialist;
pub use types::{OrderStatus, ReadinessOutcome, ReadinessStatus};
