// ==========================================
// 专员排班与就绪引擎 - 引擎层
// ==========================================
// 职责: 实现排班/就绪/逾期业务规则
// 红线: Engine 不拼 SQL, 数据访问全部经由 repository
// ==========================================

pub mod allocator;
pub mod availability;
pub mod clock;
pub mod dispatch;
pub mod error;
pub mod expiry;
pub mod locks;
pub mod overdue;
pub mod readiness;
pub mod snooze;

// 重导出核心引擎
pub use allocator::{ScheduleAllocator, SlotSearch};
pub use availability::{find_blocking, AvailabilityChecker};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{DispatchError, NoOpNotificationDispatcher, NotificationDispatcher};
pub use error::{EngineError, EngineResult};
pub use expiry::{ExpiryReport, QuoteExpiryNotifier};
pub use locks::KeyedLocks;
pub use overdue::{OverdueEscalationMonitor, OverdueOrder, ScanReport};
pub use readiness::{ItemFailure, ReadinessOrchestrator, ResponseOutcome, TickReport};
pub use snooze::SnoozeRegistry;
