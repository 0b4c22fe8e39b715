// ==========================================
// 专员排班与就绪引擎 - 专员
// ==========================================
// 由外部专员管理方维护, 此处按 id 引用
// ==========================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specialist {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}
