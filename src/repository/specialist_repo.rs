// ==========================================
// 专员排班与就绪引擎 - 专员数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::specialist::Specialist;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 专员仓储
/// 职责: specialists 表的读取与维护
pub struct SpecialistRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SpecialistRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按 id 查询专员
    pub fn find_by_id(&self, specialist_id: &str) -> RepositoryResult<Option<Specialist>> {
        let conn = self.get_conn()?;
        let specialist = conn
            .query_row(
                "SELECT id, name, is_active FROM specialists WHERE id = ?1",
                params![specialist_id],
                |row| {
                    Ok(Specialist {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        is_active: row.get::<_, i64>(2)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(specialist)
    }

    /// 插入或更新专员
    pub fn upsert(&self, specialist: &Specialist) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO specialists (id, name, is_active) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET name = ?2, is_active = ?3
            "#,
            params![
                specialist.id,
                specialist.name,
                if specialist.is_active { 1 } else { 0 }
            ],
        )?;
        Ok(())
    }

    /// 启用/停用专员
    ///
    /// # 返回
    /// - Ok(true): 已更新
    /// - Ok(false): 专员不存在
    pub fn set_active(&self, specialist_id: &str, is_active: bool) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE specialists SET is_active = ?2 WHERE id = ?1",
            params![specialist_id, if is_active { 1 } else { 0 }],
        )?;
        Ok(affected > 0)
    }
}
