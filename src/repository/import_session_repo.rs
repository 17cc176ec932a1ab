// ==========================================
// 库存批量导入 - 导入会话仓储
// ==========================================
// 职责: import_session 表的读写（分类行集合以 JSON 存储）
// 并发: revision 乐观锁，防止并发修正互相覆盖
// 红线: Repository 不含业务规则，状态迁移合法性由 API 层判定
// ==========================================

use crate::domain::inventory::{ClassifiedRow, ExecutionResult, ImportSession};
use crate::domain::types::SessionState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ImportSessionStore Trait
// ==========================================
// 实现者: SqliteImportSessionRepository
#[async_trait]
pub trait ImportSessionStore: Send + Sync {
    /// 新建会话
    async fn create(&self, session: &ImportSession) -> RepositoryResult<()>;

    /// 按 ID 查询会话
    async fn find_by_id(&self, session_id: &str) -> RepositoryResult<Option<ImportSession>>;

    /// 更新会话 (带乐观锁检查)
    ///
    /// # 返回
    /// - Ok(i32): 更新后的 revision
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision不匹配 (其他请求已更新)
    /// - `RepositoryError::NotFound`: session_id不存在
    async fn update(&self, session: &ImportSession) -> RepositoryResult<i32>;

    /// 删除最后更新时间早于 cutoff 的终态会话（EXECUTED/ABANDONED）
    ///
    /// 未终结的会话无论多旧都保留
    ///
    /// # 返回
    /// - Ok(usize): 删除的会话数
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<usize>;
}

/// 时间戳统一格式（定长，可按字符串比较）
fn to_db_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_db_time(field: &str, raw: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RepositoryError::FieldValueError {
            field: field.to_string(),
            message: e.to_string(),
        })
}

/// 表行原始值（反序列化在锁外完成）
struct SessionRecord {
    session_id: String,
    file_name: Option<String>,
    state: String,
    rows_json: String,
    result_json: Option<String>,
    revision: i32,
    created_at: String,
    updated_at: String,
}

impl SessionRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            file_name: row.get(1)?,
            state: row.get(2)?,
            rows_json: row.get(3)?,
            result_json: row.get(4)?,
            revision: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_session(self) -> RepositoryResult<ImportSession> {
        let state = SessionState::from_db_str(&self.state).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "state".to_string(),
                message: format!("未知的会话状态: {}", self.state),
            }
        })?;
        let rows: Vec<ClassifiedRow> = serde_json::from_str(&self.rows_json)?;
        let result: Option<ExecutionResult> = match self.result_json {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };

        Ok(ImportSession {
            session_id: self.session_id,
            file_name: self.file_name,
            state,
            rows,
            revision: self.revision,
            created_at: from_db_time("created_at", &self.created_at)?,
            updated_at: from_db_time("updated_at", &self.updated_at)?,
            result,
        })
    }
}

// ==========================================
// SqliteImportSessionRepository
// ==========================================
pub struct SqliteImportSessionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteImportSessionRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl ImportSessionStore for SqliteImportSessionRepository {
    async fn create(&self, session: &ImportSession) -> RepositoryResult<()> {
        let rows_json = serde_json::to_string(&session.rows)?;
        let result_json = session
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO import_session (
                session_id, file_name, state, rows_json, result_json,
                revision, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                &session.session_id,
                &session.file_name,
                session.state.to_db_str(),
                rows_json,
                result_json,
                session.revision,
                to_db_time(&session.created_at),
                to_db_time(&session.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, session_id: &str) -> RepositoryResult<Option<ImportSession>> {
        let record = {
            let conn = self.get_conn()?;
            conn.query_row(
                r#"SELECT session_id, file_name, state, rows_json, result_json,
                          revision, created_at, updated_at
                   FROM import_session
                   WHERE session_id = ?1"#,
                params![session_id],
                SessionRecord::from_row,
            )
            .optional()?
        };

        record.map(SessionRecord::into_session).transpose()
    }

    async fn update(&self, session: &ImportSession) -> RepositoryResult<i32> {
        let rows_json = serde_json::to_string(&session.rows)?;
        let result_json = session
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.get_conn()?;

        // 执行更新，带revision检查
        let rows_affected = conn.execute(
            r#"UPDATE import_session
               SET file_name = ?1, state = ?2, rows_json = ?3, result_json = ?4,
                   updated_at = ?5, revision = revision + 1
               WHERE session_id = ?6 AND revision = ?7"#,
            params![
                &session.file_name,
                session.state.to_db_str(),
                rows_json,
                result_json,
                to_db_time(&session.updated_at),
                &session.session_id,
                session.revision,
            ],
        )?;

        if rows_affected == 0 {
            // 判断是记录不存在还是revision冲突
            let actual: Option<i32> = conn
                .query_row(
                    "SELECT revision FROM import_session WHERE session_id = ?1",
                    params![&session.session_id],
                    |row| row.get(0),
                )
                .optional()?;

            return Err(match actual {
                Some(actual) => RepositoryError::OptimisticLockFailure {
                    session_id: session.session_id.clone(),
                    expected: session.revision,
                    actual,
                },
                None => RepositoryError::NotFound {
                    entity: "ImportSession".to_string(),
                    id: session.session_id.clone(),
                },
            });
        }

        Ok(session.revision + 1)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM import_session WHERE updated_at < ?1 AND state IN (?2, ?3)",
            params![
                to_db_time(&cutoff),
                SessionState::Executed.to_db_str(),
                SessionState::Abandoned.to_db_str()
            ],
        )?;
        Ok(deleted)
    }
}
