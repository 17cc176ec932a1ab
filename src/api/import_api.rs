// ==========================================
// 库存批量导入 - 导入 API
// ==========================================
// 职责: 编排 上传 → 预览 → 修正 → 提交 全流程
// 会话: 上传返回 session_id；修正写入服务端会话；提交按 session_id 读取
// 并发: 同一会话的请求经会话级异步锁串行化，存储层再以 revision 乐观锁兜底
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader, ImportSettings};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::inventory::{
    BatchFile, CatalogProduct, CorrectionAction, ExecutionOutcome, ExecutionResult,
    ImportSession, PreviewResult, RowView,
};
use crate::domain::types::{ExecutionMode, SessionState};
use crate::engine::{Classifier, CorrectionSession, ExecutionEngine, PreviewAggregator};
use crate::importer::import_trait::CatalogResolver;
use crate::importer::row_extractor::RowExtractor;
use crate::repository::{
    ImportSessionStore, SqliteCatalogRepository, SqliteImportSessionRepository,
    SqliteStockRepository, StockWriter,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// 上传响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub file_name: Option<String>,
    pub preview: PreviewResult,
}

/// 修正响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionResponse {
    pub session_id: String,
    /// 修正后的单行状态
    pub row: RowView,
    /// false 表示重放了已生效的动作
    pub changed: bool,
    /// 刷新后的汇总
    pub preview: PreviewResult,
}

/// 会话状态概览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub file_name: Option<String>,
    pub state: SessionState,
    pub revision: i32,
    pub total_rows: usize,
    pub result: Option<ExecutionResult>,
}

/// 库存导入 API
pub struct InventoryImportApi {
    config: Arc<dyn ImportConfigReader>,
    catalog: Arc<dyn CatalogResolver>,
    stock: Arc<dyn StockWriter>,
    sessions: Arc<dyn ImportSessionStore>,
    session_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl InventoryImportApi {
    /// 基于 SQLite 文件创建 API（自动建表）
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn).map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        let conn = Arc::new(Mutex::new(conn));

        Ok(Self::with_components(
            Arc::new(ConfigManager::from_connection(conn.clone())),
            Arc::new(SqliteCatalogRepository::from_connection(conn.clone())),
            Arc::new(SqliteStockRepository::from_connection(conn.clone())),
            Arc::new(SqliteImportSessionRepository::from_connection(conn)),
        ))
    }

    /// 注入各协作方（测试或外部目录服务）
    pub fn with_components(
        config: Arc<dyn ImportConfigReader>,
        catalog: Arc<dyn CatalogResolver>,
        stock: Arc<dyn StockWriter>,
        sessions: Arc<dyn ImportSessionStore>,
    ) -> Self {
        Self {
            config,
            catalog,
            stock,
            sessions,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn settings(&self) -> ApiResult<ImportSettings> {
        Ok(ImportSettings::load(self.config.as_ref()).await?)
    }

    /// 获取会话级异步锁
    fn session_lock(&self, session_id: &str) -> ApiResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .session_locks
            .lock()
            .map_err(|e| ApiError::InternalError(format!("会话锁表获取失败: {}", e)))?;
        Ok(locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    fn release_session_lock(&self, session_id: &str) {
        if let Ok(mut locks) = self.session_locks.lock() {
            locks.remove(session_id);
        }
    }

    async fn load_session(&self, session_id: &str) -> ApiResult<ImportSession> {
        self.sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("导入会话(id={})不存在", session_id)))
    }

    /// 读取仍可操作的会话（终态会话返回 SessionClosed）
    async fn load_open_session(&self, session_id: &str) -> ApiResult<ImportSession> {
        let session = self.load_session(session_id).await?;
        if session.state.is_terminal() {
            return Err(ApiError::SessionClosed {
                session_id: session.session_id,
                state: session.state.to_string(),
            });
        }
        Ok(session)
    }

    fn transition(session: &mut ImportSession, next: SessionState) -> ApiResult<()> {
        if !session.state.can_transition_to(next) {
            return Err(ApiError::InvalidStateTransition {
                from: session.state.to_string(),
                to: next.to_string(),
            });
        }
        session.state = next;
        session.updated_at = Utc::now();
        Ok(())
    }

    // ==========================================
    // 上传
    // ==========================================

    /// 上传批次文件：提取 → 分类 → 持久化会话 → 返回预览
    ///
    /// # 错误
    /// - BatchRejected: 媒体类型/大小/格式/缺列/无数据（不产生会话）
    #[instrument(skip(self, batch), fields(file_name = ?batch.file_name, size = batch.size()))]
    pub async fn upload_batch(&self, batch: BatchFile) -> ApiResult<UploadResponse> {
        let settings = self.settings().await?;
        let now = Utc::now();
        let mut session = ImportSession {
            session_id: Uuid::new_v4().to_string(),
            file_name: batch.file_name.clone(),
            state: SessionState::Uploaded,
            rows: Vec::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
            result: None,
        };

        // === 步骤 1: 行提取 ===
        let raw_rows = RowExtractor::new(settings.max_batch_bytes)
            .extract(&batch)
            .map_err(|e| {
                warn!(error = %e, "批次被拒绝");
                ApiError::from(e)
            })?;
        Self::transition(&mut session, SessionState::Extracted)?;

        // === 步骤 2: 分类 ===
        let classifier = Classifier::new(self.catalog.clone(), settings.classifier_settings());
        session.rows = classifier.classify_batch(raw_rows).await?;
        Self::transition(&mut session, SessionState::Classified)?;

        // === 步骤 3: 持久化 ===
        self.sessions.create(&session).await?;

        let preview = PreviewAggregator::new(settings.sample_size).aggregate(&session.rows);
        info!(
            session_id = %session.session_id,
            total_rows = preview.total_rows,
            valid = preview.valid_count,
            suggested = preview.suggested_count,
            errors = preview.error_count,
            "批次已分类"
        );

        Ok(UploadResponse {
            session_id: session.session_id,
            file_name: session.file_name,
            preview,
        })
    }

    // ==========================================
    // 预览
    // ==========================================

    /// 重新计算会话的预览汇总
    pub async fn preview(&self, session_id: &str) -> ApiResult<PreviewResult> {
        let settings = self.settings().await?;
        let session = self.load_open_session(session_id).await?;
        Ok(PreviewAggregator::new(settings.sample_size).aggregate(&session.rows))
    }

    /// 会话概览（终态会话同样可查）
    pub async fn session_info(&self, session_id: &str) -> ApiResult<SessionInfo> {
        let session = self.load_session(session_id).await?;
        Ok(SessionInfo {
            total_rows: session
                .result
                .as_ref()
                .map(|r| r.total_rows)
                .unwrap_or(session.rows.len()),
            session_id: session.session_id,
            file_name: session.file_name,
            state: session.state,
            revision: session.revision,
            result: session.result,
        })
    }

    // ==========================================
    // 人工修正
    // ==========================================

    /// 应用修正动作并返回刷新后的单行状态与汇总
    #[instrument(skip(self), fields(row_index = action.row_index()))]
    pub async fn correct(
        &self,
        session_id: &str,
        action: CorrectionAction,
    ) -> ApiResult<CorrectionResponse> {
        let lock = self.session_lock(session_id)?;
        let _guard = lock.lock().await;

        let settings = self.settings().await?;
        let mut session = self.load_open_session(session_id).await?;

        let outcome = CorrectionSession::new(&mut session.rows)
            .apply(&action, self.catalog.as_ref())
            .await?;

        if outcome.changed {
            Self::transition(&mut session, SessionState::Correcting)?;
            session.revision = self.sessions.update(&session).await?;
        }

        let preview = PreviewAggregator::new(settings.sample_size).aggregate(&session.rows);
        Ok(CorrectionResponse {
            session_id: session.session_id,
            row: RowView::from(&outcome.row),
            changed: outcome.changed,
            preview,
        })
    }

    /// 目录检索（供人工绑定使用）
    pub async fn search_catalog(&self, query: &str, limit: usize) -> ApiResult<Vec<CatalogProduct>> {
        Ok(self.catalog.search_products(query, limit).await?)
    }

    // ==========================================
    // 提交
    // ==========================================

    /// 按会话提交
    ///
    /// 顺序: 拒绝检查 → 以 revision 认领会话(置为 EXECUTED) → 写库存 → 保存结果。
    /// 认领失败时尚未写入任何库存；写入之后会话已是终态，重试只会得到 SessionClosed。
    ///
    /// # 错误
    /// - ExecutionRefused: ALL_PERFECT 模式下仍有 SUGGESTED/ERROR 行（零写入，会话状态不变）
    /// - SessionClosed: 会话已提交或已放弃
    #[instrument(skip(self))]
    pub async fn execute(
        &self,
        session_id: &str,
        mode: ExecutionMode,
    ) -> ApiResult<ExecutionResult> {
        let lock = self.session_lock(session_id)?;
        let _guard = lock.lock().await;

        let settings = self.settings().await?;
        let mut session = self.load_open_session(session_id).await?;
        if !session.state.can_transition_to(SessionState::Executed) {
            return Err(ApiError::InvalidStateTransition {
                from: session.state.to_string(),
                to: SessionState::Executed.to_string(),
            });
        }

        let engine = ExecutionEngine::new(self.stock.clone(), settings.duplicate_policy);
        if let Some(refusal) = engine.check_refusal(session_id, &session.rows, mode) {
            return Err(ApiError::ExecutionRefused {
                suggested: refusal.suggested_count,
                errors: refusal.error_count,
                message: refusal.message,
            });
        }

        // === 认领: 先落终态，再写库存 ===
        Self::transition(&mut session, SessionState::Executed)?;
        session.revision = self.sessions.update(&session).await?;

        let result = match engine.execute(session_id, &session.rows, mode).await {
            ExecutionOutcome::Executed(result) => result,
            ExecutionOutcome::Refused(refusal) => {
                return Err(ApiError::InternalError(format!(
                    "会话(id={})认领后提交被拒绝: {}",
                    session_id, refusal.message
                )));
            }
        };

        // 提交后丢弃行集合，仅保留结果
        session.rows.clear();
        session.result = Some(result.clone());
        if let Err(e) = self.sessions.update(&session).await {
            // 库存已写入且会话已是终态，结果仍返回给调用方
            error!(error = %e, "提交结果保存失败");
        }

        drop(_guard);
        self.release_session_lock(session_id);

        info!(
            processed = result.processed_count,
            errors = result.error_count,
            skipped = result.skipped_count,
            "会话已提交"
        );
        Ok(result)
    }

    // ==========================================
    // 会话生命周期
    // ==========================================

    /// 放弃会话
    #[instrument(skip(self))]
    pub async fn abandon(&self, session_id: &str) -> ApiResult<()> {
        let lock = self.session_lock(session_id)?;
        let _guard = lock.lock().await;

        let mut session = self.load_open_session(session_id).await?;
        Self::transition(&mut session, SessionState::Abandoned)?;
        session.rows.clear();
        self.sessions.update(&session).await?;

        drop(_guard);
        self.release_session_lock(session_id);
        info!("会话已放弃");
        Ok(())
    }

    /// 清理超过保留期的终态会话（EXECUTED/ABANDONED），并回收空闲的会话锁
    pub async fn purge_stale_sessions(&self) -> ApiResult<usize> {
        let settings = self.settings().await?;
        let retention_days = settings.session_retention_days;
        let cutoff = Duration::try_days(retention_days)
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
            .ok_or_else(|| {
                ApiError::InternalError(format!("会话保留期超出范围: {} 天", retention_days))
            })?;
        let deleted = self.sessions.purge_older_than(cutoff).await?;
        self.prune_idle_locks();
        info!(deleted, retention_days, "过期会话已清理");
        Ok(deleted)
    }

    /// 移除当前无人持有的会话锁
    fn prune_idle_locks(&self) {
        if let Ok(mut locks) = self.session_locks.lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }
}
