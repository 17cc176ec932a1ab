// ==========================================
// 库存批量导入 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换下层错误为用户友好的错误消息
// 说明: 行级问题不是错误，它们出现在预览与提交报告中
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 批次级拒绝（上传阶段）
    // ==========================================
    #[error("批次被拒绝: {0}")]
    BatchRejected(String),

    // ==========================================
    // 会话与修正
    // ==========================================
    #[error("会话已关闭: session_id={session_id}, state={state}")]
    SessionClosed { session_id: String, state: String },

    #[error("修正被拒绝: {0}")]
    CorrectionRejected(String),

    /// ALL_PERFECT 模式下仍有未就绪行
    #[error("{message}")]
    ExecutionRefused {
        suggested: usize,
        errors: usize,
        message: String,
    },

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("目录服务不可用: {0}")]
    CatalogUnavailable(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure {
                session_id,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "会话{}已被其他请求修改（期望revision={}，实际revision={}）",
                session_id, expected, actual
            )),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }

            // 数据错误
            RepositoryError::SerializationError(msg) => {
                ApiError::InternalError(format!("会话数据序列化失败: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InternalError(format!("字段{}错误: {}", field, message))
            }

            // 通用错误
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        if err.is_batch_rejection() {
            return ApiError::BatchRejected(err.to_string());
        }

        match err {
            ImportError::RowNotFound(row_index) => {
                ApiError::NotFound(format!("行 {} 不存在", row_index))
            }
            ImportError::CorrectionNotApplicable { .. } => {
                ApiError::CorrectionRejected(err.to_string())
            }
            ImportError::CatalogEntryNotFound { .. } => ApiError::NotFound(err.to_string()),
            ImportError::ResolverError(msg) => ApiError::CatalogUnavailable(msg),
            ImportError::ConfigReadError { .. } => ApiError::InternalError(err.to_string()),
            ImportError::InternalError(msg) => ApiError::InternalError(msg),
            ImportError::Other(e) => ApiError::Other(e),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
