// ==========================================
// 库存批量导入 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级问题是数据（RowStatus::Error），不是错误；
//       这里只收录批次级拒绝、修正冲突与基础设施错误
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 批次级拒绝（在任何行被检查之前）=====
    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedMediaType(String),

    #[error("文件过大: {size} 字节，上限 {max} 字节")]
    BatchTooLarge { size: usize, max: usize },

    #[error("文件无数据行")]
    EmptyBatch,

    #[error("缺少必需列: {0}")]
    MissingColumn(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    // ===== 目录服务 =====
    #[error("目录服务查询失败: {0}")]
    ResolverError(String),

    // ===== 人工修正 =====
    #[error("行不存在: row_index={0}")]
    RowNotFound(usize),

    #[error("修正动作不适用 (行 {row_index}): 当前 {bucket}，{message}")]
    CorrectionNotApplicable {
        row_index: usize,
        bucket: String,
        message: String,
    },

    #[error("目录中不存在 {entity}: id={id}")]
    CatalogEntryNotFound { entity: String, id: i64 },

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为批次级拒绝（上传阶段，未产生任何预览）
    pub fn is_batch_rejection(&self) -> bool {
        matches!(
            self,
            ImportError::UnsupportedMediaType(_)
                | ImportError::BatchTooLarge { .. }
                | ImportError::EmptyBatch
                | ImportError::MissingColumn(_)
                | ImportError::ExcelParseError(_)
                | ImportError::CsvParseError(_)
                | ImportError::FileReadError(_)
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>（SQLite 目录实现的查询失败）
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::ResolverError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
