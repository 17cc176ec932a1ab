// ==========================================
// 库存批量导入 - 核心库
// ==========================================
// 流程: 上传 → 行提取 → 分类 → 预览 → 人工修正 → 提交
// 技术栈: Rust + SQLite
// 红线: processed + error + skipped = total
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 导入层 - 文件解析与行提取
pub mod importer;

// 引擎层 - 分类/预览/修正/提交
pub mod engine;

// 数据仓储层 - 数据访问
pub mod repository;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    Bucket, DuplicateKeyPolicy, ExecutionMode, MatchKind, RowErrorReason, SessionState,
};

// 领域实体
pub use domain::{
    BatchFile, CatalogProduct, ClassifiedRow, CorrectionAction, ExecutionResult, ImportSession,
    PreviewResult, RawRow, RowView, Warehouse,
};

// 引擎
pub use engine::{Classifier, CorrectionSession, ExecutionEngine, PreviewAggregator};

// 导入
pub use importer::{ImportError, RowExtractor};

// API
pub use api::{ApiError, ApiResult, InventoryImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "库存批量导入";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
