// ==========================================
// 库存批量导入 - 领域模型层
// ==========================================
// 职责: 定义领域实体与类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod inventory;
pub mod types;

// 重导出核心类型
pub use inventory::{
    BatchFile, CatalogProduct, ClassifiedRow, CorrectionAction, ExecutionOutcome,
    ExecutionRefusal, ExecutionResult, FieldResolution, ImportSession, NotFoundProduct,
    PreviewResult, RawRow, RowFailure, RowStatus, RowView, Warehouse,
};
pub use types::{Bucket, DuplicateKeyPolicy, ExecutionMode, MatchKind, RowErrorReason, SessionState};
