// ==========================================
// 库存批量导入 - API 层
// ==========================================
// 职责: 提供导入流程的业务接口，供 CLI 或上层服务调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{CorrectionResponse, InventoryImportApi, SessionInfo, UploadResponse};
