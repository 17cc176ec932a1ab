// ==========================================
// 库存批量导入 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 红线: Repository 不含业务逻辑
// ==========================================

pub mod catalog_repo;
pub mod error;
pub mod import_session_repo;
pub mod stock_repo;

// 重导出核心仓储
pub use catalog_repo::SqliteCatalogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use import_session_repo::{ImportSessionStore, SqliteImportSessionRepository};
pub use stock_repo::{SqliteStockRepository, StockWriter};
