// ==========================================
// 库存批量导入 - 配置层
// ==========================================
// 职责: 导入参数读取（阈值/上限/策略）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::ImportConfigReader;
pub use settings::ImportSettings;
