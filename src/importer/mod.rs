// ==========================================
// 库存批量导入 - 导入层（行提取器）
// ==========================================
// 职责: 批次文件 → 原始行
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod data_cleaner;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod import_trait;
pub mod row_extractor;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper;
pub use file_parser::{CsvParser, ExcelFormat, ExcelParser};
pub use row_extractor::{
    batch_file_from_path, media_type_for_path, RowExtractor, MEDIA_TYPE_CSV, MEDIA_TYPE_XLS,
    MEDIA_TYPE_XLSX,
};

// 重导出 Trait 接口
pub use import_trait::{CatalogResolver, FileParser, ParsedSheet, RawRecord};
