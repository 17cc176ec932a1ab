// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、目录种子数据、批次文件构造
// ==========================================
#![allow(dead_code)]

use inventory_import::config::ConfigManager;
use inventory_import::db::{init_schema, open_sqlite_connection};
use inventory_import::domain::{BatchFile, PreviewResult, RowView};
use inventory_import::importer::MEDIA_TYPE_CSV;
use inventory_import::repository::{SqliteCatalogRepository, SqliteStockRepository};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 目录种子数据的 ID
#[derive(Debug, Clone, Copy)]
pub struct SeededCatalog {
    pub abc_01: i64,
    pub xyz_99: i64,
    pub lmn_500: i64,
    pub main: i64,
    pub east: i64,
}

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 写入标准目录: 3 个产品 + 2 个仓库
pub fn seed_catalog(db_path: &str) -> Result<SeededCatalog, Box<dyn Error>> {
    let conn = open_sqlite_connection(db_path)?;
    let repo = SqliteCatalogRepository::from_connection(Arc::new(Mutex::new(conn)));

    Ok(SeededCatalog {
        abc_01: repo.upsert_product("ABC-01", Some("Blue widget"), Some("Acme"), Some("pcs"))?,
        xyz_99: repo.upsert_product("XYZ-99", Some("Red gadget"), Some("Acme"), Some("pcs"))?,
        lmn_500: repo.upsert_product("LMN-500", Some("Green gizmo"), None, Some("kg"))?,
        main: repo.upsert_warehouse("MAIN", "Main Warehouse")?,
        east: repo.upsert_warehouse("EAST", "East Annex")?,
    })
}

/// 写入全局配置
pub fn set_config(db_path: &str, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
    ConfigManager::new(db_path)?.set_global_config_value(key, value)?;
    Ok(())
}

/// 读取库存数量
pub fn stock_quantity(
    db_path: &str,
    warehouse_id: i64,
    product_id: i64,
) -> Result<Option<f64>, Box<dyn Error>> {
    let conn = open_sqlite_connection(db_path)?;
    let repo = SqliteStockRepository::from_connection(Arc::new(Mutex::new(conn)));
    Ok(repo.get_quantity(warehouse_id, product_id)?)
}

/// 构造 CSV 批次（表头: warehouse,product_code,description,quantity）
pub fn csv_batch(lines: &[&str]) -> BatchFile {
    let mut content = String::from("warehouse,product_code,description,quantity\n");
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    BatchFile::new(
        Some("stock.csv".to_string()),
        MEDIA_TYPE_CSV,
        content.into_bytes(),
    )
}

/// 在预览样本中查找指定行
pub fn sample_row(preview: &PreviewResult, row_index: usize) -> Option<&RowView> {
    preview
        .valid_sample
        .iter()
        .chain(&preview.suggested_sample)
        .chain(&preview.error_sample)
        .find(|r| r.row_index == row_index)
}
