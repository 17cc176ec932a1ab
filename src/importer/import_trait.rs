// ==========================================
// 库存批量导入 - 导入接口 Trait
// ==========================================
// 职责: 定义文件解析与目录解析接口（不包含实现）
// ==========================================

use crate::domain::inventory::{CatalogProduct, Warehouse};
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::collections::HashMap;

// ==========================================
// 解析产物
// ==========================================

/// 单个原始记录（列名 → 原始值）
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 物理行号（表头为第 1 行）
    pub row_index: usize,
    pub fields: HashMap<String, String>,
}

/// 解析后的工作表
#[derive(Debug, Clone, Default)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 将批次字节解析为原始记录
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析字节内容
    ///
    /// # 返回
    /// - Ok(ParsedSheet): 表头 + 记录（完全空白的行不输出）
    /// - Err: 格式错误（批次级拒绝）
    fn parse_bytes(&self, content: &[u8]) -> ImportResult<ParsedSheet>;
}

// ==========================================
// CatalogResolver Trait
// ==========================================
// 用途: 外部目录服务（产品目录 + 仓库目录）
// 实现者: SqliteCatalogRepository；测试中为内存实现
#[async_trait]
pub trait CatalogResolver: Send + Sync {
    /// 按编码精确查找产品（区分大小写）
    async fn find_product_by_code(&self, code: &str) -> ImportResult<Option<CatalogProduct>>;

    /// 按归一化编码查找产品（可能命中多个）
    async fn find_products_by_normalized_code(
        &self,
        normalized: &str,
    ) -> ImportResult<Vec<CatalogProduct>>;

    /// 全量产品快照（用于模糊建议）
    async fn list_products(&self) -> ImportResult<Vec<CatalogProduct>>;

    /// 按 ID 查找产品（人工绑定校验）
    async fn get_product(&self, product_id: i64) -> ImportResult<Option<CatalogProduct>>;

    /// 按名称或编码精确查找仓库
    async fn find_warehouse(&self, label: &str) -> ImportResult<Option<Warehouse>>;

    /// 按归一化名称/编码查找仓库
    async fn find_warehouses_by_normalized(&self, normalized: &str) -> ImportResult<Vec<Warehouse>>;

    /// 全量仓库快照（用于模糊建议）
    async fn list_warehouses(&self) -> ImportResult<Vec<Warehouse>>;

    /// 按 ID 查找仓库（人工绑定校验）
    async fn get_warehouse(&self, warehouse_id: i64) -> ImportResult<Option<Warehouse>>;

    /// 自由文本检索产品（人工修正用），按相关度排序
    async fn search_products(&self, query: &str, limit: usize) -> ImportResult<Vec<CatalogProduct>>;
}
