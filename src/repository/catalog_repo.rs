// ==========================================
// 库存批量导入 - 目录仓储（产品 + 仓库）
// ==========================================
// 职责: CatalogResolver 的 SQLite 实现；目录维护写入
// 约束: 所有查询使用参数化；归一化键在写入时计算并建索引
// ==========================================

use crate::domain::inventory::{CatalogProduct, Warehouse};
use crate::importer::data_cleaner::normalize_code;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::CatalogResolver;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const PRODUCT_COLUMNS: &str = "product_id, code, description, brand, unit";
const WAREHOUSE_COLUMNS: &str = "warehouse_id, code, name";

fn map_product(row: &Row<'_>) -> rusqlite::Result<CatalogProduct> {
    Ok(CatalogProduct {
        product_id: row.get(0)?,
        code: row.get(1)?,
        description: row.get(2)?,
        brand: row.get(3)?,
        unit: row.get(4)?,
    })
}

fn map_warehouse(row: &Row<'_>) -> rusqlite::Result<Warehouse> {
    Ok(Warehouse {
        warehouse_id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
    })
}

/// LIKE 通配符转义（转义符为反斜杠）
fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// ==========================================
// SqliteCatalogRepository
// ==========================================
pub struct SqliteCatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn resolver_conn(&self) -> ImportResult<MutexGuard<Connection>> {
        self.get_conn()
            .map_err(|e| ImportError::ResolverError(e.to_string()))
    }

    // ===== 目录维护 =====

    /// 新增或更新产品（按编码）
    pub fn upsert_product(
        &self,
        code: &str,
        description: Option<&str>,
        brand: Option<&str>,
        unit: Option<&str>,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let product_id: i64 = conn.query_row(
            r#"
            INSERT INTO product (code, normalized_code, description, brand, unit)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(code) DO UPDATE SET
                normalized_code = excluded.normalized_code,
                description = excluded.description,
                brand = excluded.brand,
                unit = excluded.unit
            RETURNING product_id
            "#,
            params![code, normalize_code(code), description, brand, unit],
            |row| row.get(0),
        )?;
        Ok(product_id)
    }

    /// 新增或更新仓库（按编码）
    pub fn upsert_warehouse(&self, code: &str, name: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let warehouse_id: i64 = conn.query_row(
            r#"
            INSERT INTO warehouse (code, name, normalized_code, normalized_name)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                normalized_code = excluded.normalized_code,
                normalized_name = excluded.normalized_name
            RETURNING warehouse_id
            "#,
            params![code, name, normalize_code(code), normalize_code(name)],
            |row| row.get(0),
        )?;
        Ok(warehouse_id)
    }
}

// ==========================================
// CatalogResolver 实现
// ==========================================
#[async_trait]
impl CatalogResolver for SqliteCatalogRepository {
    async fn find_product_by_code(&self, code: &str) -> ImportResult<Option<CatalogProduct>> {
        let conn = self.resolver_conn()?;
        // 默认 BINARY 排序规则，区分大小写与空白
        let sql = format!("SELECT {} FROM product WHERE code = ?1", PRODUCT_COLUMNS);
        let product = conn.query_row(&sql, params![code], map_product).optional()?;
        Ok(product)
    }

    async fn find_products_by_normalized_code(
        &self,
        normalized: &str,
    ) -> ImportResult<Vec<CatalogProduct>> {
        let conn = self.resolver_conn()?;
        let sql = format!(
            "SELECT {} FROM product WHERE normalized_code = ?1 ORDER BY code",
            PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map(params![normalized], map_product)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }

    async fn list_products(&self) -> ImportResult<Vec<CatalogProduct>> {
        let conn = self.resolver_conn()?;
        let sql = format!("SELECT {} FROM product ORDER BY code", PRODUCT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map([], map_product)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }

    async fn get_product(&self, product_id: i64) -> ImportResult<Option<CatalogProduct>> {
        let conn = self.resolver_conn()?;
        let sql = format!("SELECT {} FROM product WHERE product_id = ?1", PRODUCT_COLUMNS);
        let product = conn
            .query_row(&sql, params![product_id], map_product)
            .optional()?;
        Ok(product)
    }

    async fn find_warehouse(&self, label: &str) -> ImportResult<Option<Warehouse>> {
        let conn = self.resolver_conn()?;
        // 编码优先于名称
        let sql = format!(
            "SELECT {} FROM warehouse WHERE code = ?1 OR name = ?1
             ORDER BY CASE WHEN code = ?1 THEN 0 ELSE 1 END, warehouse_id LIMIT 1",
            WAREHOUSE_COLUMNS
        );
        let warehouse = conn.query_row(&sql, params![label], map_warehouse).optional()?;
        Ok(warehouse)
    }

    async fn find_warehouses_by_normalized(&self, normalized: &str) -> ImportResult<Vec<Warehouse>> {
        let conn = self.resolver_conn()?;
        let sql = format!(
            "SELECT {} FROM warehouse WHERE normalized_code = ?1 OR normalized_name = ?1 ORDER BY name",
            WAREHOUSE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let warehouses = stmt
            .query_map(params![normalized], map_warehouse)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(warehouses)
    }

    async fn list_warehouses(&self) -> ImportResult<Vec<Warehouse>> {
        let conn = self.resolver_conn()?;
        let sql = format!("SELECT {} FROM warehouse ORDER BY name", WAREHOUSE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let warehouses = stmt
            .query_map([], map_warehouse)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(warehouses)
    }

    async fn get_warehouse(&self, warehouse_id: i64) -> ImportResult<Option<Warehouse>> {
        let conn = self.resolver_conn()?;
        let sql = format!(
            "SELECT {} FROM warehouse WHERE warehouse_id = ?1",
            WAREHOUSE_COLUMNS
        );
        let warehouse = conn
            .query_row(&sql, params![warehouse_id], map_warehouse)
            .optional()?;
        Ok(warehouse)
    }

    async fn search_products(&self, query: &str, limit: usize) -> ImportResult<Vec<CatalogProduct>> {
        let text = query.trim();
        if text.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.resolver_conn()?;
        // 相关度: 编码相等 > 编码前缀 > 编码包含 > 描述/品牌包含
        let sql = format!(
            r#"
            SELECT {cols},
                CASE
                    WHEN lower(code) = lower(?1) THEN 0
                    WHEN lower(code) LIKE lower(?2) ESCAPE '\' THEN 1
                    WHEN lower(code) LIKE lower(?3) ESCAPE '\' THEN 2
                    ELSE 3
                END AS rank
            FROM product
            WHERE lower(code) LIKE lower(?3) ESCAPE '\'
               OR lower(COALESCE(description, '')) LIKE lower(?3) ESCAPE '\'
               OR lower(COALESCE(brand, '')) LIKE lower(?3) ESCAPE '\'
            ORDER BY rank, code
            LIMIT ?4
            "#,
            cols = PRODUCT_COLUMNS
        );

        let escaped = escape_like(text);
        let prefix = format!("{}%", escaped);
        let contains = format!("%{}%", escaped);
        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map(params![text, prefix, contains, limit as i64], map_product)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }
}
