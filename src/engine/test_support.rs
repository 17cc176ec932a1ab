// ==========================================
// 引擎层单元测试辅助
// ==========================================
// 内存目录（带调用计数）与可注入失败的库存写入
// ==========================================

use crate::domain::inventory::{CatalogProduct, RawRow, Warehouse};
use crate::importer::data_cleaner::normalize_code;
use crate::importer::error::ImportResult;
use crate::importer::import_trait::CatalogResolver;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::stock_repo::StockWriter;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn raw_row(row_index: usize, warehouse: &str, code: &str, quantity: f64) -> RawRow {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    RawRow {
        row_index,
        warehouse_label: non_empty(warehouse),
        product_code: non_empty(code),
        description: None,
        quantity_text: Some(quantity.to_string()),
        quantity: Some(quantity),
        unit_label: None,
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    products: Vec<CatalogProduct>,
    warehouses: Vec<Warehouse>,
    exact_product_lookups: AtomicUsize,
    exact_warehouse_lookups: AtomicUsize,
    snapshot_loads: AtomicUsize,
}

impl MemoryCatalog {
    pub fn sample() -> Self {
        let product = |id: i64, code: &str, description: &str| CatalogProduct {
            product_id: id,
            code: code.to_string(),
            description: Some(description.to_string()),
            brand: None,
            unit: Some("pcs".to_string()),
        };
        Self {
            products: vec![
                product(10, "ABC-01", "Blue widget"),
                product(11, "XYZ-99", "Red gadget"),
                product(12, "LMN-500", "Green gizmo"),
            ],
            warehouses: vec![
                Warehouse {
                    warehouse_id: 1,
                    code: "MAIN".to_string(),
                    name: "Main Warehouse".to_string(),
                },
                Warehouse {
                    warehouse_id: 2,
                    code: "EAST".to_string(),
                    name: "East Annex".to_string(),
                },
            ],
            ..Default::default()
        }
    }

    pub fn exact_product_lookups(&self) -> usize {
        self.exact_product_lookups.load(Ordering::SeqCst)
    }

    pub fn exact_warehouse_lookups(&self) -> usize {
        self.exact_warehouse_lookups.load(Ordering::SeqCst)
    }

    pub fn snapshot_loads(&self) -> usize {
        self.snapshot_loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogResolver for MemoryCatalog {
    async fn find_product_by_code(&self, code: &str) -> ImportResult<Option<CatalogProduct>> {
        self.exact_product_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.products.iter().find(|p| p.code == code).cloned())
    }

    async fn find_products_by_normalized_code(
        &self,
        normalized: &str,
    ) -> ImportResult<Vec<CatalogProduct>> {
        Ok(self
            .products
            .iter()
            .filter(|p| normalize_code(&p.code) == normalized)
            .cloned()
            .collect())
    }

    async fn list_products(&self) -> ImportResult<Vec<CatalogProduct>> {
        self.snapshot_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.products.clone())
    }

    async fn get_product(&self, product_id: i64) -> ImportResult<Option<CatalogProduct>> {
        Ok(self
            .products
            .iter()
            .find(|p| p.product_id == product_id)
            .cloned())
    }

    async fn find_warehouse(&self, label: &str) -> ImportResult<Option<Warehouse>> {
        self.exact_warehouse_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .warehouses
            .iter()
            .find(|w| w.code == label || w.name == label)
            .cloned())
    }

    async fn find_warehouses_by_normalized(&self, normalized: &str) -> ImportResult<Vec<Warehouse>> {
        Ok(self
            .warehouses
            .iter()
            .filter(|w| normalize_code(&w.code) == normalized || normalize_code(&w.name) == normalized)
            .cloned()
            .collect())
    }

    async fn list_warehouses(&self) -> ImportResult<Vec<Warehouse>> {
        Ok(self.warehouses.clone())
    }

    async fn get_warehouse(&self, warehouse_id: i64) -> ImportResult<Option<Warehouse>> {
        Ok(self
            .warehouses
            .iter()
            .find(|w| w.warehouse_id == warehouse_id)
            .cloned())
    }

    async fn search_products(&self, query: &str, limit: usize) -> ImportResult<Vec<CatalogProduct>> {
        let needle = query.to_lowercase();
        Ok(self
            .products
            .iter()
            .filter(|p| p.code.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// 记录写入的库存写入器，可对指定产品模拟失败
#[derive(Default)]
pub struct RecordingStockWriter {
    writes: Mutex<Vec<(i64, i64, f64)>>,
    fail_product: Option<i64>,
}

impl RecordingStockWriter {
    pub fn failing_for(product_id: i64) -> Self {
        Self {
            fail_product: Some(product_id),
            ..Default::default()
        }
    }

    pub fn writes(&self) -> Vec<(i64, i64, f64)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn total_for(&self, warehouse_id: i64, product_id: i64) -> f64 {
        self.writes()
            .iter()
            .filter(|(w, p, _)| *w == warehouse_id && *p == product_id)
            .map(|(_, _, q)| q)
            .sum()
    }
}

#[async_trait]
impl StockWriter for RecordingStockWriter {
    async fn add_quantity(
        &self,
        warehouse_id: i64,
        product_id: i64,
        quantity: f64,
    ) -> RepositoryResult<f64> {
        if self.fail_product == Some(product_id) {
            return Err(RepositoryError::DatabaseQueryError(
                "simulated write failure".to_string(),
            ));
        }
        let mut writes = self.writes.lock().unwrap();
        writes.push((warehouse_id, product_id, quantity));
        Ok(writes
            .iter()
            .filter(|(w, p, _)| *w == warehouse_id && *p == product_id)
            .map(|(_, _, q)| q)
            .sum())
    }
}
