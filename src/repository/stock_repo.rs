// ==========================================
// 库存批量导入 - 库存写入仓储
// ==========================================
// 职责: 将提交行的数量累加到 stock(warehouse_id, product_id)
// 红线: Repository 不含业务规则，只做数据写入
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// StockWriter Trait
// ==========================================
// 用途: 提交引擎的逐行写入接口
// 实现者: SqliteStockRepository；测试中为可注入失败的实现
#[async_trait]
pub trait StockWriter: Send + Sync {
    /// 累加库存（记录不存在时以该数量插入）
    ///
    /// # 返回
    /// - Ok(f64): 写入后的库存数量
    async fn add_quantity(
        &self,
        warehouse_id: i64,
        product_id: i64,
        quantity: f64,
    ) -> RepositoryResult<f64>;
}

// ==========================================
// SqliteStockRepository
// ==========================================
pub struct SqliteStockRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStockRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询当前库存
    pub fn get_quantity(&self, warehouse_id: i64, product_id: i64) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;
        let quantity = conn
            .query_row(
                "SELECT quantity FROM stock WHERE warehouse_id = ?1 AND product_id = ?2",
                params![warehouse_id, product_id],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(quantity)
    }
}

#[async_trait]
impl StockWriter for SqliteStockRepository {
    async fn add_quantity(
        &self,
        warehouse_id: i64,
        product_id: i64,
        quantity: f64,
    ) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO stock (warehouse_id, product_id, quantity, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(warehouse_id, product_id) DO UPDATE SET
                quantity = stock.quantity + excluded.quantity,
                updated_at = excluded.updated_at
            "#,
            params![warehouse_id, product_id, quantity, now],
        )?;

        let total: f64 = conn.query_row(
            "SELECT quantity FROM stock WHERE warehouse_id = ?1 AND product_id = ?2",
            params![warehouse_id, product_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn repo() -> SqliteStockRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO warehouse (warehouse_id, code, name, normalized_code, normalized_name)
             VALUES (1, 'MAIN', 'Main Warehouse', 'main', 'mainwarehouse');
             INSERT INTO product (product_id, code, normalized_code) VALUES (10, 'ABC-01', 'abc01');",
        )
        .unwrap();
        SqliteStockRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_add_quantity_inserts_then_increments() {
        let repo = repo();
        assert_eq!(repo.get_quantity(1, 10).unwrap(), None);

        assert_eq!(repo.add_quantity(1, 10, 5.0).await.unwrap(), 5.0);
        assert_eq!(repo.add_quantity(1, 10, 2.5).await.unwrap(), 7.5);
        assert_eq!(repo.get_quantity(1, 10).unwrap(), Some(7.5));
    }

    #[tokio::test]
    async fn test_unknown_product_violates_foreign_key() {
        let repo = repo();
        let result = repo.add_quantity(1, 999, 1.0).await;
        assert!(result.is_err());
    }
}
