// ==========================================
// 库存批量导入 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::DuplicateKeyPolicy;
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock_error(key: &str, e: impl std::fmt::Display) -> ImportError {
        ImportError::ConfigReadError {
            key: key.to_string(),
            message: format!("锁获取失败: {}", e),
        }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| Self::lock_error(key, e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ImportError::ConfigReadError {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = self.conn.lock().map_err(|e| Self::lock_error(key, e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )
        .map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// 获取所有 global 配置的快照
    pub fn get_config_snapshot(&self) -> ImportResult<BTreeMap<String, String>> {
        let conn = self.conn.lock().map_err(|e| Self::lock_error("*", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut snapshot = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }

    /// 读取并解析配置值，缺失或格式错误时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ImportResult<T>
    where
        T: FromStr + std::fmt::Debug,
    {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!(config_key = key, raw_value = %raw, default = ?default, "配置值格式错误，使用默认值");
                Ok(default)
            }
        }
    }
}

/// 会话保留期上限（天）
pub const MAX_SESSION_RETENTION_DAYS: i64 = 36_500;

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 行提取
    pub const MAX_BATCH_BYTES: &str = "import_max_batch_bytes";

    // 分类
    pub const FUZZY_THRESHOLD: &str = "import_fuzzy_threshold";
    pub const MIN_QUANTITY: &str = "import_min_quantity";
    pub const RESOLVER_CONCURRENCY: &str = "import_resolver_concurrency";
    pub const FUZZY_USE_DESCRIPTION: &str = "import_fuzzy_use_description";

    // 预览
    pub const SAMPLE_SIZE: &str = "import_sample_size";

    // 提交
    pub const DUPLICATE_POLICY: &str = "import_duplicate_policy";

    // 会话
    pub const SESSION_RETENTION_DAYS: &str = "import_session_retention_days";
}

// ==========================================
// ImportConfigReader 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_max_batch_bytes(&self) -> ImportResult<usize> {
        let value = self.get_parsed_or_default(config_keys::MAX_BATCH_BYTES, 10_485_760usize)?;
        if value == 0 {
            warn!(config_key = config_keys::MAX_BATCH_BYTES, "上限不可为 0，使用默认值");
            return Ok(10_485_760);
        }
        Ok(value)
    }

    async fn get_fuzzy_threshold(&self) -> ImportResult<u8> {
        let value = self.get_parsed_or_default(config_keys::FUZZY_THRESHOLD, 70u8)?;
        if value > 100 {
            warn!(config_key = config_keys::FUZZY_THRESHOLD, value, "阈值超出 0-100，使用默认值");
            return Ok(70);
        }
        Ok(value)
    }

    async fn get_min_quantity(&self) -> ImportResult<f64> {
        let value = self.get_parsed_or_default(config_keys::MIN_QUANTITY, 0.0001f64)?;
        if !value.is_finite() || value <= 0.0 {
            warn!(config_key = config_keys::MIN_QUANTITY, value, "最小数量必须为正数，使用默认值");
            return Ok(0.0001);
        }
        Ok(value)
    }

    async fn get_resolver_concurrency(&self) -> ImportResult<usize> {
        let value = self.get_parsed_or_default(config_keys::RESOLVER_CONCURRENCY, 8usize)?;
        Ok(value.max(1))
    }

    async fn get_fuzzy_use_description(&self) -> ImportResult<bool> {
        let raw = self.get_global_config_value(config_keys::FUZZY_USE_DESCRIPTION)?;
        Ok(match raw.as_deref().map(|v| v.trim().to_lowercase()) {
            None => false,
            Some(v) if v == "true" || v == "1" || v == "yes" => true,
            Some(v) if v == "false" || v == "0" || v == "no" => false,
            Some(v) => {
                warn!(config_key = config_keys::FUZZY_USE_DESCRIPTION, raw_value = %v, "配置值格式错误，使用默认值");
                false
            }
        })
    }

    async fn get_sample_size(&self) -> ImportResult<usize> {
        self.get_parsed_or_default(config_keys::SAMPLE_SIZE, 20usize)
    }

    async fn get_duplicate_policy(&self) -> ImportResult<DuplicateKeyPolicy> {
        self.get_parsed_or_default(config_keys::DUPLICATE_POLICY, DuplicateKeyPolicy::Sum)
    }

    async fn get_session_retention_days(&self) -> ImportResult<i64> {
        let value = self.get_parsed_or_default(config_keys::SESSION_RETENTION_DAYS, 7i64)?;
        if value > MAX_SESSION_RETENTION_DAYS {
            warn!(
                config_key = config_keys::SESSION_RETENTION_DAYS,
                value,
                max = MAX_SESSION_RETENTION_DAYS,
                "会话保留期过大，已截断"
            );
            return Ok(MAX_SESSION_RETENTION_DAYS);
        }
        Ok(value.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let config = manager();

        assert_eq!(config.get_max_batch_bytes().await.unwrap(), 10_485_760);
        assert_eq!(config.get_fuzzy_threshold().await.unwrap(), 70);
        assert_eq!(config.get_min_quantity().await.unwrap(), 0.0001);
        assert_eq!(config.get_sample_size().await.unwrap(), 20);
        assert_eq!(config.get_resolver_concurrency().await.unwrap(), 8);
        assert_eq!(config.get_duplicate_policy().await.unwrap(), DuplicateKeyPolicy::Sum);
        assert!(!config.get_fuzzy_use_description().await.unwrap());
        assert_eq!(config.get_session_retention_days().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_overrides_are_read() {
        let config = manager();
        config.set_global_config_value(config_keys::FUZZY_THRESHOLD, "85").unwrap();
        config
            .set_global_config_value(config_keys::DUPLICATE_POLICY, "last_row_wins")
            .unwrap();
        config
            .set_global_config_value(config_keys::FUZZY_USE_DESCRIPTION, "true")
            .unwrap();

        assert_eq!(config.get_fuzzy_threshold().await.unwrap(), 85);
        assert_eq!(
            config.get_duplicate_policy().await.unwrap(),
            DuplicateKeyPolicy::LastRowWins
        );
        assert!(config.get_fuzzy_use_description().await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_values_fall_back() {
        let config = manager();
        config.set_global_config_value(config_keys::FUZZY_THRESHOLD, "abc").unwrap();
        config.set_global_config_value(config_keys::MIN_QUANTITY, "-1").unwrap();
        config.set_global_config_value(config_keys::DUPLICATE_POLICY, "MERGE").unwrap();

        assert_eq!(config.get_fuzzy_threshold().await.unwrap(), 70);
        assert_eq!(config.get_min_quantity().await.unwrap(), 0.0001);
        assert_eq!(config.get_duplicate_policy().await.unwrap(), DuplicateKeyPolicy::Sum);
    }

    #[tokio::test]
    async fn test_session_retention_is_clamped() {
        let config = manager();
        config
            .set_global_config_value(config_keys::SESSION_RETENTION_DAYS, "100000000000000")
            .unwrap();
        assert_eq!(
            config.get_session_retention_days().await.unwrap(),
            MAX_SESSION_RETENTION_DAYS
        );

        config
            .set_global_config_value(config_keys::SESSION_RETENTION_DAYS, "-3")
            .unwrap();
        assert_eq!(config.get_session_retention_days().await.unwrap(), 0);
    }

    #[test]
    fn test_snapshot() {
        let config = manager();
        config.set_global_config_value(config_keys::SAMPLE_SIZE, "5").unwrap();
        config.set_global_config_value(config_keys::SAMPLE_SIZE, "6").unwrap();

        let snapshot = config.get_config_snapshot().unwrap();
        assert_eq!(snapshot.get(config_keys::SAMPLE_SIZE).map(String::as_str), Some("6"));
    }
}
