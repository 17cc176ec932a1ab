// ==========================================
// 库存批量导入 - 配置快照
// ==========================================
// 每个请求加载一次，流程内各组件共享同一份参数
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::domain::types::DuplicateKeyPolicy;
use crate::engine::classifier::ClassifierSettings;
use crate::importer::error::ImportResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub max_batch_bytes: usize,
    pub fuzzy_threshold: u8,
    pub min_quantity: f64,
    pub sample_size: usize,
    pub resolver_concurrency: usize,
    pub duplicate_policy: DuplicateKeyPolicy,
    pub fuzzy_use_description: bool,
    pub session_retention_days: i64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_batch_bytes: 10_485_760,
            fuzzy_threshold: 70,
            min_quantity: 0.0001,
            sample_size: 20,
            resolver_concurrency: 8,
            duplicate_policy: DuplicateKeyPolicy::Sum,
            fuzzy_use_description: false,
            session_retention_days: 7,
        }
    }
}

impl ImportSettings {
    /// 从配置读取器加载快照
    pub async fn load(reader: &dyn ImportConfigReader) -> ImportResult<Self> {
        Ok(Self {
            max_batch_bytes: reader.get_max_batch_bytes().await?,
            fuzzy_threshold: reader.get_fuzzy_threshold().await?,
            min_quantity: reader.get_min_quantity().await?,
            sample_size: reader.get_sample_size().await?,
            resolver_concurrency: reader.get_resolver_concurrency().await?,
            duplicate_policy: reader.get_duplicate_policy().await?,
            fuzzy_use_description: reader.get_fuzzy_use_description().await?,
            session_retention_days: reader.get_session_retention_days().await?,
        })
    }

    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            fuzzy_threshold: self.fuzzy_threshold,
            min_quantity: self.min_quantity,
            resolver_concurrency: self.resolver_concurrency,
            use_description: self.fuzzy_use_description,
        }
    }
}
