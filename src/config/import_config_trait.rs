// ==========================================
// 库存批量导入 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入流程所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::DuplicateKeyPolicy;
use crate::importer::error::ImportResult;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入流程所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
// 约定: 值缺失或格式错误时返回默认值，不报错
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 行提取 =====

    /// 批次文件大小上限（字节）
    ///
    /// # 默认值
    /// - 10485760 (10 MiB)
    async fn get_max_batch_bytes(&self) -> ImportResult<usize>;

    // ===== 分类 =====

    /// 模糊建议的最低相似度（0-100）
    ///
    /// # 默认值
    /// - 70
    async fn get_fuzzy_threshold(&self) -> ImportResult<u8>;

    /// 最小有效数量
    ///
    /// # 默认值
    /// - 0.0001
    async fn get_min_quantity(&self) -> ImportResult<f64>;

    /// 目录查询最大并发数
    ///
    /// # 默认值
    /// - 8
    async fn get_resolver_concurrency(&self) -> ImportResult<usize>;

    /// 模糊建议是否同时比对描述
    ///
    /// # 默认值
    /// - false
    async fn get_fuzzy_use_description(&self) -> ImportResult<bool>;

    // ===== 预览 =====

    /// 每个桶返回的样本行数
    ///
    /// # 默认值
    /// - 20
    async fn get_sample_size(&self) -> ImportResult<usize>;

    // ===== 提交 =====

    /// 同批次重复 (仓库, 产品) 处理策略
    ///
    /// # 默认值
    /// - SUM
    async fn get_duplicate_policy(&self) -> ImportResult<DuplicateKeyPolicy>;

    // ===== 会话 =====

    /// 会话保留天数（超期会话可被清理）
    ///
    /// # 默认值
    /// - 7
    async fn get_session_retention_days(&self) -> ImportResult<i64>;
}
