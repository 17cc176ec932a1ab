// ==========================================
// 库存批量导入 - 引擎层
// ==========================================
// 职责: 分类 / 预览汇总 / 人工修正 / 提交
// 红线: Engine 不拼 SQL，数据访问只经由 Trait
// ==========================================

pub mod classifier;
pub mod correction;
pub mod duplicate;
pub mod executor;
pub mod preview;
pub mod similarity;

#[cfg(test)]
pub(crate) mod test_support;

// 重导出核心引擎
pub use classifier::{Classifier, ClassifierSettings};
pub use correction::{CorrectionOutcome, CorrectionSession};
pub use duplicate::{detect_duplicates, resolve_duplicates, DuplicateResolution, StockKey};
pub use executor::{ExecutionEngine, DUPLICATE_KEY_REASON};
pub use preview::PreviewAggregator;
pub use similarity::{best_match, similarity_score, FuzzyCandidate, FuzzyMatch};
