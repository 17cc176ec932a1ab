// ==========================================
// 库存批量导入 - 预览汇总
// ==========================================
// 纯函数: 分类行集合 → 计数 + 可执行标记 + 各桶样本
// 样本取每个桶的最后 N 行（按行号升序输出）
// ==========================================

use crate::domain::inventory::{ClassifiedRow, PreviewResult, RowView};
use crate::domain::types::Bucket;

pub struct PreviewAggregator {
    sample_limit: usize,
}

impl PreviewAggregator {
    pub fn new(sample_limit: usize) -> Self {
        Self { sample_limit }
    }

    pub fn aggregate(&self, rows: &[ClassifiedRow]) -> PreviewResult {
        let mut valid = Vec::new();
        let mut suggested = Vec::new();
        let mut errors = Vec::new();

        for row in rows {
            match row.bucket() {
                Bucket::Valid => valid.push(row),
                Bucket::Suggested => suggested.push(row),
                Bucket::Error => errors.push(row),
            }
        }

        let total_rows = rows.len();
        PreviewResult {
            total_rows,
            valid_count: valid.len(),
            suggested_count: suggested.len(),
            error_count: errors.len(),
            can_execute_partial: !valid.is_empty(),
            can_execute_complete: total_rows > 0 && valid.len() == total_rows,
            sample_limit: self.sample_limit,
            valid_sample: self.tail(&valid),
            suggested_sample: self.tail(&suggested),
            error_sample: self.tail(&errors),
        }
    }

    fn tail(&self, rows: &[&ClassifiedRow]) -> Vec<RowView> {
        let start = rows.len().saturating_sub(self.sample_limit);
        rows[start..].iter().map(|r| RowView::from(*r)).collect()
    }
}
