// ==========================================
// 库存批量导入 - 重复键处理
// ==========================================
// 职责: 检测同批次内 (仓库, 产品) 重复的 VALID 行，按策略给出处置
//   - SUM:            全部提交，数量累加
//   - LAST_ROW_WINS:  仅提交行号最大的一行，其余计为跳过
//   - REJECT:         该键的所有行计为错误
// ==========================================

use crate::domain::types::DuplicateKeyPolicy;
use std::collections::{BTreeMap, HashMap};

/// 提交键
pub type StockKey = (i64, i64); // (warehouse_id, product_id)

/// 重复键处置结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuplicateResolution {
    /// 被后续行覆盖的行: row_index → 覆盖它的 row_index
    pub superseded: BTreeMap<usize, usize>,
    /// 因重复被拒绝的行
    pub rejected: Vec<usize>,
}

impl DuplicateResolution {
    pub fn is_excluded(&self, row_index: usize) -> bool {
        self.superseded.contains_key(&row_index) || self.rejected.contains(&row_index)
    }
}

/// 检测重复键
///
/// # 返回
/// - Vec<(行号, 键)>: 重复记录列表（不包括第一次出现）
pub fn detect_duplicates(rows: &[(usize, StockKey)]) -> Vec<(usize, StockKey)> {
    let mut first_occurrence: HashMap<StockKey, usize> = HashMap::new();
    let mut duplicates = Vec::new();

    for (row_index, key) in rows {
        if first_occurrence.contains_key(key) {
            duplicates.push((*row_index, *key));
        } else {
            first_occurrence.insert(*key, *row_index);
        }
    }

    duplicates
}

/// 按策略处置重复键
///
/// # 参数
/// - rows: VALID 行的 (行号, 键)，按行号升序
pub fn resolve_duplicates(
    rows: &[(usize, StockKey)],
    policy: DuplicateKeyPolicy,
) -> DuplicateResolution {
    let mut resolution = DuplicateResolution::default();
    if policy == DuplicateKeyPolicy::Sum || detect_duplicates(rows).is_empty() {
        return resolution;
    }

    let mut groups: HashMap<StockKey, Vec<usize>> = HashMap::new();
    for (row_index, key) in rows {
        groups.entry(*key).or_default().push(*row_index);
    }

    for indexes in groups.values().filter(|g| g.len() > 1) {
        match policy {
            DuplicateKeyPolicy::Sum => {}
            DuplicateKeyPolicy::LastRowWins => {
                let winner = indexes.iter().copied().max().unwrap_or_default();
                for &row_index in indexes.iter().filter(|&&i| i != winner) {
                    resolution.superseded.insert(row_index, winner);
                }
            }
            DuplicateKeyPolicy::Reject => resolution.rejected.extend(indexes.iter().copied()),
        }
    }
    resolution.rejected.sort_unstable();
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<(usize, StockKey)> {
        vec![(2, (1, 10)), (3, (1, 11)), (4, (1, 10)), (5, (2, 10)), (6, (1, 10))]
    }

    #[test]
    fn test_detect_duplicates_none() {
        let rows = vec![(2, (1, 10)), (3, (1, 11))];
        assert!(detect_duplicates(&rows).is_empty());
    }

    #[test]
    fn test_detect_duplicates_found() {
        let duplicates = detect_duplicates(&rows());
        assert_eq!(duplicates, vec![(4, (1, 10)), (6, (1, 10))]);
    }

    #[test]
    fn test_sum_keeps_everything() {
        let resolution = resolve_duplicates(&rows(), DuplicateKeyPolicy::Sum);
        assert_eq!(resolution, DuplicateResolution::default());
    }

    #[test]
    fn test_last_row_wins() {
        let resolution = resolve_duplicates(&rows(), DuplicateKeyPolicy::LastRowWins);

        assert_eq!(resolution.superseded.get(&2), Some(&6));
        assert_eq!(resolution.superseded.get(&4), Some(&6));
        assert_eq!(resolution.superseded.len(), 2);
        assert!(!resolution.is_excluded(6));
        // 不同仓库的同一产品不算重复
        assert!(!resolution.is_excluded(5));
    }

    #[test]
    fn test_reject_excludes_all_rows_of_key() {
        let resolution = resolve_duplicates(&rows(), DuplicateKeyPolicy::Reject);

        assert_eq!(resolution.rejected, vec![2, 4, 6]);
        assert!(resolution.superseded.is_empty());
        assert!(!resolution.is_excluded(3));
    }
}
