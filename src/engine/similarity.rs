// ==========================================
// 库存批量导入 - 相似度评分
// ==========================================
// 纯函数: (输入, 候选集) → 最佳候选
// 算法: 归一化 Levenshtein（strsim），按 0-100 取整
// 排序: 分数降序，同分按候选编码字典序升序
// ==========================================

use crate::importer::data_cleaner::fuzzy_key;
use std::cmp::Ordering;

/// 两个字符串的相似度（0-100）
///
/// 分数 = round((1 - 编辑距离 / 较长串长度) * 100)。
/// 六字符编码错一位得 83（如 `ABX-01` 对 `ABC-01`，5/6 ≈ 0.833），而非 85；
/// 默认阈值 70 下它仍是建议，阈值调到 84 以上时这类单字符错误会直接落入 ERROR。
pub fn similarity_score(a: &str, b: &str) -> u8 {
    let a = fuzzy_key(a);
    let b = fuzzy_key(b);
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let ratio = strsim::normalized_levenshtein(&a, &b);
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

/// 待评分候选
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyCandidate<'a> {
    pub id: i64,
    pub code: &'a str,
    /// 可选的第二比对文本（如产品描述）
    pub alt_text: Option<&'a str>,
}

/// 评分结果
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub id: i64,
    pub code: String,
    pub score: u8,
}

/// 候选排序规则: 分数降序，同分按编码升序
pub fn rank(a: &FuzzyMatch, b: &FuzzyMatch) -> Ordering {
    b.score.cmp(&a.score).then_with(|| a.code.cmp(&b.code))
}

/// 选出不低于阈值的最佳候选
///
/// # 参数
/// - input: 源编码
/// - alt_input: 源描述（仅当候选也有描述时参与，取两者较高分）
/// - candidates: 候选集
/// - threshold: 最低分数（含）
pub fn best_match(
    input: &str,
    alt_input: Option<&str>,
    candidates: &[FuzzyCandidate<'_>],
    threshold: u8,
) -> Option<FuzzyMatch> {
    candidates
        .iter()
        .map(|candidate| {
            let code_score = similarity_score(input, candidate.code);
            let alt_score = match (alt_input, candidate.alt_text) {
                (Some(a), Some(b)) => similarity_score(a, b),
                _ => 0,
            };
            FuzzyMatch {
                id: candidate.id,
                code: candidate.code.to_string(),
                score: code_score.max(alt_score),
            }
        })
        .filter(|m| m.score >= threshold)
        .min_by(rank)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<FuzzyCandidate<'static>> {
        vec![
            FuzzyCandidate {
                id: 1,
                code: "ABC-01",
                alt_text: Some("Blue widget"),
            },
            FuzzyCandidate {
                id: 2,
                code: "XYZ-99",
                alt_text: Some("Red gadget"),
            },
        ]
    }

    #[test]
    fn test_similarity_one_char_typo() {
        // 6 个字符中 1 处替换
        assert_eq!(similarity_score("ABX-01", "ABC-01"), 83);
        assert_eq!(similarity_score("abc-01", "ABC-01"), 100);
        assert_eq!(similarity_score("", "ABC-01"), 0);
    }

    #[test]
    fn test_best_match_above_threshold() {
        let found = best_match("ABX-01", None, &candidates(), 70).unwrap();
        assert_eq!(found.id, 1);
        assert_eq!(found.score, 83);
    }

    #[test]
    fn test_best_match_below_threshold() {
        assert_eq!(best_match("QQQ-77", None, &candidates(), 70), None);
    }

    #[test]
    fn test_alt_text_can_lift_score() {
        let without = best_match("WID-1", None, &candidates(), 70);
        assert_eq!(without, None);

        let with = best_match("WID-1", Some("Blue widget"), &candidates(), 70).unwrap();
        assert_eq!(with.id, 1);
        assert_eq!(with.score, 100);
    }

    #[test]
    fn test_tie_breaks_on_lexical_code() {
        let tied = vec![
            FuzzyCandidate {
                id: 7,
                code: "ABD-01",
                alt_text: None,
            },
            FuzzyCandidate {
                id: 8,
                code: "ABB-01",
                alt_text: None,
            },
        ];
        // 两者与输入都只差 1 个字符
        let found = best_match("ABC-01", None, &tied, 70).unwrap();
        assert_eq!(found.score, 83);
        assert_eq!(found.code, "ABB-01");
        assert_eq!(found.id, 8);
    }

    #[test]
    fn test_highest_score_wins_over_lexical_order() {
        let list = vec![
            FuzzyCandidate {
                id: 1,
                code: "AAAA-0",
                alt_text: None,
            },
            FuzzyCandidate {
                id: 2,
                code: "ABC-012",
                alt_text: None,
            },
        ];
        let found = best_match("ABC-01", None, &list, 50).unwrap();
        assert_eq!(found.id, 2);
    }
}
