// ==========================================
// 库存批量导入 - 提交引擎
// ==========================================
// 模式:
//   - ONLY_VALID:  提交全部 VALID 行；SUGGESTED 计为跳过，ERROR 计为错误
//   - ALL_PERFECT: 存在任何 SUGGESTED/ERROR 行时整批拒绝，零写入
// 写入: 逐行尽力提交，单行写入失败计为错误，不影响其他行
// 红线: processed + error + skipped = total_rows
// ==========================================

use crate::domain::inventory::{
    ClassifiedRow, ExecutionOutcome, ExecutionRefusal, ExecutionResult, FieldResolution,
    NotFoundProduct, RowFailure, RowStatus,
};
use crate::domain::types::{DuplicateKeyPolicy, ExecutionMode};
use crate::engine::duplicate::{resolve_duplicates, StockKey};
use crate::i18n::t_with_args;
use crate::repository::stock_repo::StockWriter;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// 重复键被拒绝时的行级原因
pub const DUPLICATE_KEY_REASON: &str = "duplicate warehouse/product in batch";

pub struct ExecutionEngine {
    writer: Arc<dyn StockWriter>,
    duplicate_policy: DuplicateKeyPolicy,
}

impl ExecutionEngine {
    pub fn new(writer: Arc<dyn StockWriter>, duplicate_policy: DuplicateKeyPolicy) -> Self {
        Self {
            writer,
            duplicate_policy,
        }
    }

    /// ALL_PERFECT 前置检查：存在 SUGGESTED/ERROR 行时返回拒绝，不触发任何写入
    pub fn check_refusal(
        &self,
        session_id: &str,
        rows: &[ClassifiedRow],
        mode: ExecutionMode,
    ) -> Option<ExecutionRefusal> {
        if mode != ExecutionMode::AllPerfect {
            return None;
        }
        let mut suggested_count = 0usize;
        let mut blocked_count = 0usize;
        for row in rows {
            match row.status() {
                RowStatus::Suggested { .. } => suggested_count += 1,
                RowStatus::Error { .. } => blocked_count += 1,
                RowStatus::Valid { .. } => {}
            }
        }
        if suggested_count == 0 && blocked_count == 0 {
            return None;
        }

        warn!(suggested_count, error_count = blocked_count, "完整模式被拒绝");
        let suggested = suggested_count.to_string();
        let errors = blocked_count.to_string();
        Some(ExecutionRefusal {
            session_id: session_id.to_string(),
            suggested_count,
            error_count: blocked_count,
            message: t_with_args(
                "import.execution_refused",
                &[("suggested", suggested.as_str()), ("errors", errors.as_str())],
            ),
        })
    }

    /// 执行提交
    ///
    /// # 参数
    /// - session_id: 会话 ID（写入报告）
    /// - rows: 当前完整的分类行集合（含修正）
    /// - mode: 提交模式
    #[instrument(skip(self, rows), fields(total_rows = rows.len(), policy = %self.duplicate_policy))]
    pub async fn execute(
        &self,
        session_id: &str,
        rows: &[ClassifiedRow],
        mode: ExecutionMode,
    ) -> ExecutionOutcome {
        // === 步骤 1: ALL_PERFECT 前置检查 ===
        if let Some(refusal) = self.check_refusal(session_id, rows, mode) {
            return ExecutionOutcome::Refused(refusal);
        }
        let statuses: Vec<RowStatus> = rows.iter().map(|r| r.status()).collect();

        // === 步骤 2: 重复键处置 ===
        let valid_keys: Vec<(usize, StockKey)> = rows
            .iter()
            .zip(&statuses)
            .filter_map(|(row, status)| match status {
                RowStatus::Valid {
                    product_id,
                    warehouse_id,
                    ..
                } => Some((row.row_index(), (*warehouse_id, *product_id))),
                _ => None,
            })
            .collect();
        let duplicates = resolve_duplicates(&valid_keys, self.duplicate_policy);

        // === 步骤 3: 逐行处理 ===
        let mut processed_count = 0usize;
        let mut error_count = 0usize;
        let mut skipped_rows = Vec::new();
        let mut row_failures = Vec::new();
        let mut products_not_found = Vec::new();
        let mut warehouses_not_found = Vec::new();
        let mut seen_products = HashSet::new();
        let mut seen_warehouses = HashSet::new();

        for (row, status) in rows.iter().zip(statuses) {
            let row_index = row.row_index();
            match status {
                RowStatus::Suggested { .. } => skipped_rows.push(row_index),
                RowStatus::Error { .. } => {
                    error_count += 1;
                    row_failures.push(RowFailure {
                        row_index,
                        reason: row.error_reason().unwrap_or_default(),
                    });

                    if let (FieldResolution::Unresolved, Some(code)) =
                        (&row.product, &row.raw.product_code)
                    {
                        if seen_products.insert(code.clone()) {
                            products_not_found.push(NotFoundProduct {
                                code: code.clone(),
                                description: row.raw.description.clone(),
                            });
                        }
                    }
                    if let (FieldResolution::Unresolved, Some(label)) =
                        (&row.warehouse, &row.raw.warehouse_label)
                    {
                        if seen_warehouses.insert(label.clone()) {
                            warehouses_not_found.push(label.clone());
                        }
                    }
                }
                RowStatus::Valid {
                    product_id,
                    warehouse_id,
                    ..
                } => {
                    if let Some(winner) = duplicates.superseded.get(&row_index) {
                        debug!(row_index, superseded_by = winner, "重复键，被后续行覆盖");
                        skipped_rows.push(row_index);
                        continue;
                    }
                    if duplicates.rejected.contains(&row_index) {
                        error_count += 1;
                        row_failures.push(RowFailure {
                            row_index,
                            reason: DUPLICATE_KEY_REASON.to_string(),
                        });
                        continue;
                    }

                    let quantity = row.raw.quantity.unwrap_or_default();
                    match self
                        .writer
                        .add_quantity(warehouse_id, product_id, quantity)
                        .await
                    {
                        Ok(_) => processed_count += 1,
                        Err(e) => {
                            error!(row_index, error = %e, "库存写入失败");
                            error_count += 1;
                            row_failures.push(RowFailure {
                                row_index,
                                reason: format!("stock write failed: {}", e),
                            });
                        }
                    }
                }
            }
        }

        // === 步骤 4: 汇总 ===
        let total_rows = rows.len();
        let skipped_count = skipped_rows.len();
        let counts = [
            total_rows.to_string(),
            processed_count.to_string(),
            error_count.to_string(),
            skipped_count.to_string(),
        ];
        let summary_message = t_with_args(
            "import.execution_summary",
            &[
                ("total", counts[0].as_str()),
                ("processed", counts[1].as_str()),
                ("errors", counts[2].as_str()),
                ("skipped", counts[3].as_str()),
            ],
        );

        let result = ExecutionResult {
            session_id: session_id.to_string(),
            mode,
            processed_count,
            error_count,
            skipped_count,
            total_rows,
            summary_message,
            products_not_found,
            warehouses_not_found,
            row_failures,
            skipped_rows,
            executed_at: Utc::now(),
        };
        debug_assert!(result.is_balanced());

        info!(processed_count, error_count, skipped_count, "提交完成");
        ExecutionOutcome::Executed(result)
    }
}
