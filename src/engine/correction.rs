// ==========================================
// 库存批量导入 - 人工修正会话
// ==========================================
// 动作:
//   - AcceptSuggestion:     SUGGESTED → VALID（接受该行全部建议）
//   - ManualBind:           ERROR → VALID（产品是唯一阻断原因时）
//   - ManualBindWarehouse:  解决仓库阻断；其余原因仍在时行保持 ERROR
// 红线: 只向 VALID 方向移动，任何动作不得让 VALID 行回退
// 幂等: 对已生效的同一动作重放返回 changed = false
// ==========================================

use crate::domain::inventory::{
    CatalogProduct, ClassifiedRow, CorrectionAction, FieldResolution, Warehouse,
};
use crate::domain::types::{Bucket, MatchKind};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::CatalogResolver;
use tracing::{debug, info, instrument};

/// 单次修正结果
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionOutcome {
    pub row: ClassifiedRow,
    pub changed: bool,
}

fn manual(id: i64) -> FieldResolution {
    FieldResolution::Matched {
        id,
        kind: MatchKind::ManualCorrection,
    }
}

fn is_failing(field: &FieldResolution) -> bool {
    matches!(field, FieldResolution::Unresolved | FieldResolution::Missing)
}

fn not_applicable(row: &ClassifiedRow, message: impl Into<String>) -> ImportError {
    ImportError::CorrectionNotApplicable {
        row_index: row.row_index(),
        bucket: row.bucket().to_string(),
        message: message.into(),
    }
}

// ==========================================
// CorrectionSession
// ==========================================
pub struct CorrectionSession<'a> {
    rows: &'a mut [ClassifiedRow],
}

impl<'a> CorrectionSession<'a> {
    pub fn new(rows: &'a mut [ClassifiedRow]) -> Self {
        Self { rows }
    }

    fn row_mut(&mut self, row_index: usize) -> ImportResult<&mut ClassifiedRow> {
        self.rows
            .iter_mut()
            .find(|r| r.row_index() == row_index)
            .ok_or(ImportError::RowNotFound(row_index))
    }

    /// 执行修正动作（绑定类动作先经目录校验）
    #[instrument(skip(self, resolver), fields(row_index = action.row_index()))]
    pub async fn apply(
        &mut self,
        action: &CorrectionAction,
        resolver: &dyn CatalogResolver,
    ) -> ImportResult<CorrectionOutcome> {
        let outcome = match action {
            CorrectionAction::AcceptSuggestion { row_index } => {
                self.accept_suggestion(*row_index)?
            }
            CorrectionAction::ManualBind {
                row_index,
                product_id,
            } => {
                // 先确认行存在，避免无谓的目录查询
                self.row_mut(*row_index)?;
                let product = resolver.get_product(*product_id).await?.ok_or_else(|| {
                    ImportError::CatalogEntryNotFound {
                        entity: "product".to_string(),
                        id: *product_id,
                    }
                })?;
                self.bind_product(*row_index, &product)?
            }
            CorrectionAction::ManualBindWarehouse {
                row_index,
                warehouse_id,
            } => {
                self.row_mut(*row_index)?;
                let warehouse = resolver.get_warehouse(*warehouse_id).await?.ok_or_else(|| {
                    ImportError::CatalogEntryNotFound {
                        entity: "warehouse".to_string(),
                        id: *warehouse_id,
                    }
                })?;
                self.bind_warehouse(*row_index, &warehouse)?
            }
        };

        info!(
            bucket = %outcome.row.bucket(),
            changed = outcome.changed,
            "修正动作已应用"
        );
        Ok(outcome)
    }

    /// 接受建议
    pub fn accept_suggestion(&mut self, row_index: usize) -> ImportResult<CorrectionOutcome> {
        let row = self.row_mut(row_index)?;

        match row.bucket() {
            Bucket::Suggested => {}
            Bucket::Valid if row.suggestion_accepted => {
                debug!(row_index, "重复接受建议，忽略");
                return Ok(CorrectionOutcome {
                    row: row.clone(),
                    changed: false,
                });
            }
            _ => return Err(not_applicable(row, "仅 SUGGESTED 行可接受建议")),
        }

        if let FieldResolution::Suggested { candidate_id, .. } = row.product {
            row.product = manual(candidate_id);
        }
        if let FieldResolution::Suggested { candidate_id, .. } = row.warehouse {
            row.warehouse = manual(candidate_id);
        }
        row.suggestion_accepted = true;

        Ok(CorrectionOutcome {
            row: row.clone(),
            changed: true,
        })
    }

    /// 绑定产品（product 已经过目录校验）
    pub fn bind_product(
        &mut self,
        row_index: usize,
        product: &CatalogProduct,
    ) -> ImportResult<CorrectionOutcome> {
        let row = self.row_mut(row_index)?;

        if row.product == manual(product.product_id) && row.bucket() != Bucket::Error {
            return Ok(CorrectionOutcome {
                row: row.clone(),
                changed: false,
            });
        }
        if row.bucket() != Bucket::Error {
            return Err(not_applicable(row, "仅 ERROR 行可人工绑定产品"));
        }
        if !is_failing(&row.product) {
            return Err(not_applicable(row, "该行产品并非阻断原因"));
        }

        let mut candidate = row.clone();
        candidate.product = manual(product.product_id);
        if candidate.bucket() == Bucket::Error {
            let reason = candidate.error_reason().unwrap_or_default();
            return Err(not_applicable(row, format!("绑定后仍有阻断: {}", reason)));
        }

        *row = candidate;
        Ok(CorrectionOutcome {
            row: row.clone(),
            changed: true,
        })
    }

    /// 绑定仓库（warehouse 已经过目录校验）
    pub fn bind_warehouse(
        &mut self,
        row_index: usize,
        warehouse: &Warehouse,
    ) -> ImportResult<CorrectionOutcome> {
        let row = self.row_mut(row_index)?;

        if row.warehouse == manual(warehouse.warehouse_id) {
            return Ok(CorrectionOutcome {
                row: row.clone(),
                changed: false,
            });
        }
        if row.bucket() != Bucket::Error {
            return Err(not_applicable(row, "仅 ERROR 行可人工绑定仓库"));
        }
        if !is_failing(&row.warehouse) {
            return Err(not_applicable(row, "该行仓库并非阻断原因"));
        }

        row.warehouse = manual(warehouse.warehouse_id);
        Ok(CorrectionOutcome {
            row: row.clone(),
            changed: true,
        })
    }
}
