// ==========================================
// 库存批量导入 - 领域模型
// ==========================================
// 批次文件 → 原始行 → 分类行 → 预览 → 人工修正 → 提交结果
// 红线: 每个原始行在任意时刻只对应一个分类行，且最终报告中恰好计数一次
// ==========================================

use crate::domain::types::{Bucket, ExecutionMode, MatchKind, RowErrorReason, SessionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// BatchFile - 上传的批次文件
// ==========================================
// 生命周期: 仅在上传请求内，解析后即丢弃
#[derive(Debug, Clone)]
pub struct BatchFile {
    pub file_name: Option<String>, // 原始文件名（仅用于日志与会话记录）
    pub media_type: String,        // 声明的媒体类型
    pub content: Vec<u8>,          // 文件字节
}

impl BatchFile {
    pub fn new(file_name: Option<String>, media_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            file_name,
            media_type: media_type.into(),
            content,
        }
    }

    /// 字节大小
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

// ==========================================
// RawRow - 原始行
// ==========================================
// row_index: 表格中的物理行号（表头为第 1 行），贯穿预览/修正/报告
// 文本字段保留原样（不 TRIM），精确匹配需要原始字节
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub row_index: usize,
    pub warehouse_label: Option<String>,
    pub product_code: Option<String>,
    pub description: Option<String>,
    pub quantity_text: Option<String>, // 数量原始文本
    pub quantity: Option<f64>,         // 数量解析结果（缺失或无法解析为 None）
    pub unit_label: Option<String>,
}

// ==========================================
// 目录实体（外部目录服务的规范身份）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub product_id: i64,
    pub code: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub warehouse_id: i64,
    pub code: String,
    pub name: String,
}

// ==========================================
// FieldResolution - 单个字段（产品/仓库）的解析结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldResolution {
    /// 已确定目录身份
    Matched { id: i64, kind: MatchKind },
    /// 模糊建议，待人工确认
    Suggested {
        candidate_id: i64,
        candidate_label: String,
        score: u8,
    },
    /// 有值但目录中找不到
    Unresolved,
    /// 源数据为空
    Missing,
}

impl FieldResolution {
    pub fn matched_id(&self) -> Option<i64> {
        match self {
            FieldResolution::Matched { id, .. } => Some(*id),
            _ => None,
        }
    }
}

// ==========================================
// ClassifiedRow - 分类行
// ==========================================
// 仅由分类器创建，仅由修正会话修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    pub raw: RawRow,
    pub product: FieldResolution,
    pub warehouse: FieldResolution,
    pub quantity_ok: bool, // 数量 ≥ 最小阈值
    /// 经 AcceptSuggestion 转为 VALID（用于识别重放）
    #[serde(default)]
    pub suggestion_accepted: bool,
}

/// 分类行的状态视图
///
/// 由产品/仓库/数量三个维度派生，消费方必须穷举三种情况。
#[derive(Debug, Clone, PartialEq)]
pub enum RowStatus {
    Valid {
        product_id: i64,
        warehouse_id: i64,
        match_kind: MatchKind,
    },
    Suggested {
        candidate_product_id: Option<i64>,
        candidate_warehouse_id: Option<i64>,
        similarity_score: u8,
    },
    Error { reasons: Vec<RowErrorReason> },
}

impl ClassifiedRow {
    pub fn row_index(&self) -> usize {
        self.raw.row_index
    }

    /// 全部错误原因（固定顺序: 产品 → 仓库 → 数量）
    pub fn error_reasons(&self) -> Vec<RowErrorReason> {
        let mut reasons = Vec::new();
        match self.product {
            FieldResolution::Missing => reasons.push(RowErrorReason::MissingProductCode),
            FieldResolution::Unresolved => reasons.push(RowErrorReason::ProductNotFound),
            _ => {}
        }
        match self.warehouse {
            FieldResolution::Missing => reasons.push(RowErrorReason::MissingWarehouse),
            FieldResolution::Unresolved => reasons.push(RowErrorReason::WarehouseNotFound),
            _ => {}
        }
        if !self.quantity_ok {
            reasons.push(RowErrorReason::InvalidQuantity);
        }
        reasons
    }

    pub fn status(&self) -> RowStatus {
        let reasons = self.error_reasons();
        if !reasons.is_empty() {
            return RowStatus::Error { reasons };
        }

        match (&self.product, &self.warehouse) {
            (
                FieldResolution::Matched { id: product_id, kind },
                FieldResolution::Matched { id: warehouse_id, .. },
            ) => RowStatus::Valid {
                product_id: *product_id,
                warehouse_id: *warehouse_id,
                match_kind: *kind,
            },
            (product, warehouse) => {
                let mut candidate_product_id = None;
                let mut candidate_warehouse_id = None;
                let mut score = 100u8;
                if let FieldResolution::Suggested {
                    candidate_id,
                    score: s,
                    ..
                } = product
                {
                    candidate_product_id = Some(*candidate_id);
                    score = score.min(*s);
                }
                if let FieldResolution::Suggested {
                    candidate_id,
                    score: s,
                    ..
                } = warehouse
                {
                    candidate_warehouse_id = Some(*candidate_id);
                    score = score.min(*s);
                }
                RowStatus::Suggested {
                    candidate_product_id,
                    candidate_warehouse_id,
                    similarity_score: score,
                }
            }
        }
    }

    pub fn bucket(&self) -> Bucket {
        match self.status() {
            RowStatus::Valid { .. } => Bucket::Valid,
            RowStatus::Suggested { .. } => Bucket::Suggested,
            RowStatus::Error { .. } => Bucket::Error,
        }
    }

    /// 错误原因文本（多个原因以 "; " 连接）
    pub fn error_reason(&self) -> Option<String> {
        let reasons = self.error_reasons();
        if reasons.is_empty() {
            None
        } else {
            Some(
                reasons
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        }
    }
}

// ==========================================
// RowView - 前端展示用的单行明细
// ==========================================
// 包含渲染所需的全部字段，前端无需二次查询
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowView {
    pub row_index: usize,
    pub warehouse_label: Option<String>,
    pub product_code: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub quantity_text: Option<String>,
    pub unit_label: Option<String>,
    pub bucket: Bucket,
    pub match_kind: Option<MatchKind>,
    pub product_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub candidate_product_id: Option<i64>,
    pub candidate_product_code: Option<String>,
    pub candidate_warehouse_id: Option<i64>,
    pub candidate_warehouse_name: Option<String>,
    pub similarity_score: Option<u8>,
    pub error_reason: Option<String>,
}

impl From<&ClassifiedRow> for RowView {
    fn from(row: &ClassifiedRow) -> Self {
        let (bucket, match_kind, similarity_score) = match row.status() {
            RowStatus::Valid { match_kind, .. } => (Bucket::Valid, Some(match_kind), None),
            RowStatus::Suggested {
                similarity_score, ..
            } => (Bucket::Suggested, None, Some(similarity_score)),
            RowStatus::Error { .. } => (Bucket::Error, None, None),
        };

        let (candidate_product_id, candidate_product_code) = match &row.product {
            FieldResolution::Suggested {
                candidate_id,
                candidate_label,
                ..
            } => (Some(*candidate_id), Some(candidate_label.clone())),
            _ => (None, None),
        };
        let (candidate_warehouse_id, candidate_warehouse_name) = match &row.warehouse {
            FieldResolution::Suggested {
                candidate_id,
                candidate_label,
                ..
            } => (Some(*candidate_id), Some(candidate_label.clone())),
            _ => (None, None),
        };

        Self {
            row_index: row.raw.row_index,
            warehouse_label: row.raw.warehouse_label.clone(),
            product_code: row.raw.product_code.clone(),
            description: row.raw.description.clone(),
            quantity: row.raw.quantity,
            quantity_text: row.raw.quantity_text.clone(),
            unit_label: row.raw.unit_label.clone(),
            bucket,
            match_kind,
            product_id: row.product.matched_id(),
            warehouse_id: row.warehouse.matched_id(),
            candidate_product_id,
            candidate_product_code,
            candidate_warehouse_id,
            candidate_warehouse_name,
            similarity_score,
            error_reason: row.error_reason(),
        }
    }
}

// ==========================================
// PreviewResult - 预览汇总
// ==========================================
// 样本仅用于控制返回体大小，权威状态是完整的分类行集合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResult {
    pub total_rows: usize,
    pub valid_count: usize,
    pub suggested_count: usize,
    pub error_count: usize,
    pub can_execute_partial: bool,  // 至少 1 行 VALID
    pub can_execute_complete: bool, // 全部 VALID
    pub sample_limit: usize,
    pub valid_sample: Vec<RowView>,
    pub suggested_sample: Vec<RowView>,
    pub error_sample: Vec<RowView>,
}

// ==========================================
// CorrectionAction - 人工修正动作
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CorrectionAction {
    /// 接受该行全部待确认建议（SUGGESTED → VALID）
    AcceptSuggestion { row_index: usize },
    /// 绑定人工检索到的产品（ERROR → VALID）
    ManualBind { row_index: usize, product_id: i64 },
    /// 绑定人工检索到的仓库
    ManualBindWarehouse { row_index: usize, warehouse_id: i64 },
}

impl CorrectionAction {
    pub fn row_index(&self) -> usize {
        match self {
            CorrectionAction::AcceptSuggestion { row_index }
            | CorrectionAction::ManualBind { row_index, .. }
            | CorrectionAction::ManualBindWarehouse { row_index, .. } => *row_index,
        }
    }
}

// ==========================================
// ExecutionResult - 提交结果报告
// ==========================================
// 红线: processed_count + error_count + skipped_count = total_rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotFoundProduct {
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFailure {
    pub row_index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub session_id: String,
    pub mode: ExecutionMode,
    pub processed_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    pub total_rows: usize,
    pub summary_message: String,
    pub products_not_found: Vec<NotFoundProduct>,
    pub warehouses_not_found: Vec<String>,
    pub row_failures: Vec<RowFailure>,
    pub skipped_rows: Vec<usize>,
    pub executed_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// 行数守恒校验
    pub fn is_balanced(&self) -> bool {
        self.processed_count + self.error_count + self.skipped_count == self.total_rows
    }
}

/// ALL_PERFECT 模式下的整批拒绝
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRefusal {
    pub session_id: String,
    pub suggested_count: usize,
    pub error_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Executed(ExecutionResult),
    Refused(ExecutionRefusal),
}

// ==========================================
// ImportSession - 导入会话（服务端持久化）
// ==========================================
// 修正动作写入会话，提交时按 session_id 读取，保证修正不丢失
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSession {
    pub session_id: String,
    pub file_name: Option<String>,
    pub state: SessionState,
    pub rows: Vec<ClassifiedRow>,
    pub revision: i32, // 乐观锁
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<ExecutionResult>,
}

impl ImportSession {
    pub fn row(&self, row_index: usize) -> Option<&ClassifiedRow> {
        self.rows.iter().find(|r| r.raw.row_index == row_index)
    }
}
