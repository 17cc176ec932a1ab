// ==========================================
// 库存批量导入 - 领域类型定义
// ==========================================
// 分类桶 / 匹配方式 / 提交模式 / 会话状态 / 重复键策略
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库、前端一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 分类桶 (Bucket)
// ==========================================
// 每一行在任意时刻只属于一个桶
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bucket {
    Valid,     // 可直接提交
    Suggested, // 存在模糊建议，待人工确认
    Error,     // 阻断
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Valid => write!(f, "VALID"),
            Bucket::Suggested => write!(f, "SUGGESTED"),
            Bucket::Error => write!(f, "ERROR"),
        }
    }
}

// ==========================================
// 匹配方式 (Match Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchKind {
    Exact,            // 逐字节相等（区分大小写）
    Normalized,       // 大小写/空白/标点归一后相等
    ManualCorrection, // 人工确认建议或人工绑定
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKind::Exact => write!(f, "EXACT"),
            MatchKind::Normalized => write!(f, "NORMALIZED"),
            MatchKind::ManualCorrection => write!(f, "MANUAL_CORRECTION"),
        }
    }
}

// ==========================================
// 提交模式 (Execution Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    OnlyValid,  // 仅提交 VALID 行，其余行计入报告
    AllPerfect, // 要求全部 VALID，否则整批拒绝
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::OnlyValid => write!(f, "ONLY_VALID"),
            ExecutionMode::AllPerfect => write!(f, "ALL_PERFECT"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "ONLY_VALID" => Ok(ExecutionMode::OnlyValid),
            "ALL_PERFECT" => Ok(ExecutionMode::AllPerfect),
            other => Err(format!("未知的提交模式: {}", other)),
        }
    }
}

// ==========================================
// 导入会话状态 (Session State)
// ==========================================
// UPLOADED → EXTRACTED → CLASSIFIED → (CORRECTING)* → EXECUTED
// 任意非终态 → ABANDONED
// ALL_PERFECT 被拒绝不改变状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Uploaded,
    Extracted,
    Classified,
    Correcting,
    Executed,
    Abandoned,
}

impl SessionState {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Executed | SessionState::Abandoned)
    }

    /// 状态迁移是否合法
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::{Abandoned, Classified, Correcting, Executed, Extracted, Uploaded};

        match (*self, next) {
            (Uploaded, Extracted) => true,
            (Extracted, Classified) => true,
            (Classified, Correcting) | (Correcting, Correcting) => true,
            (Classified, Executed) | (Correcting, Executed) => true,
            (from, Abandoned) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            SessionState::Uploaded => "UPLOADED",
            SessionState::Extracted => "EXTRACTED",
            SessionState::Classified => "CLASSIFIED",
            SessionState::Correcting => "CORRECTING",
            SessionState::Executed => "EXECUTED",
            SessionState::Abandoned => "ABANDONED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "UPLOADED" => Some(SessionState::Uploaded),
            "EXTRACTED" => Some(SessionState::Extracted),
            "CLASSIFIED" => Some(SessionState::Classified),
            "CORRECTING" => Some(SessionState::Correcting),
            "EXECUTED" => Some(SessionState::Executed),
            "ABANDONED" => Some(SessionState::Abandoned),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 同批次重复 (仓库, 产品) 处理策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuplicateKeyPolicy {
    #[default]
    Sum,         // 全部提交，库存累加
    LastRowWins, // 仅提交行号最大的一行，其余计为跳过
    Reject,      // 重复键的所有行计为错误
}

impl fmt::Display for DuplicateKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateKeyPolicy::Sum => write!(f, "SUM"),
            DuplicateKeyPolicy::LastRowWins => write!(f, "LAST_ROW_WINS"),
            DuplicateKeyPolicy::Reject => write!(f, "REJECT"),
        }
    }
}

impl std::str::FromStr for DuplicateKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SUM" => Ok(DuplicateKeyPolicy::Sum),
            "LAST_ROW_WINS" => Ok(DuplicateKeyPolicy::LastRowWins),
            "REJECT" => Ok(DuplicateKeyPolicy::Reject),
            other => Err(format!("未知的重复键策略: {}", other)),
        }
    }
}

// ==========================================
// 行级错误原因
// ==========================================
// 固定顺序: 产品 → 仓库 → 数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowErrorReason {
    MissingProductCode,
    ProductNotFound,
    MissingWarehouse,
    WarehouseNotFound,
    InvalidQuantity,
}

impl RowErrorReason {
    /// 是否为产品解析失败（人工绑定产品可修复）
    pub fn is_product(&self) -> bool {
        matches!(
            self,
            RowErrorReason::MissingProductCode | RowErrorReason::ProductNotFound
        )
    }

    /// 是否为仓库解析失败（人工绑定仓库可修复）
    pub fn is_warehouse(&self) -> bool {
        matches!(
            self,
            RowErrorReason::MissingWarehouse | RowErrorReason::WarehouseNotFound
        )
    }
}

impl fmt::Display for RowErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowErrorReason::MissingProductCode => write!(f, "missing product code"),
            RowErrorReason::ProductNotFound => write!(f, "product not found"),
            RowErrorReason::MissingWarehouse => write!(f, "missing warehouse"),
            RowErrorReason::WarehouseNotFound => write!(f, "warehouse not found"),
            RowErrorReason::InvalidQuantity => write!(f, "invalid quantity"),
        }
    }
}
