// ==========================================
// 库存批量导入 - 字段映射器实现
// ==========================================
// 职责: 源列名 → 标准字段映射（支持别名，大小写不敏感）
// 说明: 必填字段缺失值的行仍然输出，由分类器判定，保证行数守恒
// ==========================================

use crate::domain::inventory::RawRow;
use crate::importer::data_cleaner::{normalize_null, parse_quantity};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::RawRecord;
use std::collections::HashMap;

/// 标准字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportField {
    Warehouse,
    ProductCode,
    Description,
    Quantity,
    Unit,
}

impl ImportField {
    pub fn name(&self) -> &'static str {
        match self {
            ImportField::Warehouse => "warehouse",
            ImportField::ProductCode => "product_code",
            ImportField::Description => "description",
            ImportField::Quantity => "quantity",
            ImportField::Unit => "unit",
        }
    }

    /// 列名别名（已小写，比对前表头同样小写 + TRIM）
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            ImportField::Warehouse => &["warehouse", "almacen", "almacén", "bodega", "仓库"],
            ImportField::ProductCode => &[
                "product_code",
                "product code",
                "code",
                "sku",
                "codigo",
                "código",
                "codigo producto",
                "产品编码",
            ],
            ImportField::Description => &["description", "descripcion", "descripción", "描述"],
            ImportField::Quantity => &["quantity", "qty", "cantidad", "数量"],
            ImportField::Unit => &["unit", "unidad", "uom", "单位"],
        }
    }

    fn all() -> [ImportField; 5] {
        [
            ImportField::Warehouse,
            ImportField::ProductCode,
            ImportField::Description,
            ImportField::Quantity,
            ImportField::Unit,
        ]
    }
}

/// 表头 → 标准字段的解析结果
#[derive(Debug, Clone)]
pub struct FieldMapper {
    columns: HashMap<ImportField, String>,
}

impl FieldMapper {
    /// 根据表头建立列映射
    ///
    /// # 错误
    /// - MissingColumn: 缺少产品编码列或数量列（模板不匹配，整批拒绝）
    pub fn from_headers(headers: &[String]) -> ImportResult<Self> {
        let mut columns = HashMap::new();
        for field in ImportField::all() {
            let found = headers.iter().find(|h| {
                let key = h.trim().to_lowercase();
                field.aliases().iter().any(|alias| *alias == key)
            });
            if let Some(header) = found {
                columns.insert(field, header.clone());
            }
        }

        for required in [ImportField::ProductCode, ImportField::Quantity] {
            if !columns.contains_key(&required) {
                return Err(ImportError::MissingColumn(required.name().to_string()));
            }
        }

        Ok(Self { columns })
    }

    fn get(&self, record: &RawRecord, field: ImportField) -> Option<String> {
        let column = self.columns.get(&field)?;
        normalize_null(record.fields.get(column))
    }

    /// 将原始记录映射为 RawRow
    pub fn map_record(&self, record: &RawRecord) -> RawRow {
        let quantity_text = self.get(record, ImportField::Quantity);
        let quantity = quantity_text.as_deref().and_then(parse_quantity);

        RawRow {
            row_index: record.row_index,
            warehouse_label: self.get(record, ImportField::Warehouse),
            product_code: self.get(record, ImportField::ProductCode),
            description: self
                .get(record, ImportField::Description)
                .map(|d| d.trim().to_string()),
            quantity_text,
            quantity,
            unit_label: self
                .get(record, ImportField::Unit)
                .map(|u| u.trim().to_string()),
        }
    }
}
