// ==========================================
// 库存批量导入 - 行提取器
// ==========================================
// 流程: 媒体类型/大小校验 → 解析 → 字段映射 → RawRow 序列
// 红线: 校验失败整批拒绝，不进入分类器；通过后行数守恒
// ==========================================

use crate::domain::inventory::{BatchFile, RawRow};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::{CsvParser, ExcelFormat, ExcelParser};
use crate::importer::import_trait::FileParser;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

pub const MEDIA_TYPE_CSV: &str = "text/csv";
pub const MEDIA_TYPE_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MEDIA_TYPE_XLS: &str = "application/vnd.ms-excel";

/// 根据扩展名推断媒体类型
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "csv" => Some(MEDIA_TYPE_CSV),
        "xlsx" => Some(MEDIA_TYPE_XLSX),
        "xls" => Some(MEDIA_TYPE_XLS),
        _ => None,
    }
}

/// 读取本地文件为 BatchFile（CLI 使用）
pub fn batch_file_from_path(path: &Path) -> ImportResult<BatchFile> {
    let media_type = media_type_for_path(path).ok_or_else(|| {
        ImportError::UnsupportedMediaType(path.display().to_string())
    })?;
    let content = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string());
    Ok(BatchFile::new(file_name, media_type, content))
}

// ==========================================
// RowExtractor
// ==========================================
pub struct RowExtractor {
    max_batch_bytes: usize,
}

impl RowExtractor {
    pub fn new(max_batch_bytes: usize) -> Self {
        Self { max_batch_bytes }
    }

    /// 根据声明的媒体类型选择解析器
    fn parser_for(media_type: &str) -> ImportResult<Box<dyn FileParser>> {
        // 允许携带参数，如 "text/csv; charset=utf-8"
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();

        match essence.as_str() {
            MEDIA_TYPE_CSV | "application/csv" => Ok(Box::new(CsvParser)),
            MEDIA_TYPE_XLSX => Ok(Box::new(ExcelParser::new(ExcelFormat::Xlsx))),
            MEDIA_TYPE_XLS => Ok(Box::new(ExcelParser::new(ExcelFormat::Xls))),
            _ => Err(ImportError::UnsupportedMediaType(media_type.to_string())),
        }
    }

    /// 提取原始行
    ///
    /// # 返回
    /// - Ok(Vec<RawRow>): 按文件顺序排列
    /// - Err: 批次级拒绝（媒体类型/大小/格式/缺列/无数据）
    #[instrument(skip(self, batch), fields(file_name = ?batch.file_name, size = batch.size()))]
    pub fn extract(&self, batch: &BatchFile) -> ImportResult<Vec<RawRow>> {
        // === 步骤 1: 媒体类型 ===
        let parser = Self::parser_for(&batch.media_type).map_err(|e| {
            warn!(media_type = %batch.media_type, "媒体类型不支持");
            e
        })?;

        // === 步骤 2: 大小 ===
        if batch.size() > self.max_batch_bytes {
            warn!(size = batch.size(), max = self.max_batch_bytes, "批次文件过大");
            return Err(ImportError::BatchTooLarge {
                size: batch.size(),
                max: self.max_batch_bytes,
            });
        }

        // === 步骤 3: 解析 ===
        let sheet = parser.parse_bytes(&batch.content)?;
        debug!(headers = ?sheet.headers, records = sheet.records.len(), "文件解析完成");

        // === 步骤 4: 字段映射 ===
        let mapper = FieldMapper::from_headers(&sheet.headers)?;
        let rows: Vec<RawRow> = sheet.records.iter().map(|r| mapper.map_record(r)).collect();

        if rows.is_empty() {
            return Err(ImportError::EmptyBatch);
        }

        info!(total_rows = rows.len(), "行提取完成");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_batch(content: &str) -> BatchFile {
        BatchFile::new(
            Some("stock.csv".to_string()),
            MEDIA_TYPE_CSV,
            content.as_bytes().to_vec(),
        )
    }

    #[test]
    fn test_extract_csv_rows() {
        let extractor = RowExtractor::new(1024);
        let rows = extractor
            .extract(&csv_batch(
                "warehouse,product_code,description,quantity,unit\n\
                 MAIN,ABC-01,Widget,5,pcs\n\
                 MAIN,,No code,2,pcs\n",
            ))
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_index, 2);
        assert_eq!(rows[0].quantity, Some(5.0));
        // 缺失编码的行仍然输出
        assert_eq!(rows[1].row_index, 3);
        assert_eq!(rows[1].product_code, None);
    }

    #[test]
    fn test_reject_unsupported_media_type() {
        let extractor = RowExtractor::new(1024);
        let batch = BatchFile::new(None, "application/pdf", b"%PDF".to_vec());
        let result = extractor.extract(&batch);
        assert!(matches!(result, Err(ImportError::UnsupportedMediaType(_))));
    }

    #[test]
    fn test_media_type_with_parameters() {
        let extractor = RowExtractor::new(1024);
        let batch = BatchFile::new(
            None,
            "text/csv; charset=utf-8",
            b"product_code,quantity\nABC-01,1\n".to_vec(),
        );
        assert_eq!(extractor.extract(&batch).unwrap().len(), 1);
    }

    #[test]
    fn test_reject_oversized_batch() {
        let extractor = RowExtractor::new(16);
        let result = extractor.extract(&csv_batch("product_code,quantity\nABC-01,1\n"));
        assert!(matches!(result, Err(ImportError::BatchTooLarge { max: 16, .. })));
    }

    #[test]
    fn test_reject_header_only() {
        let extractor = RowExtractor::new(1024);
        let result = extractor.extract(&csv_batch("product_code,quantity\n"));
        assert!(matches!(result, Err(ImportError::EmptyBatch)));
    }

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(media_type_for_path(Path::new("a.CSV")), Some(MEDIA_TYPE_CSV));
        assert_eq!(media_type_for_path(Path::new("a.xlsx")), Some(MEDIA_TYPE_XLSX));
        assert_eq!(media_type_for_path(Path::new("a.txt")), None);
    }
}
