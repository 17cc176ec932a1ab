// ==========================================
// 库存批量导入 - 文件解析器实现
// ==========================================
// 阶段 0: 字节 → 原始记录
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 说明: 单元格值保留原样（不 TRIM），精确匹配依赖原始字节
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::{FileParser, ParsedSheet, RawRecord};
use calamine::{Reader, Xls, Xlsx};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Cursor;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 根据首行猜测分隔符（',' 或 ';'）
    fn sniff_delimiter(content: &[u8]) -> u8 {
        let first_line = content.split(|b| *b == b'\n').next().unwrap_or(&[]);
        let commas = first_line.iter().filter(|b| **b == b',').count();
        let semicolons = first_line.iter().filter(|b| **b == b';').count();
        if semicolons > commas {
            b';'
        } else {
            b','
        }
    }
}

impl FileParser for CsvParser {
    fn parse_bytes(&self, content: &[u8]) -> ImportResult<ParsedSheet> {
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .delimiter(Self::sniff_delimiter(content))
            .from_reader(content);

        // 读取表头
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::EmptyBatch);
        }

        // 读取所有行
        let mut records = Vec::new();
        for (offset, result) in reader.records().enumerate() {
            let record = result?;
            // 行号取物理行（含多行引用字段时以起始行为准）
            let row_index = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(offset + 2);

            let mut fields = HashMap::new();
            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    fields.insert(header.clone(), value.to_string());
                }
            }

            // 跳过完全空白的行
            if fields.values().all(|v| v.trim().is_empty()) {
                continue;
            }

            records.push(RawRecord { row_index, fields });
        }

        Ok(ParsedSheet { headers, records })
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcelFormat {
    Xlsx,
    Xls,
}

pub struct ExcelParser {
    pub format: ExcelFormat,
}

impl ExcelParser {
    pub fn new(format: ExcelFormat) -> Self {
        Self { format }
    }

    fn first_sheet_rows(&self, content: &[u8]) -> ImportResult<(u32, Vec<Vec<String>>)> {
        let cursor = Cursor::new(content.to_vec());

        let range = match self.format {
            ExcelFormat::Xlsx => {
                let mut workbook: Xlsx<_> = Xlsx::new(cursor)
                    .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;
                let sheet_name = workbook
                    .sheet_names()
                    .first()
                    .cloned()
                    .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
                workbook
                    .worksheet_range(&sheet_name)
                    .map_err(|e| ImportError::ExcelParseError(e.to_string()))?
            }
            ExcelFormat::Xls => {
                let mut workbook: Xls<_> = Xls::new(cursor)
                    .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;
                let sheet_name = workbook
                    .sheet_names()
                    .first()
                    .cloned()
                    .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
                workbook
                    .worksheet_range(&sheet_name)
                    .map_err(|e| ImportError::ExcelParseError(e.to_string()))?
            }
        };

        // 区域可能不从 A1 开始（前导空行）
        let start_row = range.start().map(|(row, _)| row).unwrap_or(0);
        let rows = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();

        Ok((start_row, rows))
    }
}

impl FileParser for ExcelParser {
    fn parse_bytes(&self, content: &[u8]) -> ImportResult<ParsedSheet> {
        let (start_row, rows) = self.first_sheet_rows(content)?;
        let mut rows = rows.into_iter();

        // 提取表头（第一行）
        let header_row = rows.next().ok_or(ImportError::EmptyBatch)?;
        let headers: Vec<String> = header_row.iter().map(|h| h.trim().to_string()).collect();
        let header_row_index = start_row as usize + 1;

        // 读取数据行
        let mut records = Vec::new();
        for (offset, data_row) in rows.enumerate() {
            let mut fields = HashMap::new();
            for (col_idx, value) in data_row.into_iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    fields.insert(header.clone(), value);
                }
            }

            // 跳过完全空白的行
            if fields.values().all(|v| v.trim().is_empty()) {
                continue;
            }

            records.push(RawRecord {
                row_index: header_row_index + offset + 1,
                fields,
            });
        }

        Ok(ParsedSheet { headers, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_parser_valid_content() {
        let content = "warehouse,product_code,quantity\nMAIN,ABC-01,5\nMAIN,ABC-02,3\n";

        let parser = CsvParser;
        let sheet = parser.parse_bytes(content.as_bytes()).unwrap();

        assert_eq!(sheet.headers, vec!["warehouse", "product_code", "quantity"]);
        assert_eq!(sheet.records.len(), 2);
        assert_eq!(sheet.records[0].row_index, 2);
        assert_eq!(sheet.records[1].row_index, 3);
        assert_eq!(
            sheet.records[0].fields.get("product_code"),
            Some(&"ABC-01".to_string())
        );
    }

    #[test]
    fn test_csv_parser_keeps_raw_values() {
        let content = "product_code,quantity\n\"ABC-01 \",5\n";

        let sheet = CsvParser.parse_bytes(content.as_bytes()).unwrap();

        // 尾部空格保留，交给分类器判断为归一化匹配
        assert_eq!(
            sheet.records[0].fields.get("product_code"),
            Some(&"ABC-01 ".to_string())
        );
    }

    #[test]
    fn test_csv_parser_skip_empty_rows_keeps_row_index() {
        let content = "product_code,quantity\nABC-01,2.5\n,\nABC-02,3.0\n";

        let sheet = CsvParser.parse_bytes(content.as_bytes()).unwrap();

        // 应跳过空行，但行号保持物理位置
        assert_eq!(sheet.records.len(), 2);
        assert_eq!(sheet.records[0].row_index, 2);
        assert_eq!(sheet.records[1].row_index, 4);
    }

    #[test]
    fn test_csv_parser_semicolon_and_bom() {
        let mut content = UTF8_BOM.to_vec();
        content.extend_from_slice("codigo;cantidad\nABC-01;12,5\n".as_bytes());

        let sheet = CsvParser.parse_bytes(&content).unwrap();

        assert_eq!(sheet.headers, vec!["codigo", "cantidad"]);
        assert_eq!(
            sheet.records[0].fields.get("cantidad"),
            Some(&"12,5".to_string())
        );
    }

    #[test]
    fn test_excel_parser_rejects_garbage() {
        let parser = ExcelParser::new(ExcelFormat::Xlsx);
        let result = parser.parse_bytes(b"not a workbook");
        assert!(matches!(result, Err(ImportError::ExcelParseError(_))));
    }
}
