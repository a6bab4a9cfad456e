// ==========================================
// 参数化数据导入 - 表文件解析器
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 输出: TableSnapshot（含表头行，保留空行以维持坐标）
// ==========================================

use crate::domain::table::TableSnapshot;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;
use tracing::debug;

// ==========================================
// TableFileParser Trait
// ==========================================
pub trait TableFileParser: Send + Sync {
    /// 解析文件为表快照
    ///
    /// # 参数
    /// - file_path: 文件路径
    /// - table_name: 快照使用的表名
    fn parse_table(&self, file_path: &Path, table_name: &str) -> ImportResult<TableSnapshot>;
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvTableParser {
    delimiter: u8,
    decimal_delimiter: char,
}

impl CsvTableParser {
    pub fn new(delimiter: u8, decimal_delimiter: char) -> Self {
        Self {
            delimiter,
            decimal_delimiter,
        }
    }
}

impl Default for CsvTableParser {
    fn default() -> Self {
        Self::new(b',', '.')
    }
}

impl TableFileParser for CsvTableParser {
    fn parse_table(&self, file_path: &Path, table_name: &str) -> ImportResult<TableSnapshot> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false) // 表头作为第 0 行保留
            .flexible(true) // 允许行长度不一致
            .delimiter(self.delimiter)
            .from_reader(file);

        let mut cells = Vec::new();
        for result in reader.records() {
            let record = result?;
            cells.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        debug!(table = %table_name, rows = cells.len(), "CSV 表解析完成");
        Ok(TableSnapshot::new(table_name, cells, self.decimal_delimiter))
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
/// 数值单元格由 calamine 渲染，小数点固定为 '.'，不受配置的分隔符影响
#[derive(Default)]
pub struct ExcelTableParser;

impl ExcelTableParser {
    pub fn new() -> Self {
        Self
    }
}

impl TableFileParser for ExcelTableParser {
    fn parse_table(&self, file_path: &Path, table_name: &str) -> ImportResult<TableSnapshot> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;

        // 读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        // 使用区域不一定从 A1 开始，补齐前导空行/空列以保持坐标
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); row_offset];
        for data_row in range.rows() {
            let mut row = vec![String::new(); col_offset];
            row.extend(data_row.iter().map(|cell| cell.to_string()));
            cells.push(row);
        }

        debug!(table = %table_name, sheet = %sheet_name, rows = cells.len(), "Excel 表解析完成");
        Ok(TableSnapshot::new(table_name, cells, '.'))
    }
}

// ==========================================
// 通用表解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalTableParser {
    csv: CsvTableParser,
    excel: ExcelTableParser,
}

impl UniversalTableParser {
    pub fn new(csv_delimiter: u8, decimal_delimiter: char) -> Self {
        Self {
            csv: CsvTableParser::new(csv_delimiter, decimal_delimiter),
            excel: ExcelTableParser::new(),
        }
    }
}

impl TableFileParser for UniversalTableParser {
    fn parse_table(&self, file_path: &Path, table_name: &str) -> ImportResult<TableSnapshot> {
        match extension_of(file_path).as_str() {
            "csv" => self.csv.parse_table(file_path, table_name),
            "xlsx" | "xls" => self.excel.parse_table(file_path, table_name),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_csv_parser_keeps_header_and_blank_rows() {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "P_Voltage,P_Current,Q_Power").unwrap();
        writeln!(temp_file, "1,0.5,0.5").unwrap();
        writeln!(temp_file, ",,").unwrap();
        writeln!(temp_file, "2,1.5").unwrap();
        temp_file.flush().unwrap();

        let table = CsvTableParser::default()
            .parse_table(temp_file.path(), "T")
            .unwrap();
        assert_eq!(table.rows(), 4);
        assert_eq!(table.cols(), 3);
        assert_eq!(table.cell_at(0, 2), "Q_Power");
        assert_eq!(table.cell_at(3, 2), "");
        assert_eq!(table.name(), "T");
    }

    #[test]
    fn test_csv_custom_delimiter() {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "A;B").unwrap();
        writeln!(temp_file, "1,5;2").unwrap();
        temp_file.flush().unwrap();

        let table = CsvTableParser::new(b';', ',')
            .parse_table(temp_file.path(), "T")
            .unwrap();
        assert_eq!(table.cell_at(1, 0), "1,5");
        assert_eq!(table.decimal_delimiter(), ',');
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        let parser = UniversalTableParser::new(b',', '.');
        let err = parser
            .parse_table(Path::new("/nonexistent/table.csv"), "T")
            .unwrap_err();
        assert!(matches!(err, ImportError::FileNotFound(_)));

        let temp_file = Builder::new().suffix(".txt").tempfile().unwrap();
        let err = parser.parse_table(temp_file.path(), "T").unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }
}
