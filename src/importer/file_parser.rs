// ==========================================
// 表格批量导入管道 - 文件解析器实现
// ==========================================
// 支持: 分隔文本 (.csv/.tsv/.txt) / 工作簿 (.xlsx/.xlsm/.xls/.ods)
// 规则:
// - 第一个非空行为表头，表头原样保留
// - 完全空白的行跳过，但物理行号保留
// - 重复表头: 行内取第一次出现的列值
// ==========================================

use crate::domain::record::{ParsedSheet, RawRow};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FileParser;
use calamine::{Data, Ods, Reader, Xls, Xlsx};
use chrono::{Duration, NaiveDate};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

const UTF8_BOM: char = '\u{feff}';

// ==========================================
// 文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookKind {
    Xlsx,
    Xls,
    Ods,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// 分隔文本
    Delimited { delimiter: u8 },
    /// 多工作表工作簿
    Workbook(WorkbookKind),
}

impl FileFormat {
    pub const CSV: FileFormat = FileFormat::Delimited { delimiter: b',' };
    pub const TSV: FileFormat = FileFormat::Delimited { delimiter: b'\t' };

    /// 按扩展名识别（大小写不敏感）
    pub fn from_extension(ext: &str) -> ImportResult<Self> {
        match ext.to_lowercase().as_str() {
            "csv" | "txt" => Ok(FileFormat::CSV),
            "tsv" => Ok(FileFormat::TSV),
            "xlsx" | "xlsm" => Ok(FileFormat::Workbook(WorkbookKind::Xlsx)),
            "xls" => Ok(FileFormat::Workbook(WorkbookKind::Xls)),
            "ods" => Ok(FileFormat::Workbook(WorkbookKind::Ods)),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        Self::from_extension(ext)
    }
}

// ==========================================
// 分隔文本解析器
// ==========================================
pub struct DelimitedParser {
    pub delimiter: u8,
}

impl FileParser for DelimitedParser {
    fn parse_bytes(&self, bytes: &[u8], _sheet: Option<&str>) -> ImportResult<ParsedSheet> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .delimiter(self.delimiter)
            .from_reader(bytes);

        let mut physical_rows = Vec::new();
        // 引号内换行累计数：文本行号减去它才是表格行号
        let mut embedded_breaks = 0usize;
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let row = record
                .position()
                .map(|p| (p.line() as usize).saturating_sub(embedded_breaks))
                .unwrap_or(idx + 1);
            let cells: Vec<String> = record.iter().map(|v| v.to_string()).collect();
            embedded_breaks += cells.iter().map(|c| c.matches('\n').count()).sum::<usize>();
            physical_rows.push((row, cells));
        }

        // 去掉首个单元格的 BOM
        if let Some((_, first)) = physical_rows.first_mut() {
            if let Some(cell) = first.first_mut() {
                if cell.starts_with(UTF8_BOM) {
                    *cell = cell.trim_start_matches(UTF8_BOM).to_string();
                }
            }
        }

        build_sheet(physical_rows, None)
    }
}

// ==========================================
// 工作簿解析器
// ==========================================
pub struct WorkbookParser {
    pub kind: WorkbookKind,
}

impl FileParser for WorkbookParser {
    fn parse_bytes(&self, bytes: &[u8], sheet: Option<&str>) -> ImportResult<ParsedSheet> {
        match self.kind {
            WorkbookKind::Xlsx => read_workbook::<Xlsx<Cursor<Vec<u8>>>>(bytes, sheet),
            WorkbookKind::Xls => read_workbook::<Xls<Cursor<Vec<u8>>>>(bytes, sheet),
            WorkbookKind::Ods => read_workbook::<Ods<Cursor<Vec<u8>>>>(bytes, sheet),
        }
    }
}

impl WorkbookParser {
    /// 列出工作表名称
    pub fn sheet_names(&self, bytes: &[u8]) -> ImportResult<Vec<String>> {
        match self.kind {
            WorkbookKind::Xlsx => Ok(open_workbook::<Xlsx<Cursor<Vec<u8>>>>(bytes)?.sheet_names()),
            WorkbookKind::Xls => Ok(open_workbook::<Xls<Cursor<Vec<u8>>>>(bytes)?.sheet_names()),
            WorkbookKind::Ods => Ok(open_workbook::<Ods<Cursor<Vec<u8>>>>(bytes)?.sheet_names()),
        }
    }
}

fn open_workbook<R>(bytes: &[u8]) -> ImportResult<R>
where
    R: Reader<Cursor<Vec<u8>>>,
    R::Error: std::fmt::Display,
{
    R::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::Parse(format!("工作簿无法打开: {}", e)))
}

fn read_workbook<R>(bytes: &[u8], sheet: Option<&str>) -> ImportResult<ParsedSheet>
where
    R: Reader<Cursor<Vec<u8>>>,
    R::Error: std::fmt::Display,
{
    let mut workbook: R = open_workbook(bytes)?;

    let sheet_names = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(name) => sheet_names
            .iter()
            .find(|s| s.as_str() == name)
            .cloned()
            .ok_or_else(|| ImportError::Parse(format!("工作表不存在: {}", name)))?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::Parse("工作簿无工作表".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ImportError::Parse(format!("工作表 {} 读取失败: {}", sheet_name, e)))?;

    // range 不一定从 A1 开始，物理行号需加上起始偏移
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let physical_rows: Vec<(usize, Vec<String>)> = range
        .rows()
        .enumerate()
        .map(|(idx, row)| (first_row + idx + 1, row.iter().map(render_cell).collect()))
        .collect();

    debug!(sheet = %sheet_name, rows = physical_rows.len(), "工作表读取完成");
    build_sheet(physical_rows, Some(sheet_name))
}

/// 单元格渲染为文本
fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // 整数值不带小数位
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::DateTime(dt) => excel_serial_to_text(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#{:?}", e),
    }
}

/// Excel 序列日期（1900 日期系统）→ ISO 文本
fn excel_serial_to_text(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return serial.to_string();
    };
    let seconds = (serial * 86_400.0).round() as i64;
    match epoch
        .and_hms_opt(0, 0, 0)
        .and_then(|base| base.checked_add_signed(Duration::seconds(seconds)))
    {
        Some(dt) if seconds % 86_400 == 0 => dt.format("%Y-%m-%d").to_string(),
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => serial.to_string(),
    }
}

/// 从物理行构建表头与数据行
fn build_sheet(
    physical_rows: Vec<(usize, Vec<String>)>,
    sheet_name: Option<String>,
) -> ImportResult<ParsedSheet> {
    let mut rows_iter = physical_rows
        .into_iter()
        .filter(|(_, cells)| !is_blank(cells));

    let (header_row, headers) = rows_iter
        .next()
        .ok_or_else(|| ImportError::EmptyFile("文件为空".to_string()))?;

    let mut rows = Vec::new();
    for (source_row, cells) in rows_iter {
        let mut row_map = HashMap::new();
        for (col_idx, value) in cells.into_iter().enumerate() {
            let Some(header) = headers.get(col_idx) else {
                continue;
            };
            if header.is_empty() {
                continue;
            }
            // 重复表头取第一次出现
            row_map.entry(header.clone()).or_insert(value);
        }

        rows.push(RawRow {
            row_index: rows.len() + 1,
            source_row,
            cells: row_map,
        });
    }

    if rows.is_empty() {
        return Err(ImportError::EmptyFile("只有表头，没有数据行".to_string()));
    }

    Ok(ParsedSheet {
        headers,
        rows,
        header_row,
        sheet_name,
    })
}

fn is_blank(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}

// ==========================================
// 通用文件解析器（按格式选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parser_for(format: FileFormat) -> Box<dyn FileParser> {
        match format {
            FileFormat::Delimited { delimiter } => Box::new(DelimitedParser { delimiter }),
            FileFormat::Workbook(kind) => Box::new(WorkbookParser { kind }),
        }
    }

    /// 解析内存中的文件内容
    pub fn parse(
        &self,
        bytes: &[u8],
        format: FileFormat,
        sheet: Option<&str>,
    ) -> ImportResult<ParsedSheet> {
        let parsed = Self::parser_for(format).parse_bytes(bytes, sheet)?;
        info!(
            headers = parsed.headers.len(),
            rows = parsed.rows.len(),
            sheet = ?parsed.sheet_name,
            "文件解析完成"
        );
        Ok(parsed)
    }

    /// 读取并解析文件（格式按扩展名识别）
    pub fn parse_file<P: AsRef<Path>>(
        &self,
        file_path: P,
        sheet: Option<&str>,
    ) -> ImportResult<ParsedSheet> {
        let path = file_path.as_ref();
        let format = FileFormat::from_path(path)?;
        let bytes = std::fs::read(path)
            .map_err(|e| ImportError::FileRead(format!("{}: {}", path.display(), e)))?;
        self.parse(&bytes, format, sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn parse_csv(text: &str) -> ImportResult<ParsedSheet> {
        UniversalFileParser.parse(text.as_bytes(), FileFormat::CSV, None)
    }

    #[test]
    fn test_csv_headers_and_rows() {
        let sheet = parse_csv("Full Name,Email\nAda,ada@x.io\nBob,bob@x.io\nCy,cy@x.io\n").unwrap();

        assert_eq!(sheet.headers, vec!["Full Name", "Email"]);
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0].cell("Full Name"), Some("Ada"));
        assert_eq!(sheet.rows[2].row_index, 3);
        assert_eq!(sheet.rows[2].source_row, 4);
        assert_eq!(sheet.header_row, 1);
    }

    #[test]
    fn test_csv_header_only_is_empty_file() {
        let err = parse_csv("Full Name,Email\n").unwrap_err();
        assert!(matches!(err, ImportError::EmptyFile(_)));

        let err = parse_csv("").unwrap_err();
        assert!(matches!(err, ImportError::EmptyFile(_)));
    }

    #[test]
    fn test_csv_first_non_empty_row_is_header() {
        let sheet = parse_csv(",,\nName,Email\nAda,ada@x.io\n").unwrap();

        assert_eq!(sheet.headers, vec!["Name", "Email"]);
        assert_eq!(sheet.header_row, 2);
        assert_eq!(sheet.rows[0].source_row, 3);
    }

    #[test]
    fn test_csv_blank_rows_keep_physical_numbering() {
        let sheet = parse_csv("Name\nAda\n \nBob\n").unwrap();

        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1].row_index, 2);
        assert_eq!(sheet.rows[1].source_row, 4);
    }

    #[test]
    fn test_csv_multiline_cell_keeps_spreadsheet_numbering() {
        let sheet = parse_csv("Name,Note\nAnn,\"line one\nline two\"\nBob,z\n\nCy,\"a\r\nb\"\nDee,w\n").unwrap();

        let rows: Vec<(usize, usize)> = sheet
            .rows
            .iter()
            .map(|r| (r.row_index, r.source_row))
            .collect();
        // 空行仍占一个表格行号，引号内换行不占
        assert_eq!(rows, vec![(1, 2), (2, 3), (3, 5), (4, 6)]);
        assert_eq!(sheet.rows[0].cell("Note"), Some("line one\nline two"));
    }

    #[test]
    fn test_csv_headers_verbatim_and_duplicates_first_wins() {
        let sheet = parse_csv(" Email ,Email,Email\nfirst,second,third\n").unwrap();

        assert_eq!(sheet.headers, vec![" Email ", "Email", "Email"]);
        assert_eq!(sheet.rows[0].cell("Email"), Some("second"));
        assert_eq!(sheet.rows[0].cell(" Email "), Some("first"));
    }

    #[test]
    fn test_csv_bom_stripped() {
        let sheet = parse_csv("\u{feff}Name,Email\nAda,a@x\n").unwrap();
        assert_eq!(sheet.headers[0], "Name");
    }

    #[test]
    fn test_tsv_delimiter() {
        let sheet = UniversalFileParser
            .parse(b"Name\tEmail\nAda\ta@x\n", FileFormat::TSV, None)
            .unwrap();
        assert_eq!(sheet.rows[0].cell("Email"), Some("a@x"));
    }

    #[test]
    fn test_csv_invalid_utf8_is_parse_error() {
        let bytes = b"Name\n\xff\xfe\n";
        let err = UniversalFileParser
            .parse(bytes, FileFormat::CSV, None)
            .unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
    }

    #[test]
    fn test_corrupt_workbook_is_parse_error() {
        let err = UniversalFileParser
            .parse(b"definitely not a zip", FileFormat::Workbook(WorkbookKind::Xlsx), None)
            .unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(FileFormat::from_path("a.CSV").unwrap(), FileFormat::CSV);
        assert_eq!(
            FileFormat::from_path("a.xlsx").unwrap(),
            FileFormat::Workbook(WorkbookKind::Xlsx)
        );
        assert!(matches!(
            FileFormat::from_path("a.pdf"),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_parse_file_from_disk() {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "Meter,Value").unwrap();
        writeln!(temp_file, "M-1,12.5").unwrap();

        let sheet = UniversalFileParser.parse_file(temp_file.path(), None).unwrap();
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].cell("Value"), Some("12.5"));
    }

    #[test]
    fn test_excel_serial_date() {
        assert_eq!(excel_serial_to_text(45677.0), "2025-01-20");
        assert_eq!(excel_serial_to_text(45677.5), "2025-01-20 12:00:00");
    }

    #[test]
    fn test_render_integral_float() {
        assert_eq!(render_cell(&Data::Float(42.0)), "42");
        assert_eq!(render_cell(&Data::Float(2.5)), "2.5");
        assert_eq!(render_cell(&Data::Bool(true)), "TRUE");
        assert_eq!(render_cell(&Data::Empty), "");
    }
}
