// ==========================================
// 供应商 WIP 跟踪系统 - 进度表解析器
// ==========================================
// 支持: Excel (.xlsx) / CSV (.csv)，从内存字节解析
// 输出: RawTable（保留列顺序，追赶任务按列位置切片）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{Data, Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use csv::ReaderBuilder;
use std::io::Cursor;

// ==========================================
// ExtractFormat - 文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractFormat {
    Xlsx,
    Csv,
}

impl ExtractFormat {
    /// 按扩展名判定格式
    pub fn from_file_name(file_name: &str) -> ImportResult<Self> {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" => Ok(ExtractFormat::Xlsx),
            "csv" => Ok(ExtractFormat::Csv),
            _ => Err(ImportError::UnsupportedFormat(file_name.to_string())),
        }
    }
}

// ==========================================
// RawTable - 原始表格
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub row_number: usize, // 源表行号（1 起）
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// 不存在于表头中的列
    pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|name| self.column_index(name).is_none())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 取单元格（越界视为空）
    pub fn cell<'a>(&self, row: &'a RawRow, column: usize) -> &'a str {
        row.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

/// 解析进度表字节
///
/// # 参数
/// - sheet: None 取第一个工作表（CSV 忽略）
/// - header_row: 表头所在行（0 起），其之前的行丢弃
pub fn parse_workbook(
    bytes: &[u8],
    format: ExtractFormat,
    sheet: Option<&str>,
    header_row: usize,
) -> ImportResult<RawTable> {
    let grid = match format {
        ExtractFormat::Xlsx => read_xlsx_grid(bytes, sheet)?,
        ExtractFormat::Csv => read_csv_grid(bytes)?,
    };
    build_table(grid, header_row)
}

fn read_xlsx_grid(bytes: &[u8], sheet: Option<&str>) -> ImportResult<Vec<Vec<String>>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    let sheet_name = match sheet {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|s| s == name) {
                return Err(ImportError::SheetNotFound(name.to_string()));
            }
            name.to_string()
        }
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?,
    };

    let range = workbook.worksheet_range(&sheet_name)?;
    let rows = range
        .rows()
        .map(|row| row.iter().map(render_cell).collect())
        .collect();
    Ok(anchor_at_a1(range.start(), rows))
}

/// calamine 的区域从第一个非空单元格开始，补齐前导空行/空列使行列号从 A1 计
fn anchor_at_a1(start: Option<(u32, u32)>, rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let Some((start_row, start_col)) = start else {
        return rows;
    };
    let mut grid: Vec<Vec<String>> = vec![Vec::new(); start_row as usize];
    grid.extend(rows.into_iter().map(|row| {
        let mut cells = vec![String::new(); start_col as usize];
        cells.extend(row);
        cells
    }));
    grid
}

fn read_csv_grid(bytes: &[u8]) -> ImportResult<Vec<Vec<String>>> {
    // 表头行由调用方指定，这里按无表头读取
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut grid = Vec::new();
    for result in reader.records() {
        let record = result?;
        grid.push(record.iter().map(|v| v.to_string()).collect());
    }
    Ok(grid)
}

fn build_table(grid: Vec<Vec<String>>, header_row: usize) -> ImportResult<RawTable> {
    let mut rows = grid.into_iter().enumerate().skip(header_row);
    let (_, header_cells) = rows
        .next()
        .ok_or(ImportError::HeaderRowMissing(header_row))?;

    let headers: Vec<String> = header_cells
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut table = RawTable {
        headers,
        rows: Vec::new(),
    };
    for (idx, cells) in rows {
        let cells: Vec<String> = cells.into_iter().map(|c| c.trim().to_string()).collect();

        // 跳过完全空白的行
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }

        table.rows.push(RawRow {
            row_number: idx + 1,
            cells,
        });
    }
    Ok(table)
}

/// 单元格渲染: 整数值浮点去掉小数部分，日期输出 YYYY-MM-DD
fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Int(v) => v.to_string(),
        Data::Float(v) => {
            if v.fract() == 0.0 && v.abs() < 9.0e15 {
                format!("{}", *v as i64)
            } else {
                v.to_string()
            }
        }
        Data::DateTime(dt) => excel_serial_date(dt.as_f64()),
        Data::DateTimeIso(v) => v.split('T').next().unwrap_or(v).to_string(),
        other => other.to_string(),
    }
}

/// Excel 日期序列号（1900 日期系统）→ YYYY-MM-DD，忽略时间部分
fn excel_serial_date(serial: f64) -> String {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|base| base.checked_add_signed(Duration::days(serial.floor() as i64)))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| serial.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_file_name() {
        assert_eq!(
            ExtractFormat::from_file_name("长电科技_20250520.XLSX").unwrap(),
            ExtractFormat::Xlsx
        );
        assert_eq!(
            ExtractFormat::from_file_name("a.csv").unwrap(),
            ExtractFormat::Csv
        );
        assert!(matches!(
            ExtractFormat::from_file_name("a.xls"),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_csv_header_row_and_blank_rows() {
        let csv = "贵州亚芯进度表,,\n 客户订单号 ,装片1,包装\nHX-1,3,0\n,,\nHX-2,1,5\n";
        let table = parse_workbook(csv.as_bytes(), ExtractFormat::Csv, None, 1).unwrap();
        assert_eq!(table.headers, vec!["客户订单号", "装片1", "包装"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].row_number, 3);
        assert_eq!(table.rows[1].row_number, 5);
        assert_eq!(table.cell(&table.rows[1], 2), "5");
        assert_eq!(table.cell(&table.rows[1], 9), "");
    }

    #[test]
    fn test_missing_header_row() {
        let err = parse_workbook(b"", ExtractFormat::Csv, None, 0).unwrap_err();
        assert!(matches!(err, ImportError::HeaderRowMissing(0)));
    }

    #[test]
    fn test_missing_columns() {
        let csv = "订单号,研磨\nSO-1,1\n";
        let table = parse_workbook(csv.as_bytes(), ExtractFormat::Csv, None, 0).unwrap();
        assert_eq!(table.missing_columns(&["订单号", "包装"]), vec!["包装"]);
    }

    #[test]
    fn test_invalid_xlsx_bytes() {
        let err = parse_workbook(b"not a zip", ExtractFormat::Xlsx, None, 0).unwrap_err();
        assert!(matches!(err, ImportError::ExcelParseError(_)));
    }

    #[test]
    fn test_anchor_at_a1() {
        let rows = vec![
            vec!["订单号".to_string(), "装片".to_string()],
            vec!["SO-1".to_string(), "3".to_string()],
        ];
        // 区域从 B2 开始
        let grid = anchor_at_a1(Some((1, 1)), rows.clone());
        assert_eq!(grid.len(), 3);
        assert!(grid[0].is_empty());
        assert_eq!(grid[1], vec!["", "订单号", "装片"]);

        let table = build_table(grid, 1).unwrap();
        assert_eq!(table.column_index("订单号"), Some(1));
        assert_eq!(table.rows[0].row_number, 3);
        assert_eq!(table.cell(&table.rows[0], 2), "3");

        assert_eq!(anchor_at_a1(None, rows.clone()), rows);
    }

    #[test]
    fn test_render_cell() {
        assert_eq!(render_cell(&Data::Float(12.0)), "12");
        assert_eq!(render_cell(&Data::Float(1.5)), "1.5");
        assert_eq!(render_cell(&Data::Empty), "");
        assert_eq!(
            render_cell(&Data::DateTimeIso("2025-05-20T00:00:00".to_string())),
            "2025-05-20"
        );
        assert_eq!(excel_serial_date(45797.75), "2025-05-20");
    }
}
