// Spreadsheet ingestion: the first worksheet of an uploaded workbook,
// exposed as a header-indexed table. Only the header labels the import
// pipeline recognizes are ever looked up; everything else is ignored.

use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashMap;
use std::path::Path;

pub const COL_SCORE: &str = "score";
pub const COL_IDENTIFIER: &str = "identifier";
pub const COL_DISPLAY_NAME: &str = "display_name";

pub struct SheetTable {
    pub source_name: String,
    pub exam_name: String,
    columns: HashMap<String, usize>,
    rows: Vec<Vec<Data>>,
}

impl SheetTable {
    pub fn open(path: &Path) -> Result<SheetTable, String> {
        let source_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| "sheet path has no file name".to_string())?;
        let exam_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| "sheet path has no file stem".to_string())?;

        let mut workbook = open_workbook_auto(path)
            .map_err(|e| format!("failed to open workbook: {}", e))?;

        let sheet_names = workbook.sheet_names().to_vec();
        let Some(first) = sheet_names.first() else {
            return Err("workbook contains no sheets".to_string());
        };
        let range = workbook
            .worksheet_range(first)
            .map_err(|e| format!("failed to read sheet '{}': {}", first, e))?;

        let mut row_iter = range.rows();
        let Some(header) = row_iter.next() else {
            return Err(format!("sheet '{}' has no header row", first));
        };

        let mut columns = HashMap::new();
        for (idx, cell) in header.iter().enumerate() {
            if let Some(label) = cell_text(cell) {
                // First occurrence wins when a label repeats.
                columns.entry(label).or_insert(idx);
            }
        }

        let rows = row_iter.map(|r| r.to_vec()).collect();

        Ok(SheetTable {
            source_name,
            exam_name,
            columns,
            rows,
        })
    }

    pub fn has_column(&self, label: &str) -> bool {
        self.columns.contains_key(label)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Text content of a cell, or None when the column is absent or the
    /// cell is blank.
    pub fn text(&self, row: usize, label: &str) -> Option<String> {
        let col = *self.columns.get(label)?;
        self.rows.get(row)?.get(col).and_then(cell_text)
    }

    /// Numeric content of a cell, or None when the column is absent, the
    /// cell is blank, or the value does not parse as a number.
    pub fn number(&self, row: usize, label: &str) -> Option<f64> {
        let col = *self.columns.get(label)?;
        self.rows.get(row)?.get(col).and_then(cell_number)
    }
}

// Integral floats print without the trailing ".0" so a numeric student-number
// column yields the same key whether the cell arrives typed or as text.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Data::Float(n) => {
            if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                Some(format!("{}", *n as i64))
            } else {
                Some(n.to_string())
            }
        }
        Data::Int(n) => Some(n.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        other => {
            let t = other.to_string();
            let t = t.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
    }
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(n) => Some(*n),
        Data::Int(n) => Some(*n as f64),
        Data::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
