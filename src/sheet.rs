// Raw tabular input: the first worksheet of a workbook, or a CSV file,
// flattened into trimmed strings under normalized headers.
use crate::error::{ReportError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RawTable {
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        let wanted = normalize_header(name);
        self.headers.iter().position(|h| *h == wanted)
    }

    pub fn require(&self, name: &str) -> Result<usize> {
        self.column(name).ok_or_else(|| ReportError::MissingColumn {
            file: self.source.clone(),
            column: name.to_string(),
        })
    }
}

/// Returns the cell at `idx`, or `None` for a missing column or blank cell.
pub fn cell(row: &[String], idx: Option<usize>) -> Option<&str> {
    let v = row.get(idx?)?.as_str();
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

/// Normalize a header: trimmed, lower-case, inner whitespace as `_`.
/// `"RUTA"`, `" ruta "` and `"Ruta"` all become `ruta`.
pub fn normalize_header(s: &str) -> String {
    s.split_whitespace()
        .map(|p| p.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Data::Int(i) => format!("{}", i),
        Data::Bool(b) => format!("{}", b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(v) => v.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Empty | Data::Error(_) => String::new(),
    }
}

pub fn read_table(path: &Path) -> Result<RawTable> {
    if !path.exists() {
        return Err(ReportError::MissingFile(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let grid = match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook_grid(path)?,
        "csv" => read_csv_grid(path)?,
        other => return Err(ReportError::UnsupportedFormat(format!("{} ({})", path.display(), other))),
    };
    from_grid(path.display().to_string(), grid)
}

fn read_workbook_grid(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)?;
    let Some(first) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook.worksheet_range(&first)?;
    Ok(range
        .rows()
        .map(|r| r.iter().map(cell_to_string).collect())
        .collect())
}

fn read_csv_grid(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut grid = Vec::new();
    for record in rdr.records() {
        let record = record?;
        grid.push(record.iter().map(|v| v.trim().to_string()).collect());
    }
    Ok(grid)
}

fn from_grid(source: String, grid: Vec<Vec<String>>) -> Result<RawTable> {
    let mut rows = grid.into_iter();
    let headers: Vec<String> = match rows.next() {
        Some(h) if h.iter().any(|c| !c.is_empty()) => h.iter().map(|c| normalize_header(c)).collect(),
        _ => return Err(ReportError::EmptySheet(source)),
    };
    let width = headers.len();
    let rows = rows
        .filter(|r| r.iter().any(|c| !c.is_empty()))
        .map(|mut r| {
            r.resize(width.max(r.len()), String::new());
            r
        })
        .collect();
    Ok(RawTable { source, headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn headers_are_normalized() {
        assert_eq!(normalize_header("  RUTA "), "ruta");
        assert_eq!(normalize_header("Fecha  Registro"), "fecha_registro");
    }

    #[test]
    fn integer_floats_render_without_decimals() {
        assert_eq!(cell_to_string(&Data::Float(101.0)), "101");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn reads_csv_and_skips_blank_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rutas.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "RUTA,SUPERVISOR").unwrap();
        writeln!(f, "R1,Ana").unwrap();
        writeln!(f, ",").unwrap();
        writeln!(f, "R2").unwrap();
        drop(f);

        let table = read_table(&path).unwrap();
        assert_eq!(table.headers, vec!["ruta", "supervisor"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["R2".to_string(), String::new()]);
        assert_eq!(table.column("Supervisor"), Some(1));
        assert!(matches!(
            table.require("contratista"),
            Err(ReportError::MissingColumn { .. })
        ));
    }

    #[test]
    fn missing_and_unknown_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.xlsx");
        assert!(matches!(read_table(&missing), Err(ReportError::MissingFile(_))));

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, "x").unwrap();
        assert!(matches!(read_table(&txt), Err(ReportError::UnsupportedFormat(_))));
    }
}
