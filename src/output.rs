use crate::error::Result;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn write_text(path: &Path, doc: &str) -> Result<()> {
    std::fs::write(path, doc)?;
    Ok(())
}

/// Multi-sheet workbook built from `Tabled` rows; headers are bold and
/// numeric-looking cells are written as numbers.
pub struct WorkbookBuilder {
    workbook: Workbook,
}

impl WorkbookBuilder {
    pub fn new() -> Self {
        WorkbookBuilder {
            workbook: Workbook::new(),
        }
    }

    pub fn add_sheet<T: Tabled>(&mut self, name: &str, rows: &[T]) -> Result<&mut Self> {
        let header = Format::new().set_bold();
        let sheet = self.workbook.add_worksheet();
        sheet.set_name(sheet_name(name))?;
        for (c, h) in T::headers().iter().enumerate() {
            sheet.write_string_with_format(0, c as u16, h.to_string(), &header)?;
        }
        for (r, row) in rows.iter().enumerate() {
            for (c, field) in row.fields().iter().enumerate() {
                write_field(sheet, r as u32 + 1, c as u16, field.as_ref())?;
            }
        }
        Ok(self)
    }

    /// Two-column key/value sheet used for headline figures.
    pub fn add_key_values(&mut self, name: &str, pairs: &[(&str, String)]) -> Result<&mut Self> {
        let header = Format::new().set_bold();
        let sheet = self.workbook.add_worksheet();
        sheet.set_name(sheet_name(name))?;
        sheet.write_string_with_format(0, 0, "Metric", &header)?;
        sheet.write_string_with_format(0, 1, "Value", &header)?;
        for (r, (k, v)) in pairs.iter().enumerate() {
            sheet.write_string(r as u32 + 1, 0, *k)?;
            write_field(sheet, r as u32 + 1, 1, v)?;
        }
        Ok(self)
    }

    /// Serializes in memory, then writes the whole file at once.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.workbook.save_to_buffer()?)
    }
}

// Excel limits sheet names to 31 characters and forbids a few symbols.
fn sheet_name(name: &str) -> String {
    name.chars()
        .map(|c| if "[]:*?/\\".contains(c) { '-' } else { c })
        .take(31)
        .collect()
}

// Codes with leading zeros ("007") must stay text.
fn looks_numeric(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    !digits.is_empty() && !leading_zero && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn write_field(sheet: &mut Worksheet, row: u32, col: u16, value: &str) -> Result<()> {
    match value.parse::<f64>() {
        Ok(n) if looks_numeric(value) => sheet.write_number(row, col, n)?,
        _ => sheet.write_string(row, col, value)?,
    };
    Ok(())
}

pub fn markdown_table<T: Tabled>(rows: &[T], max_rows: usize) -> String
where
    T: Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn markdown_grid(header: Vec<String>, rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(header);
    for r in rows {
        builder.push_record(r);
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", markdown_table(rows, max_rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CountRow;
    use calamine::{open_workbook_auto, Data, Reader};

    fn rows() -> Vec<CountRow> {
        vec![
            CountRow { value: "Precio".into(), count: 12, share: "60.0%".into() },
            CountRow { value: "007".into(), count: 8, share: "40.0%".into() },
        ]
    }

    #[test]
    fn numeric_detection_keeps_codes_as_text() {
        assert!(looks_numeric("12"));
        assert!(looks_numeric("0.5"));
        assert!(looks_numeric("-3"));
        assert!(!looks_numeric("007"));
        assert!(!looks_numeric("60.0%"));
        assert!(!looks_numeric(""));
    }

    #[test]
    fn sheet_names_are_sanitized() {
        assert_eq!(sheet_name("Week 2025/02"), "Week 2025-02");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
    }

    #[test]
    fn workbook_round_trips_through_calamine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.xlsx");
        let mut wb = WorkbookBuilder::new();
        wb.add_sheet("By Reason", &rows()).unwrap();
        wb.add_key_values("Summary", &[("Total", "20".to_string())]).unwrap();
        wb.save(&path).unwrap();

        let mut book = open_workbook_auto(&path).unwrap();
        assert_eq!(book.sheet_names(), vec!["By Reason".to_string(), "Summary".to_string()]);
        let range = book.worksheet_range("By Reason").unwrap();
        assert_eq!(range.get((0, 0)), Some(&Data::String("Value".into())));
        assert_eq!(range.get((1, 1)), Some(&Data::Float(12.0)));
        assert_eq!(range.get((2, 0)), Some(&Data::String("007".into())));
    }

    #[test]
    fn csv_and_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reasons.csv");
        write_csv(&path, &rows()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Value,Count,Share\n"));

        let mut wb = WorkbookBuilder::new();
        wb.add_sheet("Reasons", &rows()).unwrap();
        let bytes = wb.to_bytes().unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn grids_render_as_markdown() {
        let out = markdown_grid(vec!["A".into(), "B".into()], vec![vec!["1".into(), "2".into()]]);
        assert!(out.contains("| A | B |"));
        assert_eq!(markdown_grid(vec![], vec![]), "(no rows)");
    }
}
