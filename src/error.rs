use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("input file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("{file}: required column `{column}` not found")]
    MissingColumn { file: String, column: String },

    #[error("{0}: sheet has no header row")]
    EmptySheet(String),

    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("no feedback rows for {0}")]
    EmptyPeriod(String),

    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("xlsx writer error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
