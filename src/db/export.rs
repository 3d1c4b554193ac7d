use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DbError;

const CSV_HEADER: [&str; 3] = ["时间戳", "内容", "类型"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unsupported export format: {other}")),
        }
    }
}

/// One exported history entry. Field names are the JSON keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportRow {
    pub timestamp: String,
    pub content: String,
    pub code_type: String,
}

pub(super) fn render(format: ExportFormat, rows: &[ExportRow]) -> Result<Vec<u8>, DbError> {
    match format {
        ExportFormat::Csv => render_csv(rows),
        ExportFormat::Json => Ok(serde_json::to_vec_pretty(rows)?),
    }
}

fn render_csv(rows: &[ExportRow]) -> Result<Vec<u8>, DbError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record([
            row.timestamp.as_str(),
            row.content.as_str(),
            row.code_type.as_str(),
        ])?;
    }

    writer.into_inner().map_err(|err| DbError::Io(err.into_error()))
}
