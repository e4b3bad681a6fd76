//! Output formatting for CLI

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON, or `{}` when the value cannot be serialized
pub fn format_json<T: Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// Format rows based on selected format
pub fn format_rows<T: Serialize + Tabled>(rows: &[T], format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => format_json(rows),
        OutputFormat::Table => Table::new(rows).with(Style::rounded()).to_string(),
        OutputFormat::Text => Table::new(rows).with(Style::blank()).to_string(),
    }
}
