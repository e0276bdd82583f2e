//! Reading row sets from JSON files

use std::path::Path;

use anyhow::{bail, Context, Result};
use gridview_core::{ColumnSpec, ColumnType};
use serde_json::Value;

/// Rows read from a file, with column names when the file has them
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadedRows {
    pub rows: Vec<Vec<String>>,
    pub column_names: Vec<String>,
}

impl LoadedRows {
    /// Untyped column specs carrying the names found in the file
    pub fn column_specs(&self) -> Vec<ColumnSpec> {
        self.column_names
            .iter()
            .enumerate()
            .map(|(index, name)| ColumnSpec::new(index, ColumnType::None).named(name.clone()))
            .collect()
    }
}

pub fn load_rows(path: &Path) -> Result<LoadedRows> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rows from {}", path.display()))?;
    parse_rows(&text).with_context(|| format!("Invalid rows file {}", path.display()))
}

/// Parse `[[...], ...]`, `[{...}, ...]` or `{"rows": [...]}`.
///
/// Object rows take their columns from the keys of the first object.
pub fn parse_rows(text: &str) -> Result<LoadedRows> {
    let value: Value = serde_json::from_str(text).context("Rows are not valid JSON")?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("rows") {
            Some(Value::Array(items)) => items,
            _ => bail!("Expected a \"rows\" array"),
        },
        _ => bail!("Expected a JSON array of rows"),
    };

    let column_names: Vec<String> = match items.first() {
        Some(Value::Object(first)) => first.keys().cloned().collect(),
        _ => Vec::new(),
    };

    let rows = items
        .into_iter()
        .enumerate()
        .map(|(position, item)| match item {
            Value::Array(cells) => Ok(cells.iter().map(cell_text).collect()),
            Value::Object(map) => Ok(column_names
                .iter()
                .map(|name| map.get(name).map(cell_text).unwrap_or_default())
                .collect()),
            scalar if column_names.is_empty() => Ok(vec![cell_text(&scalar)]),
            _ => bail!("Row {} is not an object", position),
        })
        .collect::<Result<Vec<Vec<String>>>>()?;

    tracing::debug!(rows = rows.len(), columns = column_names.len(), "parsed row file");
    Ok(LoadedRows { rows, column_names })
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
