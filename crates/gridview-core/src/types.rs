//! Core types for Gridview

use serde::{Deserialize, Serialize};

/// Stable identity of a row inside the store that currently owns it.
///
/// Ids index the store's arena, so they survive reordering and filtering but
/// are reassigned whenever the row set itself is replaced (e.g. a new page is
/// fetched from a remote source).
pub type RowId = usize;

/// A single row: ordered cell values plus the row's arena identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRecord {
    pub id: RowId,
    /// Raw cell content, possibly containing markup
    pub cells: Vec<String>,
}

impl RowRecord {
    pub fn new(id: RowId, cells: Vec<String>) -> Self {
        Self { id, cells }
    }

    /// Raw content of a cell, `None` when the row is shorter than `column`
    pub fn cell(&self, column: usize) -> Option<&str> {
        self.cells.get(column).map(|c| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Declared comparison type of a column.
///
/// Serialized as a plain tag (`"int"`, `"float"`, `"date"`, `"str-sensitive"`,
/// `"str-insensitive"`, `"none"`). Any other tag names a custom comparator
/// that is looked up in the [`FunctionRegistry`](crate::FunctionRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    Int,
    Float,
    Date,
    StrSensitive,
    StrInsensitive,
    /// Name of a registered comparator
    Custom(String),
    #[default]
    None,
}

impl ColumnType {
    /// Parse a type tag. Unknown tags are treated as custom comparator names.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "int" | "integer" => Self::Int,
            "float" | "number" => Self::Float,
            "date" => Self::Date,
            "str-sensitive" | "string-sensitive" => Self::StrSensitive,
            "str-insensitive" | "string" | "str" => Self::StrInsensitive,
            "" | "none" => Self::None,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Date => "date",
            Self::StrSensitive => "str-sensitive",
            Self::StrInsensitive => "str-insensitive",
            Self::Custom(name) => name,
            Self::None => "none",
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl From<String> for ColumnType {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<ColumnType> for String {
    fn from(column_type: ColumnType) -> Self {
        column_type.tag().to_string()
    }
}

/// Static description of a column
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSpec {
    /// 0-based column position
    pub index: usize,
    /// Name sent to remote sources instead of the index, when set
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Compare the raw markup instead of the extracted text
    pub wants_markup: bool,
}

impl ColumnSpec {
    pub fn new(index: usize, column_type: ColumnType) -> Self {
        Self {
            index,
            column_type,
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_markup(mut self, wants_markup: bool) -> Self {
        self.wants_markup = wants_markup;
        self
    }

    /// Identifier used when a remote source sorts on this column
    pub fn remote_identifier(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.index.to_string())
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// `+1` for ascending, `-1` for descending
    pub fn sign(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }

    pub fn from_sign(sign: i32) -> Self {
        if sign < 0 {
            Self::Descending
        } else {
            Self::Ascending
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    /// Parse `asc`/`desc` style input
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" | "+1" => Some(Self::Ascending),
            "desc" | "descending" | "-1" => Some(Self::Descending),
            _ => None,
        }
    }
}

/// Which column the rows are ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortState {
    /// `None` means unsorted
    pub column: Option<usize>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn new(column: usize, direction: SortDirection) -> Self {
        Self {
            column: Some(column),
            direction,
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.column.is_some()
    }

    /// Column index, or `-1` when unsorted
    pub fn column_code(&self) -> i64 {
        self.column.map(|c| c as i64).unwrap_or(-1)
    }
}

/// Current page, page size and row total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    /// 0-based page index
    pub current_page: usize,
    pub page_size: usize,
    /// Local surviving row count, or the total declared by a remote source
    pub total_row_count: usize,
}

impl PageState {
    /// Number of pages, never less than one
    pub fn max_page(&self) -> usize {
        let page_size = self.page_size.max(1);
        self.total_row_count.div_ceil(page_size).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_tags_round_trip_through_strings() {
        assert_eq!(ColumnType::from_tag("int"), ColumnType::Int);
        assert_eq!(ColumnType::from_tag("str-sensitive"), ColumnType::StrSensitive);
        assert_eq!(ColumnType::from_tag(""), ColumnType::None);
        assert_eq!(
            ColumnType::from_tag("byPriority"),
            ColumnType::Custom("byPriority".into())
        );
        assert_eq!(String::from(ColumnType::Date), "date");
    }

    #[test]
    fn column_spec_deserializes_type_tag() {
        let spec: ColumnSpec =
            serde_json::from_str(r#"{"index": 2, "name": "price", "type": "float"}"#).unwrap();
        assert_eq!(spec.index, 2);
        assert_eq!(spec.column_type, ColumnType::Float);
        assert_eq!(spec.remote_identifier(), "price");
        assert_eq!(ColumnSpec::new(4, ColumnType::Int).remote_identifier(), "4");
    }

    #[test]
    fn sort_direction_toggles_and_parses() {
        assert_eq!(SortDirection::Ascending.toggled(), SortDirection::Descending);
        assert_eq!(SortDirection::from_sign(-1), SortDirection::Descending);
        assert_eq!(SortDirection::parse("DESC"), Some(SortDirection::Descending));
        assert_eq!(SortDirection::parse("sideways"), None);
        assert_eq!(SortState::unsorted().column_code(), -1);
    }

    #[test]
    fn max_page_is_at_least_one() {
        let state = PageState {
            current_page: 0,
            page_size: 2,
            total_row_count: 5,
        };
        assert_eq!(state.max_page(), 3);
        let empty = PageState {
            total_row_count: 0,
            ..state
        };
        assert_eq!(empty.max_page(), 1);
    }
}
