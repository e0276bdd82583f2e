//! Conversion of raw cell text into comparable values
//!
//! Cells are stored as opaque strings that may carry markup. Sorting and the
//! typed accessors need a value with the column's comparison semantics, which
//! is what [`TypeConverter::convert`] produces. Conversion never fails:
//! unparsable numbers become `NaN` and unparsable dates become an invalid-date
//! sentinel, both of which compare as neither greater nor less than anything.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::ColumnType;

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static INT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+").expect("valid int regex"));
static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid float regex")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

/// A typed cell value with the comparison semantics of its column
#[derive(Debug, Clone, PartialEq)]
pub enum ComparableValue {
    /// Integer and float columns; `NaN` for unparsable input
    Number(f64),
    /// Date columns; `None` is the invalid-date sentinel
    Date(Option<NaiveDateTime>),
    /// String columns, already trimmed (and lower-cased when insensitive)
    Text(String),
}

impl ComparableValue {
    /// Whether this value is a NaN or invalid-date sentinel
    pub fn is_invalid(&self) -> bool {
        match self {
            Self::Number(n) => n.is_nan(),
            Self::Date(d) => d.is_none(),
            Self::Text(_) => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if !n.is_nan() => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialOrd for ComparableValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Date(Some(a)), Self::Date(Some(b))) => a.partial_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl std::fmt::Display for ComparableValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) if n.is_nan() => write!(f, "NaN"),
            Self::Number(n) => write!(f, "{}", n),
            Self::Date(Some(d)) => write!(f, "{}", d),
            Self::Date(None) => write!(f, "Invalid Date"),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Converts raw cell text into [`ComparableValue`]s
pub struct TypeConverter;

impl TypeConverter {
    /// Convert a raw cell into a comparable value for `column_type`.
    ///
    /// Custom comparator columns convert like case-insensitive strings; the
    /// comparator itself is applied by the sort engine on the raw text.
    pub fn convert(raw: &str, column_type: &ColumnType, wants_markup: bool) -> ComparableValue {
        let text = if wants_markup {
            raw.to_string()
        } else {
            Self::text_content(raw)
        };
        let text = text.trim();

        match column_type {
            ColumnType::Int => ComparableValue::Number(Self::parse_int(text)),
            ColumnType::Float => ComparableValue::Number(Self::parse_float(text)),
            ColumnType::Date => ComparableValue::Date(Self::parse_date(text)),
            ColumnType::StrSensitive => ComparableValue::Text(text.to_string()),
            ColumnType::StrInsensitive | ColumnType::None | ColumnType::Custom(_) => {
                ComparableValue::Text(text.to_lowercase())
            }
        }
    }

    /// Strip markup tags and decode the common character entities
    pub fn text_content(raw: &str) -> String {
        if !raw.contains('<') && !raw.contains('&') {
            return raw.to_string();
        }
        let stripped = MARKUP_TAG.replace_all(raw, "");
        stripped
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&")
    }

    /// Parse the leading integer of `text`, `NaN` if there is none
    pub fn parse_int(text: &str) -> f64 {
        match INT_PREFIX.find(text) {
            Some(m) => m
                .as_str()
                .parse::<i64>()
                .map(|v| v as f64)
                .or_else(|_| m.as_str().parse::<f64>())
                .unwrap_or(f64::NAN),
            None => f64::NAN,
        }
    }

    /// Parse the leading decimal number of `text`, `NaN` if there is none
    pub fn parse_float(text: &str) -> f64 {
        FLOAT_PREFIX
            .find(text)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(f64::NAN)
    }

    /// Permissive date parsing; `None` is the invalid-date sentinel
    pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
        if text.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.naive_utc());
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
            return Some(dt.naive_utc());
        }
        for format in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
                return Some(dt);
            }
        }
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                return date.and_hms_opt(0, 0, 0);
            }
        }
        tracing::trace!(input = %text, "unparsable date cell");
        None
    }
}
