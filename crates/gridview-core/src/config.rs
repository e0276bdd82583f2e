//! View configuration, loadable from TOML

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::types::{ColumnSpec, ColumnType};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_SORT_BATCH_SIZE: usize = 10;

/// Configuration of a single view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Rows per page
    pub page_size: usize,
    /// Let the remote source page the rows
    pub server_paging: bool,
    /// Let the remote source sort the rows
    pub server_sort: bool,
    /// Reuse remote responses for previously visited page/sort combinations
    pub cache_responses: bool,
    /// Fetch the full row set once when neither server paging nor sorting is on
    pub load_all_on_init: bool,
    /// Rows inserted per cooperative sort batch
    pub sort_batch_size: usize,
    pub columns: Vec<ColumnSpec>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            server_paging: false,
            server_sort: false,
            cache_responses: true,
            load_all_on_init: false,
            sort_batch_size: DEFAULT_SORT_BATCH_SIZE,
            columns: Vec::new(),
        }
    }
}

impl ViewConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)?;
        Ok(config.validate())
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents).map_err(|e| match e {
            GridError::Toml(err) => {
                GridError::Configuration(format!("{}: {}", path.display(), err))
            }
            other => other,
        })?;
        tracing::debug!(path = %path.display(), columns = config.columns.len(), "loaded view config");
        Ok(config)
    }

    /// Clamp sizes to their minimum of one
    pub fn validate(mut self) -> Self {
        if self.page_size == 0 {
            tracing::warn!("page_size of 0 is invalid, using 1");
            self.page_size = 1;
        }
        if self.sort_batch_size == 0 {
            tracing::warn!("sort_batch_size of 0 is invalid, using 1");
            self.sort_batch_size = 1;
        }
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_server_paging(mut self, enabled: bool) -> Self {
        self.server_paging = enabled;
        self
    }

    pub fn with_server_sort(mut self, enabled: bool) -> Self {
        self.server_sort = enabled;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_responses = enabled;
        self
    }

    /// Spec for column `index`, or an untyped default when not configured
    pub fn column(&self, index: usize) -> ColumnSpec {
        self.columns
            .iter()
            .find(|c| c.index == index)
            .cloned()
            .unwrap_or_else(|| ColumnSpec::new(index, ColumnType::None))
    }

    /// Number of columns described by the configuration
    pub fn configured_column_count(&self) -> usize {
        self.columns.iter().map(|c| c.index + 1).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ViewConfig::from_toml_str("server_paging = true").unwrap();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert!(config.server_paging);
        assert!(!config.server_sort);
        assert!(config.cache_responses);
        assert_eq!(config.sort_batch_size, DEFAULT_SORT_BATCH_SIZE);
    }

    #[test]
    fn columns_parse_with_type_tags() {
        let config = ViewConfig::from_toml_str(
            r#"
            page_size = 25

            [[columns]]
            index = 0
            name = "id"
            type = "int"

            [[columns]]
            index = 2
            type = "byPriority"
            wants_markup = true
            "#,
        )
        .unwrap();

        assert_eq!(config.page_size, 25);
        assert_eq!(config.column(0).column_type, ColumnType::Int);
        assert_eq!(config.column(0).name.as_deref(), Some("id"));
        assert_eq!(
            config.column(2).column_type,
            ColumnType::Custom("byPriority".into())
        );
        assert!(config.column(2).wants_markup);
        assert_eq!(config.column(1), ColumnSpec::new(1, ColumnType::None));
        assert_eq!(config.configured_column_count(), 3);
    }

    #[test]
    fn zero_sizes_are_clamped() {
        let config = ViewConfig::from_toml_str("page_size = 0\nsort_batch_size = 0").unwrap();
        assert_eq!(config.page_size, 1);
        assert_eq!(config.sort_batch_size, 1);
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(matches!(
            ViewConfig::from_toml_str("page_size = \"many\""),
            Err(GridError::Toml(_))
        ));
    }
}
