//! Remote row loading
//!
//! When paging or sorting is delegated to a server, the view engine asks a
//! [`RemoteSource`] for rows instead of slicing its local arena. The remote
//! source owns the single in-flight request and the response cache.

mod cache;
#[cfg(feature = "http")]
mod http;
mod source;

pub use cache::{CacheStats, ResponseCache};
#[cfg(feature = "http")]
pub use http::HttpDataSource;
pub use source::{Dispatch, FetchOutcome, RemoteSource, RequestId};

use async_trait::async_trait;
use gridview_core::Result;
use serde::{Deserialize, Serialize};

/// Parameters of one remote fetch.
///
/// Page fields are only set when server paging is on, sort fields only when
/// server sorting is on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FetchRequest {
    /// 0-based page index
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    /// Column name, or its index when the column has no name
    pub sort_column: Option<String>,
    /// `1` ascending, `-1` descending
    pub sort_direction: Option<i32>,
}

impl FetchRequest {
    /// Request for the whole row set
    pub fn all_rows() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn with_sort(mut self, column: impl Into<String>, direction: i32) -> Self {
        self.sort_column = Some(column.into());
        self.sort_direction = Some(if direction < 0 { -1 } else { 1 });
        self
    }

    /// `page_pageSize_sortColumn_sortDirection`, with `0`, `0`, `-1` and `1`
    /// standing in for unset fields
    pub fn cache_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.page.unwrap_or(0),
            self.page_size.unwrap_or(0),
            self.sort_column.as_deref().unwrap_or("-1"),
            self.sort_direction.unwrap_or(1)
        )
    }

    /// Query parameters for sources that speak HTTP
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(4);
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            params.push(("page_size", page_size.to_string()));
        }
        if let Some(column) = &self.sort_column {
            params.push(("sort_column", column.clone()));
        }
        if let Some(direction) = self.sort_direction {
            params.push(("sort_direction", direction.to_string()));
        }
        params
    }
}

/// Rows returned by a remote source
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchResponse {
    pub rows: Vec<Vec<String>>,
    /// Total row count declared by the server, if it reports one
    #[serde(default)]
    pub total_rows: Option<usize>,
}

impl FetchResponse {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows,
            total_rows: None,
        }
    }

    pub fn with_total(mut self, total_rows: usize) -> Self {
        self.total_rows = Some(total_rows);
        self
    }

    /// Total row count to page against.
    ///
    /// Without a declared total, a full page implies at least one more row
    /// beyond it so the next page stays reachable.
    pub fn effective_total(&self, request: &FetchRequest) -> usize {
        if let Some(total) = self.total_rows {
            return total.max(self.rows.len());
        }
        match (request.page, request.page_size) {
            (Some(page), Some(page_size)) => {
                let before = page.saturating_mul(page_size);
                if self.rows.len() >= page_size {
                    before + self.rows.len() + 1
                } else {
                    before + self.rows.len()
                }
            }
            _ => self.rows.len(),
        }
    }
}

/// A source of rows that pages and sorts on its own side
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;

    /// Human-readable identifier used in logs
    fn describe(&self) -> String {
        "remote".to_string()
    }
}
