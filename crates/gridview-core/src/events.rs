//! Lifecycle events emitted by the view engine

use crate::types::{RowId, SortState};

/// State-change notifications consumed by the presentation layer
#[derive(Clone, Debug, PartialEq)]
pub enum ViewEvent {
    /// A new row order was published
    RowOrderChanged { sort: SortState },
    /// The current page or the page count changed
    PageChanged {
        /// 1-based page number
        page: usize,
        max_page: usize,
        /// Window over the surviving rows
        start: usize,
        end: usize,
    },
    /// A filter excluded `filtered` rows; `remaining` rows survive
    FilterApplied {
        filtered: Vec<RowId>,
        remaining: usize,
    },
    /// Filters were removed and `restored` rows came back
    FilterRemoved {
        restored: Vec<RowId>,
        remaining: usize,
    },
    /// The highlighted row set changed
    HighlightChanged { highlighted: Vec<RowId> },
    /// A remote request was issued
    FetchStarted { key: String },
    /// A remote response (fresh or cached) was applied
    FetchCompleted {
        key: String,
        from_cache: bool,
        rows: usize,
    },
    /// A remote request failed; the view keeps its last good state
    FetchFailed {
        key: String,
        status: Option<u16>,
        message: String,
    },
}

impl ViewEvent {
    /// Short name, used for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::RowOrderChanged { .. } => "row-order-changed",
            Self::PageChanged { .. } => "page-changed",
            Self::FilterApplied { .. } => "filter-applied",
            Self::FilterRemoved { .. } => "filter-removed",
            Self::HighlightChanged { .. } => "highlight-changed",
            Self::FetchStarted { .. } => "fetch-started",
            Self::FetchCompleted { .. } => "fetch-completed",
            Self::FetchFailed { .. } => "fetch-failed",
        }
    }
}
