//! Gridview Engine
//!
//! The controllers behind a paged, sortable, filterable table view.
//!
//! # Architecture
//!
//! ```text
//! Presentation (any RowStore implementation)
//!     ↑ order / window / exclusions / events
//! ViewEngine ← This crate
//!     ↓
//! FilterEngine, SortEngine, PageController, RemoteSource
//!     ↓
//! gridview-core (model, TypeConverter, FunctionRegistry)
//! ```
//!
//! # Components
//!
//! - [`ViewEngine`] - owns page, sort and filter state and decides whether a
//!   change is served locally or fetched remotely
//! - [`FilterEngine`] - multi-predicate filtering and highlighting
//! - [`SortEngine`] - cooperative, cancellable batch sorting
//! - [`PageController`] - page clamping and window computation
//! - [`RemoteSource`] - one in-flight request at a time plus a response cache
//!
//! Sorting and fetching never block. Drive them with [`ViewEngine::tick`]
//! from an event loop, or await [`ViewEngine::run_until_idle`].

mod filter;
mod paging;
pub mod remote;
mod sort;
mod view;

pub use filter::{FilterEngine, FilterOutcome, FilterPattern, FilterPredicate, FilterRemoval};
pub use paging::{PageController, PageWindow};
pub use remote::{
    CacheStats, DataSource, Dispatch, FetchOutcome, FetchRequest, FetchResponse, RemoteSource,
};
#[cfg(feature = "http")]
pub use remote::HttpDataSource;
pub use sort::{SortEngine, SortOutcome, SortStep, SortTask, SortTaskId, SortTaskState};
pub use view::ViewEngine;

pub use gridview_core::{
    ColumnSpec, ColumnType, ComparableValue, FunctionRegistry, GridError, MemoryRowStore,
    PageState, Result, RowId, RowRecord, RowStore, SortDirection, SortState, ViewConfig,
    ViewEvent,
};
