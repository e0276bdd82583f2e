//! Gridview Core - shared abstractions for the tabular view engine
//!
//! This crate provides the types every other Gridview crate depends on:
//!
//! - `RowRecord`, `ColumnSpec`, `SortState`, `PageState` - the data model
//! - `TypeConverter` - raw cell text to comparable values
//! - `FunctionRegistry` - named custom comparators and filter predicates
//! - `RowStore` - the presentation-side row storage the engine drives
//! - `ViewEvent` - lifecycle notifications
//! - `ViewConfig` - per-view configuration

mod config;
mod convert;
mod error;
mod events;
mod registry;
mod store;
mod types;

pub use config::*;
pub use convert::*;
pub use error::*;
pub use events::*;
pub use registry::*;
pub use store::*;
pub use types::*;
