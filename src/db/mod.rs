//! Database layer.
//!
//! - [`schema`] — DDL and initialization (`initialize_database`).
//! - [`converters`] — Row-to-struct conversions.

pub mod converters;
pub mod schema;

pub use converters::{row_to_graph_edge, row_to_graph_node};
pub use schema::initialize_database;
