//! Shared building blocks for the temporal median workspace.

pub mod buffer3;
pub mod log_setup;

pub use buffer3::{Buffer3, ColumnWriter};
