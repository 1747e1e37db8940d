//! Turns a question plus the loaded datasets into a bounded prompt.

pub mod prompt;
pub mod selector;

pub use prompt::{compose, ReportMeta, STOP_SEQUENCES};
pub use selector::{select, SelectionLimits};
