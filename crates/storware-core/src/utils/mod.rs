//! Utility functions for formatting report values.

pub mod format;

pub use format::{format_bytes, truncate_string};
