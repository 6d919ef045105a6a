//! Utility functions for string formatting.

pub mod format;

pub use format::{format_date, mask_token, truncate_string};
