//! REST API client module for the recipe backend.
//!
//! This module provides the `ApiClient` for account and recipe calls.
//! Protected calls carry the session token as a bearer credential; the
//! backend validates it on every request.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
