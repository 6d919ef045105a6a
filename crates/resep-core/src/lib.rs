//! Resep core: session handling and backend access for the recipe client.
//!
//! The [`auth::SessionStore`] is the single source of truth for who is signed
//! in. Construct it once at startup and hand it to every consumer; protected
//! views consult [`guard`] once the store reports it has finished loading.

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;
pub mod utils;
