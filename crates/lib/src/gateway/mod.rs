//! HTTP routes for status, configuration and workspace queries.
//!
//! Single port; every route forwards to the [`crate::bridge::Bridge`] or the config file.

mod server;

pub use server::{router, run_server, ServerState};
