//! Slack bridge library: outgoing message correlation, the Slack Web API connection,
//! configuration, and the HTTP routes used by the CLI.

pub mod bridge;
pub mod config;
pub mod gateway;
pub mod outgoing;
pub mod slack;
