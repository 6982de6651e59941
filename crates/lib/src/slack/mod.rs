//! Slack side of the bridge: the connection surface, the Web API client, and the
//! message kinds with their builders and delivery handlers.

mod actions;
mod client;
mod connection;

pub use actions::{
    create_attachments, create_delete_text_or_attachments, create_reaction, create_remove_reaction,
    create_text, create_update_attachments, create_update_text, default_handlers, MessageKind,
    SlackHandler, SLACK_PLATFORM,
};
pub use client::{slack_api_base, SlackClient};
pub use connection::{ConnectionSlot, SlackConnection};

#[cfg(test)]
pub(crate) use connection::testing;
