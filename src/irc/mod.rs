pub mod client;
mod command;
pub mod ctcp;
mod host;
mod message;
mod param;
mod source;

pub use command::{IrcCommand, IrcCommandParseErr};
pub use host::IrcHost;
pub use message::{IrcMessage, IrcParseErr};
pub use param::Param;
pub use source::Source;

use crate::constants::names::CHANNEL_TYPES;

/// returns true if the target names a channel rather than a user.
pub fn is_channel_name(target: &str) -> bool {
    target.starts_with(CHANNEL_TYPES)
}
