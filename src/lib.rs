//! an IRC bot core: a reconnecting transport, a protocol parser that keeps a model of users and
//! channels, and a privilege gated event bus that loaded modules subscribe to.

pub mod bot;
pub mod config;
pub mod connection;
pub mod constants;
pub mod directory;
pub mod event;
pub mod ext;
pub mod irc;
pub mod logging;
pub mod module;
pub mod net;
pub mod slots;
pub mod util;

pub use bot::{Bot, BotErr, Scope};
pub use config::{BotConfig, ConfigErr, NetworkConfig};
pub use connection::{Connection, ConnectionState};
pub use module::{Module, ModuleContext, ModuleSubscription};
