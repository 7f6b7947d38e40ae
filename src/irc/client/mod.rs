mod command;

pub use command::{ClientCommand, ClientCommandToStringErr};
