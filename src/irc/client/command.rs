use thiserror::Error;

use crate::irc::ctcp::Ctcp;

/// a command the bot sends to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Nick(String),
    User {
        username: String,
        realname: String,
    },
    Pong(String),
    Quit(Option<String>),
    Join(Vec<String>),
    Part(Vec<String>, Option<String>),
    Names(Vec<String>),
    Who(String),
    Privmsg {
        target: String,
        msg: String,
    },
    Notice {
        target: String,
        msg: String,
    },

    /// the bot wants to send the following text directly to the server. this is used for commands
    /// that do not have their own variant.
    Raw(String),
}

impl ClientCommand {
    pub fn privmsg(target: impl Into<String>, msg: impl Into<String>) -> Self {
        ClientCommand::Privmsg {
            target: target.into(),
            msg: msg.into(),
        }
    }

    pub fn notice(target: impl Into<String>, msg: impl Into<String>) -> Self {
        ClientCommand::Notice {
            target: target.into(),
            msg: msg.into(),
        }
    }

    pub fn ctcp_reply(target: impl Into<String>, reply: &Ctcp) -> Self {
        ClientCommand::notice(target, reply.irc_string())
    }

    /// the wire form of this command, without the trailing CRLF
    pub fn irc_str(&self) -> Result<String, ClientCommandToStringErr> {
        let msg = match self {
            ClientCommand::Nick(nick) => format!("NICK {}", nick),
            ClientCommand::User { username, realname } => {
                format!("USER {} 0 * :{}", username, realname)
            }
            ClientCommand::Pong(token) => format!("PONG :{}", token),
            ClientCommand::Quit(reason) => match reason {
                Some(r) => format!("QUIT :{}", r),
                None => String::from("QUIT"),
            },
            ClientCommand::Join(channels) => {
                format!("JOIN {}", join_targets(channels)?)
            }
            ClientCommand::Part(channels, reason) => {
                let channels = join_targets(channels)?;
                match reason {
                    Some(r) => format!("PART {} :{}", channels, r),
                    None => format!("PART {}", channels),
                }
            }
            ClientCommand::Names(channels) => format!("NAMES {}", join_targets(channels)?),
            ClientCommand::Who(mask) => format!("WHO {}", mask),
            ClientCommand::Privmsg { target, msg } => format!("PRIVMSG {} :{}", target, msg),
            ClientCommand::Notice { target, msg } => format!("NOTICE {} :{}", target, msg),
            ClientCommand::Raw(text) => text.to_string(),
        };

        // a line break would smuggle a second command onto the wire
        if msg.contains(['\r', '\n']) {
            return Err(ClientCommandToStringErr::InteriorLineBreak);
        }

        Ok(msg)
    }
}

fn join_targets(targets: &[String]) -> Result<String, ClientCommandToStringErr> {
    if targets.is_empty() {
        return Err(ClientCommandToStringErr::InvalidParams);
    }
    Ok(targets.join(","))
}

#[derive(Debug, Error)]
pub enum ClientCommandToStringErr {
    #[error("message had invalid params")]
    InvalidParams,
    #[error("message contains a line break")]
    InteriorLineBreak,
}
