use thiserror::Error;

use crate::irc::{Param, param};

// expects a parameter to be a string parameter, and extracts it, otherwise returns an invalid param
// err.
macro_rules! expect_string_param {
    ($expr:expr) => {{
        let param = $expr;
        match param.as_str() {
            Some(s) => s.to_string(),
            None => return Err(IrcCommandParseErr::InvalidParams),
        }
    }};
}

/// a command sent by the server. only the commands the bot reacts to get their own variant,
/// everything else is kept as [`IrcCommand::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcCommand {
    Ping(String),
    Error(String),
    Nick(String),
    Quit(Option<String>),
    Join(Vec<String>),
    Part(Vec<String>, Option<String>),
    Topic(String, Option<String>),
    Mode {
        target: String,
        modes: Vec<String>,
    },
    Privmsg {
        targets: Vec<String>,
        msg: String,
    },
    Notice {
        targets: Vec<String>,
        msg: String,
    },
    Numeric {
        num: u16,
        args: Vec<Param>,
    },
    // an unknown message
    Unknown(String, Vec<Param>),
}

impl IrcCommand {
    /// parses a command from a string. the string must not contain leading spaces and must not
    /// contain a CRLF.
    /// only parses messages that can be sent from a server to a client!
    pub(super) fn parse(s: &str) -> Result<Self, IrcCommandParseErr> {
        let (command, args) = match s.split_once(' ') {
            Some(parts) => parts,
            // there was no space after the text, this is all one command
            None => (s, ""),
        };
        let args = param::parse_params(args);

        match command.to_ascii_uppercase().as_str() {
            "PING" => {
                // some servers send a bare PING, echo back nothing in that case
                let token = match args.first() {
                    Some(p) => p.to_irc_string(),
                    None => String::new(),
                };
                Ok(IrcCommand::Ping(token))
            }
            "ERROR" => {
                let reason = match args.first() {
                    Some(p) => expect_string_param!(p),
                    None => String::new(),
                };
                Ok(IrcCommand::Error(reason))
            }
            "NICK" => {
                let [nick, ..] = args.as_slice() else {
                    return Err(IrcCommandParseErr::MissingParams(s.to_string()));
                };
                Ok(IrcCommand::Nick(expect_string_param!(nick)))
            }
            "QUIT" => {
                // reason is optional, can be a QUIT with no args
                let reason = match args.first() {
                    Some(p) => Some(p.to_irc_string()),
                    None => None,
                };
                Ok(IrcCommand::Quit(reason))
            }
            "JOIN" => {
                let [channels, ..] = args.as_slice() else {
                    return Err(IrcCommandParseErr::MissingParams(s.to_string()));
                };
                Ok(IrcCommand::Join(channels.optional_list()))
            }
            "PART" => {
                let [channels, rest @ ..] = args.as_slice() else {
                    return Err(IrcCommandParseErr::MissingParams(s.to_string()));
                };
                let reason = rest.first().map(Param::to_irc_string);
                Ok(IrcCommand::Part(channels.optional_list(), reason))
            }
            "TOPIC" => {
                let [channel, rest @ ..] = args.as_slice() else {
                    return Err(IrcCommandParseErr::MissingParams(s.to_string()));
                };
                let channel = expect_string_param!(channel);
                let topic = rest.first().map(Param::to_irc_string);
                Ok(IrcCommand::Topic(channel, topic))
            }
            "MODE" => {
                let [target, rest @ ..] = args.as_slice() else {
                    return Err(IrcCommandParseErr::MissingParams(s.to_string()));
                };
                Ok(IrcCommand::Mode {
                    target: expect_string_param!(target),
                    modes: rest.iter().map(Param::to_irc_string).collect(),
                })
            }
            "PRIVMSG" => {
                let [targets, msg, ..] = args.as_slice() else {
                    return Err(IrcCommandParseErr::MissingParams(s.to_string()));
                };
                Ok(IrcCommand::Privmsg {
                    targets: targets.optional_list(),
                    msg: msg.to_irc_string(),
                })
            }
            "NOTICE" => {
                let [targets, msg, ..] = args.as_slice() else {
                    return Err(IrcCommandParseErr::MissingParams(s.to_string()));
                };
                Ok(IrcCommand::Notice {
                    targets: targets.optional_list(),
                    msg: msg.to_irc_string(),
                })
            }
            other => match other.parse::<u16>() {
                // numerics may only be 3 digits
                Ok(num) if other.len() == 3 => Ok(IrcCommand::Numeric { num, args }),
                _ => Ok(IrcCommand::Unknown(other.to_string(), args)),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum IrcCommandParseErr {
    #[error("message {} missing params", .0)]
    MissingParams(String),
    #[error("message had invalid params")]
    InvalidParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numerics_need_three_digits() {
        assert!(matches!(
            IrcCommand::parse("001 bot :Welcome"),
            Ok(IrcCommand::Numeric { num: 1, .. })
        ));
        assert!(matches!(
            IrcCommand::parse("1 bot"),
            Ok(IrcCommand::Unknown(..))
        ));
    }

    #[test]
    fn join_with_trailing_channel() {
        assert_eq!(
            IrcCommand::parse("JOIN :#chan").unwrap(),
            IrcCommand::Join(vec![String::from("#chan")])
        );
    }

    #[test]
    fn part_without_reason() {
        assert_eq!(
            IrcCommand::parse("PART #a,#b").unwrap(),
            IrcCommand::Part(vec![String::from("#a"), String::from("#b")], None)
        );
    }

    #[test]
    fn missing_params_are_errors() {
        assert!(IrcCommand::parse("NICK").is_err());
        assert!(IrcCommand::parse("PRIVMSG #chan").is_err());
    }

    #[test]
    fn privmsg_text_with_commas_stays_whole() {
        let IrcCommand::Privmsg { msg, .. } = IrcCommand::parse("PRIVMSG bot :a,b, c").unwrap()
        else {
            panic!("expected PRIVMSG");
        };
        assert_eq!(msg, "a,b, c");
    }
}
