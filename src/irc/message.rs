use core::fmt::Debug;

use log::*;
use thiserror::Error;

use crate::{
    ext::StrExt as _,
    irc::{IrcCommand, IrcCommandParseErr, Source},
};

/// one message received from the server
#[derive(Debug, Clone)]
pub struct IrcMessage {
    pub source: Option<Source>,
    pub command: IrcCommand,
}

impl IrcMessage {
    /// parses a message from a string. the string must contain only a single message and must not
    /// contain CRLF. runs of whitespace outside the trailing parameter are collapsed first.
    pub fn parse(s: &str) -> Result<Self, IrcParseErr> {
        if s.contains(['\r', '\n']) {
            return Err(IrcParseErr::InteriorCRLF);
        }

        let normalized = s.normalize_irc_spaces();
        let mut s = normalized.as_str();

        // message tags are not used by anything, skip them
        if s.starts_with('@') {
            let Some((_, rest)) = s.split_once(' ') else {
                // if there's not a space after the tags, the command is missing
                return Err(IrcParseErr::MissingCommand);
            };
            s = rest;
        }

        // optional source section
        let source = if let Some((_, rest)) = s.split_prefix(':') {
            let Some((source, rest)) = rest.split_once(' ') else {
                // if there's not a space after the source, the command is missing
                return Err(IrcParseErr::MissingCommand);
            };

            s = rest;
            let source = Source::parse(source);
            trace!("parsed source: {:?}", source);
            Some(source)
        } else {
            None
        };

        if s.is_empty() {
            return Err(IrcParseErr::MissingCommand);
        }

        Ok(IrcMessage {
            source,
            command: IrcCommand::parse(s)?,
        })
    }
}

#[derive(Debug, Error)]
pub enum IrcParseErr {
    #[error("message contains interior CRLF")]
    InteriorCRLF,
    #[error("message is missing a command")]
    MissingCommand,
    #[error(transparent)]
    CommandParseErr(#[from] IrcCommandParseErr),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irc::IrcHost;

    #[test]
    fn parses_source_and_command() {
        let msg = IrcMessage::parse(":alice!~a@host   PRIVMSG   #chan :hi  there").unwrap();
        assert_eq!(
            msg.source,
            Some(Source::User(IrcHost::new("alice", "~a", "host")))
        );
        let IrcCommand::Privmsg { targets, msg } = msg.command else {
            panic!("expected PRIVMSG");
        };
        assert_eq!(targets, vec![String::from("#chan")]);
        assert_eq!(msg, "hi  there");
    }

    #[test]
    fn no_source() {
        let msg = IrcMessage::parse("PING :irc.example.net").unwrap();
        assert!(msg.source.is_none());
        assert!(matches!(msg.command, IrcCommand::Ping(token) if token == "irc.example.net"));
    }

    #[test]
    fn tags_are_skipped() {
        let msg = IrcMessage::parse("@time=now :srv.example 001 bot :Welcome").unwrap();
        assert!(matches!(msg.command, IrcCommand::Numeric { num: 1, .. }));
    }

    #[test]
    fn rejects_empty_and_sourceless_garbage() {
        assert!(matches!(
            IrcMessage::parse(":onlysource"),
            Err(IrcParseErr::MissingCommand)
        ));
        assert!(matches!(
            IrcMessage::parse("   "),
            Err(IrcParseErr::MissingCommand)
        ));
        assert!(IrcMessage::parse("PING a\r\nPING b").is_err());
    }
}
