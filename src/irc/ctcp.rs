use crate::constants::names::CTCP_DELIM;

/// a CTCP request or reply carried inside a PRIVMSG or NOTICE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ctcp {
    /// the command, uppercased
    pub command: String,
    pub params: String,
}

impl Ctcp {
    pub fn new(command: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            command: command.into().to_ascii_uppercase(),
            params: params.into(),
        }
    }

    /// returns true if the message text is CTCP framed (starts with the delimiter)
    pub fn is_ctcp(msg: &str) -> bool {
        msg.starts_with(CTCP_DELIM)
    }

    /// parses a CTCP framed message. the closing delimiter is optional, some clients leave it off.
    pub fn parse(msg: &str) -> Option<Self> {
        let inner = msg.strip_prefix(CTCP_DELIM)?;
        let inner = match inner.find(CTCP_DELIM) {
            Some(end) => &inner[..end],
            None => inner,
        };

        let (command, params) = match inner.split_once(' ') {
            Some((command, params)) => (command, params),
            None => (inner, ""),
        };
        if command.is_empty() || !command.bytes().all(is_valid_ctcp_command) {
            return None;
        }

        Some(Self::new(command, params))
    }

    /// the framed text, suitable as the body of a PRIVMSG or NOTICE
    pub fn irc_string(&self) -> String {
        if self.params.is_empty() {
            format!("{CTCP_DELIM}{}{CTCP_DELIM}", self.command)
        } else {
            format!("{CTCP_DELIM}{} {}{CTCP_DELIM}", self.command, self.params)
        }
    }
}

fn is_valid_ctcp_command(c: u8) -> bool {
    matches!(c, 0x02..=0x09 | 0x0B..=0x0C | 0x0E..=0x1F | 0x21..=0xFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_with_params() {
        let ctcp = Ctcp::parse("\u{1}ACTION waves hello\u{1}").unwrap();
        assert_eq!(ctcp, Ctcp::new("ACTION", "waves hello"));
    }

    #[test]
    fn missing_close_and_lowercase() {
        let ctcp = Ctcp::parse("\u{1}version").unwrap();
        assert_eq!(ctcp.command, "VERSION");
        assert_eq!(ctcp.params, "");
    }

    #[test]
    fn not_ctcp() {
        assert!(!Ctcp::is_ctcp("hello"));
        assert!(Ctcp::parse("hello").is_none());
        assert!(Ctcp::parse("\u{1}\u{1}").is_none());
    }

    #[test]
    fn framing() {
        assert_eq!(Ctcp::new("PING", "123").irc_string(), "\u{1}PING 123\u{1}");
        assert_eq!(Ctcp::new("VERSION", "").irc_string(), "\u{1}VERSION\u{1}");
    }
}
