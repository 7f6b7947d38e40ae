use core::fmt::Display;

use crate::irc::IrcHost;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Server(String),
    User(IrcHost),
}

impl Source {
    pub(super) fn parse(s: &str) -> Source {
        // `nick!user@host` and `nick@host` are always users. a bare name is a server if it looks
        // like a hostname, since nicknames may not contain `.`
        if s.contains(['!', '@']) || !s.contains('.') {
            if let Some(host) = IrcHost::parse(s) {
                return Source::User(host);
            }
        }
        Source::Server(s.to_string())
    }

    pub fn get_name(&self) -> &str {
        match self {
            Source::Server(server) => server.as_str(),
            Source::User(host) => host.nick(),
        }
    }

    pub fn as_user(&self) -> Option<&IrcHost> {
        match self {
            Source::Server(_) => None,
            Source::User(host) => Some(host),
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get_name())
    }
}
