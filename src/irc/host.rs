use core::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

use crate::util::{has_wildcards, wildcard_match};

/// a `nick!user@host` identity, or a pattern for one.
///
/// hosts are never edited in place. when any component changes a new host is derived with
/// [`IrcHost::with_nick`] (or parsed fresh) and swapped in wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IrcHost {
    nick: String,
    user: String,
    host: String,
}

impl IrcHost {
    pub fn new(nick: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            user: user.into(),
            host: host.into(),
        }
    }

    /// a host where only the nickname is known, as seen in NAMES replies
    pub fn from_nick(nick: impl Into<String>) -> Self {
        Self::new(nick, "", "")
    }

    /// parses `nick!user@host`, `nick@host`, or a bare `nick`. returns `None` for the empty
    /// string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }

        let host = match s.split_once('!') {
            Some((nick, rest)) => match rest.split_once('@') {
                Some((user, host)) => IrcHost::new(nick, user, host),
                None => IrcHost::new(nick, rest, ""),
            },
            None => match s.split_once('@') {
                Some((nick, host)) => IrcHost::new(nick, "", host),
                None => IrcHost::from_nick(s),
            },
        };

        if host.nick.is_empty() { None } else { Some(host) }
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// true when both the user and host parts are known
    pub fn is_complete(&self) -> bool {
        !self.user.is_empty() && !self.host.is_empty()
    }

    pub fn with_nick(&self, nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            user: self.user.clone(),
            host: self.host.clone(),
        }
    }

    pub fn is_pattern(&self) -> bool {
        has_wildcards(&self.nick) || has_wildcards(&self.user) || has_wildcards(&self.host)
    }

    /// returns true if this host is matched by the given wildcard pattern.
    pub fn matches(&self, pattern: &IrcHost) -> bool {
        wildcard_match(&pattern.to_string(), &self.to_string())
    }

    /// orders two hosts. when exactly one side is a pattern, the hosts compare equal if the
    /// pattern matches the other side. otherwise hosts are ordered by their ASCII-lowercased text.
    ///
    /// this is not a total order (two distinct hosts can both equal the same pattern), so it is
    /// deliberately not an `Ord` impl.
    pub fn wildcard_cmp(&self, other: &IrcHost) -> Ordering {
        match (self.is_pattern(), other.is_pattern()) {
            (false, true) if self.matches(other) => return Ordering::Equal,
            (true, false) if other.matches(self) => return Ordering::Equal,
            _ => {}
        }

        self.to_string()
            .to_ascii_lowercase()
            .cmp(&other.to_string().to_ascii_lowercase())
    }
}

impl fmt::Display for IrcHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}@{}", self.nick, self.user, self.host)
    }
}
