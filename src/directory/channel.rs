use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    constants::names::{CHANNEL_MEMBERSHIP_PREFIXES, OP_PREFIX, VOICE_PREFIX},
    directory::UserHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelUserFlag {
    #[default]
    None,
    Voice,
    Op,
}

impl ChannelUserFlag {
    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            OP_PREFIX => Some(ChannelUserFlag::Op),
            VOICE_PREFIX => Some(ChannelUserFlag::Voice),
            _ => None,
        }
    }

    /// splits the membership prefixes off a NAMES entry. the first `@` or `+` decides the flag,
    /// other prefixes are stripped without effect.
    pub fn split_nick(entry: &str) -> (Self, &str) {
        let nick = entry.trim_start_matches(CHANNEL_MEMBERSHIP_PREFIXES);
        let prefixes = &entry[..entry.len() - nick.len()];
        let flag = prefixes
            .chars()
            .find_map(ChannelUserFlag::from_prefix)
            .unwrap_or_default();
        (flag, nick)
    }

    /// reads the flag out of the status field of a WHO reply, like `H@` or `G+`
    pub fn from_who_status(status: &str) -> Self {
        status
            .chars()
            .find_map(ChannelUserFlag::from_prefix)
            .unwrap_or_default()
    }
}

/// one user's membership of one channel
#[derive(Debug, Clone)]
pub struct ChannelUser {
    user: UserHandle,
    pub flag: ChannelUserFlag,
}

impl ChannelUser {
    pub fn new(user: UserHandle, flag: ChannelUserFlag) -> Self {
        Self { user, flag }
    }

    pub fn user(&self) -> &UserHandle {
        &self.user
    }

    pub fn is_same_user(&self, user: &UserHandle) -> bool {
        Arc::ptr_eq(&self.user, user)
    }
}

#[derive(Debug)]
pub struct Channel {
    // the name of the channel, including the kind prefix, as the server first reported it
    name: String,
    pub topic: String,
    members: IndexMap<String, ChannelUser>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: String::new(),
            members: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self, nick: &str) -> Option<&ChannelUser> {
        self.members.get(nick)
    }

    pub fn member_mut(&mut self, nick: &str) -> Option<&mut ChannelUser> {
        self.members.get_mut(nick)
    }

    pub fn contains(&self, nick: &str) -> bool {
        self.members.contains_key(nick)
    }

    /// adds a member, or refines an existing one. an existing member keeps the user it is already
    /// linked to, only its flag is updated (and only when a flag is given).
    pub fn upsert_member(&mut self, nick: &str, user: &UserHandle, flag: Option<ChannelUserFlag>) {
        match self.members.get_mut(nick) {
            Some(member) => {
                if let Some(flag) = flag {
                    member.flag = flag;
                }
            }
            None => {
                self.members.insert(
                    nick.to_string(),
                    ChannelUser::new(Arc::clone(user), flag.unwrap_or_default()),
                );
            }
        }
    }

    pub fn remove_member(&mut self, nick: &str) -> Option<ChannelUser> {
        self.members.shift_remove(nick)
    }

    /// moves a member to a new nick, keeping its position in the member list
    pub fn rename_member(&mut self, old: &str, new: &str) -> bool {
        let Some(idx) = self.members.get_index_of(old) else {
            return false;
        };
        let Some((_, member)) = self.members.shift_remove_index(idx) else {
            return false;
        };
        let (new_idx, _) = self.members.insert_full(new.to_string(), member);
        if new_idx != idx && idx < self.members.len() {
            self.members.move_index(new_idx, idx);
        }
        true
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &ChannelUser)> {
        self.members.iter().map(|(nick, member)| (nick.as_str(), member))
    }

    pub fn nicks(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// the channels the bot is in on one connection. lookups ignore ASCII case, since servers do not
/// always echo a channel name with the case it was joined with.
#[derive(Debug, Default)]
pub struct ChannelCollection {
    channels: IndexMap<String, Channel>,
}

fn channel_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl ChannelCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&channel_key(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(&channel_key(name))
    }

    pub fn get_or_create(&mut self, name: &str) -> &mut Channel {
        self.channels
            .entry(channel_key(name))
            .or_insert_with(|| Channel::new(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(&channel_key(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<Channel> {
        self.channels.shift_remove(&channel_key(name))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        directory::{RegisteredUsers, User},
        irc::IrcHost,
    };

    fn user(nick: &str) -> UserHandle {
        User::new(IrcHost::from_nick(nick), &RegisteredUsers::in_memory()).into_handle()
    }

    #[test]
    fn names_prefixes() {
        assert_eq!(ChannelUserFlag::split_nick("@alice"), (ChannelUserFlag::Op, "alice"));
        assert_eq!(ChannelUserFlag::split_nick("+bob"), (ChannelUserFlag::Voice, "bob"));
        assert_eq!(ChannelUserFlag::split_nick("@+carol"), (ChannelUserFlag::Op, "carol"));
        assert_eq!(ChannelUserFlag::split_nick("dave"), (ChannelUserFlag::None, "dave"));
        assert_eq!(ChannelUserFlag::from_who_status("G+"), ChannelUserFlag::Voice);
    }

    #[test]
    fn upsert_never_replaces_linked_user() {
        let mut channel = Channel::new("#a");
        let first = user("alice");
        let second = user("alice");

        channel.upsert_member("alice", &first, None);
        channel.upsert_member("alice", &second, Some(ChannelUserFlag::Op));

        let member = channel.member("alice").unwrap();
        assert!(member.is_same_user(&first));
        assert_eq!(member.flag, ChannelUserFlag::Op);

        // no flag given leaves the flag alone
        channel.upsert_member("alice", &first, None);
        assert_eq!(channel.member("alice").unwrap().flag, ChannelUserFlag::Op);
    }

    #[test]
    fn rename_keeps_position() {
        let mut channel = Channel::new("#a");
        for nick in ["a", "b", "c"] {
            channel.upsert_member(nick, &user(nick), None);
        }
        assert!(channel.rename_member("b", "z"));
        assert_eq!(channel.nicks().collect::<Vec<_>>(), vec!["a", "z", "c"]);
        assert!(!channel.rename_member("missing", "y"));
    }

    #[test]
    fn channel_lookup_ignores_case() {
        let mut channels = ChannelCollection::new();
        channels.get_or_create("#Rust");
        assert!(channels.contains("#rust"));
        assert_eq!(channels.get("#RUST").unwrap().name(), "#Rust");
    }
}
