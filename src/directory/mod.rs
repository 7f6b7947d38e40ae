//! the users and channels the bot can see on one connection

mod channel;
mod privilege;
mod registered;
mod user;

use std::sync::Arc;

pub use channel::{Channel, ChannelCollection, ChannelUser, ChannelUserFlag};
pub use privilege::{PrivilegeContainer, Privileges, Requirement};
pub use registered::{RegisteredUser, RegisteredUsers, RegistryErr};
pub use user::{User, UserCollection, UserHandle};

use crate::irc::IrcHost;

/// the user and channel directories of one connection.
///
/// every user referenced by a channel membership is also present in `users`, and every user in
/// `users` is referenced by the same handle from each channel it is a member of.
#[derive(Debug, Default)]
pub struct Directory {
    pub users: UserCollection,
    pub channels: ChannelCollection,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// finds or creates the user for `host`. an existing user has its host refined when the new
    /// host carries more information, and is re-authenticated when the host changes.
    pub fn upsert_user(&mut self, host: &IrcHost, registry: &RegisteredUsers) -> UserHandle {
        if let Some(existing) = self.users.get(host.nick()) {
            let mut user = existing.write();
            if host.is_complete() && user.host() != host {
                user.set_host(host.clone(), registry);
            }
            drop(user);
            return Arc::clone(existing);
        }

        let user = User::new(host.clone(), registry).into_handle();
        self.users.insert(Arc::clone(&user));
        user
    }

    /// records that `host` is in `channel`, creating the channel and user as needed
    pub fn upsert_member(
        &mut self,
        channel: &str,
        host: &IrcHost,
        flag: Option<ChannelUserFlag>,
        registry: &RegisteredUsers,
    ) -> UserHandle {
        let user = self.upsert_user(host, registry);
        self.channels
            .get_or_create(channel)
            .upsert_member(host.nick(), &user, flag);
        user
    }

    /// removes a user from every channel and from the user directory
    pub fn remove_user(&mut self, nick: &str) -> Option<UserHandle> {
        for channel in self.channels.iter_mut() {
            channel.remove_member(nick);
        }
        self.users.remove(nick)
    }

    /// removes a user from one channel. returns true if the user was in no other channel and so
    /// was dropped from the directory entirely.
    pub fn part(&mut self, channel: &str, nick: &str) -> bool {
        if let Some(channel) = self.channels.get_mut(channel) {
            channel.remove_member(nick);
        }

        if self.is_in_any_channel(nick) {
            false
        } else {
            self.users.remove(nick).is_some()
        }
    }

    /// drops a channel the bot left. users that were only known through that channel are
    /// dropped too.
    pub fn remove_channel(&mut self, name: &str) -> Option<Channel> {
        let channel = self.channels.remove(name)?;
        for nick in channel.nicks() {
            if !self.is_in_any_channel(nick) {
                self.users.remove(nick);
            }
        }
        Some(channel)
    }

    /// renames a user everywhere, keeping the same user object. the user's host is re-derived
    /// with the new nick and its registered user attachment is recomputed.
    pub fn rename(
        &mut self,
        old: &str,
        new: &str,
        registry: &RegisteredUsers,
    ) -> Option<UserHandle> {
        let user = self.users.remove(old)?;
        {
            let mut user = user.write();
            let host = user.host().with_nick(new);
            user.set_host(host, registry);
        }
        self.users.insert(Arc::clone(&user));

        for channel in self.channels.iter_mut() {
            channel.rename_member(old, new);
        }
        Some(user)
    }

    pub fn is_in_any_channel(&self, nick: &str) -> bool {
        self.channels.iter().any(|channel| channel.contains(nick))
    }

    /// the names of every channel the user is in
    pub fn channels_of(&self, nick: &str) -> Vec<String> {
        self.channels
            .iter()
            .filter(|channel| channel.contains(nick))
            .map(|channel| channel.name().to_string())
            .collect()
    }

    pub fn privileges_of(&self, nick: &str) -> PrivilegeContainer {
        self.users
            .get(nick)
            .map(|user| user.read().privileges())
            .unwrap_or_default()
    }

    /// re-derives every user's registered user attachment, used after the registry changes
    pub fn reauthenticate_all(&mut self, registry: &RegisteredUsers) {
        for (_, user) in self.users.iter() {
            user.write().reauthenticate(registry);
        }
    }

    pub fn clear(&mut self) {
        self.channels.clear();
        self.users.clear();
    }
}
