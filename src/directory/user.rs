use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::{
    directory::{PrivilegeContainer, RegisteredUser, RegisteredUsers},
    irc::IrcHost,
};

/// a user shared between the user directory and every channel they are in
pub type UserHandle = Arc<RwLock<User>>;

/// a live identity on one connection
#[derive(Debug)]
pub struct User {
    host: IrcHost,
    registered: Option<Arc<RegisteredUser>>,
}

impl User {
    pub fn new(host: IrcHost, registry: &RegisteredUsers) -> Self {
        let registered = registry.find_for(&host);
        Self { host, registered }
    }

    pub fn into_handle(self) -> UserHandle {
        Arc::new(RwLock::new(self))
    }

    pub fn nick(&self) -> &str {
        self.host.nick()
    }

    pub fn host(&self) -> &IrcHost {
        &self.host
    }

    pub fn registered(&self) -> Option<&Arc<RegisteredUser>> {
        self.registered.as_ref()
    }

    /// the privileges of this user, or the empty set for unregistered users
    pub fn privileges(&self) -> PrivilegeContainer {
        self.registered
            .as_ref()
            .map(|registered| registered.privileges)
            .unwrap_or_default()
    }

    /// replaces the host and re-derives the registered user attachment from it
    pub fn set_host(&mut self, host: IrcHost, registry: &RegisteredUsers) {
        self.host = host;
        self.reauthenticate(registry);
    }

    pub fn reauthenticate(&mut self, registry: &RegisteredUsers) {
        self.registered = registry.find_for(&self.host);
    }
}

/// the users known on one connection, keyed by nickname
#[derive(Debug, Default)]
pub struct UserCollection {
    users: IndexMap<String, UserHandle>,
}

impl UserCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, nick: &str) -> Option<&UserHandle> {
        self.users.get(nick)
    }

    pub fn contains(&self, nick: &str) -> bool {
        self.users.contains_key(nick)
    }

    /// inserts a user under its current nick, returning the user previously known by that nick
    pub fn insert(&mut self, user: UserHandle) -> Option<UserHandle> {
        let nick = user.read().nick().to_string();
        self.users.insert(nick, user)
    }

    pub fn remove(&mut self, nick: &str) -> Option<UserHandle> {
        self.users.shift_remove(nick)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UserHandle)> {
        self.users.iter().map(|(nick, user)| (nick.as_str(), user))
    }

    pub fn nicks(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }
}
