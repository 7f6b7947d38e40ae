use std::{
    fs,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{directory::PrivilegeContainer, irc::IrcHost};

/// a persisted identity. live users are attached to one when their host matches any of its
/// patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub name: String,
    pub hosts: Vec<IrcHost>,
    pub privileges: PrivilegeContainer,
    pub registered_at: DateTime<Utc>,
}

impl RegisteredUser {
    pub fn new(name: impl Into<String>, hosts: Vec<IrcHost>, privileges: PrivilegeContainer) -> Self {
        Self {
            name: name.into(),
            hosts,
            privileges,
            registered_at: Utc::now(),
        }
    }

    pub fn matches(&self, host: &IrcHost) -> bool {
        self.hosts.iter().any(|pattern| host.matches(pattern))
    }
}

#[derive(Debug, Error)]
pub enum RegistryErr {
    #[error("a registered user named {} already exists", .0)]
    DuplicateName(String),
    #[error("could not encode registered users: {}", .0)]
    Encode(#[from] bincode::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// the registered users of one network, backed by a bincode file
#[derive(Debug, Default)]
pub struct RegisteredUsers {
    path: Option<PathBuf>,
    users: Vec<Arc<RegisteredUser>>,
}

impl RegisteredUsers {
    /// a store that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// loads the store from `path`. a missing or unreadable file gives an empty store that will
    /// be written back to the same path.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let users = match fs::read(&path) {
            Ok(bytes) => match bincode::deserialize::<Vec<RegisteredUser>>(&bytes) {
                Ok(users) => {
                    debug!("loaded {} registered users from {}", users.len(), path.display());
                    users
                }
                Err(e) => {
                    warn!(
                        "registered user file {} is corrupt, starting empty: {}",
                        path.display(),
                        e
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no registered user file at {}", path.display());
                Vec::new()
            }
            Err(e) => {
                warn!("could not read {}, starting empty: {}", path.display(), e);
                Vec::new()
            }
        };

        Self {
            path: Some(path),
            users: users.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn save(&self) -> Result<(), RegistryErr> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let users = self
            .users
            .iter()
            .map(|user| RegisteredUser::clone(user))
            .collect::<Vec<_>>();
        let bytes = bincode::serialize(&users)?;

        // write to a sibling file first so a crash never leaves a half written store
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        debug!("saved {} registered users to {}", users.len(), path.display());
        Ok(())
    }

    pub fn register(&mut self, user: RegisteredUser) -> Result<Arc<RegisteredUser>, RegistryErr> {
        if self.get(&user.name).is_some() {
            return Err(RegistryErr::DuplicateName(user.name));
        }
        let user = Arc::new(user);
        self.users.push(Arc::clone(&user));
        Ok(user)
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<RegisteredUser>> {
        let idx = self.users.iter().position(|user| user.name == name)?;
        Some(self.users.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RegisteredUser>> {
        self.users.iter().find(|user| user.name == name)
    }

    /// the first registered user with a host pattern matching `host`
    pub fn find_for(&self, host: &IrcHost) -> Option<Arc<RegisteredUser>> {
        // a nick-only host would match `nick!*@*` patterns, which is too weak to authenticate
        if !host.is_complete() {
            return None;
        }
        self.users.iter().find(|user| user.matches(host)).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredUser>> {
        self.users.iter()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
