use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// named privileges a registered user can hold
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Privileges: u32 {
        /// passes every privilege and level check
        const SUPER = 1 << 0;
        const ADMIN = 1 << 1;
        const USER_ADMIN = 1 << 2;
        const MODULE_ADMIN = 1 << 3;
        const CHANNEL_ADMIN = 1 << 4;
        const TRUSTED = 1 << 5;
    }
}

/// the privileges and access level of one actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrivilegeContainer {
    pub privileges: Privileges,
    pub level: u32,
}

impl PrivilegeContainer {
    pub fn new(privileges: Privileges, level: u32) -> Self {
        Self { privileges, level }
    }

    pub fn is_super(&self) -> bool {
        self.privileges.contains(Privileges::SUPER)
    }
}

/// what an actor must hold for a subscriber to be invoked. an empty requirement admits everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Requirement {
    pub privileges: Option<Privileges>,
    pub level: Option<u32>,
}

impl Requirement {
    pub const NONE: Requirement = Requirement {
        privileges: None,
        level: None,
    };

    pub fn privilege(privileges: Privileges) -> Self {
        Self {
            privileges: Some(privileges),
            level: None,
        }
    }

    pub fn level(level: u32) -> Self {
        Self {
            privileges: None,
            level: Some(level),
        }
    }

    pub fn and_level(self, level: u32) -> Self {
        Self {
            level: Some(level),
            ..self
        }
    }

    pub fn allows(&self, actor: &PrivilegeContainer) -> bool {
        if actor.is_super() {
            return true;
        }
        if let Some(required) = self.privileges {
            if !actor.privileges.contains(required) {
                return false;
            }
        }
        if let Some(level) = self.level {
            if actor.level < level {
                return false;
            }
        }
        true
    }
}
