//! loadable modules and the bridge between them and the event bus.
//!
//! a module is any [`Module`] implementation. once loaded into a [`Bot`] it is attached to the
//! buses of the connections it asked for, and every event it receives is delivered through one of
//! the typed `on_*` methods. a module never handles two events at the same time, even when they
//! come from different connections.

mod dispatch;

pub(crate) use dispatch::{ModuleHandle, callback};

use core::time::Duration;

use thiserror::Error;

use crate::{
    bot::Bot,
    connection::Connection,
    directory::{PrivilegeContainer, Requirement},
    event::{
        CommandTrigger, CtcpEvent, EventKind, MembershipEvent, MessageEvent, MessageScope,
        ServerEvent,
    },
    irc::client::ClientCommand,
    slots::ModuleId,
};

/// how long a cross module call waits for the callee to finish what it is doing
pub const CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModuleCallErr {
    #[error("no module named {0:?} is loaded")]
    UnknownModule(String),
    #[error("module {module:?} does not export {method:?}")]
    UnknownMethod { module: String, method: String },
    #[error("caller may not call {module}::{method}")]
    Denied { module: String, method: String },
    #[error("module {0:?} stayed busy")]
    Busy(String),
    #[error("module {0:?} called itself")]
    Reentrant(String),
    #[error("{0}")]
    Failed(String),
}

/// where a module subscription attaches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hook {
    Event(EventKind),
    Command {
        trigger: CommandTrigger,
        scope: MessageScope,
    },
}

/// one subscription a module asks for when it is loaded
#[derive(Debug, Clone)]
pub struct ModuleSubscription {
    pub hook: Hook,
    pub requirement: Requirement,
    /// the network to attach on, or every network (including ones added later) if `None`
    pub network: Option<String>,
}

impl ModuleSubscription {
    pub fn event(kind: EventKind) -> Self {
        Self {
            hook: Hook::Event(kind),
            requirement: Requirement::NONE,
            network: None,
        }
    }

    pub fn command(trigger: CommandTrigger, scope: MessageScope) -> Self {
        Self {
            hook: Hook::Command { trigger, scope },
            requirement: Requirement::NONE,
            network: None,
        }
    }

    pub fn requiring(self, requirement: Requirement) -> Self {
        Self {
            requirement,
            ..self
        }
    }

    pub fn on_network(self, network: impl Into<String>) -> Self {
        Self {
            network: Some(network.into()),
            ..self
        }
    }
}

/// a method other modules may call, and what the caller must hold to call it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub method: String,
    pub requirement: Requirement,
}

impl Export {
    pub fn new(method: impl Into<String>, requirement: Requirement) -> Self {
        Self {
            method: method.into(),
            requirement,
        }
    }
}

/// what a module handler can reach while it handles one event
pub struct ModuleContext<'a> {
    bot: &'a Bot,
    connection: &'a Connection,
    module: ModuleId,
    actor: &'a PrivilegeContainer,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(
        bot: &'a Bot,
        connection: &'a Connection,
        module: ModuleId,
        actor: &'a PrivilegeContainer,
    ) -> Self {
        Self {
            bot,
            connection,
            module,
            actor,
        }
    }

    pub fn bot(&self) -> &'a Bot {
        self.bot
    }

    pub fn connection(&self) -> &'a Connection {
        self.connection
    }

    pub fn module_id(&self) -> ModuleId {
        self.module
    }

    /// the privileges of the user that caused the event being handled
    pub fn actor(&self) -> &'a PrivilegeContainer {
        self.actor
    }

    /// calls an exported method of another module on behalf of the current actor
    pub fn call(
        &self,
        module: &str,
        method: &str,
        args: &[String],
    ) -> Result<Vec<String>, ModuleCallErr> {
        self.bot.call_module(
            Some(self.module),
            self.connection,
            self.actor,
            module,
            method,
            args,
        )
    }

    /// sends a command outside of the normal reply path
    pub fn send(&self, command: &ClientCommand) -> bool {
        self.connection.send(command)
    }
}

/// a loadable unit of bot behavior. every handler returns the commands to send in reply.
pub trait Module: Send {
    fn name(&self) -> &str;

    /// read once, when the module is loaded
    fn subscriptions(&self) -> Vec<ModuleSubscription>;

    /// read once, when the module is loaded
    fn exports(&self) -> Vec<Export> {
        Vec::new()
    }

    fn on_server(&mut self, _ctx: &ModuleContext<'_>, _event: &ServerEvent) -> Vec<ClientCommand> {
        Vec::new()
    }

    fn on_membership(
        &mut self,
        _ctx: &ModuleContext<'_>,
        _event: &MembershipEvent,
    ) -> Vec<ClientCommand> {
        Vec::new()
    }

    fn on_message(
        &mut self,
        _ctx: &ModuleContext<'_>,
        _event: &MessageEvent,
    ) -> Vec<ClientCommand> {
        Vec::new()
    }

    fn on_ctcp(&mut self, _ctx: &ModuleContext<'_>, _event: &CtcpEvent) -> Vec<ClientCommand> {
        Vec::new()
    }

    /// a message matched one of the module's command triggers
    fn on_command(
        &mut self,
        _ctx: &ModuleContext<'_>,
        _trigger: &CommandTrigger,
        _message: &MessageEvent,
    ) -> Vec<ClientCommand> {
        Vec::new()
    }

    /// an exported method was called by another module. only methods listed by
    /// [`Module::exports`] reach this, after the caller passed their requirement.
    fn call(
        &mut self,
        _ctx: &ModuleContext<'_>,
        method: &str,
        _args: &[String],
    ) -> Result<Vec<String>, ModuleCallErr> {
        Err(ModuleCallErr::UnknownMethod {
            module: self.name().to_string(),
            method: method.to_string(),
        })
    }
}
