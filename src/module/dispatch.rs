use std::sync::Arc;

use log::*;
use parking_lot::{Mutex, ReentrantMutex};

use crate::{
    bot::Bot,
    connection::Connection,
    directory::PrivilegeContainer,
    event::{Callback, DispatchLock, Event, EventContext},
    irc::client::ClientCommand,
    module::{CALL_TIMEOUT, Export, Module, ModuleCallErr, ModuleContext},
    slots::ModuleId,
};

/// a loaded module. the lock around the instance is held for the whole of one event dispatch or
/// one cross module call. the dispatch lock additionally spans every handler the module runs for
/// one event occurrence.
pub(crate) struct ModuleHandle {
    id: ModuleId,
    name: String,
    exports: Vec<Export>,
    dispatch_lock: DispatchLock,
    instance: Mutex<Box<dyn Module>>,
}

impl ModuleHandle {
    pub(crate) fn new(id: ModuleId, module: Box<dyn Module>) -> Self {
        Self {
            id,
            name: module.name().to_string(),
            exports: module.exports(),
            dispatch_lock: Arc::new(ReentrantMutex::new(())),
            instance: Mutex::new(module),
        }
    }

    pub(crate) fn id(&self) -> ModuleId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn dispatch_lock(&self) -> DispatchLock {
        Arc::clone(&self.dispatch_lock)
    }

    /// delivers one event to the module through the handler for its category
    pub(crate) fn dispatch(&self, bot: &Bot, ctx: &EventContext<'_>) -> Vec<ClientCommand> {
        let _occurrence = self.dispatch_lock.lock();
        let mut instance = self.instance.lock();
        let module_ctx = ModuleContext::new(bot, ctx.connection, self.id, ctx.actor);

        match (ctx.event, ctx.trigger) {
            (Event::Message(message), Some(trigger)) => {
                instance.on_command(&module_ctx, trigger, message)
            }
            (Event::Server(event), _) => instance.on_server(&module_ctx, event),
            (Event::Membership(event), _) => instance.on_membership(&module_ctx, event),
            (Event::Message(event), None) => instance.on_message(&module_ctx, event),
            (Event::Ctcp(event), _) => instance.on_ctcp(&module_ctx, event),
        }
    }

    /// runs an exported method, if the actor the caller acts for meets its requirement
    pub(crate) fn call(
        &self,
        bot: &Bot,
        connection: &Connection,
        caller: Option<ModuleId>,
        actor: &PrivilegeContainer,
        method: &str,
        args: &[String],
    ) -> Result<Vec<String>, ModuleCallErr> {
        // the caller already holds its own lock, waiting on it would only time out
        if caller == Some(self.id) {
            return Err(ModuleCallErr::Reentrant(self.name.clone()));
        }

        let Some(export) = self.exports.iter().find(|export| export.method == method) else {
            return Err(ModuleCallErr::UnknownMethod {
                module: self.name.clone(),
                method: method.to_string(),
            });
        };
        if !export.requirement.allows(actor) {
            return Err(ModuleCallErr::Denied {
                module: self.name.clone(),
                method: method.to_string(),
            });
        }

        let Some(mut instance) = self.instance.try_lock_for(CALL_TIMEOUT) else {
            warn!("call to {}::{} timed out waiting for the module", self.name, method);
            return Err(ModuleCallErr::Busy(self.name.clone()));
        };
        trace!("calling {}::{}", self.name, method);
        let module_ctx = ModuleContext::new(bot, connection, self.id, actor);
        instance.call(&module_ctx, method, args)
    }
}

/// the bus callback that forwards events to a module. it holds the bot and module weakly, so an
/// unloaded module or a dropped bot turns it into a no-op.
pub(crate) fn callback(bot: &Arc<Bot>, handle: &Arc<ModuleHandle>) -> Callback {
    let bot = Arc::downgrade(bot);
    let handle = Arc::downgrade(handle);
    Arc::new(move |ctx: &EventContext<'_>| {
        let (Some(bot), Some(handle)) = (bot.upgrade(), handle.upgrade()) else {
            return Vec::new();
        };
        handle.dispatch(&bot, ctx)
    })
}
