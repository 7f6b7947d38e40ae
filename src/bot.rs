//! the owned context holding every connection and every loaded module

use std::{io, mem, sync::Arc, thread::JoinHandle};

use log::*;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::{
    config::{BotConfig, NetworkConfig},
    connection::Connection,
    directory::{PrivilegeContainer, RegisteredUsers, Requirement},
    event::{
        CommandTrigger, EventBus, EventContext, EventKind, MessageScope, Subscription,
        SubscriptionId, UnknownEventErr,
    },
    irc::client::ClientCommand,
    module::{self, Hook, Module, ModuleCallErr, ModuleHandle},
    slots::{ConnectionId, ModuleId, Slots, SlotsFull},
};

#[derive(Debug, Error)]
pub enum BotErr {
    #[error("connection table is full")]
    ConnectionTableFull(#[source] SlotsFull),
    #[error("module table is full")]
    ModuleTableFull(#[source] SlotsFull),
    #[error("no connection {0}")]
    UnknownConnection(ConnectionId),
    #[error("no network named {0:?}")]
    UnknownNetwork(String),
    #[error("no module {0}")]
    UnknownModule(ModuleId),
    #[error("a module named {0:?} is already loaded")]
    DuplicateModule(String),
    #[error(transparent)]
    UnknownEvent(#[from] UnknownEventErr),
    #[error("line is empty or contains a line break")]
    InvalidLine,
    #[error("could not start connection threads: {0}")]
    Spawn(#[from] io::Error),
}

/// which connections a subscription attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// every connection, including ones added later
    All,
    Connection(ConnectionId),
}

impl Hook {
    fn attach(&self, bus: &EventBus, subscription: Subscription) {
        match self {
            Hook::Event(kind) => bus.attach(*kind, subscription),
            Hook::Command { trigger, scope } => {
                bus.attach_command(trigger.clone(), *scope, subscription)
            }
        }
    }
}

pub struct Bot {
    config: BotConfig,
    connections: RwLock<Slots<ConnectionId, Arc<Connection>>>,
    modules: Mutex<Slots<ModuleId, Arc<ModuleHandle>>>,
    // subscriptions with `Scope::All`, attached to every connection added later.
    // NOTE: lock this before the connection table
    global: Mutex<Vec<(Hook, Subscription)>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Bot {
    pub fn new(config: BotConfig) -> Arc<Self> {
        Arc::new(Self {
            connections: RwLock::new(Slots::new(config.max_connections)),
            modules: Mutex::new(Slots::new(config.max_modules)),
            global: Mutex::new(Vec::new()),
            threads: Mutex::new(Vec::new()),
            config,
        })
    }

    /// creates the bot and a connection for every configured network
    pub fn from_config(config: BotConfig) -> Result<Arc<Self>, BotErr> {
        let networks = config.networks.clone();
        let bot = Self::new(config);
        for network in networks {
            bot.add_network(network)?;
        }
        Ok(bot)
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// adds a connection for `network`, loading its registered users from the data directory.
    /// the connection is not started.
    pub fn add_network(&self, network: NetworkConfig) -> Result<ConnectionId, BotErr> {
        let registry = RegisteredUsers::load(self.config.registry_path(&network.name));
        let name = network.name.clone();

        let global = self.global.lock();
        let conn = {
            let mut connections = self.connections.write();
            let id = connections
                .insert_with(|id| Connection::new(id, network, registry))
                .map_err(BotErr::ConnectionTableFull)?;
            match connections.get(id) {
                Some(conn) => Arc::clone(conn),
                None => return Err(BotErr::UnknownConnection(id)),
            }
        };
        for (hook, subscription) in global.iter() {
            hook.attach(conn.bus(), subscription.clone());
        }

        info!("added network {} as connection {}", name, conn.id());
        Ok(conn.id())
    }

    /// halts a connection for good and drops it from the table
    pub fn remove_connection(&self, id: ConnectionId) -> Result<(), BotErr> {
        let conn = self
            .connections
            .write()
            .remove(id)
            .ok_or(BotErr::UnknownConnection(id))?;
        conn.halt(true);
        // a connection that never ran has not saved its users yet
        if let Err(e) = conn.save_registry() {
            warn!("could not save registered users of {}: {}", conn.name(), e);
        }
        info!("removed connection {}", id);
        Ok(())
    }

    pub fn connection(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.read().get(id).cloned()
    }

    pub fn connection_by_name(&self, name: &str) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .values()
            .find(|conn| conn.name() == name)
            .cloned()
    }

    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }

    /// subscribes to an event by its name
    pub fn subscribe(
        &self,
        event: &str,
        scope: Scope,
        requirement: Requirement,
        callback: impl Fn(&EventContext<'_>) -> Vec<ClientCommand> + Send + Sync + 'static,
    ) -> Result<SubscriptionId, BotErr> {
        let kind = event.parse::<EventKind>()?;
        let subscription = Subscription::new(requirement, None, Arc::new(callback));
        self.attach(Hook::Event(kind), scope, subscription)
    }

    pub fn subscribe_command(
        &self,
        trigger: CommandTrigger,
        messages: MessageScope,
        scope: Scope,
        requirement: Requirement,
        callback: impl Fn(&EventContext<'_>) -> Vec<ClientCommand> + Send + Sync + 'static,
    ) -> Result<SubscriptionId, BotErr> {
        let subscription = Subscription::new(requirement, None, Arc::new(callback));
        let hook = Hook::Command {
            trigger,
            scope: messages,
        };
        self.attach(hook, scope, subscription)
    }

    fn attach(
        &self,
        hook: Hook,
        scope: Scope,
        subscription: Subscription,
    ) -> Result<SubscriptionId, BotErr> {
        let id = subscription.id();
        match scope {
            Scope::Connection(conn_id) => {
                let conn = self
                    .connection(conn_id)
                    .ok_or(BotErr::UnknownConnection(conn_id))?;
                hook.attach(conn.bus(), subscription);
            }
            Scope::All => {
                let mut global = self.global.lock();
                for conn in self.connections.read().values() {
                    hook.attach(conn.bus(), subscription.clone());
                }
                global.push((hook, subscription));
            }
        }
        Ok(id)
    }

    /// detaches a subscription wherever it is attached. returns false if it was not attached
    /// anywhere.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut global = self.global.lock();
        let before = global.len();
        global.retain(|(_, subscription)| subscription.id() != id);
        let mut removed = global.len() != before;

        for conn in self.connections.read().values() {
            removed |= conn.bus().unsubscribe(id);
        }
        removed
    }

    /// queues one raw protocol line on a connection. returns whether it was queued, which it is
    /// not while the connection is down.
    pub fn send_data(&self, id: ConnectionId, line: &str) -> Result<bool, BotErr> {
        if line.trim().is_empty() || line.contains(['\r', '\n']) {
            return Err(BotErr::InvalidLine);
        }
        let conn = self.connection(id).ok_or(BotErr::UnknownConnection(id))?;
        Ok(conn.send_raw(line))
    }

    /// loads a module and attaches everything it subscribes to
    pub fn load_module(self: &Arc<Self>, module: Box<dyn Module>) -> Result<ModuleId, BotErr> {
        let name = module.name().to_string();
        let subscriptions = module.subscriptions();

        let handle = {
            let mut modules = self.modules.lock();
            if modules.values().any(|loaded| loaded.name() == name) {
                return Err(BotErr::DuplicateModule(name));
            }
            let id = modules
                .insert_with(|id| Arc::new(ModuleHandle::new(id, module)))
                .map_err(BotErr::ModuleTableFull)?;
            match modules.get(id) {
                Some(handle) => Arc::clone(handle),
                None => return Err(BotErr::UnknownModule(id)),
            }
        };

        for subscription in subscriptions {
            let scope = match &subscription.network {
                None => Scope::All,
                Some(network) => match self.connection_by_name(network) {
                    Some(conn) => Scope::Connection(conn.id()),
                    None => {
                        warn!("module {} subscribed on unknown network {}", name, network);
                        continue;
                    }
                },
            };
            let callback = module::callback(self, &handle);
            let bus_subscription =
                Subscription::new(subscription.requirement, Some(handle.id()), callback)
                    .with_dispatch_lock(handle.dispatch_lock());
            self.attach(subscription.hook, scope, bus_subscription)?;
        }

        info!("loaded module {} as {}", name, handle.id());
        Ok(handle.id())
    }

    /// unloads a module, detaching all of its subscriptions from every connection
    pub fn unload_module(&self, id: ModuleId) -> Result<(), BotErr> {
        let handle = self
            .modules
            .lock()
            .remove(id)
            .ok_or(BotErr::UnknownModule(id))?;

        let mut global = self.global.lock();
        global.retain(|(_, subscription)| subscription.owner() != Some(id));
        let mut detached = 0;
        for conn in self.connections.read().values() {
            detached += conn.bus().unsubscribe_owner(id);
        }
        drop(global);

        info!(
            "unloaded module {} ({} subscriptions detached)",
            handle.name(),
            detached
        );
        Ok(())
    }

    pub fn module_id(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .lock()
            .values()
            .find(|handle| handle.name() == name)
            .map(|handle| handle.id())
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules
            .lock()
            .values()
            .map(|handle| handle.name().to_string())
            .collect()
    }

    /// calls an exported method of a loaded module. `caller` is the calling module, if any, and
    /// `actor` the privileges the call is made with.
    pub fn call_module(
        &self,
        caller: Option<ModuleId>,
        connection: &Connection,
        actor: &PrivilegeContainer,
        module: &str,
        method: &str,
        args: &[String],
    ) -> Result<Vec<String>, ModuleCallErr> {
        let handle = self
            .modules
            .lock()
            .values()
            .find(|handle| handle.name() == module)
            .cloned()
            .ok_or_else(|| ModuleCallErr::UnknownModule(module.to_string()))?;
        handle.call(self, connection, caller, actor, method, args)
    }

    /// starts the sender and receiver threads of every connection
    pub fn start(&self) -> Result<(), BotErr> {
        for conn in self.connections() {
            let handles = conn.start()?;
            self.threads.lock().extend(handles);
        }
        Ok(())
    }

    /// stops every connection for good. a graceful shutdown sends QUIT and waits for the server
    /// to close the socket.
    pub fn shutdown(&self, graceful: bool) {
        for conn in self.connections() {
            if graceful {
                conn.soft_halt(true);
            } else {
                conn.halt(true);
            }
        }
    }

    /// waits for every started connection thread to finish
    pub fn join(&self) {
        let handles = mem::take(&mut *self.threads.lock());
        for handle in handles {
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            if handle.join().is_err() {
                error!("thread {} panicked", name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::Duration,
    };

    use super::*;
    use crate::{
        directory::{Privileges, RegisteredUser},
        event::{Event, MessageEvent, MessageKind},
        irc::IrcHost,
        module::{Export, ModuleContext, ModuleSubscription},
        net::TransportHandler,
    };

    fn new_bot(max_modules: Option<usize>) -> (Arc<Bot>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig {
            data_dir: dir.path().to_path_buf(),
            max_connections: Some(2),
            max_modules,
            networks: Vec::new(),
        };
        (Bot::new(config), dir)
    }

    fn network(name: &str) -> NetworkConfig {
        NetworkConfig::new(name, "bot", vec![String::from("127.0.0.1")])
    }

    fn channel_message(text: &str) -> Event {
        Event::Message(MessageEvent {
            kind: MessageKind::ChannelMessage,
            sender: IrcHost::new("alice", "~a", "alice.example"),
            target: String::from("#a"),
            text: text.to_string(),
        })
    }

    fn raise(conn: &Connection, event: &Event, actor: &PrivilegeContainer) -> Vec<String> {
        conn.bus()
            .raise_message(conn, event, actor)
            .into_iter()
            .map(|command| command.irc_str().unwrap())
            .collect()
    }

    #[test]
    fn global_subscriptions_reach_later_connections() {
        let (bot, _dir) = new_bot(None);
        let first = bot.add_network(network("one")).unwrap();
        let id = bot
            .subscribe("ChannelMessage", Scope::All, Requirement::NONE, |_| {
                vec![ClientCommand::Raw(String::from("seen"))]
            })
            .unwrap();
        let second = bot.add_network(network("two")).unwrap();

        let nobody = PrivilegeContainer::default();
        for conn_id in [first, second] {
            let conn = bot.connection(conn_id).unwrap();
            assert_eq!(raise(&conn, &channel_message("hi"), &nobody), ["seen"]);
        }

        assert!(bot.unsubscribe(id));
        let conn = bot.connection(second).unwrap();
        assert!(raise(&conn, &channel_message("hi"), &nobody).is_empty());
        assert!(matches!(
            bot.subscribe("NoSuchEvent", Scope::All, Requirement::NONE, |_| Vec::new()),
            Err(BotErr::UnknownEvent(_))
        ));
    }

    #[test]
    fn connection_table_overflows() {
        let (bot, _dir) = new_bot(None);
        bot.add_network(network("one")).unwrap();
        bot.add_network(network("two")).unwrap();
        assert!(matches!(
            bot.add_network(network("three")),
            Err(BotErr::ConnectionTableFull(_))
        ));
    }

    #[test]
    fn send_data_validates() {
        let (bot, _dir) = new_bot(None);
        let id = bot.add_network(network("one")).unwrap();
        assert!(matches!(
            bot.send_data(id, "PRIVMSG #a :x\r\nQUIT"),
            Err(BotErr::InvalidLine)
        ));
        // not connected, so nothing is queued
        assert!(!bot.send_data(id, "PRIVMSG #a :x").unwrap());

        bot.remove_connection(id).unwrap();
        assert!(matches!(
            bot.send_data(id, "PRIVMSG #a :x"),
            Err(BotErr::UnknownConnection(_))
        ));
    }

    /// echoes `!echo` commands, counts channel messages, and exports `shout`
    struct Echo {
        messages: Arc<AtomicUsize>,
    }

    impl Module for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn subscriptions(&self) -> Vec<ModuleSubscription> {
            vec![
                ModuleSubscription::command(
                    CommandTrigger::Exact(String::from("!echo")),
                    MessageScope::Both,
                ),
                ModuleSubscription::event(EventKind::ChannelMessage),
            ]
        }

        fn exports(&self) -> Vec<Export> {
            vec![Export::new("shout", Requirement::privilege(Privileges::TRUSTED))]
        }

        fn on_command(
            &mut self,
            _ctx: &ModuleContext<'_>,
            _trigger: &CommandTrigger,
            message: &MessageEvent,
        ) -> Vec<ClientCommand> {
            vec![ClientCommand::privmsg(
                message.reply_target(),
                message.command_args(),
            )]
        }

        fn on_message(
            &mut self,
            _ctx: &ModuleContext<'_>,
            _event: &MessageEvent,
        ) -> Vec<ClientCommand> {
            self.messages.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }

        fn call(
            &mut self,
            _ctx: &ModuleContext<'_>,
            method: &str,
            args: &[String],
        ) -> Result<Vec<String>, ModuleCallErr> {
            match method {
                "shout" => Ok(args.iter().map(|arg| arg.to_uppercase()).collect()),
                _ => Err(ModuleCallErr::Failed(String::from("unreachable"))),
            }
        }
    }

    /// forwards `!loud` to echo's `shout`, and tries to call itself on `!self`
    struct Relay;

    impl Module for Relay {
        fn name(&self) -> &str {
            "relay"
        }

        fn subscriptions(&self) -> Vec<ModuleSubscription> {
            vec![
                ModuleSubscription::command(
                    CommandTrigger::Wildcard(String::from("!loud *")),
                    MessageScope::Channel,
                ),
                ModuleSubscription::command(
                    CommandTrigger::Exact(String::from("!self")),
                    MessageScope::Channel,
                ),
            ]
        }

        fn exports(&self) -> Vec<Export> {
            vec![Export::new("noop", Requirement::NONE)]
        }

        fn on_command(
            &mut self,
            ctx: &ModuleContext<'_>,
            trigger: &CommandTrigger,
            message: &MessageEvent,
        ) -> Vec<ClientCommand> {
            let result = if trigger.as_str() == "!self" {
                ctx.call("relay", "noop", &[])
            } else {
                ctx.call("echo", "shout", &[message.command_args().to_string()])
            };
            let text = match result {
                Ok(words) => words.join(" "),
                Err(e) => e.to_string(),
            };
            vec![ClientCommand::privmsg(message.reply_target(), text)]
        }
    }

    #[test]
    fn module_commands_and_events() {
        let (bot, _dir) = new_bot(None);
        let id = bot.add_network(network("one")).unwrap();
        let messages = Arc::new(AtomicUsize::new(0));
        let echo = bot
            .load_module(Box::new(Echo {
                messages: Arc::clone(&messages),
            }))
            .unwrap();

        let conn = bot.connection(id).unwrap();
        let nobody = PrivilegeContainer::default();
        assert_eq!(
            raise(&conn, &channel_message("!echo hello there"), &nobody),
            ["PRIVMSG #a :hello there"]
        );
        assert_eq!(messages.load(Ordering::SeqCst), 1);

        // messages also reach the module through the parser
        conn.on_line(":alice!~a@alice.example PRIVMSG #a :plain");
        assert_eq!(messages.load(Ordering::SeqCst), 2);

        bot.unload_module(echo).unwrap();
        assert!(raise(&conn, &channel_message("!echo again"), &nobody).is_empty());
        assert_eq!(messages.load(Ordering::SeqCst), 2);
        assert_eq!(conn.bus().command_count(), 0);
        assert!(matches!(
            bot.unload_module(echo),
            Err(BotErr::UnknownModule(_))
        ));
    }

    #[test]
    fn cross_module_calls_are_gated() {
        let (bot, _dir) = new_bot(None);
        let id = bot.add_network(network("one")).unwrap();
        bot.load_module(Box::new(Echo {
            messages: Arc::new(AtomicUsize::new(0)),
        }))
        .unwrap();
        bot.load_module(Box::new(Relay)).unwrap();
        let conn = bot.connection(id).unwrap();

        let nobody = PrivilegeContainer::default();
        assert_eq!(
            raise(&conn, &channel_message("!loud hi"), &nobody),
            ["PRIVMSG #a :caller may not call echo::shout"]
        );

        let trusted = PrivilegeContainer::new(Privileges::TRUSTED, 0);
        assert_eq!(
            raise(&conn, &channel_message("!loud hi"), &trusted),
            ["PRIVMSG #a :HI"]
        );

        assert_eq!(
            raise(&conn, &channel_message("!self"), &trusted),
            ["PRIVMSG #a :module \"relay\" called itself"]
        );

        assert_eq!(
            bot.call_module(None, &conn, &trusted, "nope", "x", &[]),
            Err(ModuleCallErr::UnknownModule(String::from("nope")))
        );
        assert!(matches!(
            bot.call_module(None, &conn, &trusted, "echo", "whisper", &[]),
            Err(ModuleCallErr::UnknownMethod { .. })
        ));
    }

    #[test]
    fn module_table_limits() {
        let (bot, _dir) = new_bot(Some(1));
        bot.load_module(Box::new(Relay)).unwrap();
        assert!(matches!(
            bot.load_module(Box::new(Relay)),
            Err(BotErr::DuplicateModule(_))
        ));
        assert!(matches!(
            bot.load_module(Box::new(Echo {
                messages: Arc::new(AtomicUsize::new(0))
            })),
            Err(BotErr::ModuleTableFull(_))
        ));
    }

    /// records how many dispatches are in flight at once
    struct Slow {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl Module for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn subscriptions(&self) -> Vec<ModuleSubscription> {
            vec![ModuleSubscription::event(EventKind::ChannelMessage)]
        }

        fn on_message(
            &mut self,
            _ctx: &ModuleContext<'_>,
            _event: &MessageEvent,
        ) -> Vec<ClientCommand> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Vec::new()
        }
    }

    #[test]
    fn one_dispatch_per_module_at_a_time() {
        let (bot, _dir) = new_bot(None);
        let ids = [
            bot.add_network(network("one")).unwrap(),
            bot.add_network(network("two")).unwrap(),
        ];
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        bot.load_module(Box::new(Slow {
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::clone(&max_in_flight),
        }))
        .unwrap();

        thread::scope(|s| {
            for id in ids {
                let conn = bot.connection(id).unwrap();
                s.spawn(move || {
                    for _ in 0..10 {
                        raise(&conn, &channel_message("hi"), &PrivilegeContainer::default());
                    }
                });
            }
        });
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    /// records which connection each handler ran for
    struct Pairs {
        log: Arc<Mutex<Vec<(String, &'static str)>>>,
    }

    impl Module for Pairs {
        fn name(&self) -> &str {
            "pairs"
        }

        fn subscriptions(&self) -> Vec<ModuleSubscription> {
            vec![
                ModuleSubscription::command(
                    CommandTrigger::Exact(String::from("!x")),
                    MessageScope::Channel,
                ),
                ModuleSubscription::event(EventKind::ChannelMessage),
            ]
        }

        fn on_command(
            &mut self,
            ctx: &ModuleContext<'_>,
            _trigger: &CommandTrigger,
            _message: &MessageEvent,
        ) -> Vec<ClientCommand> {
            self.log
                .lock()
                .push((ctx.connection().name().to_string(), "command"));
            thread::sleep(Duration::from_millis(1));
            Vec::new()
        }

        fn on_message(
            &mut self,
            ctx: &ModuleContext<'_>,
            _event: &MessageEvent,
        ) -> Vec<ClientCommand> {
            self.log
                .lock()
                .push((ctx.connection().name().to_string(), "message"));
            Vec::new()
        }
    }

    #[test]
    fn command_and_message_handlers_share_one_dispatch() {
        let (bot, _dir) = new_bot(None);
        let ids = [
            bot.add_network(network("one")).unwrap(),
            bot.add_network(network("two")).unwrap(),
        ];
        let log = Arc::new(Mutex::new(Vec::new()));
        bot.load_module(Box::new(Pairs {
            log: Arc::clone(&log),
        }))
        .unwrap();

        thread::scope(|s| {
            for id in ids {
                let conn = bot.connection(id).unwrap();
                s.spawn(move || {
                    for _ in 0..50 {
                        conn.raise_message(MessageEvent {
                            kind: MessageKind::ChannelMessage,
                            sender: IrcHost::new("alice", "~a", "alice.example"),
                            target: String::from("#a"),
                            text: String::from("!x go"),
                        });
                    }
                });
            }
        });

        let log = log.lock();
        assert_eq!(log.len(), 200);
        for pair in log.chunks(2) {
            assert_eq!(pair[0].1, "command");
            assert_eq!(pair[1].1, "message");
            assert_eq!(pair[0].0, pair[1].0, "another connection ran in between");
        }
    }

    #[test]
    fn removing_a_connection_saves_its_registry() {
        let (bot, dir) = new_bot(None);
        let id = bot.add_network(network("one")).unwrap();
        let conn = bot.connection(id).unwrap();
        conn.register_user(RegisteredUser::new(
            "alice",
            vec![IrcHost::new("*", "*", "alice.example")],
            PrivilegeContainer::new(Privileges::TRUSTED, 10),
        ))
        .unwrap();

        bot.remove_connection(id).unwrap();

        let path = dir.path().join("one.users");
        let reloaded = RegisteredUsers::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("alice").unwrap().privileges.level, 10);
    }
}
