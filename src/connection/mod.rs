//! one IRC network: its transport, its directory, and its event bus

mod baseline;
mod parser;

use std::{
    io,
    net::IpAddr,
    sync::{Arc, Weak},
    thread::{self, JoinHandle},
};

use bitflags::bitflags;
use log::*;
use parking_lot::{Mutex, MutexGuard};

use crate::{
    config::NetworkConfig,
    directory::{Directory, PrivilegeContainer, RegisteredUser, RegisteredUsers, RegistryErr},
    event::{Event, EventBus, MessageEvent, ServerEvent},
    irc::{IrcHost, client::ClientCommand},
    net::{Transport, TransportHandler, TransportSettings},
    slots::ConnectionId,
};

bitflags! {
    /// independent state bits. `HALT` composes with the others and stops reconnection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConnectionState: u8 {
        const CONNECTING = 1 << 0;
        const CONNECTED = 1 << 1;
        const DISCONNECTING = 1 << 2;
        const DISCONNECTED = 1 << 3;
        const HALT = 1 << 4;
    }
}

pub struct Connection {
    id: ConnectionId,
    config: NetworkConfig,
    state: Mutex<ConnectionState>,
    transport: Transport,
    // NOTE: when both are needed, lock the directory before the registry
    directory: Mutex<Directory>,
    registry: Mutex<RegisteredUsers>,
    bus: EventBus,
    // the nick the server knows the bot by
    nick: Mutex<String>,
    // the bot's full host, once the server has shown it
    own_host: Mutex<Option<IrcHost>>,
    external_ip: Mutex<Option<IpAddr>>,
}

impl Connection {
    /// creates a disconnected connection with the baseline handlers attached
    pub fn new(id: ConnectionId, config: NetworkConfig, registry: RegisteredUsers) -> Arc<Self> {
        let conn = Arc::new_cyclic(|weak: &Weak<Connection>| {
            let handler: Weak<dyn TransportHandler> = weak.clone();
            Self {
                id,
                transport: Transport::new(TransportSettings::from(&config), handler),
                nick: Mutex::new(config.nick.clone()),
                config,
                state: Mutex::new(ConnectionState::DISCONNECTED),
                directory: Mutex::new(Directory::new()),
                registry: Mutex::new(registry),
                bus: EventBus::new(),
                own_host: Mutex::new(None),
                external_ip: Mutex::new(None),
            }
        });
        baseline::attach(&conn.bus);
        conn
    }

    /// spawns the sender and receiver threads, named after the network
    pub fn start(self: &Arc<Self>) -> io::Result<Vec<JoinHandle<()>>> {
        let sender = thread::Builder::new()
            .name(format!("{}-send", self.config.name))
            .spawn({
                let conn = Arc::clone(self);
                move || conn.transport.run_sender()
            })?;
        let receiver = thread::Builder::new()
            .name(format!("{}-recv", self.config.name))
            .spawn({
                let conn = Arc::clone(self);
                move || conn.run()
            })?;
        Ok(vec![sender, receiver])
    }

    /// the receiver loop. connects, reads until the session ends, and reconnects after the retry
    /// interval, until halted. saves the registered users on the way out.
    pub fn run(&self) {
        info!("starting {}", self.config.name);
        while !self.is_halted() {
            self.set_state(ConnectionState::CONNECTING);
            // the sender thread can close the session while a line is still being parsed here
            self.reset_session();
            if self.transport.connect(&self.config.hosts, self.config.port) {
                self.set_state(ConnectionState::CONNECTED);
                self.raise(&Event::Server(ServerEvent::Connected));
                self.transport.siphon();
            } else {
                warn!("could not connect to any host of {}", self.config.name);
                self.set_state(ConnectionState::DISCONNECTED);
            }

            // NOTE: the fixed delay is deliberate, there is no backoff and no retry limit
            if self.is_halted() || !self.transport.pause(self.config.retry_interval) {
                break;
            }
            debug!("reconnecting to {}", self.config.name);
        }

        self.transport.shutdown();
        if let Err(e) = self.save_registry() {
            warn!("could not save registered users of {}: {}", self.config.name, e);
        }
        info!("stopped {}", self.config.name);
    }

    /// closes the socket locally. a permanent halt also stops reconnecting and both loops.
    pub fn halt(&self, permanent: bool) {
        if permanent {
            self.state.lock().insert(ConnectionState::HALT);
            self.transport.shutdown();
        } else {
            self.transport.close();
        }
    }

    /// sends QUIT and lets the server close the socket. a permanent soft halt also stops
    /// reconnecting once the server has done so.
    pub fn soft_halt(&self, permanent: bool) {
        if permanent {
            self.state.lock().insert(ConnectionState::HALT);
        }
        if !self.transport.is_connected() {
            if permanent {
                self.transport.shutdown();
            }
            return;
        }

        {
            let mut state = self.state.lock();
            state.remove(ConnectionState::CONNECTED);
            state.insert(ConnectionState::DISCONNECTING);
        }
        self.send(&ClientCommand::Quit(self.config.quit_message.clone()));
    }

    fn reset_session(&self) {
        self.directory.lock().clear();
        *self.own_host.lock() = None;
    }

    fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.lock();
        *current = (*current & ConnectionState::HALT) | state;
        debug!("{} is now {:?}", self.config.name, *current);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_halted(&self) -> bool {
        self.state().contains(ConnectionState::HALT)
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn nick(&self) -> String {
        self.nick.lock().clone()
    }

    pub fn set_nick(&self, nick: impl Into<String>) {
        *self.nick.lock() = nick.into();
    }

    pub fn is_own_nick(&self, nick: &str) -> bool {
        *self.nick.lock() == nick
    }

    pub fn own_host(&self) -> Option<IrcHost> {
        self.own_host.lock().clone()
    }

    pub(crate) fn set_own_host(&self, host: IrcHost) {
        *self.own_host.lock() = Some(host);
    }

    pub fn external_ip(&self) -> Option<IpAddr> {
        *self.external_ip.lock()
    }

    pub(crate) fn set_external_ip(&self, ip: IpAddr) {
        *self.external_ip.lock() = Some(ip);
    }

    /// the users and channels of the current session
    pub fn directory(&self) -> MutexGuard<'_, Directory> {
        self.directory.lock()
    }

    /// the registered users of this network. do not hold this while locking the directory.
    pub fn registry(&self) -> MutexGuard<'_, RegisteredUsers> {
        self.registry.lock()
    }

    /// registers a user and re-derives the attachment of every live user
    pub fn register_user(&self, user: RegisteredUser) -> Result<Arc<RegisteredUser>, RegistryErr> {
        let mut directory = self.directory.lock();
        let mut registry = self.registry.lock();
        let registered = registry.register(user)?;
        directory.reauthenticate_all(&registry);
        Ok(registered)
    }

    pub fn unregister_user(&self, name: &str) -> Option<Arc<RegisteredUser>> {
        let mut directory = self.directory.lock();
        let mut registry = self.registry.lock();
        let removed = registry.unregister(name)?;
        directory.reauthenticate_all(&registry);
        Some(removed)
    }

    pub fn save_registry(&self) -> Result<(), RegistryErr> {
        self.registry.lock().save()
    }

    /// queues one command. returns false if it was invalid or there is no session to send it on.
    pub fn send(&self, command: &ClientCommand) -> bool {
        match command.irc_str() {
            Ok(line) => self.transport.pump(&line),
            Err(e) => {
                warn!("not sending {:?}: {}", command, e);
                false
            }
        }
    }

    pub fn send_all(&self, commands: &[ClientCommand]) {
        for command in commands {
            self.send(command);
        }
    }

    /// queues one raw protocol line, without its CRLF
    pub fn send_raw(&self, line: &str) -> bool {
        if line.trim().is_empty() {
            return false;
        }
        self.send(&ClientCommand::Raw(line.to_string()))
    }

    /// the privileges of the user that caused `event`, as the directory currently knows them
    pub fn actor_privileges(&self, event: &Event) -> PrivilegeContainer {
        match event.actor_nick() {
            Some(nick) => self.directory.lock().privileges_of(nick),
            None => PrivilegeContainer::default(),
        }
    }

    /// raises an event on this connection's bus and queues every reply
    pub fn raise(&self, event: &Event) {
        let actor = self.actor_privileges(event);
        self.raise_as(event, &actor);
    }

    /// raises an event for an actor whose privileges were looked up beforehand, for events that
    /// remove the actor from the directory
    pub fn raise_as(&self, event: &Event, actor: &PrivilegeContainer) {
        let replies = self.bus.raise(self, event, actor);
        self.send_all(&replies);
    }

    /// runs the command table for a plain message, then raises the message itself
    pub(crate) fn raise_message(&self, message: MessageEvent) {
        let event = Event::Message(message);
        let actor = self.actor_privileges(&event);
        let replies = self.bus.raise_message(self, &event, &actor);
        self.send_all(&replies);
    }
}

impl TransportHandler for Connection {
    fn on_line(&self, line: &str) {
        parser::handle_line(self, line);
    }

    fn on_disconnect(&self) {
        // whatever the server told us about users and channels is stale now
        self.reset_session();
        self.set_state(ConnectionState::DISCONNECTED);
        info!("disconnected from {}", self.config.name);
        self.raise(&Event::Server(ServerEvent::Disconnected));
    }
}

/// a connection to nowhere, for tests that only need something to raise events on
#[cfg(test)]
pub(crate) fn test_connection() -> Arc<Connection> {
    test_connection_with(NetworkConfig::new(
        "test",
        "bot",
        vec![String::from("127.0.0.1")],
    ))
}

#[cfg(test)]
pub(crate) fn test_connection_with(config: NetworkConfig) -> Arc<Connection> {
    use crate::slots::Slots;

    let mut ids = Slots::<ConnectionId, ()>::default();
    // UNWRAP: an empty table without a capacity always has room
    let id = ids.insert(()).unwrap();
    Connection::new(id, config, RegisteredUsers::in_memory())
}
