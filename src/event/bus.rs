use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};
use std::{collections::HashMap, sync::Arc};

use log::*;
use parking_lot::{ReentrantMutex, RwLock};

use crate::{
    connection::Connection,
    directory::{PrivilegeContainer, Requirement},
    event::{Event, EventKind, MessageEvent, MessageKind},
    irc::client::ClientCommand,
    slots::ModuleId,
    util::wildcard_match,
};

/// everything a subscriber gets to look at for one event occurrence
pub struct EventContext<'a> {
    pub connection: &'a Connection,
    pub event: &'a Event,
    /// the privileges of the user that caused the event
    pub actor: &'a PrivilegeContainer,
    /// the trigger that matched, when the subscriber was attached as a command
    pub trigger: Option<&'a CommandTrigger>,
}

/// a subscriber. it returns the lines it wants sent in reply, possibly none.
pub type Callback = Arc<dyn Fn(&EventContext<'_>) -> Vec<ClientCommand> + Send + Sync>;

/// held by one thread for everything a subscriber owner handles of one event occurrence. it is
/// reentrant so the owner's callbacks can take it again while it is held.
pub type DispatchLock = Arc<ReentrantMutex<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// one attached subscriber. the same subscription (and so the same id) may be attached to the
/// buses of several connections.
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    requirement: Requirement,
    owner: Option<ModuleId>,
    callback: Callback,
    dispatch_lock: Option<DispatchLock>,
}

impl Subscription {
    pub fn new(requirement: Requirement, owner: Option<ModuleId>, callback: Callback) -> Self {
        Self {
            id: SubscriptionId::next(),
            requirement,
            owner,
            callback,
            dispatch_lock: None,
        }
    }

    /// shares `lock` with the owner's other subscriptions, so a message that triggers both a
    /// command and a message subscriber of the owner is handled under one acquisition
    pub fn with_dispatch_lock(mut self, lock: DispatchLock) -> Self {
        self.dispatch_lock = Some(lock);
        self
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    pub fn owner(&self) -> Option<ModuleId> {
        self.owner
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("requirement", &self.requirement)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// what a message has to look like to trigger a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTrigger {
    /// the first word of the message equals this, ignoring ASCII case
    Exact(String),
    /// the whole message matches this `*`/`?` pattern
    Wildcard(String),
}

impl CommandTrigger {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            CommandTrigger::Exact(word) => text
                .split(' ')
                .next()
                .is_some_and(|first| first.eq_ignore_ascii_case(word)),
            CommandTrigger::Wildcard(pattern) => wildcard_match(pattern, text),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CommandTrigger::Exact(s) | CommandTrigger::Wildcard(s) => s,
        }
    }
}

/// which messages a command listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageScope {
    Channel,
    Private,
    #[default]
    Both,
}

impl MessageScope {
    fn admits(self, kind: MessageKind) -> bool {
        match self {
            MessageScope::Channel => kind == MessageKind::ChannelMessage,
            MessageScope::Private => kind == MessageKind::PrivateMessage,
            MessageScope::Both => {
                matches!(kind, MessageKind::ChannelMessage | MessageKind::PrivateMessage)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct CommandSubscription {
    trigger: CommandTrigger,
    scope: MessageScope,
    subscription: Subscription,
}

/// the per connection event table. subscribers of one event kind run in the order they were
/// attached, and their replies are concatenated in that order.
#[derive(Debug, Default)]
pub struct EventBus {
    events: RwLock<HashMap<EventKind, Vec<Subscription>>>,
    commands: RwLock<Vec<CommandSubscription>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// attaches a new subscriber to one event kind
    pub fn subscribe(
        &self,
        kind: EventKind,
        requirement: Requirement,
        callback: impl Fn(&EventContext<'_>) -> Vec<ClientCommand> + Send + Sync + 'static,
    ) -> SubscriptionId {
        let subscription = Subscription::new(requirement, None, Arc::new(callback));
        let id = subscription.id();
        self.attach(kind, subscription);
        id
    }

    /// attaches an existing subscription, keeping its id
    pub fn attach(&self, kind: EventKind, subscription: Subscription) {
        trace!("attaching {} to {}", subscription.id, kind);
        self.events
            .write()
            .entry(kind)
            .or_default()
            .push(subscription);
    }

    pub fn subscribe_command(
        &self,
        trigger: CommandTrigger,
        scope: MessageScope,
        requirement: Requirement,
        callback: impl Fn(&EventContext<'_>) -> Vec<ClientCommand> + Send + Sync + 'static,
    ) -> SubscriptionId {
        let subscription = Subscription::new(requirement, None, Arc::new(callback));
        let id = subscription.id();
        self.attach_command(trigger, scope, subscription);
        id
    }

    pub fn attach_command(
        &self,
        trigger: CommandTrigger,
        scope: MessageScope,
        subscription: Subscription,
    ) {
        trace!("attaching {} to command {:?}", subscription.id, trigger);
        self.commands.write().push(CommandSubscription {
            trigger,
            scope,
            subscription,
        });
    }

    /// detaches a subscription from events and commands alike. returns true if it was attached.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.detach(|subscription| subscription.id == id) > 0
    }

    /// detaches everything a module attached, returning how many subscriptions that was
    pub fn unsubscribe_owner(&self, owner: ModuleId) -> usize {
        self.detach(|subscription| subscription.owner == Some(owner))
    }

    fn detach(&self, matches: impl Fn(&Subscription) -> bool) -> usize {
        let mut removed = 0;
        for subscriptions in self.events.write().values_mut() {
            let before = subscriptions.len();
            subscriptions.retain(|s| !matches(s));
            removed += before - subscriptions.len();
        }

        let mut commands = self.commands.write();
        let before = commands.len();
        commands.retain(|c| !matches(&c.subscription));
        removed += before - commands.len();

        removed
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.events.read().get(&kind).map_or(0, Vec::len)
    }

    pub fn command_count(&self) -> usize {
        self.commands.read().len()
    }

    fn subscriptions_of(&self, kind: EventKind) -> Vec<Subscription> {
        // NOTE: the list is cloned so subscribers can (un)subscribe while being invoked
        self.events.read().get(&kind).cloned().unwrap_or_default()
    }

    fn matching_commands(&self, message: &MessageEvent) -> Vec<CommandSubscription> {
        self.commands
            .read()
            .iter()
            .filter(|c| c.scope.admits(message.kind) && c.trigger.matches(&message.text))
            .cloned()
            .collect()
    }

    /// invokes every subscriber of the event's kind that the actor qualifies for, returning their
    /// replies in invocation order
    pub fn raise(
        &self,
        connection: &Connection,
        event: &Event,
        actor: &PrivilegeContainer,
    ) -> Vec<ClientCommand> {
        let subscriptions = self.subscriptions_of(event.kind());
        run_subscribers(connection, event, actor, &subscriptions)
    }

    /// runs every command whose trigger and scope match the message, under the same privilege
    /// gate as [`EventBus::raise`]
    pub fn raise_commands(
        &self,
        connection: &Connection,
        event: &Event,
        message: &MessageEvent,
        actor: &PrivilegeContainer,
    ) -> Vec<ClientCommand> {
        let commands = self.matching_commands(message);
        run_commands(connection, event, actor, &commands)
    }

    /// runs the matching commands of a message, then the subscribers of the message itself.
    /// the dispatch lock of every owner taking part is held across both, taken in owner order.
    pub fn raise_message(
        &self,
        connection: &Connection,
        event: &Event,
        actor: &PrivilegeContainer,
    ) -> Vec<ClientCommand> {
        let Event::Message(message) = event else {
            return self.raise(connection, event, actor);
        };
        let commands = self.matching_commands(message);
        let subscriptions = self.subscriptions_of(event.kind());

        let mut locks = commands
            .iter()
            .map(|c| &c.subscription)
            .chain(&subscriptions)
            .filter_map(|s| Some((s.owner, s.dispatch_lock.as_ref()?)))
            .collect::<Vec<_>>();
        locks.sort_by_key(|&(owner, _)| owner);
        locks.dedup_by(|a, b| Arc::ptr_eq(a.1, b.1));
        let _held = locks.iter().map(|(_, lock)| lock.lock()).collect::<Vec<_>>();

        let mut replies = run_commands(connection, event, actor, &commands);
        replies.extend(run_subscribers(connection, event, actor, &subscriptions));
        replies
    }
}

fn run_subscribers(
    connection: &Connection,
    event: &Event,
    actor: &PrivilegeContainer,
    subscriptions: &[Subscription],
) -> Vec<ClientCommand> {
    let ctx = EventContext {
        connection,
        event,
        actor,
        trigger: None,
    };

    let mut replies = Vec::new();
    for subscription in subscriptions {
        if !subscription.requirement.allows(actor) {
            trace!("{} skipped for {}", subscription.id, event.kind());
            continue;
        }
        replies.extend((subscription.callback)(&ctx));
    }
    replies
}

fn run_commands(
    connection: &Connection,
    event: &Event,
    actor: &PrivilegeContainer,
    commands: &[CommandSubscription],
) -> Vec<ClientCommand> {
    let mut replies = Vec::new();
    for command in commands {
        if !command.subscription.requirement.allows(actor) {
            trace!(
                "{} skipped for command {:?}",
                command.subscription.id, command.trigger
            );
            continue;
        }
        let ctx = EventContext {
            connection,
            event,
            actor,
            trigger: Some(&command.trigger),
        };
        replies.extend((command.subscription.callback)(&ctx));
    }
    replies
}
