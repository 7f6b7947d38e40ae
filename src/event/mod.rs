//! the domain events a connection raises, and the bus that delivers them

mod bus;
mod kind;

pub use bus::{
    Callback, CommandTrigger, DispatchLock, EventBus, EventContext, MessageScope, Subscription,
    SubscriptionId,
};
pub use kind::{EventKind, UnknownEventErr};

use crate::irc::{IrcHost, ctcp::Ctcp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Server(ServerEvent),
    Membership(MembershipEvent),
    Message(MessageEvent),
    Ctcp(CtcpEvent),
}

/// events about the connection itself, or sent by the server rather than a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// a transport session opened, registration has not happened yet
    Connected,
    Disconnected,
    Ping {
        token: String,
    },
    /// the server accepted registration, `nick` is the nick it granted
    Welcome {
        nick: String,
        text: String,
    },
    /// one NAMES or WHO reply was folded into the directory
    Names {
        channel: String,
        nicks: Vec<String>,
    },
    NickNameInUse {
        nick: String,
    },
    /// a mode change applied to the bot's own nick
    ServerMode {
        target: String,
        modes: Vec<String>,
    },
    ServerNotice {
        sender: String,
        target: String,
        text: String,
    },
    Topic {
        channel: String,
        topic: String,
        setter: Option<IrcHost>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    Join {
        user: IrcHost,
        channel: String,
    },
    BotJoin {
        channel: String,
    },
    Part {
        user: IrcHost,
        channel: String,
        reason: Option<String>,
    },
    BotPart {
        channel: String,
        reason: Option<String>,
    },
    Quit {
        user: IrcHost,
        reason: Option<String>,
    },
    NickName {
        old: IrcHost,
        new: String,
    },
    BotNickName {
        old: String,
        new: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ChannelMessage,
    PrivateMessage,
    ChannelNotice,
    PrivateNotice,
}

impl MessageKind {
    pub fn is_channel(self) -> bool {
        matches!(self, MessageKind::ChannelMessage | MessageKind::ChannelNotice)
    }

    pub fn is_notice(self) -> bool {
        matches!(self, MessageKind::ChannelNotice | MessageKind::PrivateNotice)
    }
}

/// a plain PRIVMSG or NOTICE from a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub kind: MessageKind,
    pub sender: IrcHost,
    pub target: String,
    pub text: String,
}

impl MessageEvent {
    /// where a reply to this message should go: the channel for channel messages, the sender for
    /// private ones
    pub fn reply_target(&self) -> &str {
        if self.kind.is_channel() {
            &self.target
        } else {
            self.sender.nick()
        }
    }

    /// the text after the first word, for messages that triggered a command
    pub fn command_args(&self) -> &str {
        match self.text.split_once(' ') {
            Some((_, args)) => args.trim_start(),
            None => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CtcpKind {
    /// a request sent to a channel
    Channel,
    /// a request sent to the bot
    Private,
    /// a CTCP framed NOTICE, the answer to a request
    Reply,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtcpEvent {
    pub kind: CtcpKind,
    pub sender: IrcHost,
    pub target: String,
    pub ctcp: Ctcp,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Server(event) => match event {
                ServerEvent::Connected => EventKind::Connected,
                ServerEvent::Disconnected => EventKind::Disconnected,
                ServerEvent::Ping { .. } => EventKind::Ping,
                ServerEvent::Welcome { .. } => EventKind::Welcome,
                ServerEvent::Names { .. } => EventKind::Names,
                ServerEvent::NickNameInUse { .. } => EventKind::NickNameInUse,
                ServerEvent::ServerMode { .. } => EventKind::ServerMode,
                ServerEvent::ServerNotice { .. } => EventKind::ServerNotice,
                ServerEvent::Topic { .. } => EventKind::Topic,
            },
            Event::Membership(event) => match event {
                MembershipEvent::Join { .. } => EventKind::Join,
                MembershipEvent::BotJoin { .. } => EventKind::BotJoin,
                MembershipEvent::Part { .. } => EventKind::Part,
                MembershipEvent::BotPart { .. } => EventKind::BotPart,
                MembershipEvent::Quit { .. } => EventKind::Quit,
                MembershipEvent::NickName { .. } => EventKind::NickName,
                MembershipEvent::BotNickName { .. } => EventKind::BotNickName,
            },
            Event::Message(event) => match event.kind {
                MessageKind::ChannelMessage => EventKind::ChannelMessage,
                MessageKind::PrivateMessage => EventKind::PrivateMessage,
                MessageKind::ChannelNotice => EventKind::ChannelNotice,
                MessageKind::PrivateNotice => EventKind::PrivateNotice,
            },
            Event::Ctcp(event) => match event.kind {
                CtcpKind::Channel => EventKind::ChannelCtcp,
                CtcpKind::Private => EventKind::PrivateCtcp,
                CtcpKind::Reply => EventKind::CtcpReply,
            },
        }
    }

    /// the nick of the user that caused the event, as it is known after the event. server events
    /// and the bot's own membership changes have no actor.
    pub fn actor_nick(&self) -> Option<&str> {
        match self {
            Event::Server(ServerEvent::Topic {
                setter: Some(setter),
                ..
            }) => Some(setter.nick()),
            Event::Server(_) => None,
            Event::Membership(event) => match event {
                MembershipEvent::Join { user, .. }
                | MembershipEvent::Part { user, .. }
                | MembershipEvent::Quit { user, .. } => Some(user.nick()),
                MembershipEvent::NickName { new, .. } => Some(new),
                MembershipEvent::BotJoin { .. }
                | MembershipEvent::BotPart { .. }
                | MembershipEvent::BotNickName { .. } => None,
            },
            Event::Message(event) => Some(event.sender.nick()),
            Event::Ctcp(event) => Some(event.sender.nick()),
        }
    }
}
