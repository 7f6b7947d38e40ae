//! turns one received line into directory updates and raised events

use log::*;

use crate::{
    connection::Connection,
    constants::numerics::*,
    directory::ChannelUserFlag,
    event::{
        CtcpEvent, CtcpKind, Event, MembershipEvent, MessageEvent, MessageKind, ServerEvent,
    },
    irc::{IrcCommand, IrcHost, IrcMessage, Param, Source, ctcp::Ctcp, is_channel_name},
};

/// handles one line from the server. lines that do not parse, and commands nothing reacts to, are
/// dropped.
pub(crate) fn handle_line(conn: &Connection, line: &str) {
    let msg = match IrcMessage::parse(line) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("dropping unparseable line {:?}: {}", line, e);
            return;
        }
    };

    let sender = msg.source.as_ref().and_then(Source::as_user);
    match &msg.command {
        IrcCommand::Ping(token) => conn.raise(&Event::Server(ServerEvent::Ping {
            token: token.clone(),
        })),
        IrcCommand::Error(reason) => {
            // the server closes the socket right after this, which drives the reconnect
            warn!("{} sent ERROR: {}", conn.name(), reason);
        }
        IrcCommand::Numeric { num, args } => handle_numeric(conn, *num, args),
        IrcCommand::Mode { target, modes } => {
            // only modes applied to the bot itself are interpreted, channel modes are not
            if conn.is_own_nick(target) {
                conn.raise(&Event::Server(ServerEvent::ServerMode {
                    target: target.clone(),
                    modes: modes.clone(),
                }));
            }
        }
        IrcCommand::Join(channels) => {
            let Some(user) = sender else { return };
            for channel in channels {
                handle_join(conn, user, channel);
            }
        }
        IrcCommand::Part(channels, reason) => {
            let Some(user) = sender else { return };
            for channel in channels {
                handle_part(conn, user, channel, reason.clone());
            }
        }
        IrcCommand::Quit(reason) => {
            let Some(user) = sender else { return };
            handle_quit(conn, user, reason.clone());
        }
        IrcCommand::Nick(new) => {
            let Some(user) = sender else { return };
            handle_nick(conn, user, new);
        }
        IrcCommand::Topic(channel, topic) => {
            let topic = topic.clone().unwrap_or_default();
            set_topic(conn, channel, &topic);
            conn.raise(&Event::Server(ServerEvent::Topic {
                channel: channel.clone(),
                topic,
                setter: sender.cloned(),
            }));
        }
        IrcCommand::Privmsg { targets, msg: text } => {
            let Some(user) = sender else {
                debug!("dropping PRIVMSG without a user source: {:?}", line);
                return;
            };
            for target in targets {
                handle_message(conn, user, target, text, false);
            }
        }
        IrcCommand::Notice { targets, msg: text } => {
            for target in targets {
                match sender {
                    Some(user) => handle_message(conn, user, target, text, true),
                    // a notice without a user sender came from the server itself
                    None => conn.raise(&Event::Server(ServerEvent::ServerNotice {
                        sender: msg
                            .source
                            .as_ref()
                            .map(|source| source.get_name().to_string())
                            .unwrap_or_default(),
                        target: target.clone(),
                        text: text.clone(),
                    })),
                }
            }
        }
        IrcCommand::Unknown(command, _) => {
            trace!("ignoring {}", command);
        }
    }
}

fn handle_numeric(conn: &Connection, num: u16, args: &[Param]) {
    match num {
        RPL_WELCOME => {
            let Some(nick) = args.first().and_then(Param::as_str) else {
                return;
            };
            let text = args.last().map(Param::to_irc_string).unwrap_or_default();
            conn.raise(&Event::Server(ServerEvent::Welcome {
                nick: nick.to_string(),
                text,
            }));
        }
        RPL_TOPIC => {
            // <me> <channel> :<topic>
            let [_, channel, topic, ..] = args else {
                return;
            };
            let Some(channel) = channel.as_str() else {
                return;
            };
            let topic = topic.to_irc_string();
            set_topic(conn, channel, &topic);
            conn.raise(&Event::Server(ServerEvent::Topic {
                channel: channel.to_string(),
                topic,
                setter: None,
            }));
        }
        RPL_WHOREPLY => {
            // <me> <channel> <user> <host> <server> <nick> <status> :<hopcount> <realname>
            let [_, channel, user, host, _, nick, status, ..] = args else {
                return;
            };
            let (Some(channel), Some(user), Some(host), Some(nick), Some(status)) = (
                channel.as_str(),
                user.as_str(),
                host.as_str(),
                nick.as_str(),
                status.as_str(),
            ) else {
                return;
            };
            // `WHO nick` replies carry `*` instead of a channel
            if !is_channel_name(channel) {
                return;
            }

            let host = IrcHost::new(nick, user, host);
            {
                let mut directory = conn.directory();
                let registry = conn.registry();
                directory.upsert_member(
                    channel,
                    &host,
                    Some(ChannelUserFlag::from_who_status(status)),
                    &registry,
                );
            }
            if conn.is_own_nick(nick) {
                conn.set_own_host(host);
            }
            conn.raise(&Event::Server(ServerEvent::Names {
                channel: channel.to_string(),
                nicks: vec![nick.to_string()],
            }));
        }
        RPL_NAMREPLY => {
            // <me> [<symbol>] <channel> :[prefix]<nick>{ [prefix]<nick>}
            let Some((names, rest)) = args.split_last() else {
                return;
            };
            let Some(channel) = rest
                .iter()
                .skip(1)
                .filter_map(Param::as_str)
                .find(|arg| is_channel_name(arg))
            else {
                return;
            };

            let mut nicks = Vec::new();
            {
                let mut directory = conn.directory();
                let registry = conn.registry();
                for entry in names.to_irc_string().split(' ') {
                    let (flag, nick) = ChannelUserFlag::split_nick(entry);
                    let Some(host) = IrcHost::parse(nick) else {
                        continue;
                    };
                    directory.upsert_member(channel, &host, Some(flag), &registry);
                    nicks.push(host.nick().to_string());
                }
            }
            conn.raise(&Event::Server(ServerEvent::Names {
                channel: channel.to_string(),
                nicks,
            }));
        }
        ERR_NICKNAMEINUSE => {
            // <me> <nick> :Nickname is already in use
            let Some(nick) = args.get(1).and_then(Param::as_str) else {
                return;
            };
            conn.raise(&Event::Server(ServerEvent::NickNameInUse {
                nick: nick.to_string(),
            }));
        }
        _ => trace!("ignoring numeric {:03}", num),
    }
}

fn handle_join(conn: &Connection, user: &IrcHost, channel: &str) {
    if conn.is_own_nick(user.nick()) {
        conn.directory().channels.get_or_create(channel);
        if user.is_complete() {
            conn.set_own_host(user.clone());
        }
        conn.raise(&Event::Membership(MembershipEvent::BotJoin {
            channel: channel.to_string(),
        }));
        return;
    }

    {
        let mut directory = conn.directory();
        let registry = conn.registry();
        directory.upsert_member(channel, user, None, &registry);
    }
    conn.raise(&Event::Membership(MembershipEvent::Join {
        user: user.clone(),
        channel: channel.to_string(),
    }));
}

fn handle_part(conn: &Connection, user: &IrcHost, channel: &str, reason: Option<String>) {
    if conn.is_own_nick(user.nick()) {
        conn.directory().remove_channel(channel);
        conn.raise(&Event::Membership(MembershipEvent::BotPart {
            channel: channel.to_string(),
            reason,
        }));
        return;
    }

    // the user may be dropped from the directory, so their privileges are looked up first
    let event = Event::Membership(MembershipEvent::Part {
        user: user.clone(),
        channel: channel.to_string(),
        reason,
    });
    let actor = conn.actor_privileges(&event);
    conn.directory().part(channel, user.nick());
    conn.raise_as(&event, &actor);
}

fn handle_quit(conn: &Connection, user: &IrcHost, reason: Option<String>) {
    conn.raise(&Event::Membership(MembershipEvent::Quit {
        user: user.clone(),
        reason,
    }));
    conn.directory().remove_user(user.nick());
}

fn handle_nick(conn: &Connection, user: &IrcHost, new: &str) {
    {
        let mut directory = conn.directory();
        let registry = conn.registry();
        directory.rename(user.nick(), new, &registry);
    }

    if conn.is_own_nick(user.nick()) {
        conn.set_nick(new);
        if let Some(own) = conn.own_host() {
            conn.set_own_host(own.with_nick(new));
        }
        conn.raise(&Event::Membership(MembershipEvent::BotNickName {
            old: user.nick().to_string(),
            new: new.to_string(),
        }));
    } else {
        conn.raise(&Event::Membership(MembershipEvent::NickName {
            old: user.clone(),
            new: new.to_string(),
        }));
    }
}

fn set_topic(conn: &Connection, channel: &str, topic: &str) {
    if let Some(channel) = conn.directory().channels.get_mut(channel) {
        channel.topic = topic.to_string();
    }
}

fn handle_message(conn: &Connection, user: &IrcHost, target: &str, text: &str, notice: bool) {
    let in_channel = is_channel_name(target);

    {
        let mut directory = conn.directory();
        let registry = conn.registry();
        if in_channel && directory.channels.contains(target) {
            directory.upsert_member(target, user, None, &registry);
        } else {
            directory.upsert_user(user, &registry);
        }
    }

    if Ctcp::is_ctcp(text) {
        let Some(ctcp) = Ctcp::parse(text) else {
            debug!("dropping malformed CTCP from {}: {:?}", user, text);
            return;
        };
        let kind = match (notice, in_channel) {
            (true, _) => CtcpKind::Reply,
            (false, true) => CtcpKind::Channel,
            (false, false) => CtcpKind::Private,
        };
        conn.raise(&Event::Ctcp(CtcpEvent {
            kind,
            sender: user.clone(),
            target: target.to_string(),
            ctcp,
        }));
        return;
    }

    let kind = match (notice, in_channel) {
        (false, true) => MessageKind::ChannelMessage,
        (false, false) => MessageKind::PrivateMessage,
        (true, true) => MessageKind::ChannelNotice,
        (true, false) => MessageKind::PrivateNotice,
    };
    conn.raise_message(MessageEvent {
        kind,
        sender: user.clone(),
        target: target.to_string(),
        text: text.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::{
        connection::test_connection,
        directory::{PrivilegeContainer, Privileges, RegisteredUser, Requirement},
        event::{CommandTrigger, EventKind, MessageScope},
        net::LineFramer,
    };

    /// records every event of the given kinds raised on the connection
    fn record(conn: &Connection, kinds: &[EventKind]) -> Arc<Mutex<Vec<Event>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        for &kind in kinds {
            let events = Arc::clone(&events);
            conn.bus().subscribe(kind, Requirement::NONE, move |ctx| {
                events.lock().push(ctx.event.clone());
                Vec::new()
            });
        }
        events
    }

    fn feed(conn: &Connection, lines: &[&str]) {
        for line in lines {
            handle_line(conn, line);
        }
    }

    fn joined(conn: &Connection, channel: &str, nicks: &[&str]) {
        let own = format!(":bot!~bot@bot.example JOIN {channel}");
        handle_line(conn, &own);
        for nick in nicks {
            handle_line(conn, &format!(":{nick}!~{nick}@{nick}.example JOIN {channel}"));
        }
    }

    #[test]
    fn split_read_raises_one_channel_message() {
        let conn = test_connection();
        joined(&conn, "#chan", &["alice"]);
        let events = record(&conn, &[EventKind::ChannelMessage]);

        let mut framer = LineFramer::new();
        for chunk in [&b":alice!~alice@alice.example PRIVMSG #ch"[..], b"an :hello\r\n"] {
            for line in framer.push(chunk) {
                handle_line(&conn, &line);
            }
        }

        let events = events.lock();
        assert_eq!(events.len(), 1);
        let Event::Message(message) = &events[0] else {
            panic!("expected a message, got {:?}", events[0]);
        };
        assert_eq!(message.text, "hello");
        assert_eq!(message.target, "#chan");
    }

    #[test]
    fn join_links_member_to_directory_user() {
        let conn = test_connection();
        let events = record(&conn, &[EventKind::Join, EventKind::BotJoin]);
        joined(&conn, "#a", &["alice"]);

        let directory = conn.directory();
        let user = directory.users.get("alice").unwrap();
        let member = directory.channels.get("#a").unwrap().member("alice").unwrap();
        assert!(member.is_same_user(user));
        assert_eq!(
            events.lock().iter().map(Event::kind).collect::<Vec<_>>(),
            [EventKind::BotJoin, EventKind::Join]
        );
    }

    #[test]
    fn names_then_who_refine_the_same_user() {
        let conn = test_connection();
        joined(&conn, "#a", &[]);
        feed(
            &conn,
            &[
                ":srv.example 353 bot = #a :bot @alice +carol",
                ":srv.example 352 bot #a ~al alice.example srv.example alice H@ :0 Alice",
            ],
        );

        let directory = conn.directory();
        let channel = directory.channels.get("#a").unwrap();
        assert_eq!(channel.nicks().collect::<Vec<_>>(), ["bot", "alice", "carol"]);
        assert_eq!(channel.member("alice").unwrap().flag, ChannelUserFlag::Op);
        assert_eq!(channel.member("carol").unwrap().flag, ChannelUserFlag::Voice);
        let alice = directory.users.get("alice").unwrap();
        assert!(channel.member("alice").unwrap().is_same_user(alice));
        assert_eq!(alice.read().host().to_string(), "alice!~al@alice.example");
    }

    #[test]
    fn quit_removes_user_everywhere() {
        let conn = test_connection();
        joined(&conn, "#a", &["alice", "bob"]);
        joined(&conn, "#b", &["alice"]);
        let events = record(&conn, &[EventKind::Quit]);

        handle_line(&conn, ":alice!~alice@alice.example QUIT :bye");

        let directory = conn.directory();
        assert!(!directory.users.contains("alice"));
        assert!(!directory.is_in_any_channel("alice"));
        assert!(directory.users.contains("bob"));
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn part_keeps_user_seen_elsewhere() {
        let conn = test_connection();
        joined(&conn, "#a", &["alice"]);
        joined(&conn, "#b", &["alice"]);

        handle_line(&conn, ":alice!~alice@alice.example PART #a :later");
        assert!(conn.directory().users.contains("alice"));
        handle_line(&conn, ":alice!~alice@alice.example PART #b");
        assert!(!conn.directory().users.contains("alice"));
    }

    #[test]
    fn bot_part_drops_the_channel() {
        let conn = test_connection();
        joined(&conn, "#a", &["alice"]);
        let events = record(&conn, &[EventKind::BotPart, EventKind::Part]);

        handle_line(&conn, ":bot!~bot@bot.example PART #a");
        assert!(!conn.directory().channels.contains("#a"));
        assert!(!conn.directory().users.contains("alice"));
        assert_eq!(
            events.lock().iter().map(Event::kind).collect::<Vec<_>>(),
            [EventKind::BotPart]
        );
    }

    #[test]
    fn part_event_carries_privileges_of_departed_user() {
        let conn = test_connection();
        conn.register_user(RegisteredUser::new(
            "alice",
            vec![IrcHost::new("*", "*", "alice.example")],
            PrivilegeContainer::new(Privileges::TRUSTED, 10),
        ))
        .unwrap();
        joined(&conn, "#a", &["alice"]);

        let seen = Arc::new(Mutex::new(None));
        conn.bus().subscribe(EventKind::Part, Requirement::level(10), {
            let seen = Arc::clone(&seen);
            move |ctx| {
                *seen.lock() = Some(ctx.actor.level);
                Vec::new()
            }
        });
        handle_line(&conn, ":alice!~alice@alice.example PART #a");
        assert_eq!(*seen.lock(), Some(10));
    }

    #[test]
    fn nick_change_propagates_to_channels() {
        let conn = test_connection();
        conn.register_user(RegisteredUser::new(
            "alice",
            vec![IrcHost::new("*", "*", "alice.example")],
            PrivilegeContainer::new(Privileges::TRUSTED, 10),
        ))
        .unwrap();
        joined(&conn, "#a", &["alice"]);
        joined(&conn, "#b", &["alice"]);
        let events = record(&conn, &[EventKind::NickName]);

        handle_line(&conn, ":alice!~alice@alice.example NICK :bob");

        let directory = conn.directory();
        assert!(!directory.users.contains("alice"));
        let bob = directory.users.get("bob").unwrap();
        assert_eq!(bob.read().registered().unwrap().name, "alice");
        for name in ["#a", "#b"] {
            let channel = directory.channels.get(name).unwrap();
            assert!(channel.contains("bob"));
            assert!(!channel.contains("alice"));
        }
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn bot_nick_change_updates_own_nick() {
        let conn = test_connection();
        let events = record(&conn, &[EventKind::BotNickName, EventKind::NickName]);
        handle_line(&conn, ":bot!~bot@bot.example NICK robot");
        assert_eq!(conn.nick(), "robot");
        assert_eq!(
            events.lock().iter().map(Event::kind).collect::<Vec<_>>(),
            [EventKind::BotNickName]
        );
    }

    #[test]
    fn messages_are_classified() {
        let conn = test_connection();
        joined(&conn, "#a", &["alice"]);
        let events = record(
            &conn,
            &[
                EventKind::ChannelMessage,
                EventKind::PrivateMessage,
                EventKind::ChannelNotice,
                EventKind::PrivateNotice,
                EventKind::ServerNotice,
                EventKind::PrivateCtcp,
                EventKind::ChannelCtcp,
                EventKind::CtcpReply,
            ],
        );

        feed(
            &conn,
            &[
                ":alice!~alice@alice.example PRIVMSG #a :hi all",
                ":alice!~alice@alice.example PRIVMSG bot :hi you",
                ":alice!~alice@alice.example NOTICE #a :note",
                ":alice!~alice@alice.example NOTICE bot :psst",
                ":srv.example NOTICE bot :*** Looking up your hostname",
                "NOTICE AUTH :*** Checking ident",
                ":alice!~alice@alice.example PRIVMSG bot :\u{1}VERSION\u{1}",
                ":alice!~alice@alice.example PRIVMSG #a :\u{1}ACTION waves\u{1}",
                ":alice!~alice@alice.example NOTICE bot :\u{1}PING 123\u{1}",
            ],
        );

        assert_eq!(
            events.lock().iter().map(Event::kind).collect::<Vec<_>>(),
            [
                EventKind::ChannelMessage,
                EventKind::PrivateMessage,
                EventKind::ChannelNotice,
                EventKind::PrivateNotice,
                EventKind::ServerNotice,
                EventKind::ServerNotice,
                EventKind::PrivateCtcp,
                EventKind::ChannelCtcp,
                EventKind::CtcpReply,
            ]
        );
    }

    #[test]
    fn commands_run_before_the_message_event() {
        let conn = test_connection();
        joined(&conn, "#a", &["alice"]);
        let order = Arc::new(Mutex::new(Vec::new()));
        conn.bus().subscribe_command(
            CommandTrigger::Exact(String::from("!hi")),
            MessageScope::Both,
            Requirement::NONE,
            {
                let order = Arc::clone(&order);
                move |_| {
                    order.lock().push("command");
                    Vec::new()
                }
            },
        );
        conn.bus().subscribe(EventKind::ChannelMessage, Requirement::NONE, {
            let order = Arc::clone(&order);
            move |_| {
                order.lock().push("message");
                Vec::new()
            }
        });

        handle_line(&conn, ":alice!~alice@alice.example PRIVMSG #a :!hi there");
        handle_line(&conn, ":alice!~alice@alice.example NOTICE #a :!hi there");
        assert_eq!(*order.lock(), ["command", "message"]);
    }

    #[test]
    fn topic_is_tracked() {
        let conn = test_connection();
        joined(&conn, "#a", &["alice"]);
        feed(
            &conn,
            &[
                ":srv.example 332 bot #a :welcome to a",
                ":alice!~alice@alice.example TOPIC #a :new topic",
            ],
        );
        assert_eq!(conn.directory().channels.get("#a").unwrap().topic, "new topic");
    }

    #[test]
    fn self_mode_is_a_server_mode_and_channel_mode_is_ignored() {
        let conn = test_connection();
        joined(&conn, "#a", &["alice"]);
        let events = record(&conn, &[EventKind::ServerMode]);
        feed(
            &conn,
            &[":bot MODE bot :+iw", ":alice!~alice@alice.example MODE #a +o bot"],
        );
        assert_eq!(
            *events.lock(),
            [Event::Server(ServerEvent::ServerMode {
                target: String::from("bot"),
                modes: vec![String::from("+iw")],
            })]
        );
    }

    #[test]
    fn garbage_is_dropped() {
        let conn = test_connection();
        feed(&conn, &[":only-a-source", "", ":a!b@c PRIVMSG", ":srv.example 999"]);
        assert!(conn.directory().users.is_empty());
    }
}
