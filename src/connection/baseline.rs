//! the handlers every connection needs to stay registered and joined

use std::net::ToSocketAddrs;

use log::*;

use crate::{
    directory::Requirement,
    event::{
        CtcpEvent, CtcpKind, Event, EventBus, EventContext, EventKind, MembershipEvent,
        ServerEvent,
    },
    irc::{IrcHost, client::ClientCommand, ctcp::Ctcp},
};

const CTCP_CLIENTINFO: &str = "CLIENTINFO PING TIME VERSION";

type Handler = fn(&EventContext<'_>) -> Vec<ClientCommand>;

/// the baseline table. the handlers are attached in this order, before anything else.
const BASELINE: &[(EventKind, Handler)] = &[
    (EventKind::Connected, on_connected),
    (EventKind::Ping, on_ping),
    (EventKind::Welcome, on_welcome),
    (EventKind::NickNameInUse, on_nick_in_use),
    (EventKind::BotJoin, on_bot_join),
    (EventKind::ServerMode, on_server_mode),
    (EventKind::PrivateCtcp, on_ctcp_request),
];

pub(super) fn attach(bus: &EventBus) {
    for &(kind, handler) in BASELINE {
        bus.subscribe(kind, Requirement::NONE, handler);
    }
}

fn on_connected(ctx: &EventContext<'_>) -> Vec<ClientCommand> {
    let config = ctx.connection.config();
    ctx.connection.set_nick(config.nick.as_str());
    vec![
        ClientCommand::Nick(config.nick.clone()),
        ClientCommand::User {
            username: config.username.clone(),
            realname: config.realname().to_string(),
        },
    ]
}

fn on_ping(ctx: &EventContext<'_>) -> Vec<ClientCommand> {
    let Event::Server(ServerEvent::Ping { token }) = ctx.event else {
        return Vec::new();
    };
    vec![ClientCommand::Pong(token.clone())]
}

fn on_welcome(ctx: &EventContext<'_>) -> Vec<ClientCommand> {
    let Event::Server(ServerEvent::Welcome { nick, text }) = ctx.event else {
        return Vec::new();
    };
    info!("registered on {} as {}", ctx.connection.name(), nick);
    ctx.connection.set_nick(nick.as_str());

    // most servers end the welcome text with the full host of the client
    if let Some(host) = text
        .rsplit(' ')
        .next()
        .and_then(IrcHost::parse)
        .filter(|host| host.is_complete() && host.nick() == nick)
    {
        ctx.connection.set_own_host(host);
    }

    let channels = &ctx.connection.config().channels;
    if channels.is_empty() {
        Vec::new()
    } else {
        vec![ClientCommand::Join(channels.clone())]
    }
}

fn on_nick_in_use(ctx: &EventContext<'_>) -> Vec<ClientCommand> {
    let Event::Server(ServerEvent::NickNameInUse { nick }) = ctx.event else {
        return Vec::new();
    };
    let config = ctx.connection.config();
    let next = if *nick == config.nick && !config.alt_nick.is_empty() && config.alt_nick != *nick
    {
        config.alt_nick.clone()
    } else {
        format!("{}_", nick)
    };

    debug!("nick {} is taken, trying {}", nick, next);
    ctx.connection.set_nick(next.as_str());
    vec![ClientCommand::Nick(next)]
}

fn on_bot_join(ctx: &EventContext<'_>) -> Vec<ClientCommand> {
    let Event::Membership(MembershipEvent::BotJoin { channel }) = ctx.event else {
        return Vec::new();
    };
    vec![
        ClientCommand::Names(vec![channel.clone()]),
        ClientCommand::Who(channel.clone()),
    ]
}

fn on_server_mode(ctx: &EventContext<'_>) -> Vec<ClientCommand> {
    let conn = ctx.connection;
    if conn.external_ip().is_some() {
        return Vec::new();
    }
    let Some(own) = conn.own_host() else {
        debug!("own host is not known yet, not resolving external address");
        return Vec::new();
    };

    match (own.host(), 0).to_socket_addrs() {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => {
                info!("external address on {} is {}", conn.name(), addr.ip());
                conn.set_external_ip(addr.ip());
            }
            None => debug!("{} resolved to nothing", own.host()),
        },
        Err(e) => debug!("could not resolve own host {}: {}", own.host(), e),
    }
    Vec::new()
}

fn on_ctcp_request(ctx: &EventContext<'_>) -> Vec<ClientCommand> {
    let Event::Ctcp(CtcpEvent {
        kind: CtcpKind::Private,
        sender,
        ctcp,
        ..
    }) = ctx.event
    else {
        return Vec::new();
    };

    let reply = match ctcp.command.as_str() {
        "VERSION" => Ctcp::new(
            "VERSION",
            format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        ),
        "PING" => Ctcp::new("PING", ctcp.params.as_str()),
        "TIME" => Ctcp::new("TIME", chrono::Local::now().to_rfc2822()),
        "CLIENTINFO" => Ctcp::new("CLIENTINFO", CTCP_CLIENTINFO),
        other => {
            trace!("no reply to CTCP {} from {}", other, sender);
            return Vec::new();
        }
    };
    vec![ClientCommand::ctcp_reply(sender.nick(), &reply)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::NetworkConfig,
        connection::{test_connection, test_connection_with},
        directory::PrivilegeContainer,
    };

    fn run(conn: &crate::connection::Connection, event: Event) -> Vec<String> {
        conn.bus()
            .raise(conn, &event, &PrivilegeContainer::default())
            .into_iter()
            .map(|command| command.irc_str().unwrap())
            .collect()
    }

    #[test]
    fn handshake_and_pong() {
        let conn = test_connection();
        assert_eq!(
            run(&conn, Event::Server(ServerEvent::Connected)),
            ["NICK bot", "USER bot 0 * :bot"]
        );
        assert_eq!(
            run(
                &conn,
                Event::Server(ServerEvent::Ping {
                    token: String::from("irc.example")
                })
            ),
            ["PONG :irc.example"]
        );
    }

    #[test]
    fn welcome_joins_and_records_host() {
        let mut config = NetworkConfig::new("n", "bot", vec![String::from("h")]);
        config.channels = vec![String::from("#a"), String::from("#b")];
        let conn = test_connection_with(config);

        let replies = run(
            &conn,
            Event::Server(ServerEvent::Welcome {
                nick: String::from("bot_"),
                text: String::from("Welcome to Example bot_!~bot@198.51.100.7"),
            }),
        );
        assert_eq!(replies, ["JOIN #a,#b"]);
        assert_eq!(conn.nick(), "bot_");
        assert_eq!(conn.own_host().unwrap().host(), "198.51.100.7");

        // the first self mode resolves the address once
        run(
            &conn,
            Event::Server(ServerEvent::ServerMode {
                target: String::from("bot_"),
                modes: vec![String::from("+i")],
            }),
        );
        assert_eq!(
            conn.external_ip(),
            Some("198.51.100.7".parse().unwrap())
        );
    }

    #[test]
    fn nick_collision_falls_back() {
        let mut config = NetworkConfig::new("n", "bot", vec![String::from("h")]);
        config.alt_nick = String::from("botty");
        let conn = test_connection_with(config);

        let in_use = |nick: &str| {
            Event::Server(ServerEvent::NickNameInUse {
                nick: nick.to_string(),
            })
        };
        assert_eq!(run(&conn, in_use("bot")), ["NICK botty"]);
        assert_eq!(run(&conn, in_use("botty")), ["NICK botty_"]);
        assert_eq!(run(&conn, in_use("botty_")), ["NICK botty__"]);
        assert_eq!(conn.nick(), "botty__");
    }

    #[test]
    fn bot_join_probes_channel() {
        let conn = test_connection();
        assert_eq!(
            run(
                &conn,
                Event::Membership(MembershipEvent::BotJoin {
                    channel: String::from("#a")
                })
            ),
            ["NAMES #a", "WHO #a"]
        );
    }

    #[test]
    fn ctcp_requests_get_replies() {
        let conn = test_connection();
        let request = |command: &str, params: &str| {
            Event::Ctcp(CtcpEvent {
                kind: CtcpKind::Private,
                sender: IrcHost::new("alice", "~a", "h"),
                target: String::from("bot"),
                ctcp: Ctcp::new(command, params),
            })
        };

        assert_eq!(
            run(&conn, request("PING", "12345")),
            ["NOTICE alice :\u{1}PING 12345\u{1}"]
        );
        assert_eq!(
            run(&conn, request("CLIENTINFO", "")),
            ["NOTICE alice :\u{1}CLIENTINFO CLIENTINFO PING TIME VERSION\u{1}"]
        );
        let version = run(&conn, request("VERSION", ""));
        assert!(version[0].starts_with("NOTICE alice :\u{1}VERSION irc_bot "));
        assert!(run(&conn, request("FINGER", "")).is_empty());
    }
}
