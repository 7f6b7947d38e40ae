use core::{fmt, str::FromStr};

use thiserror::Error;

macro_rules! event_kinds {
    ($($kind:ident => $name:literal),* $(,)?) => {
        /// every event a connection can raise. subscriptions are keyed by this.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EventKind {
            $($kind,)*
        }

        impl EventKind {
            pub const ALL: &'static [EventKind] = &[$(EventKind::$kind,)*];

            /// the stable name modules subscribe with
            pub fn name(self) -> &'static str {
                match self {
                    $(EventKind::$kind => $name,)*
                }
            }
        }

        impl FromStr for EventKind {
            type Err = UnknownEventErr;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(EventKind::$kind),)*
                    _ => Err(UnknownEventErr(s.to_string())),
                }
            }
        }
    };
}

event_kinds! {
    Connected => "Connected",
    Disconnected => "Disconnected",
    Ping => "Ping",
    Welcome => "Welcome",
    Names => "Names",
    NickNameInUse => "Err_NickNameInUse",
    ServerMode => "ServerModeMessage",
    ServerNotice => "ServerNotice",
    Topic => "Topic",

    Join => "Join",
    BotJoin => "BotJoin",
    Part => "Part",
    BotPart => "BotPart",
    Quit => "Quit",
    NickName => "NickName",
    BotNickName => "BotNickName",

    ChannelMessage => "ChannelMessage",
    PrivateMessage => "PrivateMessage",
    ChannelNotice => "ChannelNotice",
    PrivateNotice => "PrivateNotice",

    ChannelCtcp => "ChannelCtcp",
    PrivateCtcp => "PrivateCtcp",
    CtcpReply => "CtcpReply",
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown event {0:?}")]
pub struct UnknownEventErr(pub String);

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.name().parse::<EventKind>(), Ok(*kind));
        }
        assert_eq!(
            "Err_NickNameInUse".parse::<EventKind>(),
            Ok(EventKind::NickNameInUse)
        );
        assert_eq!(
            "channelmessage".parse::<EventKind>(),
            Err(UnknownEventErr(String::from("channelmessage")))
        );
    }
}
