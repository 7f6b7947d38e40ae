use core::time::Duration;
use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigErr {
    #[error("could not read {}: {}", .path.display(), .source)]
    Io { path: PathBuf, source: io::Error },
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no networks configured")]
    NoNetworks,
    #[error("network {0:?} has an empty nick")]
    EmptyNick(String),
    #[error("network {0:?} has an empty username")]
    EmptyUsername(String),
    #[error("network {0:?} has no hosts")]
    NoHosts(String),
    #[error("network {0:?} has port 0")]
    ZeroPort(String),
    #[error("network {0:?} is configured more than once")]
    DuplicateNetwork(String),
}

/// the whole bot: where to keep data and which networks to connect to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// registered user files live here, one per network
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub max_connections: Option<usize>,
    #[serde(default)]
    pub max_modules: Option<usize>,
    #[serde(rename = "network", default)]
    pub networks: Vec<NetworkConfig>,
}

/// connection parameters for one IRC network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub nick: String,
    /// tried when the server rejects `nick`
    #[serde(default)]
    pub alt_nick: String,
    pub username: String,
    #[serde(default)]
    pub realname: String,
    /// candidate hostnames, tried in order
    pub hosts: Vec<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub quit_message: Option<String>,
    /// joined after the server welcomes the bot
    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default = "default_retry_interval", with = "humantime_duration")]
    pub retry_interval: Duration,
    /// the send and receive timeout of the socket
    #[serde(default = "default_operation_timeout", with = "humantime_duration")]
    pub operation_timeout: Duration,
    #[serde(default = "default_send_inhibit", with = "humantime_duration")]
    pub send_inhibit: Duration,
    #[serde(default = "default_idle_delay", with = "humantime_duration")]
    pub idle_delay: Duration,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_port() -> u16 {
    6667
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_send_inhibit() -> Duration {
    Duration::from_millis(500)
}

fn default_idle_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_buffer_size() -> usize {
    4096
}

// durations are written the way humantime formats them, like "30s" or "1m 30s"
mod humantime_duration {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(d)?;
        humantime::parse_duration(&s).map_err(D::Error::custom)
    }
}

impl BotConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigErr> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigErr::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// parses and validates a config file's contents
    pub fn parse(text: &str) -> Result<Self, ConfigErr> {
        let config = toml::from_str::<Self>(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigErr> {
        if self.networks.is_empty() {
            return Err(ConfigErr::NoNetworks);
        }

        let mut names = HashSet::new();
        for network in &self.networks {
            network.validate()?;
            if !names.insert(network.name.as_str()) {
                return Err(ConfigErr::DuplicateNetwork(network.name.clone()));
            }
        }
        Ok(())
    }

    /// where the registered users of `network` are persisted
    pub fn registry_path(&self, network: &str) -> PathBuf {
        self.data_dir.join(format!("{}.users", network))
    }
}

impl NetworkConfig {
    /// a config for `name` with every optional field at its default
    pub fn new(name: impl Into<String>, nick: impl Into<String>, hosts: Vec<String>) -> Self {
        let nick = nick.into();
        Self {
            name: name.into(),
            alt_nick: String::new(),
            username: nick.clone(),
            realname: nick.clone(),
            nick,
            hosts,
            port: default_port(),
            quit_message: None,
            channels: Vec::new(),
            retry_interval: default_retry_interval(),
            operation_timeout: default_operation_timeout(),
            send_inhibit: default_send_inhibit(),
            idle_delay: default_idle_delay(),
            buffer_size: default_buffer_size(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigErr> {
        if self.nick.trim().is_empty() {
            return Err(ConfigErr::EmptyNick(self.name.clone()));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigErr::EmptyUsername(self.name.clone()));
        }
        if self.hosts.iter().all(|host| host.trim().is_empty()) {
            return Err(ConfigErr::NoHosts(self.name.clone()));
        }
        if self.port == 0 {
            return Err(ConfigErr::ZeroPort(self.name.clone()));
        }
        Ok(())
    }

    /// the realname sent at registration, falling back to the nick
    pub fn realname(&self) -> &str {
        if self.realname.is_empty() {
            &self.nick
        } else {
            &self.realname
        }
    }
}
