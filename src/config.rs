use std::{fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{anyhow, ensure};

/// Knobs of the chat core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub max_message_len: usize,
    pub rate_limit_window_ms: i64,
    pub rate_limit_max_messages: u32,
    /// Room messages are escaped like global ones unless this is off.
    pub escape_room_messages: bool,
    /// Frames a connection may have queued before it is dropped as stalled.
    pub outbox_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_len: 500,
            rate_limit_window_ms: 1000,
            rate_limit_max_messages: 5,
            escape_room_messages: true,
            outbox_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub chat: ChatConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3000,
            static_dir: PathBuf::from("frontend"),
            chat: ChatConfig::default(),
        }
    }
}

impl Config {
    /// Reads the process environment (and `.env`, if loaded) over the defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Config::default();
        let chat = ChatConfig {
            max_message_len: parse(&lookup, "MAX_MESSAGE_LEN", defaults.chat.max_message_len)?,
            rate_limit_window_ms: parse(&lookup, "RATE_LIMIT_WINDOW_MS", defaults.chat.rate_limit_window_ms)?,
            rate_limit_max_messages: parse(&lookup, "RATE_LIMIT_MAX_MESSAGES", defaults.chat.rate_limit_max_messages)?,
            escape_room_messages: parse(&lookup, "ESCAPE_ROOM_MESSAGES", defaults.chat.escape_room_messages)?,
            outbox_capacity: parse(&lookup, "OUTBOX_CAPACITY", defaults.chat.outbox_capacity)?,
        };
        ensure!(chat.outbox_capacity > 0, "OUTBOX_CAPACITY must be at least 1");

        Ok(Config {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT", defaults.port)?,
            static_dir: lookup("STATIC_DIR").map(PathBuf::from).unwrap_or(defaults.static_dir),
            chat,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err| anyhow!("invalid {key}={raw:?}: {err}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(Config::from_lookup(lookup(&[])).unwrap(), Config::default());
    }

    #[test]
    fn overrides_from_env() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("MAX_MESSAGE_LEN", "140"),
            ("ESCAPE_ROOM_MESSAGES", "false"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.chat.max_message_len, 140);
        assert!(!config.chat.escape_room_messages);
        assert_eq!(config.chat.rate_limit_max_messages, 5);
    }

    #[test]
    fn bad_values_are_errors() {
        let err = Config::from_lookup(lookup(&[("PORT", "lots")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err = Config::from_lookup(lookup(&[("OUTBOX_CAPACITY", "0")])).unwrap_err();
        assert!(err.to_string().contains("OUTBOX_CAPACITY"));
    }
}
