use std::env;
use std::time::Duration;

use crate::chat::DEFAULT_CHAT_CAPACITY;
use crate::clock::TimeMode;
use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 5555;

pub const PORT_VAR: &str = "CHESS_PORT";
pub const TIME_MODE_VAR: &str = "CHESS_TIME_MODE";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub time_mode: TimeMode,
    /// Socket read timeout; bounds how long a receiver takes to notice `stop`.
    pub read_timeout: Duration,
    /// Bounds how long a send may block on a peer that stopped reading.
    pub write_timeout: Duration,
    pub accept_poll: Duration,
    pub connect_timeout: Duration,
    pub stop_timeout: Duration,
    pub tick_interval: Duration,
    pub chat_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            port: DEFAULT_PORT,
            time_mode: TimeMode::Standard,
            read_timeout: Duration::from_millis(100),
            write_timeout: Duration::from_secs(5),
            accept_poll: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(2),
            tick_interval: Duration::from_millis(100),
            chat_capacity: DEFAULT_CHAT_CAPACITY,
        }
    }
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort(value.to_string()))
}

impl Settings {
    /// Defaults overridden by `CHESS_PORT` and `CHESS_TIME_MODE`. Bad values
    /// are logged and ignored.
    pub fn from_env() -> Settings {
        Settings::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Settings {
        let mut settings = Settings::default();
        if let Some(value) = lookup(PORT_VAR) {
            match parse_port(&value) {
                Ok(port) => settings.port = port,
                Err(e) => log::warn!("{}, using {}", e, settings.port),
            }
        }
        if let Some(value) = lookup(TIME_MODE_VAR) {
            match value.parse::<TimeMode>() {
                Ok(mode) => settings.time_mode = mode,
                Err(e) => log::warn!("{}, using {}", e, settings.time_mode),
            }
        }
        log::debug!("Settings: {:?}", settings);
        settings
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use crate::clock::TimeMode;
    use crate::config::{Settings, DEFAULT_PORT, PORT_VAR, TIME_MODE_VAR};

    #[test]
    fn test_overrides() {
        let vars = HashMap::from([(PORT_VAR, "6000"), (TIME_MODE_VAR, "blitz")]);
        let settings = Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(settings.port, 6000);
        assert_eq!(settings.time_mode, TimeMode::Blitz);
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let vars = HashMap::from([(PORT_VAR, "99999"), (TIME_MODE_VAR, "bullet")]);
        let settings = Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.time_mode, TimeMode::Standard);
        assert_eq!(Settings::from_lookup(|_| None), Settings::default());
    }
}
