//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so the client starts with no configuration.

use std::path::PathBuf;
use std::time::Duration;

use peerchat_net::TransportConfig;
use peerchat_shared::constants::DEFAULT_STUN_URL;

/// Default bound on waiting for the data channel to open.
pub const DEFAULT_OPEN_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path of the SQLite database.
    /// Env: `PEERCHAT_DB_PATH`
    /// Default: `peerchat.db` in the platform data directory.
    pub db_path: Option<PathBuf>,

    /// STUN server used for candidate gathering.
    /// Env: `PEERCHAT_STUN_URL`
    /// Default: `stun:stun.l.google.com:19302`
    pub stun_url: String,

    /// Upper bound on candidate gathering.
    /// Env: `PEERCHAT_GATHER_TIMEOUT_SECS`
    /// Default: unset (wait for the completion signal).
    pub gather_timeout: Option<Duration>,

    /// Upper bound on waiting for the channel to open.
    /// Env: `PEERCHAT_OPEN_TIMEOUT_SECS` (`0` disables)
    /// Default: 120 seconds.
    pub open_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            stun_url: DEFAULT_STUN_URL.to_string(),
            gather_timeout: None,
            open_timeout: Some(Duration::from_secs(DEFAULT_OPEN_TIMEOUT_SECS)),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("PEERCHAT_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(url) = lookup("PEERCHAT_STUN_URL") {
            if url.starts_with("stun:") || url.starts_with("turn:") {
                config.stun_url = url;
            } else {
                tracing::warn!(value = %url, "Invalid PEERCHAT_STUN_URL, using default");
            }
        }

        if let Some(raw) = lookup("PEERCHAT_GATHER_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(0) => config.gather_timeout = None,
                Ok(secs) => config.gather_timeout = Some(Duration::from_secs(secs)),
                Err(_) => {
                    tracing::warn!(value = %raw, "Invalid PEERCHAT_GATHER_TIMEOUT_SECS, ignoring")
                }
            }
        }

        if let Some(raw) = lookup("PEERCHAT_OPEN_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(0) => config.open_timeout = None,
                Ok(secs) => config.open_timeout = Some(Duration::from_secs(secs)),
                Err(_) => {
                    tracing::warn!(value = %raw, "Invalid PEERCHAT_OPEN_TIMEOUT_SECS, using default")
                }
            }
        }

        config
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            ice_urls: vec![self.stun_url.clone()],
            gather_timeout: self.gather_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ClientConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert!(config.db_path.is_none());
        assert_eq!(config.stun_url, DEFAULT_STUN_URL);
        assert_eq!(config.gather_timeout, None);
        assert_eq!(config.open_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.transport().ice_urls, vec![DEFAULT_STUN_URL.to_string()]);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PEERCHAT_DB_PATH", "/tmp/chat.db"),
            ("PEERCHAT_STUN_URL", "stun:stun.example.org:3478"),
            ("PEERCHAT_GATHER_TIMEOUT_SECS", "10"),
            ("PEERCHAT_OPEN_TIMEOUT_SECS", "0"),
        ]);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/chat.db")));
        assert_eq!(config.stun_url, "stun:stun.example.org:3478");
        assert_eq!(config.gather_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.open_timeout, None);
    }

    #[test]
    fn test_invalid_values_ignored() {
        let config = config_from(&[
            ("PEERCHAT_STUN_URL", "http://nope"),
            ("PEERCHAT_OPEN_TIMEOUT_SECS", "soon"),
        ]);
        assert_eq!(config.stun_url, DEFAULT_STUN_URL);
        assert_eq!(config.open_timeout, Some(Duration::from_secs(120)));
    }
}
