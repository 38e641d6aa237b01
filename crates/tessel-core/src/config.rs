//! Core configuration loaded from environment variables.
//!
//! Every setting has a default so a node can start with no configuration.

use std::path::PathBuf;
use std::time::Duration;

use tessel_shared::constants::{
    DEFAULT_DOWNLOAD_DIR, DEFAULT_GROUP_POLL_MS, DEFAULT_TICK_MS, DEFAULT_UNKNOWN_NAME,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Directory used when a transfer is accepted without a destination.
    /// Env: `TESSEL_DOWNLOAD_DIR`
    /// Default: `./downloads`
    pub download_dir: PathBuf,

    /// Host loop tick interval.
    /// Env: `TESSEL_TICK_MS`
    /// Default: 100 ms
    pub tick_interval: Duration,

    /// How often group member connection state is polled.
    /// Env: `TESSEL_GROUP_POLL_MS`
    /// Default: 1000 ms
    pub group_poll_interval: Duration,

    /// Display name used when the transport cannot report one.
    /// Env: `TESSEL_UNKNOWN_NAME`
    /// Default: `<unk>`
    pub unknown_name: String,

    /// Offers above this size are logged as suspicious. They are still
    /// recorded.
    /// Env: `TESSEL_MAX_OFFER_SIZE`
    /// Default: no limit
    pub max_offer_size: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
            group_poll_interval: Duration::from_millis(DEFAULT_GROUP_POLL_MS),
            unknown_name: DEFAULT_UNKNOWN_NAME.to_string(),
            max_offer_size: u64::MAX,
        }
    }
}

impl CoreConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CoreConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = var("TESSEL_DOWNLOAD_DIR") {
            if !dir.is_empty() {
                config.download_dir = PathBuf::from(dir);
            }
        }

        if let Some(ms) = parse_millis(&var, "TESSEL_TICK_MS") {
            config.tick_interval = ms;
        }

        if let Some(ms) = parse_millis(&var, "TESSEL_GROUP_POLL_MS") {
            config.group_poll_interval = ms;
        }

        if let Some(name) = var("TESSEL_UNKNOWN_NAME") {
            config.unknown_name = name;
        }

        if let Some(val) = var("TESSEL_MAX_OFFER_SIZE") {
            match val.parse::<u64>() {
                Ok(n) => config.max_offer_size = n,
                Err(e) => tracing::warn!(
                    value = %val,
                    error = %e,
                    "Invalid TESSEL_MAX_OFFER_SIZE, using default"
                ),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

fn parse_millis(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let val = var(key)?;
    match val.parse::<u64>() {
        Ok(0) => {
            tracing::warn!(key, "Interval must be non-zero, using default");
            None
        }
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(e) => {
            tracing::warn!(key, value = %val, error = %e, "Invalid interval, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.download_dir, PathBuf::from("./downloads"));
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.group_poll_interval, Duration::from_secs(1));
        assert_eq!(config.unknown_name, "<unk>");
        assert_eq!(config.max_offer_size, u64::MAX);
    }

    #[test]
    fn test_overrides() {
        let config = CoreConfig::from_lookup(lookup(&[
            ("TESSEL_DOWNLOAD_DIR", "/tmp/dl"),
            ("TESSEL_TICK_MS", "50"),
            ("TESSEL_GROUP_POLL_MS", "2500"),
            ("TESSEL_UNKNOWN_NAME", "?"),
            ("TESSEL_MAX_OFFER_SIZE", "4096"),
        ]));
        assert_eq!(config.download_dir, PathBuf::from("/tmp/dl"));
        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert_eq!(config.group_poll_interval, Duration::from_millis(2500));
        assert_eq!(config.unknown_name, "?");
        assert_eq!(config.max_offer_size, 4096);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = CoreConfig::from_lookup(lookup(&[
            ("TESSEL_TICK_MS", "soon"),
            ("TESSEL_GROUP_POLL_MS", "0"),
            ("TESSEL_MAX_OFFER_SIZE", "-1"),
        ]));
        assert_eq!(config, CoreConfig::default());
    }
}
