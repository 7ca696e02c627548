//! # Configuration
//!
//! `HostConfig` collects the knobs shared by the host and plugin runtimes. Values come
//! from `HostConfig::standard()` and can be overridden from the environment or through
//! `HostConfigBuilder`.

use std::time::Duration;

use plugrpc::codec::DEFAULT_MAX_FRAME_BYTES;

pub const ENV_CALL_TIMEOUT_MS: &str = "PLUGHOST_CALL_TIMEOUT_MS";
pub const ENV_MAX_FRAME_BYTES: &str = "PLUGHOST_MAX_FRAME_BYTES";
pub const ENV_RESTART_ATTEMPTS: &str = "PLUGHOST_RESTART_ATTEMPTS";
pub const ENV_RESTART_DELAY_MS: &str = "PLUGHOST_RESTART_DELAY_MS";
pub const ENV_LOG: &str = "PLUGHOST_LOG";
pub const ENV_APP_NAME: &str = "PLUGHOST_APP_NAME";
pub const ENV_LANGUAGE: &str = "PLUGHOST_LANGUAGE";

/// Values exposed to plugins through the `env` namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub app_name: String,
    pub language: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            app_name: "Plughost".into(),
            language: "en".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    /// Upper bound for one proxy call. `None` waits for the reply or for disconnection.
    pub call_timeout: Option<Duration>,
    pub max_frame_bytes: usize,
    /// How many times `restart` tries to bring the hosted instance back up.
    pub restart_attempts: u32,
    pub restart_delay: Duration,
    /// `tracing_subscriber::EnvFilter` directive used when `PLUGHOST_LOG` is unset.
    pub log_filter: String,
    pub env: EnvConfig,
}

impl HostConfig {
    pub fn standard() -> Self {
        Self {
            call_timeout: None,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            restart_attempts: 15,
            restart_delay: Duration::from_millis(500),
            log_filter: "info".into(),
            env: EnvConfig::default(),
        }
    }

    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder { config: Self::standard() }
    }

    /// Standard values overridden by `PLUGHOST_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Standard values overridden by whatever `lookup` returns.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::standard();

        if let Some(ms) = parse_number::<u64>(&lookup, ENV_CALL_TIMEOUT_MS) {
            config.call_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(bytes) = parse_number::<usize>(&lookup, ENV_MAX_FRAME_BYTES) {
            config.max_frame_bytes = bytes;
        }
        if let Some(attempts) = parse_number::<u32>(&lookup, ENV_RESTART_ATTEMPTS) {
            config.restart_attempts = attempts;
        }
        if let Some(ms) = parse_number::<u64>(&lookup, ENV_RESTART_DELAY_MS) {
            config.restart_delay = Duration::from_millis(ms);
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }
        if let Some(name) = lookup(ENV_APP_NAME) {
            config.env.app_name = name;
        }
        if let Some(language) = lookup(ENV_LANGUAGE) {
            config.env.language = language;
        }

        config
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::standard()
    }
}

fn parse_number<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}

/// Fluent overrides on top of `HostConfig::standard()`.
pub struct HostConfigBuilder {
    config: HostConfig,
}

impl HostConfigBuilder {
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = Some(timeout);
        self
    }

    pub fn max_frame_bytes(mut self, bytes: usize) -> Self {
        self.config.max_frame_bytes = bytes;
        self
    }

    pub fn restart_policy(mut self, attempts: u32, delay: Duration) -> Self {
        self.config.restart_attempts = attempts;
        self.config.restart_delay = delay;
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.log_filter = filter.into();
        self
    }

    pub fn env(mut self, app_name: impl Into<String>, language: impl Into<String>) -> Self {
        self.config.env = EnvConfig {
            app_name: app_name.into(),
            language: language.into(),
        };
        self
    }

    pub fn build(self) -> HostConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_standard_values() {
        let config = HostConfig::standard();
        assert_eq!(config.call_timeout, None);
        assert_eq!(config.restart_attempts, 15);
        assert_eq!(config.restart_delay, Duration::from_millis(500));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_lookup_overrides() {
        let config = HostConfig::from_lookup(lookup(&[
            (ENV_CALL_TIMEOUT_MS, "2500"),
            (ENV_RESTART_ATTEMPTS, "3"),
            (ENV_LOG, "plughost=debug"),
            (ENV_APP_NAME, "Theia"),
        ]));
        assert_eq!(config.call_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.restart_attempts, 3);
        assert_eq!(config.log_filter, "plughost=debug");
        assert_eq!(config.env.app_name, "Theia");
        assert_eq!(config.env.language, "en");
    }

    #[test]
    fn test_zero_timeout_disables_and_garbage_is_ignored() {
        let config = HostConfig::from_lookup(lookup(&[
            (ENV_CALL_TIMEOUT_MS, "0"),
            (ENV_MAX_FRAME_BYTES, "lots"),
        ]));
        assert_eq!(config.call_timeout, None);
        assert_eq!(config.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
    }

    #[test]
    fn test_builder() {
        let config = HostConfig::builder()
            .call_timeout(Duration::from_secs(1))
            .restart_policy(2, Duration::from_millis(10))
            .env("App", "de")
            .build();
        assert_eq!(config.call_timeout, Some(Duration::from_secs(1)));
        assert_eq!(config.restart_attempts, 2);
        assert_eq!(config.env.language, "de");
    }
}
