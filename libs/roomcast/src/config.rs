use std::time::Duration;

const DEFAULT_NAMESPACE: &str = "/";
const DEFAULT_WRITE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CONNECTION_BUFFER: usize = 256;

/// Fan-out configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Namespace identity stamped on every encoded packet.
    pub namespace: String,
    /// Upper bound on a single connection write during a broadcast.
    pub write_timeout: Duration,
    /// Outbound queue depth of a channel-backed connection.
    pub connection_buffer: usize,
}

impl FanoutConfig {
    /// Load configuration from `ROOMCAST_*` environment variables.
    /// Missing or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same rules as [`from_env`](Self::from_env), reading variables through `var`.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |name: &str| var(name).and_then(|v| v.trim().parse().ok());

        Self {
            namespace: var("ROOMCAST_NAMESPACE")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            write_timeout: Duration::from_millis(
                parsed("ROOMCAST_WRITE_TIMEOUT_MS").unwrap_or(DEFAULT_WRITE_TIMEOUT_MS),
            ),
            connection_buffer: parsed("ROOMCAST_CONNECTION_BUFFER")
                .and_then(|n: u64| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_CONNECTION_BUFFER),
        }
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
            connection_buffer: DEFAULT_CONNECTION_BUFFER,
        }
    }
}
