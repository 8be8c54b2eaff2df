use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Upper bound on `max_poll_seconds`, one day
pub const MAX_POLL_SECONDS_CEILING: u64 = 24 * 60 * 60;

/// Server settings, read once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Messages kept per room before the oldest are evicted
    pub chat_history_limit: usize,
    /// Longest poll duration a teacher may ask for
    pub max_poll_seconds: u64,
    /// Recent client message ids remembered per sender
    pub dedup_window: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            chat_history_limit: 100,
            max_poll_seconds: 600,
            dedup_window: 32,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

impl ServerConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            host: env_or("HOST", defaults.host),
            port: env_or("PORT", defaults.port),
            chat_history_limit: env_or("CHAT_HISTORY_LIMIT", defaults.chat_history_limit)
                .max(1),
            max_poll_seconds: env_or("MAX_POLL_SECONDS", defaults.max_poll_seconds)
                .clamp(1, MAX_POLL_SECONDS_CEILING),
            dedup_window: env_or("DEDUP_WINDOW", defaults.dedup_window),
        };

        tracing::info!(
            host = %config.host,
            port = config.port,
            chat_history_limit = config.chat_history_limit,
            max_poll_seconds = config.max_poll_seconds,
            dedup_window = config.dedup_window,
            "Server config loaded"
        );

        config
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
