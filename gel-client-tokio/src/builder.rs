use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Process-wide random source for reconnection jitter.
///
/// Connections may back off concurrently from many tasks, so the rng
/// lives behind a lock rather than in task-local state.
static JITTER_RNG: LazyLock<Mutex<StdRng>> = LazyLock::new(|| Mutex::new(StdRng::from_os_rng()));

/// Ready-made connection options.
///
/// DSN and environment parsing happen in the configuration layer; this
/// struct is its output.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    pub password: Option<String>,
    pub secret_key: Option<String>,
    /// Additional handshake parameters, forwarded verbatim.
    pub extra_params: HashMap<String, String>,
    pub connect_timeout: Duration,
    pub wait_until_available: Duration,
}

impl Config {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        database: impl Into<String>,
    ) -> Config {
        Config {
            host: host.into(),
            port,
            user: user.into(),
            database: database.into(),
            password: None,
            secret_key: None,
            extra_params: HashMap::new(),
            connect_timeout: Duration::from_secs(10),
            wait_until_available: Duration::from_secs(30),
        }
    }
    pub fn with_password(mut self, password: impl Into<String>) -> Config {
        self.password = Some(password.into());
        self
    }
    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Config {
        self.secret_key = Some(secret_key.into());
        self
    }
    /// The key-value map sent in the client handshake.
    pub(crate) fn handshake_params(&self) -> HashMap<String, String> {
        let mut params = self.extra_params.clone();
        params.insert("user".into(), self.user.clone());
        params.insert("database".into(), self.database.clone());
        if let Some(secret_key) = &self.secret_key {
            params.insert("secret_key".into(), secret_key.clone());
        }
        params
    }
}

/// Reconnection pacing for callers that retry failed connects.
#[derive(Debug, Clone, Copy)]
pub struct RetryOptions {
    pub attempts: u32,
}

impl Default for RetryOptions {
    fn default() -> RetryOptions {
        RetryOptions { attempts: 3 }
    }
}

impl RetryOptions {
    /// Exponential backoff with jitter, starting at 100ms.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = 100u64.saturating_mul(1 << attempt.min(10));
        Duration::from_millis(base + jitter_millis(base))
    }
}

fn jitter_millis(range: u64) -> u64 {
    if range == 0 {
        return 0;
    }
    JITTER_RNG
        .lock()
        .expect("jitter rng poisoned")
        .random_range(0..range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows() {
        let retry = RetryOptions::default();
        for attempt in 0..5 {
            let d = retry.backoff(attempt);
            assert!(d >= Duration::from_millis(100 << attempt));
            assert!(d < Duration::from_millis(2 * (100 << attempt)));
        }
    }

    #[test]
    fn handshake_params_forward_extras() {
        let mut config = Config::new("localhost", 5656, "edgedb", "main");
        config
            .extra_params
            .insert("application_name".into(), "test".into());
        let params = config.handshake_params();
        assert_eq!(params.get("user").map(|s| &s[..]), Some("edgedb"));
        assert_eq!(params.get("database").map(|s| &s[..]), Some("main"));
        assert_eq!(params.get("application_name").map(|s| &s[..]), Some("test"));
        assert!(!params.contains_key("secret_key"));
    }
}
