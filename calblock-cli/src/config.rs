//! Daemon configuration at ~/.config/calblock/config.toml

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use calblock_core::{CalBlockError, CalBlockResult};
use serde::Deserialize;

#[cfg(windows)]
static DEFAULT_HOSTS_PATH: &str = r"C:\Windows\System32\drivers\etc\hosts";
#[cfg(not(windows))]
static DEFAULT_HOSTS_PATH: &str = "/etc/hosts";

fn default_tick_secs() -> u64 {
    30
}

fn default_sync_secs() -> u64 {
    300
}

fn default_lookahead_days() -> i64 {
    7
}

fn default_redirect_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_hosts_path() -> PathBuf {
    PathBuf::from(DEFAULT_HOSTS_PATH)
}

fn default_unblock_timeout_secs() -> u64 {
    30
}

/// Daemon configuration. Only `feed_url` is required; everything else has
/// a sensible default.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Private ICS subscription URL (webcal:// or https://).
    pub feed_url: String,

    /// How often the scheduler evaluates the timeline. Must be at most the
    /// shortest expected event granularity or transitions get missed.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// How often the feed is refetched (a multiple of the tick interval).
    #[serde(default = "default_sync_secs")]
    pub sync_secs: u64,

    /// Sync window: events within ±lookahead_days of now are kept.
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: i64,

    #[serde(default = "default_redirect_ip")]
    pub redirect_ip: String,

    #[serde(default = "default_hosts_path")]
    pub hosts_path: PathBuf,

    /// Upper bound on the shutdown unblock-all pass.
    #[serde(default = "default_unblock_timeout_secs")]
    pub unblock_timeout_secs: u64,
}

impl Config {
    pub fn config_path() -> CalBlockResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalBlockError::Config("Could not determine config directory".into()))?
            .join("calblock");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing file or a missing/empty `feed_url` is fatal: the daemon
    /// cannot do anything safe without a feed to follow.
    pub fn load(path: Option<&Path>) -> CalBlockResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            CalBlockError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| CalBlockError::Config(format!("Invalid {}: {}", path.display(), e)))?;

        if config.feed_url.trim().is_empty() {
            return Err(CalBlockError::Config(format!(
                "feed_url is empty in {}",
                path.display()
            )));
        }

        Ok(config)
    }

    /// Verify we can actually edit the hosts file before entering the loop.
    ///
    /// Blocking requires elevated privileges; discovering that mid-event
    /// would leave the user believing they are blocked when they are not.
    pub fn ensure_hosts_writable(&self) -> CalBlockResult<()> {
        OpenOptions::new()
            .append(true)
            .open(&self.hosts_path)
            .map_err(|e| {
                CalBlockError::Config(format!(
                    "Cannot write {} ({}). Run calblock with elevated privileges.",
                    self.hosts_path.display(),
                    e
                ))
            })?;
        Ok(())
    }
}
