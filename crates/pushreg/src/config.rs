//! Push manager configuration.

use crate::error::{ManagerError, ManagerResult};
use pushreg_sync_engine::{SyncConfig, TrackerConfig};

/// Default API host.
pub const DEFAULT_API_HOST: &str = "https://api.push.example.com";

/// How much the client logs.
///
/// Binaries turn this into a `tracing_subscriber::EnvFilter` via
/// [`directive`](Self::directive); the library itself only emits events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DebugLevel {
    /// Nothing.
    None,
    /// Errors only.
    #[default]
    ErrorsOnly,
    /// Registration and tracking activity.
    Activity,
    /// Everything.
    Verbose,
}

impl DebugLevel {
    /// Returns the filter directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            Self::None => "off",
            Self::ErrorsOnly => "error",
            Self::Activity => "info",
            Self::Verbose => "trace",
        }
    }

    /// Maps a `-v` count to a level.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => Self::ErrorsOnly,
            1 => Self::Activity,
            _ => Self::Verbose,
        }
    }
}

/// Configuration for a [`PushManager`](crate::PushManager).
#[derive(Clone)]
pub struct ManagerConfig {
    /// Application API key.
    pub api_key: String,
    /// API host.
    pub api_host: String,
    /// Time zone reported instead of the local one.
    pub time_zone: Option<String>,
    /// Logging level.
    pub debug_level: DebugLevel,
    /// Registration sync settings.
    pub sync: SyncConfig,
    /// Engagement tracker settings.
    pub tracker: TrackerConfig,
}

impl std::fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_host", &self.api_host)
            .field("time_zone", &self.time_zone)
            .field("debug_level", &self.debug_level)
            .field("sync", &self.sync)
            .field("tracker", &self.tracker)
            .finish()
    }
}

/// Masks all but the first four characters of a credential.
pub(crate) fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    if prefix.len() == secret.len() {
        return "***".to_string();
    }
    format!("{prefix}***")
}

impl ManagerConfig {
    /// Creates a configuration for `api_key` against the default host.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_host: DEFAULT_API_HOST.to_string(),
            time_zone: None,
            debug_level: DebugLevel::default(),
            sync: SyncConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }

    /// Overrides the API host.
    #[must_use]
    pub fn with_api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = host.into();
        self
    }

    /// Overrides the reported time zone.
    #[must_use]
    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    /// Sets the logging level.
    #[must_use]
    pub fn with_debug_level(mut self, level: DebugLevel) -> Self {
        self.debug_level = level;
        self
    }

    /// Sets the sync settings.
    #[must_use]
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Sets the tracker settings.
    #[must_use]
    pub fn with_tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }

    /// Checks the configuration.
    pub fn validate(&self) -> ManagerResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(ManagerError::InvalidConfig("API key must not be empty".into()));
        }
        if !(self.api_host.starts_with("https://") || self.api_host.starts_with("http://")) {
            return Err(ManagerError::InvalidConfig(format!(
                "API host must be an http(s) URL: {}",
                self.api_host
            )));
        }
        if matches!(&self.time_zone, Some(tz) if tz.trim().is_empty()) {
            return Err(ManagerError::InvalidConfig("time zone must not be empty".into()));
        }
        if self.tracker.capacity == 0 || self.tracker.batch_size == 0 {
            return Err(ManagerError::InvalidConfig(
                "tracker capacity and batch size must be positive".into(),
            ));
        }
        Ok(())
    }
}
