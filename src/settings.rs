//! Layered configuration for the recovery layer.
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables of the form `RECOURSE__<SECTION>__<KEY>`
//! (e.g. `RECOURSE__HANDLER__MAX_RETRIES=5`). Every key has a default, so an
//! empty configuration is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::handler::{FallbackContacts, HandlerOptions};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "RECOURSE";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// A source could not be read or did not match the expected shape.
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] ConfigError),

    /// The configuration file path is not valid UTF-8.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),
}

/// Offline fallback queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Directory holding the persisted queue.
    pub directory: PathBuf,
    /// Storage key; the queue file is `<directory>/<key>.json`.
    pub key: String,
    /// Most recent entries kept.
    pub capacity: usize,
    /// Replay attempts per entry before it is skipped.
    pub max_replay_retries: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".recourse"),
            key: "failed_submissions".to_string(),
            capacity: 5,
            max_replay_retries: 3,
        }
    }
}

/// Live-region announcer timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnnouncerSettings {
    pub debounce_ms: u64,
    pub clear_after_ms: u64,
}

impl Default for AnnouncerSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            clear_after_ms: 10_000,
        }
    }
}

impl AnnouncerSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn clear_after(&self) -> Duration {
        Duration::from_millis(self.clear_after_ms)
    }
}

/// HTTP submission settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout; expiry surfaces as a timeout failure.
    pub timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecourseConfig {
    pub handler: HandlerOptions,
    pub queue: QueueSettings,
    pub announcer: AnnouncerSettings,
    pub contacts: FallbackContacts,
    pub http: HttpSettings,
}

impl RecourseConfig {
    /// Loads configuration from `path` (if any) plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - an explicit path does not exist or is not valid UTF-8
    /// - a source cannot be parsed into the expected shape
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use recourse::settings::RecourseConfig;
    ///
    /// let config = RecourseConfig::load(Some("recourse.toml".as_ref()))?;
    /// # Ok::<(), recourse::settings::SettingsError>(())
    /// ```
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            let path_str = path
                .to_str()
                .ok_or_else(|| SettingsError::InvalidPath(format!("{:?}", path)))?;
            if !path.exists() {
                return Err(SettingsError::FileNotFound(path_str.to_string()));
            }
            builder = builder.add_source(File::with_name(path_str));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: RecourseConfig = config.try_deserialize()?;
        tracing::debug!(?settings, "configuration loaded");
        Ok(settings)
    }

    /// Path of the persisted fallback queue.
    pub fn queue_path(&self) -> PathBuf {
        self.queue
            .directory
            .join(format!("{}.json", self.queue.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::DisplayType;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RecourseConfig::default();
        assert_eq!(config.queue.capacity, 5);
        assert_eq!(config.queue.max_replay_retries, 3);
        assert_eq!(config.queue.key, "failed_submissions");
        assert_eq!(config.announcer.debounce(), Duration::from_millis(100));
        assert_eq!(config.announcer.clear_after(), Duration::from_secs(10));
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
        assert!(config.handler.auto_retry);
        assert_eq!(config.handler.max_retries, 3);
        assert_eq!(config.handler.default_display_type, DisplayType::Toast);
    }

    #[test]
    fn test_queue_path() {
        let config = RecourseConfig::default();
        assert_eq!(
            config.queue_path(),
            PathBuf::from(".recourse").join("failed_submissions.json")
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = RecourseConfig::load(Some(Path::new("/nonexistent/recourse.toml")));
        assert!(matches!(result, Err(SettingsError::FileNotFound(_))));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("recourse.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(
            file,
            r#"
[handler]
auto_retry = false
default_display_type = "banner"

[queue]
capacity = 8

[contacts]
phone = "+34 600 000 000"
"#
        )
        .expect("write");

        let config = RecourseConfig::load(Some(&path)).expect("load");
        assert!(!config.handler.auto_retry);
        assert_eq!(config.handler.default_display_type, DisplayType::Banner);
        assert_eq!(config.handler.max_retries, 3);
        assert_eq!(config.queue.capacity, 8);
        assert_eq!(config.queue.max_replay_retries, 3);
        assert_eq!(config.contacts.phone, "+34 600 000 000");
        assert_eq!(config.announcer, AnnouncerSettings::default());
    }

    #[test]
    fn test_invalid_value_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[queue]\ncapacity = \"many\"\n").expect("write");

        let result = RecourseConfig::load(Some(&path));
        assert!(matches!(result, Err(SettingsError::ParseError(_))));
    }
}
