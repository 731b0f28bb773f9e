use directories::BaseDirs;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportPreference {
    Persistent,
    RequestOnly,
}

/// User-tunable generation and transport settings.
///
/// Every field carries a serde default, so loading a partially persisted
/// value is a shallow merge: keys absent from disk resolve to the documented
/// defaults, present keys override them. Values are persisted as-is; the
/// documented ranges (temperature in [0, 2], max_length > 0) are not
/// enforced here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "Settings::default_temperature")]
    pub temperature: f32,
    #[serde(default = "Settings::default_max_length")]
    pub max_length: u32,
    #[serde(default = "Settings::default_transport_preference")]
    pub transport_preference: TransportPreference,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temperature: Settings::default_temperature(),
            max_length: Settings::default_max_length(),
            transport_preference: Settings::default_transport_preference(),
        }
    }
}

impl Settings {
    fn default_temperature() -> f32 {
        0.7
    }

    fn default_max_length() -> u32 {
        1000
    }

    fn default_transport_preference() -> TransportPreference {
        TransportPreference::Persistent
    }
}

/// Owner of the persisted [`Settings`] value.
///
/// Reads merge persisted overrides onto defaults; writes persist the full
/// value (last-write-wins, single logical writer). Persistence failures are
/// logged and swallowed — the in-memory value stays authoritative.
#[derive(Clone)]
pub struct SettingsStore {
    path: PathBuf,
    current: Arc<RwLock<Settings>>,
}

impl SettingsStore {
    /// Load from the given file, falling back to defaults when the file is
    /// missing or unreadable.
    pub async fn load(path: PathBuf) -> Self {
        let settings = read_json_file(&path).await.unwrap_or_default();
        Self {
            path,
            current: Arc::new(RwLock::new(settings)),
        }
    }

    /// Load from the platform config directory.
    pub async fn load_default() -> Self {
        Self::load(config_dir().join("settings.json")).await
    }

    pub fn current(&self) -> Settings {
        self.current.read().clone()
    }

    /// Persist the full value. A later [`SettingsStore::load`] of the same
    /// path observes exactly what was written.
    pub async fn save(&self, settings: Settings) {
        *self.current.write() = settings.clone();
        write_json_file(&self.path, &settings).await;
    }
}

/// Read a JSON value from disk, tolerating absence and corruption.
///
/// Shared by [`SettingsStore`] and the view layer's theme key, which uses
/// the same persistence mechanism.
pub async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Option<T> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = ?err, path = %path.display(), "failed to parse persisted value, using defaults");
                None
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            warn!(error = ?err, path = %path.display(), "failed to read persisted value, using defaults");
            None
        }
    }
}

/// Write a JSON value to disk; failures are logged and swallowed.
pub async fn write_json_file<T: Serialize>(path: &Path, value: &T) {
    if let Some(parent) = path.parent() {
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            warn!(error = ?err, path = %parent.display(), "failed to create config directory");
            return;
        }
    }
    let serialized = match serde_json::to_string_pretty(value) {
        Ok(serialized) => serialized,
        Err(err) => {
            warn!(error = ?err, "failed to serialize persisted value");
            return;
        }
    };
    if let Err(err) = tokio::fs::write(path, serialized).await {
        warn!(error = ?err, path = %path.display(), "failed to write persisted value");
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(base) = BaseDirs::new() {
        base.config_dir().join("tether")
    } else {
        PathBuf::from(".tether")
    }
}
