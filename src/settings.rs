use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

const ENV_BACKEND_URL: &str = "CLUBHOUSE_BACKEND_URL";
const ENV_API_KEY: &str = "CLUBHOUSE_API_KEY";
const ENV_ACCESS_TOKEN: &str = "CLUBHOUSE_ACCESS_TOKEN";
const ENV_DEBUG: &str = "CLUBHOUSE_DEBUG";

const DEBUG_HEARTBEAT_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendSettings {
    pub url: String,
    pub api_key: String,
    pub access_token: Option<String>,
    /// Upper bound on a single remote call, connect included.
    pub request_timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            access_token: None,
            request_timeout_secs: 10,
        }
    }
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    pub heartbeat_interval_secs: u64,
    /// Flushes shorter than this are dropped instead of reported.
    pub min_flush_minutes: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 5 * 60,
            min_flush_minutes: 5,
        }
    }
}

impl SessionSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Reporting floor for a flush. Absurd values saturate instead of wrapping.
    pub fn min_flush(&self) -> chrono::Duration {
        let minutes = i64::try_from(self.min_flush_minutes).unwrap_or(i64::MAX);
        chrono::Duration::try_minutes(minutes).unwrap_or(chrono::Duration::MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PresenceSettings {
    pub channel: String,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            channel: "online-users".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecorderSettings {
    /// Tag attached to finished recordings for the upload.
    pub mime_type: String,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            mime_type: "audio/webm".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    pub backend: BackendSettings,
    pub session: SessionSettings,
    pub presence: PresenceSettings,
    pub recorder: RecorderSettings,
}

impl ClientSettings {
    /// Apply `CLUBHOUSE_*` environment overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend.url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.backend.api_key = key;
        }
        if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
            self.backend.access_token = Some(token);
        }

        let debug_mode = lookup(ENV_DEBUG)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            self.session.heartbeat_interval_secs = DEBUG_HEARTBEAT_SECS;
        }
    }
}

/// JSON-backed settings file. A missing or unparsable file yields defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ClientSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    log::warn!(
                        "Ignoring malformed settings at {}: {}",
                        path.display(),
                        err
                    );
                    ClientSettings::default()
                }
            }
        } else {
            ClientSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> ClientSettings {
        self.read().clone()
    }

    pub fn update_backend(&self, backend: BackendSettings) -> Result<()> {
        let mut guard = self.write();
        guard.backend = backend;
        self.persist(&guard)
    }

    pub fn update_session(&self, session: SessionSettings) -> Result<()> {
        let mut guard = self.write();
        guard.session = session;
        self.persist(&guard)
    }

    pub fn update_recorder(&self, recorder: RecorderSettings) -> Result<()> {
        let mut guard = self.write();
        guard.recorder = recorder;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: ClientSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings at {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &ClientSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, ClientSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, ClientSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
