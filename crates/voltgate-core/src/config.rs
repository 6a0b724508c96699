//! Durable configuration: gateway settings plus the automation rule set.
//!
//! Everything lives in one JSON document so a whole-collection save is a
//! single atomic file replace. The on-disk shape is versioned:
//!
//! ```json
//! {
//!   "version": 1,
//!   "data": {
//!     "settings": { "selected_provider": "tessie", ... },
//!     "rules": [ ... ]
//!   }
//! }
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::{AutomationRule, GatewayError, ProviderKind, VehicleId};

/// Current on-disk schema version.
pub const CONFIG_VERSION: u32 = 1;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "VOLTGATE_CONFIG";

pub const DEFAULT_CONFIG_PATH: &str = "voltgate.json";

/// Configuration persistence errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

impl From<ConfigError> for GatewayError {
    fn from(error: ConfigError) -> Self {
        GatewayError::internal(format!("config store: {error}"))
    }
}

/// User-tunable gateway settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Preferred provider; initialization tries it first.
    #[serde(default)]
    pub selected_provider: Option<ProviderKind>,
    #[serde(default)]
    pub tessie_api_key: Option<String>,
    #[serde(default)]
    pub teslafi_api_key: Option<String>,
    /// Vehicle targeted by automation rules and bare CLI commands.
    #[serde(default)]
    pub default_vehicle: Option<VehicleId>,
    #[serde(default = "default_pass_interval")]
    pub state_pass_interval_secs: u64,
    #[serde(default = "default_pass_interval")]
    pub time_pass_interval_secs: u64,
}

fn default_pass_interval() -> u64 {
    60
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            selected_provider: None,
            tessie_api_key: None,
            teslafi_api_key: None,
            default_vehicle: None,
            state_pass_interval_secs: default_pass_interval(),
            time_pass_interval_secs: default_pass_interval(),
        }
    }
}

impl GatewaySettings {
    pub fn api_key_for(&self, provider: ProviderKind) -> Option<&str> {
        match provider {
            ProviderKind::Tessie => self.tessie_api_key.as_deref(),
            ProviderKind::Teslafi => self.teslafi_api_key.as_deref(),
        }
    }

    /// A provider is selected with its key present and a default vehicle
    /// is set.
    pub fn is_configured(&self) -> bool {
        let keyed = self
            .selected_provider
            .map(|provider| self.api_key_for(provider).is_some())
            .unwrap_or(false);
        keyed && self.default_vehicle.is_some()
    }
}

/// The full persisted document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(default)]
    pub settings: GatewaySettings,
    #[serde(default)]
    pub rules: Vec<AutomationRule>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    version: u32,
    data: ConfigData,
}

/// Persistence contract for settings and rules.
///
/// Saves replace their whole section; partial updates are the caller's
/// responsibility (read, modify, save).
pub trait ConfigStore: Send + Sync {
    fn load<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<ConfigData, ConfigError>> + Send + 'a>>;

    fn save_settings<'a>(
        &'a self,
        settings: GatewaySettings,
    ) -> Pin<Box<dyn Future<Output = Result<(), ConfigError>> + Send + 'a>>;

    fn save_rules<'a>(
        &'a self,
        rules: Vec<AutomationRule>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ConfigError>> + Send + 'a>>;
}

/// File-backed store. Writes go to a temp file first, then an atomic
/// rename, so a crash mid-save never truncates the config.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the path from `VOLTGATE_CONFIG`, falling back to
    /// `voltgate.json` in the working directory.
    pub fn from_env() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::new(path)
    }

    async fn read(&self) -> Result<ConfigData, ConfigError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "config file missing, using defaults");
            return Ok(ConfigData::default());
        }

        let content = fs::read_to_string(&self.path).await?;
        let file: ConfigFile = serde_json::from_str(&content)?;

        if file.version != CONFIG_VERSION {
            return Err(ConfigError::VersionMismatch {
                expected: CONFIG_VERSION,
                found: file.version,
            });
        }

        Ok(file.data)
    }

    async fn write(&self, data: ConfigData) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = ConfigFile {
            version: CONFIG_VERSION,
            data,
        };
        let content = serde_json::to_string_pretty(&file)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!(path = %self.path.display(), "config saved");
        Ok(())
    }
}

impl ConfigStore for JsonFileStore {
    fn load<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<ConfigData, ConfigError>> + Send + 'a>> {
        Box::pin(async move { self.read().await })
    }

    fn save_settings<'a>(
        &'a self,
        settings: GatewaySettings,
    ) -> Pin<Box<dyn Future<Output = Result<(), ConfigError>> + Send + 'a>> {
        Box::pin(async move {
            let mut data = self.read().await?;
            data.settings = settings;
            self.write(data).await
        })
    }

    fn save_rules<'a>(
        &'a self,
        rules: Vec<AutomationRule>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ConfigError>> + Send + 'a>> {
        Box::pin(async move {
            let mut data = self.read().await?;
            data.rules = rules;
            self.write(data).await
        })
    }
}

/// Volatile store for tests and mock runs.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    data: std::sync::Mutex<ConfigData>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: GatewaySettings) -> Self {
        Self {
            data: std::sync::Mutex::new(ConfigData {
                settings,
                rules: Vec::new(),
            }),
        }
    }

    /// Snapshot of the current contents, for assertions.
    pub fn current(&self) -> ConfigData {
        self.data
            .lock()
            .expect("config store lock is not poisoned")
            .clone()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<ConfigData, ConfigError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.current()) })
    }

    fn save_settings<'a>(
        &'a self,
        settings: GatewaySettings,
    ) -> Pin<Box<dyn Future<Output = Result<(), ConfigError>> + Send + 'a>> {
        Box::pin(async move {
            self.data
                .lock()
                .expect("config store lock is not poisoned")
                .settings = settings;
            Ok(())
        })
    }

    fn save_rules<'a>(
        &'a self,
        rules: Vec<AutomationRule>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ConfigError>> + Send + 'a>> {
        Box::pin(async move {
            self.data
                .lock()
                .expect("config store lock is not poisoned")
                .rules = rules;
            Ok(())
        })
    }
}
