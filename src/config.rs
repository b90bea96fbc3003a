//! Configuration management for the slicer server
//!
//! Configuration is read from a TOML file with environment variable
//! overrides and sensible defaults.
//!
//! ```toml
//! [server]
//! listen_addr = "127.0.0.1:5000"
//! identity_header = "x-cubes-user"
//!
//! [workspace]
//! model_path = "model.json"
//!
//! [calendar]
//! timezone = "Europe/Berlin"
//! first_weekday = 0
//!
//! [authorization]
//! enabled = true
//! guest = "public"
//!
//! [authorization.rights.public]
//! allow_cubes = ["sales"]
//! cube_restrictions = { sales = ["geography:de"] }
//! hierarchy_limits = { sales = { geography = "country" } }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "CUBES_CONFIG";
/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "slicer.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApplicationConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Model and workspace metadata
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Calendar used for relative time members
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Cube access rights
    #[serde(default)]
    pub authorization: AuthorizationConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Socket address to bind
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// CORS allowed origins (empty = allow all origins)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    /// Request header carrying the authenticated user name
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
}

/// Workspace configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// JSON model file; without one the workspace has no cubes
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Extra keys merged into the `/info` response
    #[serde(default)]
    pub info: Map<String, Value>,
}

/// Calendar configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalendarConfig {
    /// Timezone name reported by `/info`
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// First day of the week, 0 = Monday .. 6 = Sunday
    #[serde(default)]
    pub first_weekday: u8,
}

/// Authorization configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthorizationConfig {
    /// Enforce the rights below
    #[serde(default)]
    pub enabled: bool,

    /// Rights entry applied to anonymous and unknown identities
    #[serde(default)]
    pub guest: Option<String>,

    /// Rights per identity
    #[serde(default)]
    pub rights: HashMap<String, RightsConfig>,
}

/// Rights of one identity
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RightsConfig {
    /// Cubes the identity may use; empty allows every cube not denied
    #[serde(default)]
    pub allow_cubes: Vec<String>,

    /// Cubes the identity may not use; `*` denies all
    #[serde(default)]
    pub deny_cubes: Vec<String>,

    /// Cut strings per cube appended to every cell of that cube
    #[serde(default)]
    pub cube_restrictions: HashMap<String, Vec<String>>,

    /// Deepest visible level per cube, keyed by `dimension[@hierarchy]`
    #[serde(default)]
    pub hierarchy_limits: HashMap<String, HashMap<String, String>>,
}

fn default_listen_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_identity_header() -> String {
    "x-cubes-user".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            cors_allowed_origins: Vec::new(),
            identity_header: default_identity_header(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            first_weekday: 0,
        }
    }
}

impl ApplicationConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents).map_err(|e| {
            Error::Configuration(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Load a file, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Locate and load the configuration
    ///
    /// Priority:
    /// 1. explicit path
    /// 2. `CUBES_CONFIG` environment variable
    /// 3. `slicer.toml` in the working directory
    /// 4. defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(path);
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::load(local);
        }
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("CUBES_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(model) = std::env::var("CUBES_MODEL") {
            self.workspace.model_path = Some(PathBuf::from(model));
        }
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.server.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.listen_addr.trim().is_empty() {
            return Err(Error::Configuration("Listen address cannot be empty".to_string()));
        }
        self.server
            .listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| {
                Error::Configuration(format!(
                    "Invalid listen address '{}': {}",
                    self.server.listen_addr, e
                ))
            })?;

        if self.server.identity_header.trim().is_empty() {
            return Err(Error::Configuration("Identity header cannot be empty".to_string()));
        }

        if self.calendar.first_weekday > 6 {
            return Err(Error::Configuration(format!(
                "first_weekday must be between 0 (Monday) and 6 (Sunday), got {}",
                self.calendar.first_weekday
            )));
        }

        let auth = &self.authorization;
        if auth.enabled && auth.rights.is_empty() {
            return Err(Error::Configuration(
                "Authorization is enabled but no rights are configured".to_string(),
            ));
        }
        if let Some(guest) = &auth.guest {
            if auth.enabled && !auth.rights.contains_key(guest) {
                return Err(Error::Configuration(format!(
                    "Guest identity '{}' has no rights entry",
                    guest
                )));
            }
        }

        Ok(())
    }
}
