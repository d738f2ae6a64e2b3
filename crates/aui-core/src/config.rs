//! Configuration management for aui.
//!
//! Loads configuration from ${AUI_HOME}/config.toml with sensible defaults,
//! then applies environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for aui configuration and data directories.
    //!
    //! AUI_HOME resolution order:
    //! 1. AUI_HOME environment variable (if set)
    //! 2. ~/.config/aui (default)

    use std::path::PathBuf;

    /// Returns the aui home directory.
    pub fn aui_home() -> PathBuf {
        if let Ok(home) = std::env::var("AUI_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".aui"),
            |h| h.join(".config").join("aui"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        aui_home().join("config.toml")
    }

    /// Returns the path to the secrets file holding login credentials.
    pub fn secrets_path() -> PathBuf {
        aui_home().join("secrets.toml")
    }

    /// Returns the directory log files are written to.
    pub fn logs_dir() -> PathBuf {
        aui_home().join("logs")
    }

    /// Returns the default directory for files generated by the assistant.
    pub fn downloads_dir() -> PathBuf {
        aui_home().join("downloads")
    }
}

/// Parses an environment-style boolean. Only a case-insensitive `"true"` is true.
pub fn str_to_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Title shown at the top of the chat
    pub title: String,

    /// Assistant used for every run
    pub assistant_id: Option<String>,

    /// Require a login before chatting
    pub authentication_required: bool,

    /// Hint shown for the upload command
    pub file_upload_message: String,

    /// Directory generated files are saved to
    pub download_dir: Option<String>,

    /// Backend configuration (keys, endpoints).
    pub providers: ProvidersConfig,
}

impl Config {
    pub const DEFAULT_TITLE: &str = "Assistants API UI";
    pub const DEFAULT_FILE_UPLOAD_MESSAGE: &str = "Upload a file";

    /// Loads configuration from the default config path and the process environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&paths::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Overlays environment variables onto the loaded values.
    ///
    /// Empty variables are ignored so an exported-but-blank key does not
    /// wipe a value from the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.providers.openai.base_url = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_KEY") {
            self.providers.azure.api_key = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
            self.providers.azure.base_url = Some(v);
        }
        if let Some(v) = get("AUTHENTICATION_REQUIRED") {
            self.authentication_required = str_to_bool(&v);
        }
        if let Some(v) = get("ASSISTANT_ID") {
            self.assistant_id = Some(v);
        }
        if let Some(v) = get("ASSISTANT_TITLE") {
            self.title = v;
        }
        if let Some(v) = get("ENABLED_FILE_UPLOAD_MESSAGE") {
            self.file_upload_message = v;
        }
    }

    /// Returns the assistant id if set and non-empty.
    pub fn effective_assistant_id(&self) -> Option<&str> {
        self.assistant_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the directory generated files are saved to.
    pub fn effective_download_dir(&self) -> PathBuf {
        self.download_dir
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map_or_else(paths::downloads_dir, PathBuf::from)
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: Self::DEFAULT_TITLE.to_string(),
            assistant_id: None,
            authentication_required: false,
            file_upload_message: Self::DEFAULT_FILE_UPLOAD_MESSAGE.to_string(),
            download_dir: None,
            providers: ProvidersConfig::default(),
        }
    }
}

/// Backend configuration. Azure wins when both its key and endpoint are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderConfig,
    #[serde(default = "default_azure_provider")]
    pub azure: ProviderConfig,
}

impl ProvidersConfig {
    /// Returns whether the Azure deployment should be used.
    pub fn uses_azure(&self) -> bool {
        self.azure.effective_api_key().is_some() && self.azure.effective_base_url().is_some()
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: ProviderConfig::default(),
            azure: default_azure_provider(),
        }
    }
}

fn default_azure_provider() -> ProviderConfig {
    ProviderConfig {
        api_version: Some(ProviderConfig::DEFAULT_AZURE_API_VERSION.to_string()),
        ..Default::default()
    }
}

/// Provider configuration entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    /// Optional API key (environment variables take precedence).
    pub api_key: Option<String>,
    /// Optional API base URL (Azure: the resource endpoint).
    pub base_url: Option<String>,
    /// API version query parameter (Azure only).
    pub api_version: Option<String>,
}

impl ProviderConfig {
    pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

    /// Returns the effective API key if set and non-empty.
    pub fn effective_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the effective base URL if set and non-empty.
    pub fn effective_base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the API version, falling back to the Azure default.
    pub fn effective_api_version(&self) -> &str {
        self.api_version
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(Self::DEFAULT_AZURE_API_VERSION)
    }
}
