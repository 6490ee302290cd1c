//! TOML configuration file loading
//!
//! Supports `~/.config/ringway/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct RingwayConfigFile {
    /// Voice-call configuration
    #[serde(default)]
    pub call: CallFileConfig,

    /// Provider credentials
    #[serde(default, rename = "provider")]
    pub provider_auth: ProviderAuthFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Voice-call configuration section
#[derive(Debug, Default, Deserialize)]
pub struct CallFileConfig {
    /// Enable the voice-call gateway
    pub enabled: Option<bool>,

    /// Telephony provider name (e.g. "plivo")
    pub provider: Option<String>,

    /// Inbound admission policy ("open", "allowlist", "blocklist")
    pub inbound_policy: Option<String>,

    /// Numbers allowed to call in
    pub allow_from: Option<Vec<String>>,

    /// Numbers rejected when calling in
    pub block_from: Option<Vec<String>>,

    /// Default outbound caller id
    pub from_number: Option<String>,

    /// Maximum call duration in seconds
    pub max_call_duration_secs: Option<u64>,

    /// Public webhook URL
    pub webhook_url: Option<String>,

    /// Directory for call artifacts
    pub store_path: Option<String>,
}

/// Provider credential section
#[derive(Debug, Default, Deserialize)]
pub struct ProviderAuthFileConfig {
    /// Provider account/auth id
    pub auth_id: Option<String>,

    /// Provider auth token
    pub auth_token: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Webhook server port
    pub port: Option<u16>,
}

/// Path to the standard config file, if a home directory is resolvable
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "ringway")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load the TOML config file from the standard path
///
/// Returns `RingwayConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
#[must_use]
pub fn load_config_file() -> RingwayConfigFile {
    let Some(path) = config_file_path() else {
        return RingwayConfigFile::default();
    };

    if !path.exists() {
        return RingwayConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse config file");
                RingwayConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read config file");
            RingwayConfigFile::default()
        }
    }
}
