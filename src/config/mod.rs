//! Configuration for the Ringway gateway

pub mod file;

use std::path::PathBuf;

use crate::{Error, Result};

/// Default maximum call duration (10 minutes)
const DEFAULT_MAX_CALL_DURATION_SECS: u64 = 600;

/// Default API server port
const DEFAULT_PORT: u16 = 18790;

/// Inbound call admission policy
///
/// Decides whether an inbound call is accepted or immediately hung up:
/// - Open: accept every caller
/// - Allowlist: accept only callers in `allow_from`
/// - Blocklist: accept unless the caller is in `block_from`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InboundPolicy {
    /// Accept all inbound calls
    #[default]
    Open,

    /// Only numbers in `allow_from` may call
    Allowlist,

    /// Numbers in `block_from` are rejected
    Blocklist,
}

impl InboundPolicy {
    /// Parse from string representation
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "allowlist" | "whitelist" => Self::Allowlist,
            "blocklist" | "denylist" => Self::Blocklist,
            _ => Self::Open,
        }
    }
}

impl std::fmt::Display for InboundPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Allowlist => write!(f, "allowlist"),
            Self::Blocklist => write!(f, "blocklist"),
        }
    }
}

/// Voice-call gateway configuration
#[derive(Debug, Clone)]
pub struct VoiceCallConfig {
    /// Enable the voice-call gateway
    pub enabled: bool,

    /// Telephony provider name (e.g. "plivo")
    pub provider: String,

    /// Inbound call admission policy
    pub inbound_policy: InboundPolicy,

    /// Numbers allowed to call in (allowlist mode)
    pub allow_from: Vec<String>,

    /// Numbers rejected when calling in (blocklist mode)
    pub block_from: Vec<String>,

    /// Default outbound caller id
    pub from_number: Option<String>,

    /// Maximum wall-clock duration of a call before it is force-ended
    pub max_call_duration_secs: u64,

    /// Public URL the provider delivers webhooks to
    pub webhook_url: String,

    /// Directory for call artifacts (recordings, transcripts)
    pub store_path: PathBuf,

    /// Provider account/auth id (from `RINGWAY_AUTH_ID` env or config file)
    pub auth_id: Option<String>,

    /// Provider auth token (from `RINGWAY_AUTH_TOKEN` env or config file)
    pub auth_token: Option<String>,

    /// Port the webhook server listens on
    pub port: u16,
}

impl Default for VoiceCallConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "plivo".to_string(),
            inbound_policy: InboundPolicy::Open,
            allow_from: Vec::new(),
            block_from: Vec::new(),
            from_number: None,
            max_call_duration_secs: DEFAULT_MAX_CALL_DURATION_SECS,
            webhook_url: String::new(),
            store_path: PathBuf::from("data"),
            auth_id: None,
            auth_token: None,
            port: DEFAULT_PORT,
        }
    }
}

impl VoiceCallConfig {
    /// Load configuration: defaults, overlaid with the TOML config file,
    /// overlaid with environment credentials.
    #[must_use]
    pub fn load() -> Self {
        let mut config = Self::default();
        config.apply_file(&file::load_config_file());

        if let Ok(auth_id) = std::env::var("RINGWAY_AUTH_ID") {
            config.auth_id = Some(auth_id);
        }
        if let Ok(auth_token) = std::env::var("RINGWAY_AUTH_TOKEN") {
            config.auth_token = Some(auth_token);
        }

        config
    }

    /// Overlay a partial config file on top of this configuration.
    pub fn apply_file(&mut self, overlay: &file::RingwayConfigFile) {
        let call = &overlay.call;
        if let Some(enabled) = call.enabled {
            self.enabled = enabled;
        }
        if let Some(ref provider) = call.provider {
            self.provider.clone_from(provider);
        }
        if let Some(ref policy) = call.inbound_policy {
            self.inbound_policy = InboundPolicy::from_str(policy);
        }
        if let Some(ref allow) = call.allow_from {
            self.allow_from.clone_from(allow);
        }
        if let Some(ref block) = call.block_from {
            self.block_from.clone_from(block);
        }
        if let Some(ref from) = call.from_number {
            self.from_number = Some(from.clone());
        }
        if let Some(secs) = call.max_call_duration_secs {
            self.max_call_duration_secs = secs;
        }
        if let Some(ref url) = call.webhook_url {
            self.webhook_url.clone_from(url);
        }
        if let Some(ref path) = call.store_path {
            self.store_path = PathBuf::from(path);
        }

        if let Some(ref auth_id) = overlay.provider_auth.auth_id {
            self.auth_id = Some(auth_id.clone());
        }
        if let Some(ref auth_token) = overlay.provider_auth.auth_token {
            self.auth_token = Some(auth_token.clone());
        }

        if let Some(port) = overlay.server.port {
            self.port = port;
        }
    }

    /// Validate the configuration for serving.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a recognized option is missing or
    /// inconsistent (empty webhook URL, empty allowlist in allowlist mode,
    /// zero max duration).
    pub fn validate(&self) -> Result<()> {
        if self.webhook_url.trim().is_empty() {
            return Err(Error::Config(
                "webhook_url is required for webhook delivery".to_string(),
            ));
        }
        if self.inbound_policy == InboundPolicy::Allowlist && self.allow_from.is_empty() {
            return Err(Error::Config(
                "allowlist policy requires at least one allow_from number".to_string(),
            ));
        }
        if self.max_call_duration_secs == 0 {
            return Err(Error::Config(
                "max_call_duration_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
