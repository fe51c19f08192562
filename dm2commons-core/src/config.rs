use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::oauth::ConsumerCredential;

pub const DEFAULT_SOURCE_API_BASE: &str = "https://digitaltmuseum.se/api/1/";
pub const DEFAULT_COMMONS_BASE: &str = "https://commons.wikimedia.org/w/";
/// Out-of-band callback: the user copies the verifier by hand.
pub const OOB_CALLBACK: &str = "oob";
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(3600);

/// Explicit configuration handed to each component at construction.
///
/// Secrets are optional here; a step that needs them checks for presence when it runs.
#[derive(Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub source_api_base: String,
    pub commons_base: String,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub callback_url: String,
    pub session_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            source_api_base: DEFAULT_SOURCE_API_BASE.to_string(),
            commons_base: DEFAULT_COMMONS_BASE.to_string(),
            consumer_key: None,
            consumer_secret: None,
            callback_url: OOB_CALLBACK.to_string(),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }
}

// Hand-written so the consumer secret never ends up in logs.
impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("source_api_base", &self.source_api_base)
            .field("commons_base", &self.commons_base)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &self.consumer_secret.as_ref().map(|_| "<redacted>"))
            .field("callback_url", &self.callback_url)
            .field("session_timeout", &self.session_timeout)
            .finish()
    }
}

impl BridgeConfig {
    pub fn trace_loaded(&self) {
        info!(
            source_api_base = %self.source_api_base,
            commons_base = %self.commons_base,
            consumer_key_set = self.consumer_key.is_some(),
            callback_url = %self.callback_url,
            session_timeout_secs = self.session_timeout.as_secs(),
            "Loaded BridgeConfig"
        );
        debug!(?self, "BridgeConfig loaded (full debug)");
    }

    /// The application's OAuth consumer credentials, if both halves are configured.
    pub fn consumer(&self) -> Result<ConsumerCredential, ConfigError> {
        let key = non_empty(&self.consumer_key).ok_or(ConfigError::Missing("consumer_key"))?;
        let secret =
            non_empty(&self.consumer_secret).ok_or(ConfigError::Missing("consumer_secret"))?;
        Ok(ConsumerCredential {
            key: key.to_string(),
            secret: secret.to_string(),
        })
    }

    /// `index.php` entry point used by the OAuth special pages.
    pub fn index_url(&self) -> String {
        format!("{}index.php", with_trailing_slash(&self.commons_base))
    }

    /// `api.php` entry point used by the upload protocol.
    pub fn api_url(&self) -> String {
        format!("{}api.php", with_trailing_slash(&self.commons_base))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}
