/// `load_config` module: reads the static YAML config and injects secrets from the
/// environment, producing the [`BridgeConfig`] every core component is built from.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file (no secrets) into a loosely-typed intermediate
/// - Apply defaults for every key the file leaves out
/// - Inject the OAuth consumer credential from `WIKIMEDIA_CONSUMER_KEY` and
///   `WIKIMEDIA_CONSUMER_SECRET`, and let `DM_API_BASE` / `OAUTH_CALLBACK_URL`
///   override the file
///
/// Missing secrets are not an error here. `preview` runs without them; the
/// handshake reports their absence when it needs them.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
///
/// Accepted YAML keys: `source_api_base`, `commons_base`, `callback_url`,
/// `session_timeout_secs`.
use anyhow::{Context, Result};
use dm2commons_core::config::BridgeConfig;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

pub const ENV_CONSUMER_KEY: &str = "WIKIMEDIA_CONSUMER_KEY";
pub const ENV_CONSUMER_SECRET: &str = "WIKIMEDIA_CONSUMER_SECRET";
pub const ENV_CALLBACK_URL: &str = "OAUTH_CALLBACK_URL";
pub const ENV_SOURCE_API_BASE: &str = "DM_API_BASE";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    source_api_base: Option<String>,
    commons_base: Option<String>,
    callback_url: Option<String>,
    session_timeout_secs: Option<u64>,
}

/// Loads a static YAML config file and injects secrets from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BridgeConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref)
        .map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            e
        })
        .with_context(|| format!("Failed to read config file {path_ref:?}"))?;

    let raw: RawConfig = if config_content.trim().is_empty() {
        RawConfig::default()
    } else {
        serde_yaml::from_str(&config_content).map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            anyhow::anyhow!("Failed to parse config YAML: {e}")
        })?
    };
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    let config = with_env(raw);
    config.trace_loaded();
    Ok(config)
}

/// Defaults plus environment, for runs without a config file.
pub fn load_from_env() -> BridgeConfig {
    info!("No config file given, using defaults and environment");
    let config = with_env(RawConfig::default());
    config.trace_loaded();
    config
}

fn with_env(raw: RawConfig) -> BridgeConfig {
    let defaults = BridgeConfig::default();
    BridgeConfig {
        source_api_base: env_var(ENV_SOURCE_API_BASE)
            .or(raw.source_api_base)
            .unwrap_or(defaults.source_api_base),
        commons_base: raw.commons_base.unwrap_or(defaults.commons_base),
        consumer_key: env_var(ENV_CONSUMER_KEY),
        consumer_secret: env_var(ENV_CONSUMER_SECRET),
        callback_url: env_var(ENV_CALLBACK_URL)
            .or(raw.callback_url)
            .unwrap_or(defaults.callback_url),
        session_timeout: raw
            .session_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_timeout),
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
