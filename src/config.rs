//! Runtime configuration read from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::clients::completion::{OPENROUTER_API_BASE, usable_api_key};
use crate::clients::voice::{DEFAULT_CALL_TIMEOUT, VOICE_AGENT_API_BASE};

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
pub const DEFAULT_DB_PATH: &str = "sqlite:arogya.db?mode=rwc";

/// Default directory for the local JSON fallback store.
pub const DEFAULT_FALLBACK_DIR: &str = "data";

/// Default completion timeout in seconds.
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub fallback_dir: PathBuf,
    /// `None` when the key is absent, blank or the sample placeholder.
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    pub openrouter_model: Option<String>,
    pub ai_timeout: Duration,
    pub voice_agent_api_key: Option<String>,
    pub voice_agent_id: Option<String>,
    pub voice_agent_base_url: String,
    pub voice_call_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = non_blank("AROGYA_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let seconds = |name: &str| {
            non_blank(name)
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
        };

        Self {
            port,
            database_url: non_blank("AROGYA_DATABASE_URL").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            fallback_dir: non_blank("AROGYA_FALLBACK_DIR")
                .unwrap_or_else(|| DEFAULT_FALLBACK_DIR.to_string())
                .into(),
            openrouter_api_key: usable_api_key(lookup("OPENROUTER_API_KEY").as_deref()),
            openrouter_base_url: non_blank("OPENROUTER_BASE_URL").unwrap_or_else(|| OPENROUTER_API_BASE.to_string()),
            openrouter_model: non_blank("OPENROUTER_MODEL"),
            ai_timeout: seconds("AROGYA_AI_TIMEOUT_SECS")
                .unwrap_or(Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS)),
            voice_agent_api_key: non_blank("VOICE_AGENT_API_KEY"),
            voice_agent_id: non_blank("VOICE_AGENT_ID"),
            voice_agent_base_url: non_blank("VOICE_AGENT_BASE_URL")
                .unwrap_or_else(|| VOICE_AGENT_API_BASE.to_string()),
            voice_call_timeout: seconds("AROGYA_VOICE_TIMEOUT_SECS").unwrap_or(DEFAULT_CALL_TIMEOUT),
        }
    }

    pub fn ai_configured(&self) -> bool {
        self.openrouter_api_key.is_some()
    }

    pub fn voice_agent_configured(&self) -> bool {
        self.voice_agent_api_key.is_some() && self.voice_agent_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database_url, DEFAULT_DB_PATH);
        assert_eq!(config.fallback_dir, PathBuf::from(DEFAULT_FALLBACK_DIR));
        assert_eq!(config.openrouter_base_url, OPENROUTER_API_BASE);
        assert_eq!(config.ai_timeout, Duration::from_secs(30));
        assert_eq!(config.voice_call_timeout, DEFAULT_CALL_TIMEOUT);
        assert!(!config.ai_configured());
        assert!(!config.voice_agent_configured());
    }

    #[test]
    fn test_placeholder_key_is_unconfigured() {
        let config = config(&[("OPENROUTER_API_KEY", "your_openrouter_api_key_here")]);
        assert_eq!(config.openrouter_api_key, None);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("AROGYA_PORT", "8080"),
            ("OPENROUTER_API_KEY", "sk-or-test"),
            ("OPENROUTER_MODEL", "meta/llama"),
            ("AROGYA_AI_TIMEOUT_SECS", "5"),
            ("VOICE_AGENT_API_KEY", "xi-key"),
            ("VOICE_AGENT_ID", "agent-1"),
            ("AROGYA_VOICE_TIMEOUT_SECS", "8"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.openrouter_api_key.as_deref(), Some("sk-or-test"));
        assert_eq!(config.openrouter_model.as_deref(), Some("meta/llama"));
        assert_eq!(config.ai_timeout, Duration::from_secs(5));
        assert!(config.voice_agent_configured());
        assert_eq!(config.voice_call_timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config(&[("AROGYA_PORT", "not-a-port"), ("AROGYA_AI_TIMEOUT_SECS", "0")]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.ai_timeout, Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS));
    }
}
