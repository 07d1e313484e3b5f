// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run configuration.
//!
//! Every entry point receives one explicit [`RunConfig`]. It is built from
//! defaults, then an optional JSON file, then environment overrides:
//!
//! 1. `--config <path>` (must exist) or `~/.pagewright/config.json` (if present)
//! 2. `PAGEWRIGHT_*`, `TWILIO_*` and `CAPTCHA_*` environment variables

use anyhow::{bail, Context, Result};
use pagewright::{InteractionRequest, Interactor, RetryPolicy, TypingCadence, DEFAULT_COUNTRY_CODE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root of all Pagewright state in the user's home directory.
pub fn pagewright_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".pagewright")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub browser: BrowserConfig,
    pub interaction: InteractionConfig,
    pub messaging: MessagingConfig,
    pub captcha: CaptchaConfig,
    /// SQLite database for clients, appointments and messages.
    pub store_path: PathBuf,
    /// JSONL audit log of run events. Disabled when `None`.
    pub audit_path: Option<PathBuf>,
    /// Where failure screenshots are written.
    pub diagnostics_dir: PathBuf,
    pub default_country_code: u8,
}

impl Default for RunConfig {
    fn default() -> Self {
        let home = pagewright_home();
        Self {
            browser: BrowserConfig::default(),
            interaction: InteractionConfig::default(),
            messaging: MessagingConfig::default(),
            captcha: CaptchaConfig::default(),
            store_path: home.join("pagewright.db"),
            audit_path: Some(home.join("audit.jsonl")),
            diagnostics_dir: home.join("diagnostics"),
            default_country_code: DEFAULT_COUNTRY_CODE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// CDP websocket of a remote browser. When set, no local Chromium is launched.
    pub ws_endpoint: Option<String>,
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
    pub navigation_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            ws_endpoint: None,
            chromium_path: None,
            headless: true,
            navigation_timeout_ms: 30_000,
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    pub selector_timeout_ms: u64,
    pub settle_ms: u64,
    pub typing: TypingCadence,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            selector_timeout_ms: 5_000,
            settle_ms: 1_000,
            typing: TypingCadence::default(),
        }
    }
}

impl InteractionConfig {
    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Apply the configured timeout and settle delay to a request.
    pub fn apply(&self, request: InteractionRequest) -> InteractionRequest {
        request
            .with_timeout(self.selector_timeout())
            .with_settle(self.settle())
    }

    pub fn interactor(&self) -> Interactor {
        Interactor::new(self.typing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub api_base: String,
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            api_base: "https://api.twilio.com".to_string(),
            request_timeout_ms: 15_000,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_ms: 120_000,
        }
    }
}

impl RunConfig {
    /// Load configuration from file and process environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = pagewright_home().join("config.json");
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PAGEWRIGHT_WS_ENDPOINT") {
            self.browser.ws_endpoint = Some(v);
        }
        if let Some(v) = get("PAGEWRIGHT_CHROMIUM_PATH") {
            self.browser.chromium_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("PAGEWRIGHT_HEADLESS") {
            self.browser.headless = parse_bool("PAGEWRIGHT_HEADLESS", &v)?;
        }
        if let Some(v) = get("PAGEWRIGHT_NAVIGATION_TIMEOUT_MS") {
            self.browser.navigation_timeout_ms = parse_num("PAGEWRIGHT_NAVIGATION_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("PAGEWRIGHT_SELECTOR_TIMEOUT_MS") {
            self.interaction.selector_timeout_ms = parse_num("PAGEWRIGHT_SELECTOR_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("PAGEWRIGHT_SETTLE_MS") {
            self.interaction.settle_ms = parse_num("PAGEWRIGHT_SETTLE_MS", &v)?;
        }
        if let Some(v) = get("PAGEWRIGHT_STORE") {
            self.store_path = PathBuf::from(v);
        }
        if let Some(v) = get("PAGEWRIGHT_AUDIT_LOG") {
            self.audit_path = match v.as_str() {
                "off" | "none" => None,
                _ => Some(PathBuf::from(v)),
            };
        }
        if let Some(v) = get("PAGEWRIGHT_DIAGNOSTICS_DIR") {
            self.diagnostics_dir = PathBuf::from(v);
        }
        if let Some(v) = get("PAGEWRIGHT_COUNTRY_CODE") {
            self.default_country_code = parse_num("PAGEWRIGHT_COUNTRY_CODE", &v)?;
        }

        if let Some(v) = get("TWILIO_ACCOUNT_SID") {
            self.messaging.account_sid = Some(v);
        }
        if let Some(v) = get("TWILIO_AUTH_TOKEN") {
            self.messaging.auth_token = Some(v);
        }
        if let Some(v) = get("TWILIO_FROM_NUMBER").or_else(|| get("TWILIO_PHONE_NUMBER")) {
            self.messaging.from_number = Some(v);
        }
        if let Some(v) = get("TWILIO_API_BASE") {
            self.messaging.api_base = v;
        }

        if let Some(v) = get("CAPTCHA_ENDPOINT") {
            self.captcha.endpoint = Some(v);
        }
        if let Some(v) = get("CAPTCHA_API_KEY") {
            self.captcha.api_key = Some(v);
        }
        Ok(())
    }

    /// Reject configuration that can never work.
    pub fn validate(&self) -> Result<()> {
        if !(1..=9).contains(&self.default_country_code) {
            bail!(
                "default_country_code must be a single digit 1-9, got {}",
                self.default_country_code
            );
        }
        if self.interaction.selector_timeout_ms == 0 {
            bail!("interaction.selector_timeout_ms must be greater than zero");
        }
        if self.browser.navigation_timeout_ms == 0 {
            bail!("browser.navigation_timeout_ms must be greater than zero");
        }
        self.interaction.typing.validate()?;
        self.messaging.retry.validate()?;
        if let Some(endpoint) = &self.browser.ws_endpoint {
            let parsed = url::Url::parse(endpoint)
                .with_context(|| format!("invalid browser.ws_endpoint: {endpoint}"))?;
            if !matches!(parsed.scheme(), "ws" | "wss" | "http" | "https") {
                bail!("browser.ws_endpoint must be a ws:// or wss:// URL, got {endpoint}");
            }
        }
        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{key} must be a number, got {value:?}"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{key} must be a boolean, got {value:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_validate() {
        let config = RunConfig::default();
        config.validate().unwrap();
        assert_eq!(config.default_country_code, 1);
        assert_eq!(config.interaction.typing, TypingCadence::default());
        assert_eq!(config.messaging.retry.max_attempts, 3);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RunConfig::default();
        config
            .apply_env(env(&[
                ("TWILIO_ACCOUNT_SID", "AC123"),
                ("TWILIO_AUTH_TOKEN", "secret"),
                ("TWILIO_PHONE_NUMBER", "+15550001111"),
                ("PAGEWRIGHT_SELECTOR_TIMEOUT_MS", "2500"),
                ("PAGEWRIGHT_HEADLESS", "false"),
                ("PAGEWRIGHT_AUDIT_LOG", "off"),
                ("PAGEWRIGHT_WS_ENDPOINT", "wss://cloud.example/session?token=x"),
            ]))
            .unwrap();

        assert_eq!(config.messaging.account_sid.as_deref(), Some("AC123"));
        assert_eq!(config.messaging.from_number.as_deref(), Some("+15550001111"));
        assert_eq!(config.interaction.selector_timeout(), Duration::from_millis(2500));
        assert!(!config.browser.headless);
        assert!(config.audit_path.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_blank_env_values_ignored() {
        let mut config = RunConfig::default();
        config
            .apply_env(env(&[("TWILIO_ACCOUNT_SID", "  ")]))
            .unwrap();
        assert!(config.messaging.account_sid.is_none());
    }

    #[test]
    fn test_bad_env_number_rejected() {
        let mut config = RunConfig::default();
        let err = config
            .apply_env(env(&[("PAGEWRIGHT_SETTLE_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("PAGEWRIGHT_SETTLE_MS"));
    }

    #[test]
    fn test_invalid_country_code_rejected() {
        let mut config = RunConfig::default();
        config.default_country_code = 44;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "interaction": { "settle_ms": 250 }, "default_country_code": 7 }"#,
        )
        .unwrap();
        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.interaction.settle_ms, 250);
        assert_eq!(config.interaction.selector_timeout_ms, 5_000);
        assert_eq!(config.default_country_code, 7);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        assert!(RunConfig::load(Some(Path::new("/nonexistent/pagewright.json"))).is_err());
    }
}
