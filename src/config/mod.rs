//! Configuration module for the NLS client
//!
//! This module handles process configuration from various sources: .env files,
//! YAML files, and environment variables. Priority: YAML > ENV vars > .env
//! values > defaults.
//!
//! # Example
//! ```rust,no_run
//! use nls_client::config::ClientConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variables as the base
//! let config_path = PathBuf::from("config.yaml");
//! let config = ClientConfig::from_file(&config_path)?;
//!
//! println!("Gateway: {}", config.url);
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::Path;
use std::time::Duration;

mod yaml;

pub use yaml::{NlsYaml, RelayYaml, YamlConfig};

use crate::core::nls::{
    DEFAULT_NLS_URL, PacingConfig, RecorderPreset, SessionConfig, TransportMode,
};

/// Client configuration
///
/// Contains everything the CLI needs to run a session:
/// - Gateway endpoint and credentials
/// - Binary transport mode and recognition sample rate
/// - Optional connect timeout
/// - Optional transcription relay endpoint
#[derive(Clone)]
pub struct ClientConfig {
    pub url: String,
    pub token: String,
    pub appkey: String,
    pub transport: TransportMode,
    pub sample_rate: u32,
    pub connect_timeout: Option<Duration>,
    pub relay_url: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_NLS_URL.to_string(),
            token: String::new(),
            appkey: String::new(),
            transport: TransportMode::default(),
            sample_rate: 16000,
            connect_timeout: None,
            relay_url: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// Reads `NLS_URL`, `NLS_TOKEN`, `NLS_APPKEY`, `NLS_TRANSPORT`,
    /// `NLS_SAMPLE_RATE`, `NLS_CONNECT_TIMEOUT_MS` and `NLS_RELAY_URL`.
    /// The .env file is loaded by the binary before this is called.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::load_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, on top of the environment
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = Self::load_env()?;
        config.apply_yaml(yaml_config)?;
        config.validate()?;

        Ok(config)
    }

    fn load_env() -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = Self::default();

        if let Some(url) = env_var("NLS_URL") {
            config.url = url;
        }
        if let Some(token) = env_var("NLS_TOKEN") {
            config.token = token;
        }
        if let Some(appkey) = env_var("NLS_APPKEY") {
            config.appkey = appkey;
        }
        if let Some(transport) = env_var("NLS_TRANSPORT") {
            config.transport = transport.parse()?;
        }
        if let Some(rate) = env_var("NLS_SAMPLE_RATE") {
            config.sample_rate = rate
                .parse()
                .map_err(|e| format!("Invalid NLS_SAMPLE_RATE '{rate}': {e}"))?;
        }
        if let Some(ms) = env_var("NLS_CONNECT_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|e| format!("Invalid NLS_CONNECT_TIMEOUT_MS '{ms}': {e}"))?;
            config.connect_timeout = Some(Duration::from_millis(ms));
        }
        config.relay_url = env_var("NLS_RELAY_URL");

        Ok(config)
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(nls) = yaml.nls {
            if let Some(url) = nls.url {
                self.url = url;
            }
            if let Some(token) = nls.token {
                self.token = token;
            }
            if let Some(appkey) = nls.appkey {
                self.appkey = appkey;
            }
            if let Some(transport) = nls.transport {
                self.transport = transport.parse()?;
            }
            if let Some(rate) = nls.sample_rate {
                self.sample_rate = rate;
            }
            if let Some(ms) = nls.connect_timeout_ms {
                self.connect_timeout = Some(Duration::from_millis(ms));
            }
        }

        if let Some(url) = yaml.relay.and_then(|relay| relay.url) {
            self.relay_url = Some(url);
        }

        Ok(())
    }

    /// Validate the merged configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.appkey.trim().is_empty() {
            return Err("NLS_APPKEY is required".into());
        }
        if !RecorderPreset::SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(format!(
                "Unsupported sample rate {}. Supported rates: {:?}",
                self.sample_rate,
                RecorderPreset::SAMPLE_RATES
            )
            .into());
        }
        self.session_config().build_websocket_url()?;
        if let Some(relay) = &self.relay_url {
            url::Url::parse(relay).map_err(|e| format!("Invalid NLS_RELAY_URL '{relay}': {e}"))?;
        }
        Ok(())
    }

    /// Connection parameters for an [`NlsSession`](crate::core::nls::NlsSession).
    pub fn session_config(&self) -> SessionConfig {
        let config = SessionConfig::new(&self.url, &self.token, &self.appkey)
            .with_transport(self.transport);
        match self.connect_timeout {
            Some(limit) => config.with_connect_timeout(limit),
            None => config,
        }
    }

    /// Upload pacing for the configured sample rate.
    pub fn pacing(&self) -> Result<PacingConfig, Box<dyn std::error::Error>> {
        Ok(PacingConfig::for_sample_rate(self.sample_rate)?)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .field("appkey", &self.appkey)
            .field("transport", &self.transport)
            .field("sample_rate", &self.sample_rate)
            .field("connect_timeout", &self.connect_timeout)
            .field("relay_url", &self.relay_url)
            .finish()
    }
}

/// Implement Drop to zeroize the token when ClientConfig is dropped.
impl Drop for ClientConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.token.zeroize();
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
