//! Configuration types for NLS sessions.
//!
//! This module contains:
//! - Connection parameters ([`SessionConfig`])
//! - Upload pacing per sample-rate class ([`PacingConfig`])
//! - Start-command defaults per task type ([`SynthesisParams`], [`RecognitionParams`])
//! - Recording-format presets used to label caller audio ([`RecorderPreset`])

use std::time::Duration;

use url::Url;

use super::base::{NlsError, NlsResult, TransportMode};

/// Public gateway endpoint.
pub const DEFAULT_NLS_URL: &str = "wss://nls-gateway.cn-shanghai.aliyuncs.com/ws/v1";

// =============================================================================
// Session Config
// =============================================================================

/// Immutable connection parameters for one client.
#[derive(Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint (`ws://` or `wss://`)
    pub url: String,
    /// Auth token, attached as the `token` query parameter
    pub token: String,
    /// Application key copied into every command header
    pub appkey: String,
    /// Binary frame representation for both directions
    pub transport: TransportMode,
    /// Upper bound on the socket handshake. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
}

impl SessionConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>, appkey: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            appkey: appkey.into(),
            transport: TransportMode::default(),
            connect_timeout: None,
        }
    }

    pub fn with_transport(mut self, transport: TransportMode) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Check required fields without touching the network.
    pub fn validate(&self) -> NlsResult<()> {
        if self.url.trim().is_empty() {
            return Err(NlsError::ConfigurationError(
                "Endpoint URL is required".to_string(),
            ));
        }
        if self.appkey.trim().is_empty() {
            return Err(NlsError::ConfigurationError(
                "Application key is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the connection URL with the token attached as a query credential.
    pub fn build_websocket_url(&self) -> NlsResult<Url> {
        self.validate()?;

        let mut url = Url::parse(&self.url)
            .map_err(|e| NlsError::ConfigurationError(format!("Invalid endpoint URL: {e}")))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(NlsError::ConfigurationError(format!(
                    "Unsupported URL scheme: {other}. Expected ws or wss"
                )));
            }
        }

        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .field("appkey", &self.appkey)
            .field("transport", &self.transport)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Drop for SessionConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.token.zeroize();
    }
}

// =============================================================================
// Pacing
// =============================================================================

/// Outbound audio rate budget: `chunk_size` bytes every `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    pub chunk_size: usize,
    pub interval: Duration,
    /// Delay between the last chunk and the stop command
    pub stop_delay: Duration,
}

impl PacingConfig {
    pub fn new(chunk_size: usize, interval: Duration) -> Self {
        Self {
            chunk_size,
            interval,
            stop_delay: interval,
        }
    }

    pub fn with_stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    /// Rate class imposed by the service for a recognition sample rate.
    ///
    /// 16 kHz: 3200 bytes per 100 ms. 8 kHz: 3200 bytes per 200 ms.
    pub fn for_sample_rate(sample_rate: u32) -> NlsResult<Self> {
        match sample_rate {
            16000 => Ok(Self::new(3200, Duration::from_millis(100))),
            8000 => Ok(Self::new(3200, Duration::from_millis(200))),
            other => Err(NlsError::ConfigurationError(format!(
                "Unsupported sample rate: {other}. Supported rates: 16000, 8000"
            ))),
        }
    }

    /// Number of chunks a payload of `len` bytes splits into.
    #[inline]
    pub fn chunk_count(&self, len: usize) -> usize {
        if self.chunk_size == 0 {
            return 0;
        }
        len.div_ceil(self.chunk_size)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self::new(3200, Duration::from_millis(100))
    }
}

// =============================================================================
// Task Defaults
// =============================================================================

/// Start-command parameters for speech synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisParams {
    pub speaker: Option<String>,
    pub voice: String,
    pub emotion: Option<String>,
    pub format: String,
    pub sample_rate: u32,
    /// 0 to 100
    pub volume: u32,
    /// -500 to 500
    pub speech_rate: i32,
    /// -500 to 500
    pub pitch_rate: i32,
    pub enable_subtitle: bool,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            speaker: Some("知妙_多情感".to_string()),
            voice: "zhimiao_emo".to_string(),
            emotion: Some("gentle".to_string()),
            format: "wav".to_string(),
            sample_rate: 16000,
            volume: 50,
            speech_rate: -200,
            pitch_rate: 0,
            enable_subtitle: false,
        }
    }
}

/// Start-command parameters for streaming recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionParams {
    pub format: String,
    pub sample_rate: u32,
    pub enable_intermediate_result: bool,
    pub enable_punctuation_prediction: bool,
    pub enable_inverse_text_normalization: bool,
}

impl Default for RecognitionParams {
    fn default() -> Self {
        Self {
            format: "pcm".to_string(),
            sample_rate: 16000,
            enable_intermediate_result: true,
            enable_punctuation_prediction: true,
            enable_inverse_text_normalization: true,
        }
    }
}

impl RecognitionParams {
    /// Pacing that matches this payload's sample rate.
    pub fn pacing(&self) -> NlsResult<PacingConfig> {
        PacingConfig::for_sample_rate(self.sample_rate)
    }
}

// =============================================================================
// Recorder Presets
// =============================================================================

/// Capture format the audio collaborator was configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderPreset {
    pub mime_type: &'static str,
    pub bits_per_second: u32,
}

impl RecorderPreset {
    pub const WEBM_PCM: Self = Self {
        mime_type: "audio/webm;codecs=pcm",
        bits_per_second: 16000,
    };
    pub const MP3: Self = Self {
        mime_type: "audio/mp3",
        bits_per_second: 16000,
    };
    pub const WAV: Self = Self {
        mime_type: "audio/wav",
        bits_per_second: 16000,
    };

    /// Sample rates the recognition service accepts.
    pub const SAMPLE_RATES: [u32; 2] = [16000, 8000];

    /// Guess a preset from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "webm" => Some(Self::WEBM_PCM),
            "mp3" => Some(Self::MP3),
            "wav" | "pcm" => Some(Self::WAV),
            _ => None,
        }
    }
}
