//! Hand-off of a finished recording to an HTTP transcription relay.
//!
//! The relay receives the recording as base64 JSON and answers with the
//! transcription result and how long it took.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::nls::{AudioBlob, NlsError, NlsResult};

/// Request timeout applied when none is configured.
const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(60);

/// Body posted to the relay.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RelayRequest {
    /// Base64-encoded recording
    pub audio: String,
}

/// Relay answer.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RelayResponse {
    /// Backend processing time
    #[serde(default)]
    pub duration: f64,
    /// Transcription result as returned by the backend
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RelayResponse {
    /// Transcribed text, when the backend returned a plain string.
    pub fn text(&self) -> Option<&str> {
        self.data.as_str()
    }
}

/// HTTP client for the transcription relay.
#[derive(Debug, Clone)]
pub struct RelayClient {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl RelayClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: DEFAULT_RELAY_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Transcribe an accumulated recording.
    pub async fn transcribe_blob(&self, blob: &AudioBlob) -> NlsResult<RelayResponse> {
        self.send(RelayRequest {
            audio: blob.to_base64(),
        })
        .await
    }

    /// Transcribe raw audio bytes.
    pub async fn transcribe(&self, audio: &[u8]) -> NlsResult<RelayResponse> {
        use base64::prelude::*;

        self.send(RelayRequest {
            audio: BASE64_STANDARD.encode(audio),
        })
        .await
    }

    async fn send(&self, request: RelayRequest) -> NlsResult<RelayResponse> {
        debug!(
            url = %self.url,
            encoded_len = request.audio.len(),
            "Relay request"
        );

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| NlsError::RelayError(format!("Request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NlsError::RelayError(format!("HTTP {status} - {error_text}")));
        }

        let result: RelayResponse = response
            .json()
            .await
            .map_err(|e| NlsError::RelayError(format!("Failed to parse response: {e}")))?;

        info!("Relay transcription finished in {:.2}s", result.duration);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_transcribe_posts_base64() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/whisper"))
            .and(body_json(serde_json::json!({"audio": "YWJjZGVm"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"duration": 1.25, "data": "你好"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = RelayClient::new(format!("{}/api/whisper", server.uri()));
        let result = client.transcribe(b"abcdef").await.unwrap();

        assert_eq!(result.duration, 1.25);
        assert_eq!(result.text(), Some("你好"));
    }

    #[tokio::test]
    async fn test_transcribe_blob_flattens_segments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({"audio": "YWJjZGVm"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"duration": 0.5, "data": {"text": "ok"}})),
            )
            .mount(&server)
            .await;

        let mut blob = AudioBlob::new();
        blob.push(Bytes::from_static(b"abc"));
        blob.push(Bytes::from_static(b"def"));

        let result = RelayClient::new(server.uri())
            .transcribe_blob(&blob)
            .await
            .unwrap();
        assert_eq!(result.data["text"], "ok");
        assert_eq!(result.text(), None);
    }

    #[tokio::test]
    async fn test_non_success_status_is_relay_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = RelayClient::new(server.uri())
            .transcribe(b"x")
            .await
            .unwrap_err();
        match err {
            NlsError::RelayError(msg) => {
                assert!(msg.contains("502"));
                assert!(msg.contains("upstream down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_relay_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = RelayClient::new(server.uri()).transcribe(b"x").await;
        assert!(matches!(result, Err(NlsError::RelayError(_))));
    }
}
