//! Base types shared by every part of the NLS client.
//!
//! This module defines the error taxonomy, the task and transport enums that
//! are fixed at construction time, the connection state machine, and the
//! caller-facing callback types registered through [`StartOptions`].

use base64::prelude::*;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use super::messages::ResponseHeader;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while driving an NLS session.
#[derive(Debug, Clone, Error)]
pub enum NlsError {
    /// Invalid or incomplete configuration, reported before any network activity
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The socket could not be opened
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation not allowed in the current connection state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An operation that needs an open connection found none. Session sends
    /// are no-ops instead; callers raise this when they cannot continue.
    #[error("Not connected")]
    NotConnected,

    /// Malformed control message from the service. Logged and skipped by
    /// the session.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The service reported a `TaskFailed` event
    #[error("Task failed (status {status}): {status_text}")]
    TaskFailed { status: i64, status_text: String },

    /// Command could not be serialized
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Socket-level failure on an open connection
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Transcription relay request failed
    #[error("Relay error: {0}")]
    RelayError(String),
}

/// Result type for NLS operations.
pub type NlsResult<T> = Result<T, NlsError>;

// =============================================================================
// Task Type
// =============================================================================

/// The kind of work a session performs. Fixed when the session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskType {
    /// Text to speech (`tts`)
    #[default]
    Synthesis,
    /// Streaming speech to text (`asr`)
    Recognition,
    /// Long-form transcription (`ts`). Reserved tag with no command table.
    Transcription,
}

impl TaskType {
    /// Short protocol tag for this task type.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synthesis => "tts",
            Self::Recognition => "asr",
            Self::Transcription => "ts",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = NlsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tts" | "synthesis" => Ok(Self::Synthesis),
            "asr" | "recognition" => Ok(Self::Recognition),
            "ts" | "transcription" => Ok(Self::Transcription),
            _ => Err(NlsError::ConfigurationError(format!(
                "Unsupported task type: {s}. Supported task types: tts, asr, ts"
            ))),
        }
    }
}

// =============================================================================
// Transport Mode
// =============================================================================

/// How binary frames are materialized, both inbound and outbound.
///
/// `Blob` keeps every frame as an opaque segment; `ArrayBuffer` concatenates
/// frames into one contiguous byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportMode {
    #[default]
    Blob,
    ArrayBuffer,
}

impl TransportMode {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::ArrayBuffer => "arraybuffer",
        }
    }
}

impl FromStr for TransportMode {
    type Err = NlsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blob" => Ok(Self::Blob),
            "arraybuffer" | "array_buffer" | "buffer" => Ok(Self::ArrayBuffer),
            _ => Err(NlsError::ConfigurationError(format!(
                "Unsupported transport mode: {s}. Supported modes: blob, arraybuffer"
            ))),
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
        }
    }
}

// =============================================================================
// Delivered Data
// =============================================================================

/// Content type attached to synthesized audio blobs.
pub const BLOB_CONTENT_TYPE: &str = "audio/mpeg";

/// Opaque audio object built from binary frames, kept as separate segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioBlob {
    parts: Vec<Bytes>,
}

impl AudioBlob {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment to the end of the blob.
    pub fn push(&mut self, part: Bytes) {
        self.parts.push(part);
    }

    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    /// Total size in bytes across all segments.
    pub fn len(&self) -> usize {
        self.parts.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn content_type(&self) -> &'static str {
        BLOB_CONTENT_TYPE
    }

    /// Flatten all segments into one contiguous buffer.
    pub fn to_bytes(&self) -> Bytes {
        match self.parts.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            parts => {
                let mut buf = BytesMut::with_capacity(self.len());
                for part in parts {
                    buf.extend_from_slice(part);
                }
                buf.freeze()
            }
        }
    }

    /// Base64 form used when handing a finished recording to a relay.
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.to_bytes())
    }
}

/// Payload handed to the caller's data callback.
#[derive(Debug, Clone)]
pub enum NlsData {
    /// Synthesized audio accumulated in blob mode
    Blob(AudioBlob),
    /// Synthesized audio accumulated in array-buffer mode
    Buffer(Bytes),
    /// Structured recognition result (intermediate or final)
    Result(serde_json::Value),
}

impl NlsData {
    /// Audio bytes regardless of the transport mode they were gathered in.
    pub fn audio_bytes(&self) -> Option<Bytes> {
        match self {
            NlsData::Blob(blob) => Some(blob.to_bytes()),
            NlsData::Buffer(bytes) => Some(bytes.clone()),
            NlsData::Result(_) => None,
        }
    }
}

// =============================================================================
// Callback Types
// =============================================================================

/// Callback receiving synthesized audio or recognition results.
pub type DataCallback =
    Arc<dyn Fn(NlsData) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback receiving the raw header of metadata and unrecognized events.
pub type MessageCallback =
    Arc<dyn Fn(ResponseHeader) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback fired once when the socket closes.
pub type CloseCallback = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback receiving errors raised after the session opened.
pub type ErrorCallback =
    Arc<dyn Fn(NlsError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callbacks installed by [`NlsSession::start`](super::NlsSession::start).
///
/// `on_data` is required; the others are optional diagnostic channels.
#[derive(Clone, Default)]
pub struct StartOptions {
    pub on_data: Option<DataCallback>,
    pub on_message: Option<MessageCallback>,
    pub on_close: Option<CloseCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl StartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_data(mut self, callback: DataCallback) -> Self {
        self.on_data = Some(callback);
        self
    }

    pub fn on_message(mut self, callback: MessageCallback) -> Self {
        self.on_message = Some(callback);
        self
    }

    pub fn on_close(mut self, callback: CloseCallback) -> Self {
        self.on_close = Some(callback);
        self
    }

    pub fn on_error(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }
}

impl fmt::Debug for StartOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartOptions")
            .field("on_data", &self.on_data.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Generate a 32-character lowercase hex identifier for messages and tasks.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_tags() {
        assert_eq!(TaskType::Synthesis.as_str(), "tts");
        assert_eq!(TaskType::Recognition.as_str(), "asr");
        assert_eq!(TaskType::Transcription.as_str(), "ts");
        assert_eq!("ASR".parse::<TaskType>().unwrap(), TaskType::Recognition);
        assert!("video".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_transport_mode_parse() {
        assert_eq!("blob".parse::<TransportMode>().unwrap(), TransportMode::Blob);
        assert_eq!(
            "ArrayBuffer".parse::<TransportMode>().unwrap(),
            TransportMode::ArrayBuffer
        );
        assert!(matches!(
            "stream".parse::<TransportMode>(),
            Err(NlsError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Open.to_string(), "Open");
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_audio_blob_flatten_preserves_order() {
        let mut blob = AudioBlob::new();
        blob.push(Bytes::from_static(b"ab"));
        blob.push(Bytes::from_static(b"c"));
        blob.push(Bytes::from_static(b"def"));

        assert_eq!(blob.len(), 6);
        assert_eq!(blob.parts().len(), 3);
        assert_eq!(&blob.to_bytes()[..], b"abcdef");
        assert_eq!(blob.to_base64(), "YWJjZGVm");
        assert_eq!(blob.content_type(), "audio/mpeg");
    }

    #[test]
    fn test_new_id_format() {
        let a = new_id();
        let b = new_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_error_display() {
        let err = NlsError::TaskFailed {
            status: 40000001,
            status_text: "Gateway:ACCESS_DENIED".to_string(),
        };
        assert!(err.to_string().contains("ACCESS_DENIED"));
        assert_eq!(NlsError::NotConnected.to_string(), "Not connected");
    }
}
