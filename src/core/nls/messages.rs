//! Wire types for the NLS WebSocket protocol.
//!
//! - **Outgoing**: [`CommandEnvelope`] JSON text frames (start/stop commands)
//!   and raw binary audio frames (sent without any JSON wrapper).
//! - **Incoming**: [`InboundMessage`] JSON text frames carrying a header with
//!   an event name, and raw binary frames carrying synthesized audio.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::base::{NlsError, NlsResult};

// =============================================================================
// Outgoing Messages (Client to Server)
// =============================================================================

/// Header of an outbound command.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandHeader {
    /// Unique per command
    pub message_id: String,
    /// Stable for the connection's active task
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Empty when the task type defines no name for this command
    pub name: String,
    pub appkey: String,
}

/// Start payload for speech synthesis.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SynthesisPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub voice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    pub format: String,
    pub sample_rate: u32,
    pub volume: u32,
    pub speech_rate: i32,
    pub pitch_rate: i32,
    pub enable_subtitle: bool,
    pub text: String,
}

/// Start payload for streaming recognition.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecognitionPayload {
    pub format: String,
    pub sample_rate: u32,
    pub enable_intermediate_result: bool,
    pub enable_punctuation_prediction: bool,
    pub enable_inverse_text_normalization: bool,
}

/// Task-specific command payload. Stop commands carry an empty object.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum CommandPayload {
    Synthesis(SynthesisPayload),
    Recognition(RecognitionPayload),
    Empty(EmptyPayload),
}

/// Serializes as `{}`.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct EmptyPayload {}

/// Client identity sent with every command.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SdkInfo {
    pub name: String,
    pub version: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandContext {
    pub sdk: SdkInfo,
}

impl Default for CommandContext {
    fn default() -> Self {
        Self {
            sdk: SdkInfo {
                name: "nls-rust-sdk".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                language: "rust".to_string(),
            },
        }
    }
}

/// Complete outbound command.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommandEnvelope {
    pub header: CommandHeader,
    pub payload: CommandPayload,
    pub context: CommandContext,
}

impl CommandEnvelope {
    /// Whether this envelope carries an empty (stop) payload.
    #[inline]
    pub fn is_stop(&self) -> bool {
        matches!(self.payload, CommandPayload::Empty(_))
    }
}

// =============================================================================
// Incoming Messages (Server to Client)
// =============================================================================

/// Header of an inbound control message.
///
/// Fields beyond the well-known ones are kept in `extra` so the raw header can
/// be forwarded to the caller unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseHeader {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Decoded inbound control message.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InboundMessage {
    pub header: ResponseHeader,
    #[serde(default)]
    pub payload: Value,
}

impl InboundMessage {
    /// Parse a WebSocket text frame.
    ///
    /// Frames that are not JSON, or lack a `header` object, are protocol
    /// errors.
    pub fn parse(text: &str) -> NlsResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| NlsError::ProtocolError(format!("Malformed control message: {e}")))
    }

    /// Classify the message by its event name.
    #[inline]
    pub fn event(&self) -> ResponseEvent {
        ResponseEvent::from_name(&self.header.name)
    }
}

/// Event names the service emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    /// Session metadata (common)
    MetaInfo,
    /// Task failure (common)
    TaskFailed,
    /// All synthesized audio has been sent
    SynthesisCompleted,
    /// Recognition task accepted
    RecognitionStarted,
    /// Intermediate recognition result
    RecognitionResultChanged,
    /// Final recognition result
    RecognitionCompleted,
    /// Any other name, kept for forward compatibility
    Unknown(String),
}

impl ResponseEvent {
    pub fn from_name(name: &str) -> Self {
        match name {
            "MetaInfo" => Self::MetaInfo,
            "TaskFailed" => Self::TaskFailed,
            "SynthesisCompleted" => Self::SynthesisCompleted,
            "RecognitionStarted" => Self::RecognitionStarted,
            "RecognitionResultChanged" => Self::RecognitionResultChanged,
            "RecognitionCompleted" => Self::RecognitionCompleted,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::MetaInfo => "MetaInfo",
            Self::TaskFailed => "TaskFailed",
            Self::SynthesisCompleted => "SynthesisCompleted",
            Self::RecognitionStarted => "RecognitionStarted",
            Self::RecognitionResultChanged => "RecognitionResultChanged",
            Self::RecognitionCompleted => "RecognitionCompleted",
            Self::Unknown(name) => name,
        }
    }
}
