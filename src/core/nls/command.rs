//! Command envelope construction.
//!
//! Each task type maps to a namespace and a table of command names. A start
//! command carries the task's default payload; a stop command is requested by
//! passing [`STOP_SENTINEL`] as the text and carries an empty payload.

use super::base::{NlsError, NlsResult, TaskType, new_id};
use super::config::{RecognitionParams, SynthesisParams};
use super::messages::{
    CommandContext, CommandEnvelope, CommandHeader, CommandPayload, EmptyPayload,
    RecognitionPayload, SynthesisPayload,
};

/// Text value that turns a command into the task's stop command.
pub const STOP_SENTINEL: &str = "_asr_stop_";

/// Namespace and command names defined for a task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandNames {
    pub namespace: Option<&'static str>,
    pub start: Option<&'static str>,
    pub stop: Option<&'static str>,
}

impl CommandNames {
    pub fn for_task(task_type: TaskType) -> Self {
        match task_type {
            TaskType::Synthesis => Self {
                namespace: Some("SpeechSynthesizer"),
                start: Some("StartSynthesis"),
                stop: None,
            },
            TaskType::Recognition => Self {
                namespace: Some("SpeechRecognizer"),
                start: Some("StartRecognition"),
                stop: Some("StopRecognition"),
            },
            TaskType::Transcription => Self {
                namespace: None,
                start: None,
                stop: None,
            },
        }
    }

    /// Stop name, falling back to the start name, else empty.
    pub fn stop_name(&self) -> &'static str {
        self.stop.or(self.start).unwrap_or_default()
    }

    pub fn start_name(&self) -> &'static str {
        self.start.unwrap_or_default()
    }
}

/// Builds start and stop envelopes for one task type.
#[derive(Debug, Clone)]
pub struct CommandEncoder {
    task_type: TaskType,
    appkey: String,
    synthesis: SynthesisParams,
    recognition: RecognitionParams,
    context: CommandContext,
}

impl CommandEncoder {
    pub fn new(task_type: TaskType, appkey: impl Into<String>) -> Self {
        Self {
            task_type,
            appkey: appkey.into(),
            synthesis: SynthesisParams::default(),
            recognition: RecognitionParams::default(),
            context: CommandContext::default(),
        }
    }

    pub fn with_synthesis_params(mut self, params: SynthesisParams) -> Self {
        self.synthesis = params;
        self
    }

    pub fn with_recognition_params(mut self, params: RecognitionParams) -> Self {
        self.recognition = params;
        self
    }

    #[inline]
    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn recognition_params(&self) -> &RecognitionParams {
        &self.recognition
    }

    /// Default start payload for the task type.
    ///
    /// Fails with a configuration error for task types without a payload
    /// template.
    pub fn generate_start_payload(&self, text: Option<&str>) -> NlsResult<CommandPayload> {
        match self.task_type {
            TaskType::Synthesis => {
                let p = &self.synthesis;
                Ok(CommandPayload::Synthesis(SynthesisPayload {
                    speaker: p.speaker.clone(),
                    voice: p.voice.clone(),
                    emotion: p.emotion.clone(),
                    format: p.format.clone(),
                    sample_rate: p.sample_rate,
                    volume: p.volume,
                    speech_rate: p.speech_rate,
                    pitch_rate: p.pitch_rate,
                    enable_subtitle: p.enable_subtitle,
                    text: text.unwrap_or_default().to_string(),
                }))
            }
            TaskType::Recognition => {
                let p = &self.recognition;
                Ok(CommandPayload::Recognition(RecognitionPayload {
                    format: p.format.clone(),
                    sample_rate: p.sample_rate,
                    enable_intermediate_result: p.enable_intermediate_result,
                    enable_punctuation_prediction: p.enable_punctuation_prediction,
                    enable_inverse_text_normalization: p.enable_inverse_text_normalization,
                }))
            }
            other => Err(NlsError::ConfigurationError(format!(
                "No payload template for task type: {other}"
            ))),
        }
    }

    /// Build an envelope for the active task.
    ///
    /// `text == Some(STOP_SENTINEL)` selects the stop command; anything else
    /// is a start command carrying `text` in its payload where applicable.
    pub fn build(&self, task_id: &str, text: Option<&str>) -> NlsResult<CommandEnvelope> {
        let names = CommandNames::for_task(self.task_type);
        let is_stop = text == Some(STOP_SENTINEL);

        let (name, payload) = if is_stop {
            (names.stop_name(), CommandPayload::Empty(EmptyPayload::default()))
        } else {
            (names.start_name(), self.generate_start_payload(text)?)
        };

        Ok(CommandEnvelope {
            header: CommandHeader {
                message_id: new_id(),
                task_id: task_id.to_string(),
                namespace: names.namespace.map(str::to_string),
                name: name.to_string(),
                appkey: self.appkey.clone(),
            },
            payload,
            context: self.context.clone(),
        })
    }

    /// Build and serialize an envelope into a text frame.
    pub fn encode(&self, task_id: &str, text: Option<&str>) -> NlsResult<String> {
        let envelope = self.build(task_id, text)?;
        serde_json::to_string(&envelope).map_err(|e| NlsError::SerializationError(e.to_string()))
    }
}
