//! NLS speech service client.
//!
//! This module provides a streaming client for the NLS WebSocket gateway with
//! support for:
//!
//! - Speech synthesis: one start command carrying the text, audio returned as
//!   binary frames and released on `SynthesisCompleted`
//! - Streaming recognition: start command, rate-paced binary audio upload,
//!   stop command, intermediate and final results as JSON
//! - Blob and array-buffer representations for binary frames
//!
//! # Architecture
//!
//! - [`base`]: Error type, task/transport enums, connection state, callbacks
//! - [`config`]: Session config, pacing classes, task defaults
//! - [`messages`]: Wire types for commands and inbound events
//! - [`command`]: Command envelope construction
//! - [`buffer`]: Inbound binary frame accumulation
//! - [`router`]: Event classification and callback dispatch
//! - [`link`]: Outbound frame queue with cancellation
//! - [`uploader`]: Rate-paced chunk upload with pluggable transmitters
//! - [`session`]: The `NlsSession` client and its connection task
//!
//! # Example
//!
//! ```rust,no_run
//! use nls_client::core::nls::{NlsData, NlsSession, SessionConfig, StartOptions, TaskType};
//! use std::future::Future;
//! use std::pin::Pin;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new(
//!         "wss://nls-gateway.cn-shanghai.aliyuncs.com/ws/v1",
//!         "your-token",
//!         "your-appkey",
//!     );
//!     let session = NlsSession::new(config, TaskType::Synthesis)?;
//!
//!     let options = StartOptions::new().on_data(Arc::new(|data: NlsData| {
//!         Box::pin(async move {
//!             if let Some(audio) = data.audio_bytes() {
//!                 println!("Received {} bytes of audio", audio.len());
//!             }
//!         }) as Pin<Box<dyn Future<Output = ()> + Send>>
//!     }));
//!
//!     session.start(options).await?;
//!     session.send_text(Some("你好")).await?;
//!     session.closed().await;
//!     Ok(())
//! }
//! ```
//!
//! # Rate Classes
//!
//! | Sample rate | Chunk size | Interval |
//! |-------------|------------|----------|
//! | 16000 | 3200 bytes | 100 ms |
//! | 8000 | 3200 bytes | 200 ms |

pub mod base;
pub mod buffer;
pub mod command;
pub mod config;
pub mod link;
pub mod messages;
pub mod router;
pub mod session;
pub mod uploader;

pub use base::{
    AudioBlob, BLOB_CONTENT_TYPE, CloseCallback, ConnectionState, DataCallback, ErrorCallback,
    MessageCallback, NlsData, NlsError, NlsResult, StartOptions, TaskType, TransportMode, new_id,
};
pub use buffer::AccumulationBuffer;
pub use command::{CommandEncoder, CommandNames, STOP_SENTINEL};
pub use config::{
    DEFAULT_NLS_URL, PacingConfig, RecognitionParams, RecorderPreset, SessionConfig,
    SynthesisParams,
};
pub use link::{Outbound, SocketLink};
pub use messages::{CommandEnvelope, InboundMessage, ResponseEvent, ResponseHeader};
pub use router::{Dispatch, ResponseRouter, Route, route};
pub use session::NlsSession;
pub use uploader::{
    BlobTransmitter, BufferTransmitter, ChunkTransmitter, ChunkedUploader, UploadReport,
    transmitter_for,
};
