//! NLS socket session.
//!
//! [`NlsSession`] owns one WebSocket connection at a time and drives the
//! start/stream/stop lifecycle for a single task type.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌───────────────────┐     ┌──────────────────┐
//! │ send_text()      │────▶│ SocketLink (mpsc) │────▶│ Connection Task  │
//! │ send_audio_*()   │     └───────────────────┘     └────────┬─────────┘
//! └──────────────────┘                                        │
//!                           ┌───────────────────┐             │
//!                           │ AccumulationBuffer│◀── binary ──┤
//!                           └─────────┬─────────┘             │
//!                                     │                       │
//!                           ┌─────────▼─────────┐             │
//!                           │  ResponseRouter   │◀── text ────┘
//!                           └─────────┬─────────┘
//!                                     │
//!                                     ▼
//!                             caller callbacks
//! ```
//!
//! # State Machine
//!
//! `Disconnected → Connecting → Open → Closing → Disconnected`. A failed
//! connect goes straight from `Connecting` back to `Disconnected`. There is
//! no automatic reconnect; `start` on a session that is not `Disconnected` is
//! rejected.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use super::base::{
    CloseCallback, ConnectionState, ErrorCallback, NlsError, NlsResult, StartOptions, TaskType,
    new_id,
};
use super::buffer::AccumulationBuffer;
use super::command::{CommandEncoder, STOP_SENTINEL};
use super::config::{PacingConfig, RecognitionParams, SessionConfig, SynthesisParams};
use super::link::{Outbound, SocketLink};
use super::messages::InboundMessage;
use super::router::{Dispatch, ResponseRouter};
use super::uploader::{
    BlobTransmitter, BufferTransmitter, ChunkTransmitter, ChunkedUploader, UploadReport,
};

// =============================================================================
// Constants
// =============================================================================

/// Capacity of the outbound frame queue.
const OUTBOUND_QUEUE_SIZE: usize = 64;

/// How long to wait for the server's close frame after we sent ours.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Shared State
// =============================================================================

/// State shared between the session handle and its connection task.
#[derive(Default)]
struct Shared {
    state: RwLock<ConnectionState>,
    task_id: RwLock<Option<String>>,
    link: RwLock<Option<SocketLink>>,
}

impl Shared {
    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write();
        if *state != next {
            debug!("NLS session state: {} -> {}", *state, next);
            *state = next;
        }
    }

    /// Move to `Closing` unless already past it.
    fn begin_closing(&self) {
        let mut state = self.state.write();
        if *state == ConnectionState::Open {
            debug!("NLS session state: {} -> {}", *state, ConnectionState::Closing);
            *state = ConnectionState::Closing;
        }
    }

    fn reset(&self) {
        *self.link.write() = None;
        *self.task_id.write() = None;
        self.set_state(ConnectionState::Disconnected);
    }
}

/// Result of handling one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameOutcome {
    /// Keep reading
    Continue,
    /// The router asked to close the session
    Close,
    /// The server closed the socket
    Closed,
}

// =============================================================================
// NlsSession
// =============================================================================

/// Client for one NLS task type over a single WebSocket connection.
///
/// All operations take `&self`; the session may be shared behind an `Arc`
/// between the caller driving the upload and the code awaiting results.
pub struct NlsSession {
    config: SessionConfig,
    encoder: Arc<CommandEncoder>,
    pacing: PacingConfig,
    shared: Arc<Shared>,
    connection_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl NlsSession {
    /// Create a session. No network activity happens until [`start`](Self::start).
    pub fn new(config: SessionConfig, task_type: TaskType) -> NlsResult<Self> {
        config.validate()?;

        let encoder = CommandEncoder::new(task_type, config.appkey.clone());
        let pacing = encoder.recognition_params().pacing()?;

        Ok(Self {
            config,
            encoder: Arc::new(encoder),
            pacing,
            shared: Arc::new(Shared::default()),
            connection_handle: parking_lot::Mutex::new(None),
        })
    }

    pub fn with_synthesis_params(mut self, params: SynthesisParams) -> Self {
        self.encoder = Arc::new(self.encoder.as_ref().clone().with_synthesis_params(params));
        self
    }

    /// Override recognition defaults. Pacing follows the new sample rate.
    pub fn with_recognition_params(mut self, params: RecognitionParams) -> NlsResult<Self> {
        self.pacing = params.pacing()?;
        self.encoder = Arc::new(self.encoder.as_ref().clone().with_recognition_params(params));
        Ok(self)
    }

    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    #[inline]
    pub fn task_type(&self) -> TaskType {
        self.encoder.task_type()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Task id of the active connection, if any.
    pub fn task_id(&self) -> Option<String> {
        self.shared.task_id.read().clone()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
            && self
                .shared
                .link
                .read()
                .as_ref()
                .is_some_and(SocketLink::is_open)
    }

    pub fn pacing(&self) -> &PacingConfig {
        &self.pacing
    }

    /// Open the socket and install the callbacks.
    ///
    /// Returns once the socket is open, or with the connect error. A missing
    /// `on_data` callback is rejected before any network activity.
    pub async fn start(&self, options: StartOptions) -> NlsResult<()> {
        let on_data = options.on_data.clone().ok_or_else(|| {
            NlsError::ConfigurationError("on_data callback is required".to_string())
        })?;
        let url = self.config.build_websocket_url()?;

        {
            let mut state = self.shared.state.write();
            if *state != ConnectionState::Disconnected {
                return Err(NlsError::InvalidState(format!(
                    "start called while session is {}",
                    *state
                )));
            }
            *state = ConnectionState::Connecting;
        }

        info!(
            "Connecting to NLS gateway at {}",
            url.host_str().unwrap_or_default()
        );

        let ws_stream = match self.connect(url.as_str()).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("{}", e);
                self.shared.reset();
                return Err(e);
            }
        };

        let task_id = new_id();
        let (tx, rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE_SIZE);
        let link = SocketLink::new(tx);

        *self.shared.task_id.write() = Some(task_id.clone());
        *self.shared.link.write() = Some(link.clone());
        self.shared.set_state(ConnectionState::Open);

        info!(
            "Connected to NLS gateway ({} task {})",
            self.task_type(),
            task_id
        );

        let router = ResponseRouter::new(on_data, options.on_message, options.on_error.clone());
        let buffer = AccumulationBuffer::new(self.config.transport);

        let handle = tokio::spawn(Self::run_connection(
            ws_stream,
            rx,
            link,
            router,
            buffer,
            self.shared.clone(),
            options.on_close,
            options.on_error,
        ));
        *self.connection_handle.lock() = Some(handle);

        Ok(())
    }

    async fn connect(&self, url: &str) -> NlsResult<WsStream> {
        let connect = connect_async(url);
        let result = match self.config.connect_timeout {
            Some(limit) => timeout(limit, connect).await.map_err(|_| {
                NlsError::Timeout(format!(
                    "WebSocket did not open within {} ms",
                    limit.as_millis()
                ))
            })?,
            None => connect.await,
        };

        result
            .map(|(stream, _response)| stream)
            .map_err(|e| NlsError::ConnectionFailed(format!("Failed to connect to NLS gateway: {e}")))
    }

    /// Send a command for the active task.
    ///
    /// `None` or any text sends the start command; [`STOP_SENTINEL`] sends the
    /// stop command. Does nothing when no connection is open.
    pub async fn send_text(&self, text: Option<&str>) -> NlsResult<()> {
        let Some((link, task_id)) = self.active() else {
            debug!("send_text ignored: no active connection");
            return Ok(());
        };

        let frame = self.encoder.encode(&task_id, text)?;
        debug!("Sending {} command: {}", self.task_type(), frame);
        link.send_text(frame).await;
        Ok(())
    }

    /// Signal end of input with the task's stop command.
    pub async fn stop_audio(&self) -> NlsResult<()> {
        info!("Sending stop command for {} task", self.task_type());
        self.send_text(Some(STOP_SENTINEL)).await
    }

    /// Stream `payload` by slicing it directly, then send the stop command.
    ///
    /// Resolves once every chunk was sent or the connection closed. Returns
    /// `None` without sending anything when no connection is open.
    pub async fn send_audio_blob(&self, payload: Bytes) -> Option<UploadReport> {
        let (link, task_id) = self.active()?;
        let uploader = self.uploader(Box::new(BlobTransmitter))?;
        info!("Sending {} bytes of audio (blob)", payload.len());

        Some(stream_audio(uploader, link, self.encoder.clone(), task_id, payload).await)
    }

    /// Stream `payload` through the buffered read step on a background task.
    ///
    /// Returns immediately; the handle resolves with the upload report.
    pub fn send_audio_buffer(&self, payload: Bytes) -> Option<JoinHandle<UploadReport>> {
        let (link, task_id) = self.active()?;
        let uploader = self.uploader(Box::new(BufferTransmitter::default()))?;
        info!("Sending {} bytes of audio (arraybuffer)", payload.len());

        let encoder = self.encoder.clone();
        Some(tokio::spawn(stream_audio(
            uploader, link, encoder, task_id, payload,
        )))
    }

    /// Close the connection. Pending uploads stop at once and frames still
    /// queued are discarded.
    pub fn close(&self, code: Option<u16>, reason: Option<&str>) {
        let Some(link) = self.shared.link.read().clone() else {
            return;
        };

        info!("Closing NLS connection");
        self.shared.begin_closing();

        let frame = code.map(|code| CloseFrame {
            code: code.into(),
            reason: reason.unwrap_or_default().to_string().into(),
        });
        link.request_close(frame);
    }

    /// Wait until the connection task has finished its teardown.
    pub async fn closed(&self) {
        let handle = self.connection_handle.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!("NLS connection task ended abnormally: {}", e);
        }
    }

    fn active(&self) -> Option<(SocketLink, String)> {
        let link = self.shared.link.read().clone()?;
        let task_id = self.shared.task_id.read().clone()?;
        link.is_open().then_some((link, task_id))
    }

    fn uploader(&self, transmitter: Box<dyn ChunkTransmitter>) -> Option<ChunkedUploader> {
        match ChunkedUploader::new(self.pacing, transmitter) {
            Ok(uploader) => Some(uploader),
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    // =========================================================================
    // Connection Task
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    async fn run_connection(
        ws_stream: WsStream,
        mut outbound: mpsc::Receiver<Outbound>,
        link: SocketLink,
        router: ResponseRouter,
        mut buffer: AccumulationBuffer,
        shared: Arc<Shared>,
        on_close: Option<CloseCallback>,
        on_error: Option<ErrorCallback>,
    ) {
        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let cancel = link.cancellation();
        let mut closing = false;
        let mut failure: Option<NlsError> = None;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    shared.begin_closing();
                    closing = true;
                    if let Err(e) = ws_sink.send(Message::Close(link.take_close_frame())).await {
                        debug!("Failed to send close frame: {}", e);
                    }
                    break;
                }

                Some(frame) = outbound.recv() => {
                    let message = match frame {
                        Outbound::Text(text) => Message::Text(text.into()),
                        Outbound::Binary(data) => Message::Binary(data),
                    };

                    if let Err(e) = ws_sink.send(message).await {
                        failure = Some(NlsError::NetworkError(format!("Failed to send frame: {e}")));
                        break;
                    }
                }

                message = ws_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            match Self::handle_websocket_message(msg, &router, &mut buffer).await {
                                FrameOutcome::Continue => {}
                                FrameOutcome::Close => {
                                    shared.begin_closing();
                                    link.shut();
                                    closing = true;
                                    if let Err(e) = ws_sink.send(Message::Close(None)).await {
                                        debug!("Failed to send close frame: {}", e);
                                    }
                                    break;
                                }
                                FrameOutcome::Closed => break,
                            }
                        }
                        Some(Err(e)) => {
                            failure = Some(NlsError::NetworkError(format!("WebSocket error: {e}")));
                            break;
                        }
                        None => {
                            info!("NLS WebSocket stream ended");
                            break;
                        }
                    }
                }
            }
        }

        link.shut();

        if closing {
            let drain = async {
                while let Some(Ok(msg)) = ws_stream.next().await {
                    if matches!(msg, Message::Close(_)) {
                        break;
                    }
                }
            };
            if timeout(CLOSE_HANDSHAKE_TIMEOUT, drain).await.is_err() {
                debug!("Server did not acknowledge close frame");
            }
        }

        // Callbacks see a Disconnected session and may start it again.
        shared.reset();
        info!("NLS WebSocket connection closed");

        if let Some(error) = failure {
            error!("{}", error);
            if let Some(on_error) = &on_error {
                on_error(error).await;
            }
        }

        if let Some(on_close) = on_close {
            on_close().await;
        }
    }

    /// Classify one inbound frame.
    ///
    /// Binary frames go to the accumulation buffer; text frames are decoded
    /// and routed. Frames that fail to decode are logged and skipped.
    pub(crate) async fn handle_websocket_message(
        message: Message,
        router: &ResponseRouter,
        buffer: &mut AccumulationBuffer,
    ) -> FrameOutcome {
        match message {
            Message::Binary(data) => {
                debug!("Received {} bytes of binary audio", data.len());
                buffer.push(data);
                FrameOutcome::Continue
            }
            Message::Text(text) => {
                debug!("Received NLS message: {}", text.as_str());
                match InboundMessage::parse(text.as_str()) {
                    Ok(inbound) => match router.dispatch(inbound, buffer).await {
                        Dispatch::Continue => FrameOutcome::Continue,
                        Dispatch::Close => FrameOutcome::Close,
                    },
                    Err(e) => {
                        warn!("Skipping inbound frame: {}", e);
                        FrameOutcome::Continue
                    }
                }
            }
            Message::Close(frame) => {
                info!("NLS WebSocket closed by server: {:?}", frame);
                FrameOutcome::Closed
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => FrameOutcome::Continue,
        }
    }
}

impl Drop for NlsSession {
    fn drop(&mut self) {
        if let Some(link) = self.shared.link.read().clone() {
            link.request_close(None);
        }
    }
}

impl std::fmt::Debug for NlsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NlsSession")
            .field("task_type", &self.task_type())
            .field("state", &self.state())
            .field("task_id", &self.task_id())
            .field("pacing", &self.pacing)
            .finish()
    }
}

/// Paced upload followed by the stop command once every byte went out.
async fn stream_audio(
    mut uploader: ChunkedUploader,
    link: SocketLink,
    encoder: Arc<CommandEncoder>,
    task_id: String,
    payload: Bytes,
) -> UploadReport {
    let report = uploader.upload(&link, payload).await;

    if report.completed() && uploader.settle(&link).await {
        match encoder.encode(&task_id, Some(STOP_SENTINEL)) {
            Ok(frame) => {
                if link.send_text(frame).await {
                    debug!("Sent stop command after {} chunks", report.chunks_sent);
                }
            }
            Err(e) => warn!("Failed to encode stop command: {}", e),
        }
    }

    report
}
