//! Inbound control message routing.
//!
//! [`route`] is a pure classification of a decoded message into a [`Route`];
//! [`ResponseRouter`] applies a route by invoking the caller's callbacks and
//! draining the accumulation buffer where the route calls for it.

use serde_json::Value;
use tracing::{debug, error, info};

use super::base::{DataCallback, ErrorCallback, MessageCallback, NlsData, NlsError};
use super::buffer::AccumulationBuffer;
use super::messages::{InboundMessage, ResponseEvent, ResponseHeader};

/// What an inbound control message asks the session to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Release the accumulated audio to `on_data`, then close
    DeliverAudio,
    /// Deliver a structured result to `on_data`, closing afterwards if `close`
    DeliverResult { payload: Value, close: bool },
    /// Log the failure and close. Nothing reaches `on_data`.
    Fail { status: i64, status_text: String },
    /// Forward the raw header to `on_message`; no state change
    Notify(ResponseHeader),
}

/// Classify a control message by its event name.
///
/// Names outside the known table fall through to [`Route::Notify`].
pub fn route(message: InboundMessage) -> Route {
    match message.event() {
        ResponseEvent::SynthesisCompleted => Route::DeliverAudio,
        ResponseEvent::RecognitionCompleted => Route::DeliverResult {
            payload: message.payload,
            close: true,
        },
        ResponseEvent::RecognitionResultChanged => Route::DeliverResult {
            payload: message.payload,
            close: false,
        },
        ResponseEvent::TaskFailed => Route::Fail {
            status: message.header.status.unwrap_or_default(),
            status_text: message.header.status_text.unwrap_or_default(),
        },
        ResponseEvent::MetaInfo
        | ResponseEvent::RecognitionStarted
        | ResponseEvent::Unknown(_) => Route::Notify(message.header),
    }
}

/// Whether the connection should stay open after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Close,
}

/// Applies routes against the caller's callbacks.
#[derive(Clone)]
pub struct ResponseRouter {
    on_data: DataCallback,
    on_message: Option<MessageCallback>,
    on_error: Option<ErrorCallback>,
}

impl ResponseRouter {
    pub fn new(
        on_data: DataCallback,
        on_message: Option<MessageCallback>,
        on_error: Option<ErrorCallback>,
    ) -> Self {
        Self {
            on_data,
            on_message,
            on_error,
        }
    }

    pub async fn dispatch(
        &self,
        message: InboundMessage,
        buffer: &mut AccumulationBuffer,
    ) -> Dispatch {
        match route(message) {
            Route::DeliverAudio => {
                info!("Synthesis completed with {} bytes of audio", buffer.len());
                (self.on_data)(buffer.take()).await;
                Dispatch::Close
            }
            Route::DeliverResult { payload, close } => {
                debug!("Recognition result (final: {}): {}", close, payload);
                (self.on_data)(NlsData::Result(payload)).await;
                if close {
                    info!("Recognition completed");
                    Dispatch::Close
                } else {
                    Dispatch::Continue
                }
            }
            Route::Fail {
                status,
                status_text,
            } => {
                error!("NLS task failed (status {}): {}", status, status_text);
                if let Some(on_error) = &self.on_error {
                    on_error(NlsError::TaskFailed {
                        status,
                        status_text,
                    })
                    .await;
                }
                Dispatch::Close
            }
            Route::Notify(header) => {
                debug!("NLS event: {}", header.name);
                if let Some(on_message) = &self.on_message {
                    on_message(header).await;
                }
                Dispatch::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::nls::base::TransportMode;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;

    fn message(json: &str) -> InboundMessage {
        InboundMessage::parse(json).unwrap()
    }

    #[derive(Default)]
    struct Recorded {
        data: Mutex<Vec<NlsData>>,
        headers: Mutex<Vec<ResponseHeader>>,
        errors: Mutex<Vec<NlsError>>,
    }

    fn router(recorded: &Arc<Recorded>, with_message: bool) -> ResponseRouter {
        let r = recorded.clone();
        let on_data: DataCallback = Arc::new(move |data: NlsData| {
            let r = r.clone();
            Box::pin(async move { r.data.lock().push(data) }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let r = recorded.clone();
        let on_message: MessageCallback = Arc::new(move |header: ResponseHeader| {
            let r = r.clone();
            Box::pin(async move { r.headers.lock().push(header) })
                as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let r = recorded.clone();
        let on_error: ErrorCallback = Arc::new(move |err: NlsError| {
            let r = r.clone();
            Box::pin(async move { r.errors.lock().push(err) }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        ResponseRouter::new(on_data, with_message.then_some(on_message), Some(on_error))
    }

    #[test]
    fn test_route_table() {
        assert_eq!(
            route(message(r#"{"header":{"name":"SynthesisCompleted"}}"#)),
            Route::DeliverAudio
        );
        assert!(matches!(
            route(message(r#"{"header":{"name":"RecognitionCompleted"},"payload":{"result":"ok"}}"#)),
            Route::DeliverResult { close: true, .. }
        ));
        assert!(matches!(
            route(message(r#"{"header":{"name":"RecognitionResultChanged"},"payload":{}}"#)),
            Route::DeliverResult { close: false, .. }
        ));
        assert!(matches!(
            route(message(r#"{"header":{"name":"RecognitionStarted"}}"#)),
            Route::Notify(_)
        ));
    }

    #[test]
    fn test_route_failure_carries_status() {
        let routed = route(message(
            r#"{"header":{"name":"TaskFailed","status":40000002,"status_text":"Gateway:MESSAGE_INVALID"}}"#,
        ));
        assert_eq!(
            routed,
            Route::Fail {
                status: 40000002,
                status_text: "Gateway:MESSAGE_INVALID".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_name_routes_to_notify() {
        match route(message(r#"{"header":{"name":"SentenceEnd","status":20000000}}"#)) {
            Route::Notify(header) => assert_eq!(header.name, "SentenceEnd"),
            other => panic!("unexpected route: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_synthesis_completed_releases_buffer() {
        let recorded = Arc::new(Recorded::default());
        let router = router(&recorded, true);
        let mut buffer = AccumulationBuffer::new(TransportMode::ArrayBuffer);
        buffer.push(Bytes::from_static(b"abc"));
        buffer.push(Bytes::from_static(b"def"));

        let outcome = router
            .dispatch(message(r#"{"header":{"name":"SynthesisCompleted"}}"#), &mut buffer)
            .await;

        assert_eq!(outcome, Dispatch::Close);
        assert!(buffer.is_empty());
        let data = recorded.data.lock();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].audio_bytes().unwrap(), Bytes::from_static(b"abcdef"));
    }

    #[tokio::test]
    async fn test_dispatch_intermediate_keeps_open() {
        let recorded = Arc::new(Recorded::default());
        let router = router(&recorded, true);
        let mut buffer = AccumulationBuffer::new(TransportMode::Blob);

        let outcome = router
            .dispatch(
                message(r#"{"header":{"name":"RecognitionResultChanged"},"payload":{"result":"北京"}}"#),
                &mut buffer,
            )
            .await;

        assert_eq!(outcome, Dispatch::Continue);
        match &recorded.data.lock()[0] {
            NlsData::Result(payload) => assert_eq!(payload["result"], "北京"),
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_failure_skips_on_data() {
        let recorded = Arc::new(Recorded::default());
        let router = router(&recorded, true);
        let mut buffer = AccumulationBuffer::new(TransportMode::Blob);
        buffer.push(Bytes::from_static(b"partial"));

        let outcome = router
            .dispatch(
                message(r#"{"header":{"name":"TaskFailed","status":41010101,"status_text":"bad"}}"#),
                &mut buffer,
            )
            .await;

        assert_eq!(outcome, Dispatch::Close);
        assert!(recorded.data.lock().is_empty());
        assert!(matches!(
            recorded.errors.lock()[0],
            NlsError::TaskFailed { status: 41010101, .. }
        ));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_reaches_on_message() {
        let recorded = Arc::new(Recorded::default());
        let router = router(&recorded, true);
        let mut buffer = AccumulationBuffer::new(TransportMode::Blob);

        let outcome = router
            .dispatch(message(r#"{"header":{"name":"Whatever"}}"#), &mut buffer)
            .await;

        assert_eq!(outcome, Dispatch::Continue);
        assert_eq!(recorded.headers.lock()[0].name, "Whatever");
        assert!(recorded.data.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_without_on_message_does_not_fail() {
        let recorded = Arc::new(Recorded::default());
        let router = router(&recorded, false);
        let mut buffer = AccumulationBuffer::new(TransportMode::Blob);

        let outcome = router
            .dispatch(message(r#"{"header":{"name":"MetaInfo"}}"#), &mut buffer)
            .await;
        assert_eq!(outcome, Dispatch::Continue);
    }
}
