//! Mock NLS gateway
//!
//! In-process WebSocket server that speaks enough of the NLS protocol to drive
//! a real `NlsSession`:
//! - Synthesis: answers `StartSynthesis` with binary audio frames followed by
//!   `SynthesisCompleted`
//! - Recognition: answers `StartRecognition` with `RecognitionStarted`, every
//!   audio frame with `RecognitionResultChanged`, and `StopRecognition` with
//!   `RecognitionCompleted`
//! - Failure, unknown-event, silent and abrupt-drop behaviors for error paths
//!
//! Every frame the client sends is recorded with its arrival time.

// Not every test uses every helper
#![allow(dead_code)]

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// How the mock answers commands.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Stream these frames, then `SynthesisCompleted`
    Synthesis { frames: Vec<Bytes> },
    /// Partial result per audio frame, final result on stop
    Recognition,
    /// `TaskFailed` in answer to the first command
    Fail { status: i64, status_text: String },
    /// Answer the first command with an event outside the protocol table
    UnknownEvent { name: String },
    /// Record frames, never answer
    Silent,
    /// Drop the TCP connection on the first command
    Drop,
}

/// A frame received from the client.
#[derive(Debug, Clone)]
pub enum Received {
    Command(Value),
    Audio(Bytes),
    Close(Option<u16>),
}

#[derive(Debug, Clone)]
pub struct Record {
    pub at: Instant,
    pub frame: Received,
}

#[derive(Default)]
pub struct MockState {
    pub records: Mutex<Vec<Record>>,
    pub request_uris: Mutex<Vec<String>>,
}

impl MockState {
    fn record(&self, frame: Received) {
        self.records.lock().push(Record {
            at: Instant::now(),
            frame,
        });
    }

    pub fn commands(&self) -> Vec<Value> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match &r.frame {
                Received::Command(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn audio_frames(&self) -> Vec<(Instant, Bytes)> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match &r.frame {
                Received::Audio(b) => Some((r.at, b.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn close_codes(&self) -> Vec<Option<u16>> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match &r.frame {
                Received::Close(code) => Some(*code),
                _ => None,
            })
            .collect()
    }
}

pub struct MockNlsServer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockNlsServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState::default());

        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                let behavior = behavior.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state, behavior).await {
                        eprintln!("Mock NLS connection error: {e}");
                    }
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws/v1", self.addr)
    }
}

impl Drop for MockNlsServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn event(name: &str, task_id: &str, payload: Value) -> Message {
    let message = json!({
        "header": {
            "namespace": "Mock",
            "name": name,
            "status": 20000000,
            "status_text": "Gateway:SUCCESS:Success.",
            "message_id": format!("mock-{name}"),
            "task_id": task_id,
        },
        "payload": payload,
    });
    Message::Text(message.to_string().into())
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockState>,
    behavior: Behavior,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let uri_state = state.clone();
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        uri_state.request_uris.lock().push(req.uri().to_string());
        Ok(resp)
    };
    let ws_stream = accept_hdr_async(stream, callback).await?;
    let (mut write, mut read) = ws_stream.split();

    let mut audio_bytes = 0usize;
    let mut answered = false;

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let command: Value = serde_json::from_str(text.as_str())?;
                state.record(Received::Command(command.clone()));

                let name = command["header"]["name"].as_str().unwrap_or_default().to_string();
                let task_id = command["header"]["task_id"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();

                match &behavior {
                    Behavior::Synthesis { frames } if name == "StartSynthesis" => {
                        write.send(event("MetaInfo", &task_id, json!({}))).await?;
                        for frame in frames {
                            write.send(Message::Binary(frame.clone())).await?;
                        }
                        write
                            .send(event("SynthesisCompleted", &task_id, json!({})))
                            .await?;
                    }
                    Behavior::Recognition if name == "StartRecognition" => {
                        write
                            .send(event("RecognitionStarted", &task_id, json!({})))
                            .await?;
                    }
                    Behavior::Recognition if name == "StopRecognition" => {
                        let payload = json!({
                            "result": format!("heard {audio_bytes} bytes"),
                            "duration": audio_bytes / 32,
                        });
                        write
                            .send(event("RecognitionCompleted", &task_id, payload))
                            .await?;
                    }
                    Behavior::Fail {
                        status,
                        status_text,
                    } if !answered => {
                        let failure = json!({
                            "header": {
                                "name": "TaskFailed",
                                "status": status,
                                "status_text": status_text,
                                "task_id": task_id,
                            },
                            "payload": {},
                        });
                        write.send(Message::Text(failure.to_string().into())).await?;
                    }
                    Behavior::UnknownEvent { name: event_name } if !answered => {
                        write.send(event(event_name, &task_id, json!({}))).await?;
                    }
                    Behavior::Drop => return Ok(()),
                    _ => {}
                }
                answered = true;
            }
            Ok(Message::Binary(data)) => {
                audio_bytes += data.len();
                state.record(Received::Audio(data));

                if let Behavior::Recognition = behavior {
                    let payload = json!({ "result": format!("partial {audio_bytes}") });
                    write
                        .send(event("RecognitionResultChanged", "", payload))
                        .await?;
                }
            }
            Ok(Message::Close(frame)) => {
                state.record(Received::Close(frame.map(|f| u16::from(f.code))));
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    Ok(())
}

/// Poll `check` until it holds or `limit` elapses.
pub async fn wait_for(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
