//! Handle to the outbound half of an open connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Frames queued for the connection task.
#[derive(Debug)]
pub enum Outbound {
    Text(String),
    Binary(Bytes),
}

/// Cloneable sender side of one connection.
///
/// Sends on a closed link are dropped and reported as `false`, never as
/// errors. The cancellation token fires once the connection starts closing
/// so pacing loops and the connection task stop without waiting for the
/// queue. A requested close frame is parked beside the queue, so a full
/// queue cannot swallow it.
#[derive(Debug, Clone)]
pub struct SocketLink {
    tx: mpsc::Sender<Outbound>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
    close_frame: Arc<Mutex<Option<CloseFrame>>>,
}

impl SocketLink {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            tx,
            open: Arc::new(AtomicBool::new(true)),
            cancel: CancellationToken::new(),
            close_frame: Arc::new(Mutex::new(None)),
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Mark the link closed and cancel its token.
    pub fn shut(&self) {
        self.open.store(false, Ordering::Release);
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn send_binary(&self, data: Bytes) -> bool {
        self.send(Outbound::Binary(data)).await
    }

    pub async fn send_text(&self, text: String) -> bool {
        self.send(Outbound::Text(text)).await
    }

    /// Ask the connection task to close with `frame`, then shut the link.
    ///
    /// The first frame requested wins; later requests only shut.
    pub fn request_close(&self, frame: Option<CloseFrame>) {
        {
            let mut slot = self.close_frame.lock();
            if slot.is_none() {
                *slot = frame;
            }
        }
        self.shut();
    }

    /// Close frame requested for this link, if any.
    pub fn take_close_frame(&self) -> Option<CloseFrame> {
        self.close_frame.lock().take()
    }

    async fn send(&self, frame: Outbound) -> bool {
        if !self.is_open() {
            debug!("Dropping outbound frame: connection not open");
            return false;
        }
        self.tx.send(frame).await.is_ok()
    }
}
