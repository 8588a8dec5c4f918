//! Accumulation of inbound binary frames for one connection.

use bytes::{Bytes, BytesMut};

use super::base::{AudioBlob, NlsData, TransportMode};

/// Collects binary frames in arrival order until a completion event
/// releases them.
///
/// The transport mode picks the representation: blob mode keeps each frame
/// as a separate segment, array-buffer mode concatenates into one buffer.
#[derive(Debug)]
pub struct AccumulationBuffer {
    mode: TransportMode,
    blob: AudioBlob,
    bytes: BytesMut,
}

impl AccumulationBuffer {
    pub fn new(mode: TransportMode) -> Self {
        Self {
            mode,
            blob: AudioBlob::new(),
            bytes: BytesMut::new(),
        }
    }

    #[inline]
    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub fn push(&mut self, frame: Bytes) {
        match self.mode {
            TransportMode::Blob => self.blob.push(frame),
            TransportMode::ArrayBuffer => self.bytes.extend_from_slice(&frame),
        }
    }

    pub fn len(&self) -> usize {
        match self.mode {
            TransportMode::Blob => self.blob.len(),
            TransportMode::ArrayBuffer => self.bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&mut self) {
        self.blob = AudioBlob::new();
        self.bytes.clear();
    }

    /// Hand the accumulated audio over, leaving the buffer empty.
    pub fn take(&mut self) -> NlsData {
        match self.mode {
            TransportMode::Blob => NlsData::Blob(std::mem::take(&mut self.blob)),
            TransportMode::ArrayBuffer => NlsData::Buffer(self.bytes.split().freeze()),
        }
    }
}
