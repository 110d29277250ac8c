use crate::error::TransportError;
use crate::message::Frame;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// The writable side of one client stream, owned by exactly one connection.
///
/// `write` may be slow; the engine bounds every call with its write deadline.
/// `close` must be cheap and idempotent because it can run from a drop guard.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn write(&self, frame: Frame) -> Result<(), TransportError>;

    fn close(&self);
}

/// Transport backed by a bounded channel whose receiver feeds an SSE body.
///
/// Closing drops the sender so the body stream ends once buffered frames
/// drain. A dropped receiver (client went away) surfaces as
/// [`TransportError::Closed`] on the next write.
pub struct ChannelTransport {
    sender: Mutex<Option<mpsc::Sender<Frame>>>,
}

impl ChannelTransport {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (
            Self {
                sender: Mutex::new(Some(sender)),
            },
            receiver,
        )
    }

    fn sender(&self) -> Option<mpsc::Sender<Frame>> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn write(&self, frame: Frame) -> Result<(), TransportError> {
        let sender = self.sender().ok_or(TransportError::Closed)?;
        sender
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }
}
