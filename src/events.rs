//! Event sinks for live streaming
//!
//! Agent runs and orchestrations push typed events into an [`EventSink`].
//! The HTTP layer drains the receiving end into an SSE response. When the
//! client goes away the receiver is dropped, `emit` starts returning
//! `false` and producers stop at their next boundary.

use tokio::sync::mpsc;

/// Channel capacity used by the HTTP layer
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Sending half of an event stream
#[derive(Debug)]
pub struct EventSink<T> {
    tx: Option<mpsc::Sender<T>>,
}

impl<T> Clone for EventSink<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T: Send + 'static> EventSink<T> {
    /// Create a sink and the receiver that drains it
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops every event
    pub fn discard() -> Self {
        Self { tx: None }
    }

    /// Deliver an event; returns `false` once the consumer has gone away
    pub async fn emit(&self, event: T) -> bool {
        match &self.tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => true,
        }
    }

    /// Whether the consumer has disconnected
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map(|tx| tx.is_closed()).unwrap_or(false)
    }
}
