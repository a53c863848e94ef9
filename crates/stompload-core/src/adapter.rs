//! Broker adapter seam.
//!
//! The harness never touches the wire. A [`ProtocolAdapter`] opens sessions;
//! a [`Session`] sends, subscribes, acknowledges and disconnects with header
//! lists the harness builds. Adapters own framing, heart-beats and TLS.
//!
//! # Adapter Preconditions
//!
//! - A session may be shared by many tasks through an `Arc`. Concurrent
//!   calls must not interleave frames on the wire.
//! - Each subscription gets its own [`Delivery`] channel; messages for one
//!   subscription never appear on another's channel.
//! - Frame and byte counters cover every frame the session has read or
//!   written, and keep their final values after disconnect.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use stompload_proto::{Frame, Headers, ProtocolVersion};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::ConnectOptions;

/// One item of a subscription's delivery stream.
pub type MessageData = Result<Frame, AdapterError>;

/// Failures reported by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// Connection could not be established or broke
    #[error("transport error: {0}")]
    Transport(String),

    /// Broker rejected a frame
    #[error("broker error: {0}")]
    Broker(String),

    /// Session or subscription was already closed
    #[error("session closed")]
    Closed,
}

/// Delivery stream of a single subscription.
#[derive(Debug)]
pub struct Delivery {
    inbox: mpsc::UnboundedReceiver<MessageData>,
}

impl Delivery {
    /// Wrap the receiving half of a subscription channel.
    pub fn new(inbox: mpsc::UnboundedReceiver<MessageData>) -> Self {
        Self { inbox }
    }

    /// Next delivered item, or `None` once the adapter closed the channel.
    pub async fn recv(&mut self) -> Option<MessageData> {
        self.inbox.recv().await
    }
}

/// Traffic counters of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMetrics {
    /// Frames received from the broker
    pub frames_read: u64,
    /// Bytes received from the broker
    pub bytes_read: u64,
    /// Frames sent to the broker
    pub frames_written: u64,
    /// Bytes sent to the broker
    pub bytes_written: u64,
    /// Time since the session connected
    pub elapsed: Duration,
}

/// Live broker session.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Protocol level negotiated at connect.
    fn protocol(&self) -> ProtocolVersion;

    /// Register a subscription and return its delivery stream.
    async fn subscribe(&self, headers: Headers) -> Result<Delivery, AdapterError>;

    /// Send a message.
    async fn send(&self, headers: Headers, body: Bytes) -> Result<(), AdapterError>;

    /// Acknowledge a delivered message.
    async fn ack(&self, headers: Headers) -> Result<(), AdapterError>;

    /// Remove a subscription.
    async fn unsubscribe(&self, headers: Headers) -> Result<(), AdapterError>;

    /// Close the session.
    async fn disconnect(&self, headers: Headers) -> Result<(), AdapterError>;

    /// Current traffic counters.
    fn metrics(&self) -> SessionMetrics;
}

/// Factory for broker sessions.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync + 'static {
    /// Session type this adapter opens.
    type Session: Session;

    /// Open a session with `headers` as the CONNECT header list.
    async fn connect(
        &self,
        options: &ConnectOptions,
        headers: Headers,
    ) -> Result<Self::Session, AdapterError>;
}

#[cfg(test)]
mod tests {
    use stompload_proto::Command;

    use super::*;

    #[tokio::test]
    async fn delivery_yields_until_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut delivery = Delivery::new(rx);

        let frame = Frame::bodyless(Command::Message, Headers::new());
        tx.send(Ok(frame.clone())).unwrap();
        tx.send(Err(AdapterError::Closed)).unwrap();
        drop(tx);

        assert_eq!(delivery.recv().await, Some(Ok(frame)));
        assert_eq!(delivery.recv().await, Some(Err(AdapterError::Closed)));
        assert_eq!(delivery.recv().await, None);
    }
}
