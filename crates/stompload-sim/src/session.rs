//! Adapter and session over a [`MemoryBroker`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use stompload_core::{
    AdapterError, ConnectOptions, Delivery, ProtocolAdapter, Session, SessionMetrics,
};
use stompload_proto::{Command, Frame, Headers, ProtocolVersion, header};
use tokio::time::Instant;

use crate::broker::{Counters, MemoryBroker};

/// [`ProtocolAdapter`] opening sessions on an in-process broker.
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    broker: MemoryBroker,
}

impl MemoryAdapter {
    /// Adapter for `broker`.
    pub fn new(broker: MemoryBroker) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl ProtocolAdapter for MemoryAdapter {
    type Session = MemorySession;

    async fn connect(
        &self,
        options: &ConnectOptions,
        headers: Headers,
    ) -> Result<MemorySession, AdapterError> {
        let counters = Arc::new(Counters::default());
        counters.written(&Frame::bodyless(Command::Connect, headers.clone()));

        let (id, protocol) = self.broker.open(&headers)?;
        counters.read(&Frame::bodyless(
            Command::Connected,
            Headers::new().with(header::VERSION, protocol.as_str()),
        ));
        tracing::debug!(session = id, address = %options.address(), %protocol, "memory session opened");

        Ok(MemorySession {
            id,
            protocol,
            broker: self.broker.clone(),
            counters,
            started: Instant::now(),
            closed: AtomicBool::new(false),
            lifetime_nanos: AtomicU64::new(0),
        })
    }
}

/// Session on a [`MemoryBroker`].
///
/// Every call writes one frame and is counted as such, including calls the
/// broker rejects.
#[derive(Debug)]
pub struct MemorySession {
    id: u64,
    protocol: ProtocolVersion,
    broker: MemoryBroker,
    counters: Arc<Counters>,
    started: Instant,
    closed: AtomicBool,
    /// Lifetime frozen at disconnect
    lifetime_nanos: AtomicU64,
}

impl MemorySession {
    /// Broker-assigned session number.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True once DISCONNECT went out.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn write(&self, command: Command, headers: &Headers, body: &Bytes) -> Result<(), AdapterError> {
        if self.is_closed() {
            return Err(AdapterError::Closed);
        }
        self.counters.written(&Frame::new(command, headers.clone(), body.clone()));
        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    async fn subscribe(&self, headers: Headers) -> Result<Delivery, AdapterError> {
        self.write(Command::Subscribe, &headers, &Bytes::new())?;
        self.broker.subscribe(self.id, self.protocol, &headers, Arc::clone(&self.counters))
    }

    async fn send(&self, headers: Headers, body: Bytes) -> Result<(), AdapterError> {
        self.write(Command::Send, &headers, &body)?;
        self.broker.send(&headers, body)
    }

    async fn ack(&self, headers: Headers) -> Result<(), AdapterError> {
        self.write(Command::Ack, &headers, &Bytes::new())?;
        self.broker.ack(self.id, self.protocol, &headers)
    }

    async fn unsubscribe(&self, headers: Headers) -> Result<(), AdapterError> {
        self.write(Command::Unsubscribe, &headers, &Bytes::new())?;
        self.broker.unsubscribe(self.id, self.protocol, &headers)
    }

    async fn disconnect(&self, headers: Headers) -> Result<(), AdapterError> {
        self.write(Command::Disconnect, &headers, &Bytes::new())?;
        let lifetime = u64::try_from(self.started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.lifetime_nanos.store(lifetime, Ordering::Release);
        self.closed.store(true, Ordering::Release);
        self.broker.close(self.id);
        tracing::debug!(session = self.id, "memory session closed");
        Ok(())
    }

    fn metrics(&self) -> SessionMetrics {
        let elapsed = if self.is_closed() {
            Duration::from_nanos(self.lifetime_nanos.load(Ordering::Acquire))
        } else {
            self.started.elapsed()
        };
        SessionMetrics {
            frames_read: self.counters.frames_read.load(Ordering::Relaxed),
            bytes_read: self.counters.bytes_read.load(Ordering::Relaxed),
            frames_written: self.counters.frames_written.load(Ordering::Relaxed),
            bytes_written: self.counters.bytes_written.load(Ordering::Relaxed),
            elapsed,
        }
    }
}
