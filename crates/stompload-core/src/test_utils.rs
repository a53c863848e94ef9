//! Test doubles for unit tests inside this crate.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use stompload_proto::{Command, Frame, Headers, ProtocolVersion};
use tokio::sync::mpsc;

use crate::{
    adapter::{AdapterError, Delivery, MessageData, Session, SessionMetrics},
    env::Environment,
};

/// Environment with OS randomness whose sleeps complete at once and are
/// counted.
#[derive(Clone, Default)]
pub struct MockEnv {
    sleeps: Arc<AtomicUsize>,
}

impl MockEnv {
    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Environment for MockEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap();
    }
}

/// Frame the session was asked to write.
#[derive(Debug, Clone, PartialEq)]
pub struct Written {
    pub command: Command,
    pub headers: Headers,
    pub body: Bytes,
}

/// Session that records writes and serves scripted deliveries.
pub struct MockSession {
    pub protocol: ProtocolVersion,
    pub written: Mutex<Vec<Written>>,
    scripted: Mutex<Option<mpsc::UnboundedReceiver<MessageData>>>,
    pub fail_send_at: Option<usize>,
    pub fail_ack: bool,
}

impl MockSession {
    /// Session whose first subscription yields `script`, then closes.
    pub fn new(protocol: ProtocolVersion, script: Vec<MessageData>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for item in script {
            tx.send(item).unwrap();
        }
        Self {
            protocol,
            written: Mutex::new(Vec::new()),
            scripted: Mutex::new(Some(rx)),
            fail_send_at: None,
            fail_ack: false,
        }
    }

    pub fn written(&self, command: Command) -> Vec<Written> {
        self.written.lock().unwrap().iter().filter(|w| w.command == command).cloned().collect()
    }

    fn record(&self, command: Command, headers: Headers, body: Bytes) -> usize {
        let mut written = self.written.lock().unwrap();
        written.push(Written { command, headers, body });
        written.iter().filter(|w| w.command == command).count()
    }
}

#[async_trait]
impl Session for MockSession {
    fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    async fn subscribe(&self, headers: Headers) -> Result<Delivery, AdapterError> {
        self.record(Command::Subscribe, headers, Bytes::new());
        let inbox = self.scripted.lock().unwrap().take().ok_or(AdapterError::Closed)?;
        Ok(Delivery::new(inbox))
    }

    async fn send(&self, headers: Headers, body: Bytes) -> Result<(), AdapterError> {
        let n = self.record(Command::Send, headers, body);
        if self.fail_send_at == Some(n) {
            return Err(AdapterError::Broker("send rejected".to_string()));
        }
        Ok(())
    }

    async fn ack(&self, headers: Headers) -> Result<(), AdapterError> {
        self.record(Command::Ack, headers, Bytes::new());
        if self.fail_ack {
            return Err(AdapterError::Broker("ack rejected".to_string()));
        }
        Ok(())
    }

    async fn unsubscribe(&self, headers: Headers) -> Result<(), AdapterError> {
        self.record(Command::Unsubscribe, headers, Bytes::new());
        Ok(())
    }

    async fn disconnect(&self, headers: Headers) -> Result<(), AdapterError> {
        self.record(Command::Disconnect, headers, Bytes::new());
        Ok(())
    }

    fn metrics(&self) -> SessionMetrics {
        let written = self.written.lock().unwrap();
        SessionMetrics { frames_written: written.len() as u64, ..SessionMetrics::default() }
    }
}

/// MESSAGE frame as a broker would deliver it.
pub fn delivered(queue: u32, sequence: u64, body: &'static [u8]) -> MessageData {
    let headers = Headers::new()
        .with("message-id", format!("m-{queue}-{sequence}"))
        .with("subscription", "sub")
        .with("ack", format!("a-{queue}-{sequence}"))
        .with("qnum", queue.to_string())
        .with("msgnum", sequence.to_string());
    Ok(Frame::new(Command::Message, headers, Bytes::from_static(body)))
}
