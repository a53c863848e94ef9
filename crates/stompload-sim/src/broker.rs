//! In-process broker.
//!
//! Reference semantics for the adapter seam: queues are created on first use,
//! hold messages until a subscriber exists, and deliver to exactly one
//! subscriber per destination in send order. Message ids, subscription
//! headers and ack ids follow the subscriber's negotiated protocol level, and
//! acks are checked against outstanding deliveries the way a strict broker
//! would check them.
//!
//! All state sits behind one mutex that is never held across an await, so
//! concurrent calls from tasks sharing a session are serialized frame by
//! frame.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use stompload_core::{AckMode, AdapterError, ConfigError, Delivery, MessageData};
use stompload_proto::{Command, Frame, Headers, ProtocolVersion, header};
use tokio::sync::mpsc;

use crate::{
    fault::{DeliveryFault, Fault, FaultPlan},
    session::MemoryAdapter,
};

/// Per-destination traffic seen by the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Messages accepted from producers
    pub sent: u64,
    /// MESSAGE frames handed to the subscriber
    pub delivered: u64,
    /// ACK frames accepted
    pub acked: u64,
    /// Messages waiting for a subscriber
    pub pending: usize,
}

/// Connection lifecycle counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Sessions successfully opened
    pub opened: u64,
    /// Sessions disconnected
    pub closed: u64,
}

/// Frame and byte counters of one session, shared with the broker so
/// deliveries are counted as reads when they are enqueued.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) frames_read: AtomicU64,
    pub(crate) bytes_read: AtomicU64,
    pub(crate) frames_written: AtomicU64,
    pub(crate) bytes_written: AtomicU64,
}

impl Counters {
    pub(crate) fn read(&self, frame: &Frame) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(frame.encoded_len() as u64, Ordering::Relaxed);
    }

    pub(crate) fn written(&self, frame: &Frame) {
        self.frames_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(frame.encoded_len() as u64, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
struct Pending {
    headers: Headers,
    body: Bytes,
    sequence: Option<u64>,
}

#[derive(Debug)]
struct Subscriber {
    session: u64,
    id: String,
    ack_mode: AckMode,
    protocol: ProtocolVersion,
    counters: Arc<Counters>,
    tx: mpsc::UnboundedSender<MessageData>,
}

#[derive(Debug, Default)]
struct Queue {
    pending: VecDeque<Pending>,
    /// Message held back by a reorder fault until its successor is delivered
    held: Option<Pending>,
    subscriber: Option<Subscriber>,
    stats: QueueStats,
}

#[derive(Debug)]
struct Unacked {
    destination: String,
    sequence: Option<u64>,
    session: u64,
    subscription: String,
}

#[derive(Debug, Default)]
struct BrokerState {
    queues: HashMap<String, Queue>,
    unacked: HashMap<String, Unacked>,
    faults: FaultPlan,
    credentials: Option<(String, String)>,
    next_session: u64,
    next_message: u64,
    connections: ConnectionStats,
}

/// Shared handle to an in-process broker. Clones see the same queues.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    /// Empty broker accepting any credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject connects whose `login`/`passcode` differ from these.
    pub fn require_credentials(&self, login: impl Into<String>, passcode: impl Into<String>) {
        self.lock().credentials = Some((login.into(), passcode.into()));
    }

    /// Install a fault.
    pub fn inject(&self, fault: Fault) {
        tracing::debug!(?fault, "fault installed");
        self.lock().faults.push(fault);
    }

    /// Adapter opening sessions on this broker.
    pub fn adapter(&self) -> MemoryAdapter {
        MemoryAdapter::new(self.clone())
    }

    /// Traffic seen on `destination`, if it was ever used.
    pub fn queue_stats(&self, destination: &str) -> Option<QueueStats> {
        self.lock().queues.get(destination).map(Queue::snapshot)
    }

    /// Every destination used so far, sorted.
    pub fn destinations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().queues.keys().cloned().collect();
        names.sort();
        names
    }

    /// Traffic summed over all destinations.
    pub fn totals(&self) -> QueueStats {
        self.lock().queues.values().map(Queue::snapshot).fold(QueueStats::default(), |acc, q| {
            QueueStats {
                sent: acc.sent + q.sent,
                delivered: acc.delivered + q.delivered,
                acked: acc.acked + q.acked,
                pending: acc.pending + q.pending,
            }
        })
    }

    /// Connection lifecycle counts.
    pub fn connections(&self) -> ConnectionStats {
        self.lock().connections
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        #[allow(clippy::expect_used)]
        self.state.lock().expect("broker mutex poisoned")
    }

    pub(crate) fn open(&self, headers: &Headers) -> Result<(u64, ProtocolVersion), AdapterError> {
        let mut state = self.lock();
        if state.faults.refuses_connect() {
            return Err(AdapterError::Transport("connection refused".to_string()));
        }
        if let Some((login, passcode)) = &state.credentials {
            let accepted = headers.contains_kv(header::LOGIN, login)
                && headers.contains_kv(header::PASSCODE, passcode);
            if !accepted {
                return Err(AdapterError::Broker("authentication failed".to_string()));
            }
        }
        let protocol = negotiate(headers)?;

        state.next_session += 1;
        state.connections.opened += 1;
        Ok((state.next_session, protocol))
    }

    pub(crate) fn close(&self, session: u64) {
        let mut state = self.lock();
        for queue in state.queues.values_mut() {
            if queue.subscriber.as_ref().is_some_and(|s| s.session == session) {
                queue.subscriber = None;
            }
        }
        state.connections.closed += 1;
    }

    pub(crate) fn subscribe(
        &self,
        session: u64,
        protocol: ProtocolVersion,
        headers: &Headers,
        counters: Arc<Counters>,
    ) -> Result<Delivery, AdapterError> {
        let destination = required(headers, header::DESTINATION, "SUBSCRIBE")?.to_string();
        let ack_mode = headers
            .value(header::ACK)
            .map(str::parse::<AckMode>)
            .transpose()
            .map_err(|err: ConfigError| AdapterError::Broker(err.to_string()))?
            .unwrap_or_default();
        let id = match protocol {
            ProtocolVersion::V1_0 => headers.value(header::ID).unwrap_or(&destination).to_string(),
            _ => required(headers, header::ID, "SUBSCRIBE")?.to_string(),
        };

        let mut state = self.lock();
        let queue = state.queues.entry(destination.clone()).or_default();
        if queue.subscriber.is_some() {
            return Err(AdapterError::Broker(format!("{destination} already has a subscriber")));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        queue.subscriber = Some(Subscriber { session, id, ack_mode, protocol, counters, tx });
        state.flush(&destination);
        Ok(Delivery::new(rx))
    }

    pub(crate) fn send(&self, headers: &Headers, body: Bytes) -> Result<(), AdapterError> {
        let destination = required(headers, header::DESTINATION, "SEND")?.to_string();
        let sequence = headers.value(header::MSGNUM).and_then(|v| v.parse().ok());

        let mut state = self.lock();
        if sequence.is_some_and(|seq| state.faults.fails_send(&destination, seq)) {
            return Err(AdapterError::Broker(format!("send to {destination} rejected")));
        }
        let queue = state.queues.entry(destination.clone()).or_default();
        queue.pending.push_back(Pending { headers: headers.clone(), body, sequence });
        queue.stats.sent += 1;
        state.flush(&destination);
        Ok(())
    }

    pub(crate) fn ack(
        &self,
        session: u64,
        protocol: ProtocolVersion,
        headers: &Headers,
    ) -> Result<(), AdapterError> {
        let key_header = match protocol {
            ProtocolVersion::V1_2 => header::ID,
            _ => header::MESSAGE_ID,
        };
        let key = required(headers, key_header, "ACK")?;

        let mut state = self.lock();
        let Some(entry) = state.unacked.get(key) else {
            return Err(AdapterError::Broker(format!("unknown ack {key}")));
        };
        if entry.session != session {
            return Err(AdapterError::Broker(format!("ack {key} from foreign session")));
        }
        if protocol == ProtocolVersion::V1_1
            && !headers.contains_kv(header::SUBSCRIPTION, &entry.subscription)
        {
            return Err(AdapterError::Broker(format!("ack {key} names the wrong subscription")));
        }
        if entry.sequence.is_some_and(|seq| state.faults.fails_ack(&entry.destination, seq)) {
            return Err(AdapterError::Broker(format!("ack {key} rejected")));
        }

        if let Some(entry) = state.unacked.remove(key) {
            if let Some(queue) = state.queues.get_mut(&entry.destination) {
                queue.stats.acked += 1;
            }
        }
        Ok(())
    }

    pub(crate) fn unsubscribe(
        &self,
        session: u64,
        protocol: ProtocolVersion,
        headers: &Headers,
    ) -> Result<(), AdapterError> {
        let mut state = self.lock();
        let found = state.queues.iter_mut().find(|(name, queue)| {
            queue.subscriber.as_ref().is_some_and(|sub| {
                sub.session == session
                    && match protocol {
                        ProtocolVersion::V1_0 => headers.contains_kv(header::DESTINATION, name),
                        _ => headers.contains_kv(header::ID, &sub.id),
                    }
            })
        });
        match found {
            Some((_, queue)) => {
                queue.subscriber = None;
                Ok(())
            },
            None => Err(AdapterError::Broker(format!("unknown subscription {headers}"))),
        }
    }
}

impl Queue {
    fn snapshot(&self) -> QueueStats {
        QueueStats { pending: self.pending.len() + usize::from(self.held.is_some()), ..self.stats }
    }
}

impl BrokerState {
    /// Hand pending messages of `destination` to its subscriber, if any.
    fn flush(&mut self, destination: &str) {
        if self.faults.stalls(destination) {
            return;
        }
        let Self { queues, unacked, faults, next_message, .. } = self;
        let Some(queue) = queues.get_mut(destination) else {
            return;
        };
        let Some(subscriber) = &queue.subscriber else {
            return;
        };

        while let Some(message) = queue.pending.pop_front() {
            let fault = message.sequence.and_then(|seq| faults.on_delivery(destination, seq));
            if fault == Some(DeliveryFault::Reorder) && queue.held.is_none() {
                queue.held = Some(message);
                continue;
            }
            if fault == Some(DeliveryFault::Drop) {
                continue;
            }

            deliver(subscriber, destination, message, fault, unacked, next_message);
            queue.stats.delivered += 1;
            if let Some(held) = queue.held.take() {
                deliver(subscriber, destination, held, None, unacked, next_message);
                queue.stats.delivered += 1;
            }
        }
    }
}

fn deliver(
    subscriber: &Subscriber,
    destination: &str,
    message: Pending,
    fault: Option<DeliveryFault>,
    unacked: &mut HashMap<String, Unacked>,
    next_message: &mut u64,
) {
    let frame = match fault {
        Some(DeliveryFault::ReceiveError) => {
            let err = AdapterError::Transport(format!("connection reset delivering to {destination}"));
            let _ = subscriber.tx.send(Err(err));
            return;
        },
        Some(DeliveryFault::ErrorFrame) => Frame::bodyless(
            Command::Error,
            Headers::new().with(header::MESSAGE, format!("{destination} is unavailable")),
        ),
        _ => {
            *next_message += 1;
            let message_id = format!("msg-{next_message}");
            let mut headers = message.headers;
            headers.push(header::MESSAGE_ID, message_id.as_str());
            if subscriber.protocol != ProtocolVersion::V1_0 {
                headers.push(header::SUBSCRIPTION, subscriber.id.as_str());
            }
            let ack_key = if subscriber.protocol == ProtocolVersion::V1_2 {
                let ack_id = format!("ack-{next_message}");
                headers.push(header::ACK, ack_id.as_str());
                ack_id
            } else {
                message_id
            };

            let body = if fault == Some(DeliveryFault::CorruptBody) {
                Bytes::from(vec![b'#'; message.body.len().max(1)])
            } else {
                message.body
            };
            headers.push(header::CONTENT_LENGTH, body.len().to_string());

            if subscriber.ack_mode.requires_ack() {
                unacked.insert(ack_key, Unacked {
                    destination: destination.to_string(),
                    sequence: message.sequence,
                    session: subscriber.session,
                    subscription: subscriber.id.clone(),
                });
            }
            Frame::new(Command::Message, headers, body)
        },
    };

    let copies = if fault == Some(DeliveryFault::Duplicate) { 2 } else { 1 };
    for _ in 0..copies {
        subscriber.counters.read(&frame);
        // A closed receiver means the consumer is gone; the frame is lost as
        // it would be on a dead socket.
        let _ = subscriber.tx.send(Ok(frame.clone()));
    }
}

fn required<'a>(
    headers: &'a Headers,
    name: &'static str,
    command: &str,
) -> Result<&'a str, AdapterError> {
    headers
        .value(name)
        .ok_or_else(|| AdapterError::Broker(format!("{command} without {name} header")))
}

/// Highest offered level; no `accept-version` means 1.0.
fn negotiate(headers: &Headers) -> Result<ProtocolVersion, AdapterError> {
    let Some(offered) = headers.value(header::ACCEPT_VERSION) else {
        return Ok(ProtocolVersion::V1_0);
    };
    offered
        .split(',')
        .filter_map(|v| v.parse::<ProtocolVersion>().ok())
        .max()
        .ok_or_else(|| AdapterError::Broker(format!("no supported version in {offered}")))
}
