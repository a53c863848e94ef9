//! Destinations and the messages produced to them.

use std::fmt;

use bytes::Bytes;
use stompload_proto::{Headers, header};

/// A queue the harness drives one producer and one consumer against.
///
/// The broker-facing name is `prefix[.tag].index`. Destinations are
/// immutable once handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    prefix: String,
    run_tag: Option<String>,
    index: u32,
    name: String,
}

impl Destination {
    /// Destination `index` (1-based) under `prefix`, optionally tagged.
    pub fn new(prefix: impl Into<String>, run_tag: Option<String>, index: u32) -> Self {
        let prefix = prefix.into();
        let name = match &run_tag {
            Some(tag) => format!("{prefix}.{tag}.{index}"),
            None => format!("{prefix}.{index}"),
        };
        Self { prefix, run_tag, index, name }
    }

    /// Queue prefix shared by every destination of a run.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Tag distinguishing this run's queues from other runs.
    pub fn run_tag(&self) -> Option<&str> {
        self.run_tag.as_deref()
    }

    /// Queue number carried in the `qnum` header.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Broker-facing destination name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One tagged message a producer sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Broker-facing destination name
    pub destination: String,
    /// Queue number of the destination
    pub queue_number: u32,
    /// 1-based, dense sequence number within the destination
    pub sequence: u64,
    /// Id of the producer that sent it
    pub sender_id: String,
    /// Filler body
    pub payload: Bytes,
}

impl Message {
    /// Message `sequence` for `destination`.
    pub fn new(destination: &Destination, sequence: u64, sender_id: &str, payload: Bytes) -> Self {
        Self {
            destination: destination.name().to_string(),
            queue_number: destination.index(),
            sequence,
            sender_id: sender_id.to_string(),
            payload,
        }
    }

    /// SEND headers carrying the message's routing and tracking tags.
    pub fn headers(&self, persistent: bool) -> Headers {
        let mut headers = Headers::new()
            .with(header::DESTINATION, self.destination.as_str())
            .with(header::SENDER_ID, self.sender_id.as_str())
            .with(header::QNUM, self.queue_number.to_string())
            .with(header::MSGNUM, self.sequence.to_string());
        if persistent {
            headers.push(header::PERSISTENT, "true");
        }
        headers
    }
}
