//! Per-message delivery checks.
//!
//! A consumer validates every frame it receives before acknowledging it:
//! the frame must be a MESSAGE, it must come from the consumer's own queue,
//! it must carry the next sequence number, and its body must be filler.
//! The first failed check is fatal for the consumer.

use stompload_proto::{Command, Frame, header};
use thiserror::Error;

use crate::{destination::Destination, payload::Filler};

/// Why a delivered frame was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Broker delivered something other than a MESSAGE frame
    #[error("expected MESSAGE frame, got {command}")]
    WrongFrame {
        /// Command actually delivered
        command: Command,
    },

    /// Message was routed from another queue
    #[error("queue mismatch: expected {expected}, got {}", .actual.as_deref().unwrap_or("<absent>"))]
    QueueMismatch {
        /// Queue number of the consumer's destination
        expected: String,
        /// `qnum` header of the message, if any
        actual: Option<String>,
    },

    /// Message arrived out of order, duplicated, or after a gap
    #[error("sequence mismatch: expected {expected}, got {}", .actual.as_deref().unwrap_or("<absent>"))]
    SequenceMismatch {
        /// Next sequence number the consumer expected
        expected: u64,
        /// `msgnum` header of the message, if any
        actual: Option<String>,
    },

    /// Message lacks a header required to process it
    #[error("missing header: {name}")]
    MissingHeader {
        /// Name of the missing header
        name: &'static str,
    },

    /// Body is not a prefix of the filler pattern
    #[error("body of {len} bytes is not filler")]
    BodyMismatch {
        /// Length of the rejected body
        len: usize,
    },
}

/// Check a delivered frame against the consumer's queue and position.
///
/// `expected` is the 1-based sequence number the consumer is waiting for.
/// String headers are compared textually so a malformed `msgnum` is reported
/// verbatim rather than as a parse failure.
pub fn validate_delivery(
    frame: &Frame,
    destination: &Destination,
    expected: u64,
) -> Result<(), ValidationError> {
    if frame.command != Command::Message {
        return Err(ValidationError::WrongFrame { command: frame.command });
    }

    let queue = destination.index().to_string();
    let qnum = frame.header(header::QNUM);
    if qnum != Some(queue.as_str()) {
        return Err(ValidationError::QueueMismatch {
            expected: queue,
            actual: qnum.map(str::to_string),
        });
    }

    let msgnum = frame.header(header::MSGNUM);
    if msgnum != Some(expected.to_string().as_str()) {
        return Err(ValidationError::SequenceMismatch {
            expected,
            actual: msgnum.map(str::to_string),
        });
    }

    if !Filler::verify(&frame.body) {
        return Err(ValidationError::BodyMismatch { len: frame.body.len() });
    }

    Ok(())
}
