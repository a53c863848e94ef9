//! Run-level errors.
//!
//! Every failure ends the run. Workers return a [`HarnessError`] through the
//! completion barrier and the driver hands the first one back to its caller;
//! deciding to exit the process is left to the binary.

use std::time::Duration;

use thiserror::Error;

use crate::{adapter::AdapterError, config::ConfigError, validation::ValidationError};

/// Why a run failed.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Opening a connection failed
    #[error("connect failed for {connection}: {source}")]
    Connect {
        /// Connection label (`conn-N` or a worker id)
        connection: String,
        /// Adapter failure
        source: AdapterError,
    },

    /// SUBSCRIBE was rejected
    #[error("subscribe to {destination} failed: {source}")]
    Subscribe {
        /// Destination name
        destination: String,
        /// Adapter failure
        source: AdapterError,
    },

    /// UNSUBSCRIBE was rejected
    #[error("unsubscribe from {destination} failed: {source}")]
    Unsubscribe {
        /// Destination name
        destination: String,
        /// Adapter failure
        source: AdapterError,
    },

    /// SEND was rejected
    #[error("send of message {sequence} to {destination} failed: {source}")]
    Send {
        /// Destination name
        destination: String,
        /// Sequence number of the message
        sequence: u64,
        /// Adapter failure
        source: AdapterError,
    },

    /// Delivery stream reported an error or closed early
    #[error("receive of message {sequence} from {destination} failed: {source}")]
    Receive {
        /// Destination name
        destination: String,
        /// Sequence number the consumer was waiting for
        sequence: u64,
        /// Adapter failure
        source: AdapterError,
    },

    /// Delivered message broke ordering or content rules
    #[error("invalid delivery on {destination}: {source}")]
    Validation {
        /// Destination name
        destination: String,
        /// What was wrong
        source: ValidationError,
    },

    /// ACK was rejected
    #[error("ack of message {sequence} on {destination} failed: {source}")]
    Ack {
        /// Destination name
        destination: String,
        /// Sequence number of the acknowledged message
        sequence: u64,
        /// Adapter failure
        source: AdapterError,
    },

    /// DISCONNECT was rejected
    #[error("disconnect of {connection} failed: {source}")]
    Disconnect {
        /// Connection label
        connection: String,
        /// Adapter failure
        source: AdapterError,
    },

    /// Workers did not finish within the completion timeout
    #[error("{barrier} barrier timed out after {elapsed:?} with {outstanding} workers outstanding")]
    Timeout {
        /// `producers` or `consumers`
        barrier: &'static str,
        /// Workers that had not reported
        outstanding: usize,
        /// Time waited
        elapsed: Duration,
    },

    /// Configuration was rejected before any connection opened
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A worker task panicked or was cancelled outside the driver
    #[error("worker {worker} panicked: {reason}")]
    WorkerPanicked {
        /// Worker that died
        worker: String,
        /// Panic or cancellation message
        reason: String,
    },
}

impl HarnessError {
    /// Destination the error is attributed to, if any.
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Subscribe { destination, .. }
            | Self::Unsubscribe { destination, .. }
            | Self::Send { destination, .. }
            | Self::Receive { destination, .. }
            | Self::Validation { destination, .. }
            | Self::Ack { destination, .. } => Some(destination),
            _ => None,
        }
    }
}
