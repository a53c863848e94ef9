//! Fault injection for the in-process broker.
//!
//! Faults are scripted rather than random: each names the destination and
//! the message sequence number (`msgnum`) it applies to, so a test knows
//! exactly which error the harness must surface.

/// One scripted misbehavior of the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Every CONNECT is refused
    RefuseConnect,
    /// SEND of `sequence` to `destination` is rejected
    FailSend {
        /// Destination name
        destination: String,
        /// `msgnum` of the rejected message
        sequence: u64,
    },
    /// ACK of `sequence` on `destination` is rejected
    FailAck {
        /// Destination name
        destination: String,
        /// `msgnum` of the message whose ack is rejected
        sequence: u64,
    },
    /// Delivery of `sequence` is replaced by a transport error
    ReceiveError {
        /// Destination name
        destination: String,
        /// `msgnum` of the message replaced
        sequence: u64,
    },
    /// `sequence` is accepted but never delivered
    Drop {
        /// Destination name
        destination: String,
        /// `msgnum` of the lost message
        sequence: u64,
    },
    /// `sequence` is delivered twice
    Duplicate {
        /// Destination name
        destination: String,
        /// `msgnum` of the duplicated message
        sequence: u64,
    },
    /// `sequence` is held back and delivered after its successor
    Reorder {
        /// Destination name
        destination: String,
        /// `msgnum` of the delayed message
        sequence: u64,
    },
    /// Body of `sequence` is overwritten with non-filler bytes
    CorruptBody {
        /// Destination name
        destination: String,
        /// `msgnum` of the corrupted message
        sequence: u64,
    },
    /// `sequence` is delivered as an ERROR frame
    ErrorFrame {
        /// Destination name
        destination: String,
        /// `msgnum` of the replaced message
        sequence: u64,
    },
    /// Nothing sent to `destination` is ever delivered
    Stall {
        /// Destination name
        destination: String,
    },
}

/// What the broker does with a message on its way to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeliveryFault {
    ReceiveError,
    Drop,
    Duplicate,
    Reorder,
    CorruptBody,
    ErrorFrame,
}

/// Installed faults.
#[derive(Debug, Clone, Default)]
pub(crate) struct FaultPlan {
    faults: Vec<Fault>,
}

impl FaultPlan {
    pub(crate) fn push(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    pub(crate) fn refuses_connect(&self) -> bool {
        self.faults.contains(&Fault::RefuseConnect)
    }

    pub(crate) fn fails_send(&self, dest: &str, seq: u64) -> bool {
        self.faults.iter().any(|f| {
            matches!(f, Fault::FailSend { destination, sequence } if destination == dest && *sequence == seq)
        })
    }

    pub(crate) fn fails_ack(&self, dest: &str, seq: u64) -> bool {
        self.faults.iter().any(|f| {
            matches!(f, Fault::FailAck { destination, sequence } if destination == dest && *sequence == seq)
        })
    }

    pub(crate) fn stalls(&self, dest: &str) -> bool {
        self.faults
            .iter()
            .any(|f| matches!(f, Fault::Stall { destination } if destination == dest))
    }

    /// First delivery fault installed for `dest`/`seq`.
    pub(crate) fn on_delivery(&self, dest: &str, seq: u64) -> Option<DeliveryFault> {
        self.faults.iter().find_map(|fault| {
            let (destination, sequence, kind) = match fault {
                Fault::ReceiveError { destination, sequence } => {
                    (destination, sequence, DeliveryFault::ReceiveError)
                },
                Fault::Drop { destination, sequence } => (destination, sequence, DeliveryFault::Drop),
                Fault::Duplicate { destination, sequence } => {
                    (destination, sequence, DeliveryFault::Duplicate)
                },
                Fault::Reorder { destination, sequence } => {
                    (destination, sequence, DeliveryFault::Reorder)
                },
                Fault::CorruptBody { destination, sequence } => {
                    (destination, sequence, DeliveryFault::CorruptBody)
                },
                Fault::ErrorFrame { destination, sequence } => {
                    (destination, sequence, DeliveryFault::ErrorFrame)
                },
                _ => return None,
            };
            (destination == dest && *sequence == seq).then_some(kind)
        })
    }
}
