//! Frame vocabulary for the stompload workload harness.
//!
//! This crate defines the pieces of the broker protocol the harness reasons
//! about: negotiated protocol versions, frame commands, ordered header lists
//! and frames. It does not read or write the wire. Adapters own framing; the
//! harness only builds header lists and inspects delivered frames.
//!
//! # Components
//!
//! - [`ProtocolVersion`]: negotiated protocol level (1.0, 1.1, 1.2)
//! - [`Command`]: frame command verbs
//! - [`Headers`]: ordered, duplicate-tolerant header list
//! - [`Frame`]: command + headers + body, with a wire-size estimate

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod errors;
pub mod frame;
pub mod headers;
pub mod version;

pub use command::Command;
pub use errors::ProtocolError;
pub use frame::Frame;
pub use headers::Headers;
pub use version::ProtocolVersion;

/// Well-known header names used by the harness.
pub mod header {
    /// Target destination of a SEND or SUBSCRIBE.
    pub const DESTINATION: &str = "destination";
    /// Subscription id (1.1+) or ack id (1.2 ACK frames).
    pub const ID: &str = "id";
    /// Acknowledgment mode on SUBSCRIBE, ack id on 1.2 MESSAGE frames.
    pub const ACK: &str = "ack";
    /// Broker-assigned message identifier.
    pub const MESSAGE_ID: &str = "message-id";
    /// Subscription a MESSAGE was delivered on.
    pub const SUBSCRIPTION: &str = "subscription";
    /// Queue number of a harness message.
    pub const QNUM: &str = "qnum";
    /// Sequence number of a harness message (1-based).
    pub const MSGNUM: &str = "msgnum";
    /// Unique id of the producer that sent a message.
    pub const SENDER_ID: &str = "senderId";
    /// Requests broker persistence of a message.
    pub const PERSISTENT: &str = "persistent";
    /// Body length in bytes.
    pub const CONTENT_LENGTH: &str = "content-length";
    /// CONNECT credential.
    pub const LOGIN: &str = "login";
    /// CONNECT credential.
    pub const PASSCODE: &str = "passcode";
    /// Versions offered on CONNECT (1.1+).
    pub const ACCEPT_VERSION: &str = "accept-version";
    /// Version chosen by the broker on CONNECTED.
    pub const VERSION: &str = "version";
    /// Virtual host on CONNECT (1.1+).
    pub const HOST: &str = "host";
    /// Heart-beat negotiation on CONNECT (1.1+).
    pub const HEART_BEAT: &str = "heart-beat";
    /// Error summary on ERROR frames.
    pub const MESSAGE: &str = "message";
}
