//! Acknowledgment modes and protocol-level header dialects.
//!
//! Each protocol level names subscriptions and acknowledgments differently.
//! A [`Dialect`] captures those rules once; sessions pick theirs from the
//! negotiated [`ProtocolVersion`] via [`dialect_for`] and every subscribe,
//! unsubscribe and ack call site goes through it.
//!
//! | level | subscribe      | unsubscribe   | ack                          |
//! |-------|----------------|---------------|------------------------------|
//! | 1.0   | destination    | destination   | message-id                   |
//! | 1.1   | destination+id | id            | message-id + subscription    |
//! | 1.2   | destination+id | id            | id (from the message's ack)  |
//!
//! Every ACK also echoes the message's `qnum` and `msgnum` when present, so
//! broker-side traces can tie an acknowledgment to its message.

use std::{fmt, str::FromStr};

use stompload_proto::{Headers, ProtocolVersion, header};

use crate::{config::ConfigError, validation::ValidationError};

/// How a consumer confirms receipt of messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AckMode {
    /// Broker acknowledges on delivery; no ACK frames are sent
    #[default]
    Auto,
    /// Consumer acknowledges; brokers may treat acks as cumulative
    Client,
    /// Consumer acknowledges exactly the received message
    ClientIndividual,
}

impl AckMode {
    /// Wire spelling used on SUBSCRIBE.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Client => "client",
            Self::ClientIndividual => "client-individual",
        }
    }

    /// True when the consumer must send an ACK per message.
    pub fn requires_ack(self) -> bool {
        self != Self::Auto
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AckMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "client" => Ok(Self::Client),
            "client-individual" => Ok(Self::ClientIndividual),
            other => Err(ConfigError::InvalidAckMode(other.to_string())),
        }
    }
}

/// Protocol-level header rules for subscriptions and acknowledgments.
pub trait Dialect: Send + Sync {
    /// Level these rules belong to.
    fn version(&self) -> ProtocolVersion;

    /// Headers for a SUBSCRIBE frame.
    fn subscribe_headers(&self, destination: &str, subscription_id: &str, ack: AckMode)
    -> Headers;

    /// Headers for an UNSUBSCRIBE frame.
    fn unsubscribe_headers(&self, destination: &str, subscription_id: &str) -> Headers;

    /// Headers for an ACK of the message carrying `message` headers.
    ///
    /// Fails when the message lacks the header this level acknowledges by.
    fn ack_headers(
        &self,
        message: &Headers,
        subscription_id: &str,
    ) -> Result<Headers, ValidationError>;
}

struct Stomp10;
struct Stomp11;
struct Stomp12;

/// Append the message's `qnum` and `msgnum` to `ack`.
fn tracked(mut ack: Headers, message: &Headers) -> Headers {
    for name in [header::QNUM, header::MSGNUM] {
        if let Some(value) = message.value(name) {
            ack.push(name, value);
        }
    }
    ack
}

fn required<'a>(message: &'a Headers, name: &'static str) -> Result<&'a str, ValidationError> {
    message.value(name).ok_or(ValidationError::MissingHeader { name })
}

impl Dialect for Stomp10 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1_0
    }

    fn subscribe_headers(&self, destination: &str, _: &str, ack: AckMode) -> Headers {
        Headers::new().with(header::DESTINATION, destination).with(header::ACK, ack.as_str())
    }

    fn unsubscribe_headers(&self, destination: &str, _: &str) -> Headers {
        Headers::new().with(header::DESTINATION, destination)
    }

    fn ack_headers(&self, message: &Headers, _: &str) -> Result<Headers, ValidationError> {
        let message_id = required(message, header::MESSAGE_ID)?;
        Ok(tracked(Headers::new().with(header::MESSAGE_ID, message_id), message))
    }
}

impl Dialect for Stomp11 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1_1
    }

    fn subscribe_headers(&self, destination: &str, subscription_id: &str, ack: AckMode) -> Headers {
        Headers::new()
            .with(header::DESTINATION, destination)
            .with(header::ACK, ack.as_str())
            .with(header::ID, subscription_id)
    }

    fn unsubscribe_headers(&self, _: &str, subscription_id: &str) -> Headers {
        Headers::new().with(header::ID, subscription_id)
    }

    fn ack_headers(
        &self,
        message: &Headers,
        subscription_id: &str,
    ) -> Result<Headers, ValidationError> {
        let message_id = required(message, header::MESSAGE_ID)?;
        let ack = Headers::new()
            .with(header::MESSAGE_ID, message_id)
            .with(header::SUBSCRIPTION, subscription_id);
        Ok(tracked(ack, message))
    }
}

impl Dialect for Stomp12 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1_2
    }

    fn subscribe_headers(&self, destination: &str, subscription_id: &str, ack: AckMode) -> Headers {
        Headers::new()
            .with(header::DESTINATION, destination)
            .with(header::ACK, ack.as_str())
            .with(header::ID, subscription_id)
    }

    fn unsubscribe_headers(&self, _: &str, subscription_id: &str) -> Headers {
        Headers::new().with(header::ID, subscription_id)
    }

    fn ack_headers(&self, message: &Headers, _: &str) -> Result<Headers, ValidationError> {
        let ack_id = required(message, header::ACK)?;
        Ok(tracked(Headers::new().with(header::ID, ack_id), message))
    }
}

/// Dialect for a negotiated protocol level.
pub fn dialect_for(version: ProtocolVersion) -> &'static dyn Dialect {
    match version {
        ProtocolVersion::V1_0 => &Stomp10,
        ProtocolVersion::V1_1 => &Stomp11,
        ProtocolVersion::V1_2 => &Stomp12,
    }
}

/// Build ACK headers for a received message.
pub fn build_ack(
    version: ProtocolVersion,
    message: &Headers,
    subscription_id: &str,
) -> Result<Headers, ValidationError> {
    dialect_for(version).ack_headers(message, subscription_id)
}
