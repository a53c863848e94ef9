//! Frame command verbs.

use std::fmt;

/// Command verb carried on the first line of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client opens a session
    Connect,
    /// Broker accepts a session
    Connected,
    /// Client publishes a message
    Send,
    /// Client registers a subscription
    Subscribe,
    /// Client removes a subscription
    Unsubscribe,
    /// Client acknowledges a message
    Ack,
    /// Client rejects a message
    Nack,
    /// Broker delivers a message
    Message,
    /// Broker confirms a receipt request
    Receipt,
    /// Broker reports an error
    Error,
    /// Client closes a session
    Disconnect,
}

impl Command {
    /// Wire spelling of the command.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
            Self::Disconnect => "DISCONNECT",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_wire_spelling() {
        assert_eq!(Command::Message.to_string(), "MESSAGE");
        assert_eq!(Command::Unsubscribe.to_string(), Command::Unsubscribe.as_str());
    }
}
