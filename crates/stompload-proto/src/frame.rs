//! Frame type combining command, headers and body.
//!
//! A `Frame` is a pure data holder. Adapters translate between frames and
//! their wire representation; the harness builds outbound header lists and
//! inspects inbound frames.

use bytes::Bytes;

use crate::{Command, Headers, header};

/// Complete protocol frame.
///
/// Layout on the wire:
/// `COMMAND\n` + `name:value\n`* + `\n` + body + `\0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command verb
    pub command: Command,
    /// Ordered headers
    pub headers: Headers,
    /// Raw body bytes
    pub body: Bytes,
}

impl Frame {
    /// Create a frame.
    #[must_use]
    pub fn new(command: Command, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self { command, headers, body: body.into() }
    }

    /// Create a frame without a body.
    #[must_use]
    pub fn bodyless(command: Command, headers: Headers) -> Self {
        Self::new(command, headers, Bytes::new())
    }

    /// First value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.value(name)
    }

    /// Destination header, if present.
    pub fn destination(&self) -> Option<&str> {
        self.header(header::DESTINATION)
    }

    /// Bytes this frame occupies on the wire.
    ///
    /// Used by adapters for byte accounting. Header escaping is not applied,
    /// so values containing `:` or newlines are counted unescaped.
    pub fn encoded_len(&self) -> usize {
        // command line + headers + blank line + body + NUL terminator
        self.command.as_str().len() + 1 + self.headers.encoded_len() + 1 + self.body.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn encoded_len_of_bodyless_frame() {
        let frame = Frame::bodyless(Command::Ack, Headers::new().with("id", "7"));
        assert_eq!(frame.encoded_len(), "ACK\nid:7\n\n\0".len());
    }

    #[test]
    fn destination_reads_header() {
        let frame =
            Frame::new(Command::Send, Headers::new().with("destination", "/queue/a"), "x");
        assert_eq!(frame.destination(), Some("/queue/a"));
        assert_eq!(frame.header("missing"), None);
    }

    proptest! {
        #[test]
        fn encoded_len_grows_with_body(body in prop::collection::vec(any::<u8>(), 0..512)) {
            let empty = Frame::bodyless(Command::Send, Headers::new().with("destination", "q"));
            let full = Frame::new(Command::Send, empty.headers.clone(), body.clone());
            prop_assert_eq!(full.encoded_len(), empty.encoded_len() + body.len());
        }
    }
}
