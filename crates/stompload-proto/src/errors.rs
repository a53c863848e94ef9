//! Protocol vocabulary errors.

use thiserror::Error;

/// Errors produced while interpreting protocol vocabulary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Protocol level string is not one of 1.0, 1.1, 1.2
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),
}
