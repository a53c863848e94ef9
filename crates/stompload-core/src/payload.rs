//! Filler message bodies.
//!
//! Bodies are prefixes of a repeating 16-byte pattern. Consumers check that
//! every delivered body is such a prefix, which catches truncation and
//! cross-wiring without carrying checksums.

use bytes::Bytes;

use crate::env::Environment;

/// Repeating unit of every filler body.
pub const FILLER_PATTERN: &[u8; 16] = b"_123456789ABCDEF";

/// Default body length.
pub const DEFAULT_PAYLOAD_LEN: usize = 1024;

/// How long each body is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Every body has exactly this many bytes
    Fixed(usize),
    /// Each body length is drawn uniformly from `[1, max)`
    Variable {
        /// Exclusive upper bound of the body length
        max: usize,
    },
}

impl Default for PayloadShape {
    fn default() -> Self {
        Self::Fixed(DEFAULT_PAYLOAD_LEN)
    }
}

impl PayloadShape {
    /// Longest body this shape can produce.
    pub fn max_len(self) -> usize {
        match self {
            Self::Fixed(len) => len,
            Self::Variable { max } => max.saturating_sub(1).max(1),
        }
    }
}

/// Shared filler buffer; bodies are cheap slices of it.
#[derive(Debug, Clone)]
pub struct Filler {
    shape: PayloadShape,
    buffer: Bytes,
}

impl Filler {
    /// Filler able to serve every body length `shape` can ask for.
    pub fn new(shape: PayloadShape) -> Self {
        let len = shape.max_len();
        let buffer: Vec<u8> = FILLER_PATTERN.iter().copied().cycle().take(len).collect();
        Self { shape, buffer: Bytes::from(buffer) }
    }

    /// Next body, drawing its length from `env` for variable shapes.
    pub fn body(&self, env: &impl Environment) -> Bytes {
        let len = match self.shape {
            PayloadShape::Fixed(len) => len,
            PayloadShape::Variable { max } => {
                let span = (max as u64).saturating_sub(1);
                1 + env.random_below(span.max(1)) as usize
            },
        };
        self.buffer.slice(..len.min(self.buffer.len()))
    }

    /// True when `body` is a prefix of the filler pattern repetition.
    pub fn verify(body: &[u8]) -> bool {
        body.iter().zip(FILLER_PATTERN.iter().cycle()).all(|(a, b)| a == b)
    }
}
