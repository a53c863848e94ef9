//! In-process broker and simulation environment for the stompload harness.
//!
//! [`MemoryBroker`] implements the adapter seam without a network: it keeps
//! per-destination queues, assigns message and ack ids per protocol level,
//! validates acknowledgments, and counts frames and bytes per session. Tests
//! script misbehavior with [`Fault`]s to check that every failure surfaces as
//! the right typed error.
//!
//! [`SimEnv`] pairs the tokio clock with a seeded RNG, so runs on a paused
//! runtime are fast and replayable.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broker;
pub mod fault;
pub mod session;
pub mod sim_env;

pub use broker::{ConnectionStats, MemoryBroker, QueueStats};
pub use fault::Fault;
pub use session::{MemoryAdapter, MemorySession};
pub use sim_env::{DEFAULT_SEED, SimEnv};
