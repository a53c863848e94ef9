//! Concurrent producer/consumer workload harness for message brokers.
//!
//! The harness drives `N` destinations, each with exactly one producer and
//! one consumer, over connections arranged by a [`Topology`]. Producers send
//! densely numbered messages; consumers check every delivery against the
//! next expected sequence number and acknowledge it as the [`AckMode`]
//! requires. The first violation or adapter failure ends the run with a
//! typed [`HarnessError`].
//!
//! # Architecture
//!
//! ```text
//! HarnessConfig ──► WorkloadDriver ──► Topology::assign
//!                        │
//!            ┌───────────┴───────────┐
//!        Producer(i)             Consumer(i)     one pair per destination
//!            │                       │
//!            └──────► Session ◄──────┘           ProtocolAdapter seam
//! ```
//!
//! Time and randomness come from an [`Environment`]: [`SystemEnv`] in
//! production, a seeded simulation environment in tests.
//!
//! # Components
//!
//! - [`WorkloadDriver`]: opens connections, supervises workers, reports
//! - [`Producer`] / [`Consumer`]: per-destination workers
//! - [`Dialect`]: protocol-level subscribe/unsubscribe/ack headers
//! - [`StaggerScheduler`]: randomized pacing
//! - [`ProtocolAdapter`] / [`Session`]: broker seam implemented elsewhere

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ack;
pub mod adapter;
pub mod config;
pub mod consumer;
pub mod destination;
pub mod driver;
pub mod env;
pub mod error;
pub mod payload;
pub mod producer;
pub mod stagger;
pub mod stats;
pub mod system_env;
pub mod topology;
pub mod validation;

#[cfg(test)]
mod test_utils;

pub use ack::{AckMode, Dialect, build_ack, dialect_for};
pub use adapter::{AdapterError, Delivery, MessageData, ProtocolAdapter, Session, SessionMetrics};
pub use config::{ConfigError, ConnectOptions, HarnessConfig, StaggerConfig, WorkloadConfig};
pub use consumer::{Consumer, ConsumerReport, ConsumerState};
pub use destination::{Destination, Message};
pub use driver::WorkloadDriver;
pub use env::Environment;
pub use error::HarnessError;
pub use payload::{FILLER_PATTERN, Filler, PayloadShape};
pub use producer::{Producer, ProducerReport};
pub use stagger::{DEFAULT_MAX_STAGGER, DEFAULT_MIN_STAGGER, StaggerScheduler, next_delay};
pub use stats::{DestinationOutcome, RunReport, RunStatistics};
pub use system_env::SystemEnv;
pub use topology::{Assignment, Slot, Topology, WorkerId, WorkerRole};
pub use validation::{ValidationError, validate_delivery};
