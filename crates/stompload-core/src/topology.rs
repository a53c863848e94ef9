//! Mapping of workers onto connections.
//!
//! Every destination gets one producer and one consumer. Workers are indexed
//! destination-major: the producer of queue `i` (1-based) is worker
//! `2(i-1)`, its consumer is worker `2(i-1)+1`. A [`Topology`] turns a worker
//! count into an [`Assignment`] telling the driver how many connections to
//! open up front and which of them each worker uses.

use std::{fmt, str::FromStr};

use crate::config::ConfigError;

/// How workers share broker connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    /// One connection for every worker
    #[default]
    Shared,
    /// Each worker opens and closes its own connection
    PerWorker,
    /// A fixed pool; workers split into contiguous balanced runs
    Pooled(usize),
    /// One connection for all producers, one for all consumers
    Split,
}

impl Topology {
    /// Assign `worker_count` workers to connection slots.
    pub fn assign(self, worker_count: usize) -> Assignment {
        let slots = match self {
            Self::Shared => vec![Slot::Shared(0); worker_count],
            Self::PerWorker => vec![Slot::Owned; worker_count],
            Self::Split => (0..worker_count)
                .map(|worker| Slot::Shared(WorkerId::from_index(worker).role.split_slot()))
                .collect(),
            Self::Pooled(size) => pooled_slots(size, worker_count),
        };
        let connection_count = match self {
            Self::Shared => 1,
            Self::PerWorker => 0,
            Self::Split => 2,
            Self::Pooled(size) => pool_size(size, worker_count),
        };
        Assignment { slots, connection_count }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("shared"),
            Self::PerWorker => f.write_str("per-worker"),
            Self::Pooled(size) => write!(f, "pooled:{size}"),
            Self::Split => f.write_str("split"),
        }
    }
}

impl FromStr for Topology {
    type Err = ConfigError;

    /// Parses `shared`, `per-worker`, `split` or `pooled:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared" => Ok(Self::Shared),
            "per-worker" => Ok(Self::PerWorker),
            "split" => Ok(Self::Split),
            other => other
                .strip_prefix("pooled:")
                .and_then(|size| size.parse().ok())
                .map(Self::Pooled)
                .ok_or_else(|| ConfigError::InvalidTopology(other.to_string())),
        }
    }
}

fn pool_size(requested: usize, worker_count: usize) -> usize {
    requested.min(worker_count).max(1)
}

// First `w mod n` handles carry ceil(w/n) workers, the rest floor(w/n).
fn pooled_slots(requested: usize, worker_count: usize) -> Vec<Slot> {
    let handles = pool_size(requested, worker_count);
    let base = worker_count / handles;
    let larger = worker_count % handles;
    let larger_span = larger * (base + 1);

    (0..worker_count)
        .map(|worker| {
            let slot = if worker < larger_span {
                worker / (base + 1)
            } else {
                larger + (worker - larger_span) / base
            };
            Slot::Shared(slot)
        })
        .collect()
}

/// Which connection a worker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Up-front connection opened and closed by the driver
    Shared(usize),
    /// Connection opened and closed inside the worker's own task
    Owned,
}

/// Result of [`Topology::assign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    slots: Vec<Slot>,
    connection_count: usize,
}

impl Assignment {
    /// Number of connections the driver opens before starting workers.
    pub fn connection_count(&self) -> usize {
        self.connection_count
    }

    /// Slot of `worker`, if it exists.
    pub fn slot(&self, worker: usize) -> Option<Slot> {
        self.slots.get(worker).copied()
    }

    /// Number of workers bound to up-front connection `slot`.
    pub fn load(&self, slot: usize) -> usize {
        self.slots.iter().filter(|s| **s == Slot::Shared(slot)).count()
    }
}

/// What a worker does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    /// Sends a destination's messages
    Producer,
    /// Receives, validates and acknowledges a destination's messages
    Consumer,
}

impl WorkerRole {
    fn split_slot(self) -> usize {
        match self {
            Self::Producer => 0,
            Self::Consumer => 1,
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer => f.write_str("producer"),
            Self::Consumer => f.write_str("consumer"),
        }
    }
}

/// Role and queue of a worker; displayed as e.g. `consumer-3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId {
    /// Producer or consumer
    pub role: WorkerRole,
    /// 1-based queue number
    pub queue: u32,
}

impl WorkerId {
    /// Producer of `queue`.
    pub fn producer(queue: u32) -> Self {
        Self { role: WorkerRole::Producer, queue }
    }

    /// Consumer of `queue`.
    pub fn consumer(queue: u32) -> Self {
        Self { role: WorkerRole::Consumer, queue }
    }

    /// Worker at destination-major position `index`.
    pub fn from_index(index: usize) -> Self {
        let role = if index % 2 == 0 { WorkerRole::Producer } else { WorkerRole::Consumer };
        let queue = u32::try_from(index / 2 + 1).unwrap_or(u32::MAX);
        Self { role, queue }
    }

    /// Destination-major position of this worker.
    pub fn index(self) -> usize {
        let base = 2 * (self.queue.saturating_sub(1) as usize);
        match self.role {
            WorkerRole::Producer => base,
            WorkerRole::Consumer => base + 1,
        }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.role, self.queue)
    }
}
