//! Workload driver.
//!
//! Orchestrates one run: validate the configuration, open the up-front
//! connections the topology asks for, spawn one producer and one consumer per
//! destination, wait on both completion barriers, then disconnect and collect
//! statistics.
//!
//! # Failure
//!
//! The first worker error ends the run. Remaining workers are aborted, the
//! up-front connections are closed on a best-effort basis, and the error is
//! returned. Nothing here exits the process.
//!
//! # Concurrency
//!
//! Workers run as tokio tasks in two [`JoinSet`]s, one per barrier. Tasks
//! sharing a connection hold it through an `Arc`; the adapter is responsible
//! for keeping concurrent frames on one connection from interleaving.

use std::{collections::HashMap, sync::Arc, time::Duration};

use stompload_proto::Headers;
use tokio::task::{Id, JoinSet};

use crate::{
    adapter::{ProtocolAdapter, Session},
    config::{ConnectOptions, HarnessConfig},
    consumer::{Consumer, ConsumerReport},
    destination::Destination,
    env::Environment,
    error::HarnessError,
    payload::Filler,
    producer::{Producer, ProducerReport},
    stats::{DestinationOutcome, RunReport, RunStatistics},
    topology::{Assignment, Slot, WorkerId, WorkerRole},
};

/// What a finished worker hands back through its barrier.
#[derive(Debug)]
struct WorkerReport {
    worker: WorkerId,
    outcome: WorkerOutcome,
    /// Statistics of a connection the worker opened itself
    connection: Option<RunStatistics>,
}

#[derive(Debug)]
enum WorkerOutcome {
    Produced(ProducerReport),
    Consumed(ConsumerReport),
}

type WorkerResult = Result<WorkerReport, HarnessError>;

/// Up-front connection owned by the driver.
struct Handle<S> {
    label: String,
    session: Arc<S>,
}

/// Runs a configured workload against an adapter.
pub struct WorkloadDriver<A, E> {
    adapter: Arc<A>,
    config: HarnessConfig,
    env: E,
}

impl<A: ProtocolAdapter, E: Environment> WorkloadDriver<A, E> {
    /// Driver for `config` using `adapter` for connections and `env` for
    /// pacing and ids.
    pub fn new(adapter: A, config: HarnessConfig, env: E) -> Self {
        Self { adapter: Arc::new(adapter), config, env }
    }

    /// Execute the workload.
    pub async fn run(&self) -> Result<RunReport, HarnessError> {
        self.config.validate()?;
        let workload = &self.config.workload;
        let start = self.env.now();

        let worker_count = 2 * workload.queue_count as usize;
        let assignment = workload.topology.assign(worker_count);
        tracing::info!(
            queues = workload.queue_count,
            messages = workload.message_count,
            ack = %workload.ack_mode,
            topology = %workload.topology,
            connections = assignment.connection_count(),
            "workload starting"
        );

        let handles = self.open_handles(&assignment).await?;

        let mut producers = JoinSet::new();
        let mut consumers = JoinSet::new();
        let mut workers = HashMap::new();
        for queue in 1..=workload.queue_count {
            for worker in [WorkerId::producer(queue), WorkerId::consumer(queue)] {
                let shared = match assignment.slot(worker.index()) {
                    Some(Slot::Shared(slot)) => {
                        handles.get(slot).map(|handle| Arc::clone(&handle.session))
                    },
                    _ => None,
                };
                let destination =
                    Destination::new(&workload.destination_prefix, workload.run_tag.clone(), queue);
                let id = match worker.role {
                    WorkerRole::Producer => {
                        producers.spawn(self.producer_task(worker, destination, shared)).id()
                    },
                    WorkerRole::Consumer => {
                        consumers.spawn(self.consumer_task(worker, destination, shared)).id()
                    },
                };
                workers.insert(id, worker);
            }
        }

        let mut reports = Vec::with_capacity(worker_count);
        let supervised = supervise(&mut producers, &mut consumers, &workers, &mut reports);
        let outcome = match workload.completion_timeout {
            Some(limit) => match tokio::time::timeout(limit, supervised).await {
                Ok(outcome) => outcome,
                Err(_) => Err(timeout_error(&producers, &consumers, limit)),
            },
            None => supervised.await,
        };

        if let Err(err) = outcome {
            tracing::error!(error = %err, "run failed, aborting workers");
            producers.abort_all();
            consumers.abort_all();
            close_quietly(&handles).await;
            return Err(err);
        }

        let mut statistics: Vec<RunStatistics> =
            reports.iter().filter_map(|report| report.connection.clone()).collect();
        for handle in &handles {
            statistics.push(release(&handle.label, &*handle.session).await?);
        }

        let report = RunReport {
            statistics,
            destinations: destination_outcomes(workload.queue_count, &reports),
            elapsed: self.env.now() - start,
        };
        report.log();
        Ok(report)
    }

    async fn open_handles(
        &self,
        assignment: &Assignment,
    ) -> Result<Vec<Handle<A::Session>>, HarnessError> {
        let mut handles = Vec::with_capacity(assignment.connection_count());
        for slot in 0..assignment.connection_count() {
            let label = format!("conn-{slot}");
            match connect(&*self.adapter, &self.config.connect, &label).await {
                Ok(session) => {
                    tracing::debug!(
                        connection = %label,
                        workers = assignment.load(slot),
                        "handle ready"
                    );
                    handles.push(Handle { label, session: Arc::new(session) });
                },
                Err(err) => {
                    close_quietly(&handles).await;
                    return Err(err);
                },
            }
        }
        Ok(handles)
    }

    fn producer_task(
        &self,
        worker: WorkerId,
        destination: Destination,
        shared: Option<Arc<A::Session>>,
    ) -> impl Future<Output = WorkerResult> + Send + use<A, E> {
        let adapter = Arc::clone(&self.adapter);
        let options = self.config.connect.clone();
        let env = self.env.clone();
        let workload = &self.config.workload;
        let (count, stagger, persistent) =
            (workload.message_count, workload.send_stagger, workload.persistent);
        let filler = Filler::new(workload.payload);

        async move {
            let (session, owned) = acquire(&*adapter, &options, worker, shared).await?;
            let sender_id = env.unique_id();
            let report = Producer::new(Arc::clone(&session), destination, sender_id, count, env)
                .with_filler(filler)
                .with_stagger(stagger)
                .with_persistent(persistent)
                .run()
                .await?;
            let connection = if owned {
                Some(release(&worker.to_string(), &*session).await?)
            } else {
                None
            };
            Ok(WorkerReport { worker, outcome: WorkerOutcome::Produced(report), connection })
        }
    }

    fn consumer_task(
        &self,
        worker: WorkerId,
        destination: Destination,
        shared: Option<Arc<A::Session>>,
    ) -> impl Future<Output = WorkerResult> + Send + use<A, E> {
        let adapter = Arc::clone(&self.adapter);
        let options = self.config.connect.clone();
        let env = self.env.clone();
        let workload = &self.config.workload;
        let (ack_mode, count, stagger) =
            (workload.ack_mode, workload.message_count, workload.recv_stagger);

        async move {
            let (session, owned) = acquire(&*adapter, &options, worker, shared).await?;
            let report = Consumer::new(Arc::clone(&session), destination, ack_mode, count, env)
                .with_stagger(stagger)
                .run()
                .await?;
            let connection = if owned {
                Some(release(&worker.to_string(), &*session).await?)
            } else {
                None
            };
            Ok(WorkerReport { worker, outcome: WorkerOutcome::Consumed(report), connection })
        }
    }
}

async fn connect<A: ProtocolAdapter>(
    adapter: &A,
    options: &ConnectOptions,
    label: &str,
) -> Result<A::Session, HarnessError> {
    let session = adapter
        .connect(options, options.connect_headers())
        .await
        .map_err(|source| HarnessError::Connect { connection: label.to_string(), source })?;
    tracing::debug!(
        connection = label,
        address = %options.address(),
        protocol = %session.protocol(),
        ciphers = ?options.custom_ciphers,
        "connected"
    );
    Ok(session)
}

/// Shared connection when assigned one, otherwise a fresh connection owned by
/// the calling worker.
async fn acquire<A: ProtocolAdapter>(
    adapter: &A,
    options: &ConnectOptions,
    worker: WorkerId,
    shared: Option<Arc<A::Session>>,
) -> Result<(Arc<A::Session>, bool), HarnessError> {
    match shared {
        Some(session) => Ok((session, false)),
        None => {
            let session = connect(adapter, options, &worker.to_string()).await?;
            Ok((Arc::new(session), true))
        },
    }
}

/// Disconnect and snapshot counters. Counters are read after DISCONNECT so
/// the final frame is included.
async fn release<S: Session>(label: &str, session: &S) -> Result<RunStatistics, HarnessError> {
    session
        .disconnect(Headers::new())
        .await
        .map_err(|source| HarnessError::Disconnect { connection: label.to_string(), source })?;
    tracing::debug!(connection = label, "disconnected");
    Ok(RunStatistics::from_metrics(label, session.metrics()))
}

async fn close_quietly<S: Session>(handles: &[Handle<S>]) {
    for handle in handles {
        if let Err(err) = handle.session.disconnect(Headers::new()).await {
            tracing::warn!(connection = %handle.label, error = %err, "disconnect after failure");
        }
    }
}

/// Drain both barriers, stopping at the first failure.
async fn supervise(
    producers: &mut JoinSet<WorkerResult>,
    consumers: &mut JoinSet<WorkerResult>,
    workers: &HashMap<Id, WorkerId>,
    reports: &mut Vec<WorkerReport>,
) -> Result<(), HarnessError> {
    loop {
        let joined = tokio::select! {
            Some(joined) = producers.join_next_with_id() => joined,
            Some(joined) = consumers.join_next_with_id() => joined,
            else => return Ok(()),
        };

        let report = match joined {
            Ok((_, result)) => result?,
            Err(err) => {
                let worker = workers
                    .get(&err.id())
                    .map_or_else(|| format!("task {}", err.id()), ToString::to_string);
                return Err(HarnessError::WorkerPanicked { worker, reason: err.to_string() });
            },
        };
        tracing::debug!(worker = %report.worker, "worker finished");
        reports.push(report);
    }
}

fn timeout_error(
    producers: &JoinSet<WorkerResult>,
    consumers: &JoinSet<WorkerResult>,
    limit: Duration,
) -> HarnessError {
    let (barrier, outstanding) = if producers.is_empty() {
        ("consumers", consumers.len())
    } else {
        ("producers", producers.len())
    };
    HarnessError::Timeout { barrier, outstanding, elapsed: limit }
}

fn destination_outcomes(queue_count: u32, reports: &[WorkerReport]) -> Vec<DestinationOutcome> {
    let mut outcomes: Vec<DestinationOutcome> =
        (0..queue_count).map(|_| DestinationOutcome::default()).collect();
    for report in reports {
        let Some(outcome) = outcomes.get_mut(report.worker.queue as usize - 1) else {
            continue;
        };
        match &report.outcome {
            WorkerOutcome::Produced(produced) => {
                outcome.destination.clone_from(&produced.destination);
                outcome.sent = produced.sent;
            },
            WorkerOutcome::Consumed(consumed) => {
                outcome.destination.clone_from(&consumed.destination);
                outcome.received = consumed.received;
                outcome.acked = consumed.acked;
            },
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_are_indexed_by_queue() {
        let reports = vec![
            WorkerReport {
                worker: WorkerId::consumer(2),
                outcome: WorkerOutcome::Consumed(ConsumerReport {
                    destination: "q.2".to_string(),
                    received: 3,
                    acked: 3,
                }),
                connection: None,
            },
            WorkerReport {
                worker: WorkerId::producer(2),
                outcome: WorkerOutcome::Produced(ProducerReport {
                    destination: "q.2".to_string(),
                    sent: 3,
                }),
                connection: None,
            },
        ];

        let outcomes = destination_outcomes(2, &reports);

        assert_eq!(outcomes[0], DestinationOutcome::default());
        assert_eq!(outcomes[1], DestinationOutcome {
            destination: "q.2".to_string(),
            sent: 3,
            received: 3,
            acked: 3,
        });
        assert_eq!(reports[0].worker.role, WorkerRole::Consumer);
    }

    #[tokio::test]
    async fn timeout_names_the_first_unfinished_barrier() {
        let mut producers: JoinSet<WorkerResult> = JoinSet::new();
        let mut consumers: JoinSet<WorkerResult> = JoinSet::new();
        consumers.spawn(std::future::pending());
        consumers.spawn(std::future::pending());

        let err = timeout_error(&producers, &consumers, Duration::from_secs(5));
        assert!(matches!(
            err,
            HarnessError::Timeout { barrier: "consumers", outstanding: 2, .. }
        ));

        producers.spawn(std::future::pending());
        let err = timeout_error(&producers, &consumers, Duration::from_secs(5));
        assert!(matches!(
            err,
            HarnessError::Timeout { barrier: "producers", outstanding: 1, .. }
        ));

        producers.abort_all();
        consumers.abort_all();
    }
}
