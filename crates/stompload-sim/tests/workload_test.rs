//! End-to-end workload runs against the in-process broker.
//!
//! Every test runs the real driver, producers and consumers. Faults are
//! scripted on the broker so each failure path is reached deterministically.

use std::time::Duration;

use stompload_core::{
    AckMode, AdapterError, ConfigError, HarnessConfig, HarnessError, PayloadShape, RunReport,
    StaggerConfig, Topology, ValidationError, WorkloadDriver,
};
use stompload_proto::{Command, ProtocolVersion};
use stompload_sim::{Fault, MemoryBroker, QueueStats, SimEnv};

const PREFIX: &str = "/queue/snge.common.queue";

fn config(queues: u32, messages: u64, ack_mode: AckMode, topology: Topology) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.workload.queue_count = queues;
    config.workload.message_count = messages;
    config.workload.ack_mode = ack_mode;
    config.workload.topology = topology;
    config.workload.payload = PayloadShape::Fixed(64);
    config
}

async fn run(broker: &MemoryBroker, config: HarnessConfig) -> Result<RunReport, HarnessError> {
    WorkloadDriver::new(broker.adapter(), config, SimEnv::with_seed(42)).run().await
}

fn dest(queue: u32) -> String {
    format!("{PREFIX}.{queue}")
}

#[tokio::test(start_paused = true)]
async fn shared_connection_client_individual_three_by_five() {
    let broker = MemoryBroker::new();

    let report = run(&broker, config(3, 5, AckMode::ClientIndividual, Topology::Shared))
        .await
        .unwrap();

    assert_eq!(report.total_sent(), 15);
    assert_eq!(report.total_received(), 15);
    assert_eq!(report.total_acked(), 15);
    for (i, outcome) in report.destinations.iter().enumerate() {
        assert_eq!(outcome.destination, dest(i as u32 + 1));
        assert_eq!((outcome.sent, outcome.received, outcome.acked), (5, 5, 5));
    }

    assert_eq!(report.statistics.len(), 1);
    let stats = &report.statistics[0];
    assert_eq!(stats.label, "conn-0");
    assert!(stats.frames_written >= 15);
    // CONNECT + 3 SUBSCRIBE + 15 SEND + 15 ACK + 3 UNSUBSCRIBE + DISCONNECT
    assert_eq!(stats.frames_written, 38);
    // CONNECTED + 15 MESSAGE
    assert_eq!(stats.frames_read, 16);

    assert_eq!(broker.totals(), QueueStats { sent: 15, delivered: 15, acked: 15, pending: 0 });
    let connections = broker.connections();
    assert_eq!((connections.opened, connections.closed), (1, 1));
}

#[tokio::test(start_paused = true)]
async fn out_of_order_delivery_fails_the_run() {
    let broker = MemoryBroker::new();
    broker.inject(Fault::Reorder { destination: dest(1), sequence: 2 });

    let err = run(&broker, config(1, 3, AckMode::ClientIndividual, Topology::Shared))
        .await
        .unwrap_err();

    match err {
        HarnessError::Validation { destination, source } => {
            assert_eq!(destination, dest(1));
            assert_eq!(source, ValidationError::SequenceMismatch {
                expected: 2,
                actual: Some("3".to_string()),
            });
        },
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn auto_mode_sends_no_acks() {
    let broker = MemoryBroker::new();

    let report = run(&broker, config(2, 4, AckMode::Auto, Topology::Shared)).await.unwrap();

    assert_eq!(report.total_received(), 8);
    assert_eq!(report.total_acked(), 0);
    assert_eq!(broker.totals().acked, 0);
}

#[tokio::test(start_paused = true)]
async fn client_mode_acks_each_message() {
    let broker = MemoryBroker::new();

    let report = run(&broker, config(2, 3, AckMode::Client, Topology::Shared)).await.unwrap();

    assert_eq!(report.total_acked(), 6);
    assert_eq!(broker.totals().acked, 6);
}

#[tokio::test(start_paused = true)]
async fn every_protocol_level_acks_correctly() {
    for protocol in ProtocolVersion::ALL {
        let broker = MemoryBroker::new();
        let mut config = config(2, 3, AckMode::ClientIndividual, Topology::Shared);
        config.connect.protocol = protocol;

        let report = run(&broker, config).await.unwrap();

        assert_eq!(report.total_acked(), 6, "level {protocol}");
        assert_eq!(broker.totals().acked, 6, "level {protocol}");
    }
}

#[tokio::test(start_paused = true)]
async fn pooled_connections_are_clamped_and_balanced() {
    let broker = MemoryBroker::new();
    let report = run(&broker, config(4, 2, AckMode::Auto, Topology::Pooled(3))).await.unwrap();
    assert_eq!(report.statistics.len(), 3);
    assert_eq!(broker.connections().opened, 3);

    let broker = MemoryBroker::new();
    let report = run(&broker, config(2, 2, AckMode::Auto, Topology::Pooled(10))).await.unwrap();
    assert_eq!(report.statistics.len(), 4);
    assert_eq!(broker.connections().opened, 4);
}

#[tokio::test(start_paused = true)]
async fn split_topology_opens_two_connections() {
    let broker = MemoryBroker::new();

    let report =
        run(&broker, config(3, 4, AckMode::ClientIndividual, Topology::Split)).await.unwrap();

    assert_eq!(broker.connections().opened, 2);
    let labels: Vec<_> = report.statistics.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["conn-0", "conn-1"]);
    // Producer connection only writes; consumer connection reads every message.
    assert_eq!(report.statistics[0].frames_read, 1);
    assert_eq!(report.statistics[1].frames_read, 1 + 12);
}

#[tokio::test(start_paused = true)]
async fn per_worker_topology_opens_a_connection_per_worker() {
    let broker = MemoryBroker::new();

    let report = run(&broker, config(3, 2, AckMode::Auto, Topology::PerWorker)).await.unwrap();

    let connections = broker.connections();
    assert_eq!((connections.opened, connections.closed), (6, 6));
    assert_eq!(report.statistics.len(), 6);
    let mut labels: Vec<_> = report.statistics.iter().map(|s| s.label.clone()).collect();
    labels.sort();
    assert_eq!(labels, vec![
        "consumer-1",
        "consumer-2",
        "consumer-3",
        "producer-1",
        "producer-2",
        "producer-3"
    ]);
}

#[tokio::test(start_paused = true)]
async fn connect_failure_aborts_before_any_send() {
    let broker = MemoryBroker::new();
    broker.inject(Fault::RefuseConnect);

    let err = run(&broker, config(2, 3, AckMode::Auto, Topology::Shared)).await.unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Connect { ref connection, source: AdapterError::Transport(_) } if connection == "conn-0"
    ));
    assert_eq!(broker.totals().sent, 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_credentials_fail_connect() {
    let broker = MemoryBroker::new();
    broker.require_credentials("guest", "guest");

    let mut bad = config(1, 1, AckMode::Auto, Topology::Shared);
    bad.connect.login = Some("guest".to_string());
    bad.connect.passcode = Some("wrong".to_string());
    let err = run(&broker, bad).await.unwrap_err();
    assert!(matches!(err, HarnessError::Connect { source: AdapterError::Broker(_), .. }));

    let mut good = config(1, 1, AckMode::Auto, Topology::Shared);
    good.connect.login = Some("guest".to_string());
    good.connect.passcode = Some("guest".to_string());
    run(&broker, good).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn send_fault_surfaces_as_send_error() {
    let broker = MemoryBroker::new();
    broker.inject(Fault::FailSend { destination: dest(2), sequence: 3 });

    let err = run(&broker, config(2, 5, AckMode::Auto, Topology::Shared)).await.unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Send { ref destination, sequence: 3, .. } if *destination == dest(2)
    ));
}

#[tokio::test(start_paused = true)]
async fn ack_fault_surfaces_as_ack_error() {
    let broker = MemoryBroker::new();
    broker.inject(Fault::FailAck { destination: dest(1), sequence: 2 });

    let err = run(&broker, config(1, 4, AckMode::ClientIndividual, Topology::Shared))
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::Ack { sequence: 2, .. }));
}

#[tokio::test(start_paused = true)]
async fn receive_fault_surfaces_as_receive_error() {
    let broker = MemoryBroker::new();
    broker.inject(Fault::ReceiveError { destination: dest(1), sequence: 2 });

    let err = run(&broker, config(1, 3, AckMode::Auto, Topology::PerWorker)).await.unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Receive { sequence: 2, source: AdapterError::Transport(_), .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn lost_message_is_a_sequence_gap() {
    let broker = MemoryBroker::new();
    broker.inject(Fault::Drop { destination: dest(1), sequence: 2 });

    let err = run(&broker, config(1, 3, AckMode::Auto, Topology::Shared)).await.unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Validation {
            source: ValidationError::SequenceMismatch { expected: 2, .. },
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn duplicate_message_is_rejected() {
    let broker = MemoryBroker::new();
    broker.inject(Fault::Duplicate { destination: dest(1), sequence: 2 });

    let err = run(&broker, config(1, 3, AckMode::Auto, Topology::Shared)).await.unwrap_err();

    match err {
        HarnessError::Validation { source, .. } => assert_eq!(source, ValidationError::SequenceMismatch {
            expected: 3,
            actual: Some("2".to_string()),
        }),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn corrupt_body_is_rejected() {
    let broker = MemoryBroker::new();
    broker.inject(Fault::CorruptBody { destination: dest(1), sequence: 1 });

    let err = run(&broker, config(1, 2, AckMode::Auto, Topology::Shared)).await.unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Validation { source: ValidationError::BodyMismatch { len: 64 }, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn error_frame_is_rejected() {
    let broker = MemoryBroker::new();
    broker.inject(Fault::ErrorFrame { destination: dest(1), sequence: 1 });

    let err = run(&broker, config(1, 2, AckMode::Auto, Topology::Shared)).await.unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Validation {
            source: ValidationError::WrongFrame { command: Command::Error },
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn stalled_consumer_hits_completion_timeout() {
    let broker = MemoryBroker::new();
    broker.inject(Fault::Stall { destination: dest(2) });
    let mut config = config(3, 2, AckMode::Auto, Topology::Shared);
    config.workload.completion_timeout = Some(Duration::from_secs(30));

    let err = run(&broker, config).await.unwrap_err();

    match err {
        HarnessError::Timeout { barrier, outstanding, elapsed } => {
            assert_eq!(barrier, "consumers");
            assert_eq!(outstanding, 1);
            assert_eq!(elapsed, Duration::from_secs(30));
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(broker.connections().closed, 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_config_opens_no_connections() {
    let broker = MemoryBroker::new();

    let err = run(&broker, config(0, 3, AckMode::Auto, Topology::Shared)).await.unwrap_err();

    assert!(matches!(err, HarnessError::Config(ConfigError::NoQueues)));
    assert_eq!(broker.connections().opened, 0);
}

#[tokio::test(start_paused = true)]
async fn stagger_spreads_the_run_over_virtual_time() {
    let broker = MemoryBroker::new();
    let mut config = config(2, 3, AckMode::ClientIndividual, Topology::Shared);
    config.workload.send_stagger = StaggerConfig::enabled(1.0);
    config.workload.recv_stagger = StaggerConfig::enabled(0.5);

    let report = run(&broker, config).await.unwrap();

    assert_eq!(report.total_acked(), 6);
    // Two pauses per producer, each at least 100ms.
    assert!(report.elapsed >= Duration::from_millis(200), "elapsed {:?}", report.elapsed);
    // Two pauses per consumer, each below 500ms, after the last producer pause below 1s.
    assert!(report.elapsed < Duration::from_secs(3), "elapsed {:?}", report.elapsed);
}

#[tokio::test(start_paused = true)]
async fn run_tag_and_persistence_shape_destinations() {
    let broker = MemoryBroker::new();
    let mut config = config(2, 2, AckMode::Auto, Topology::Shared);
    config.workload.destination_prefix = "/queue/t".to_string();
    config.workload.run_tag = Some("r1".to_string());
    config.workload.persistent = true;
    config.workload.payload = PayloadShape::Variable { max: 256 };

    run(&broker, config).await.unwrap();

    assert_eq!(broker.destinations(), vec!["/queue/t.r1.1", "/queue/t.r1.2"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_connection_under_parallel_workers() {
    let broker = MemoryBroker::new();

    let report = run(&broker, config(8, 25, AckMode::ClientIndividual, Topology::Shared))
        .await
        .unwrap();

    assert_eq!(report.total_received(), 200);
    assert_eq!(broker.totals(), QueueStats { sent: 200, delivered: 200, acked: 200, pending: 0 });
}
