//! stompload binary
//!
//! Runs one workload against the in-process broker and logs the per-connection
//! statistics. Exits non-zero when the run fails.
//!
//! # Usage
//!
//! ```bash
//! stompload --nqs 4 --nmsgs 100 --ackmode client-individual --topology pooled:2
//! STOMP_NQS=4 STOMP_NOSENDW=true stompload --seed 7
//! ```

mod args;

use clap::Parser;
use stompload_core::{
    Environment, HarnessConfig, HarnessError, RunReport, SystemEnv, WorkloadDriver,
};
use stompload_sim::{MemoryBroker, SimEnv};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = match args.to_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return Err(e.into());
        },
    };

    tracing::info!(
        address = %config.connect.address(),
        protocol = %config.connect.protocol,
        queues = config.workload.queue_count,
        messages = config.workload.message_count,
        ack_mode = config.workload.ack_mode.as_str(),
        topology = %config.workload.topology,
        custom_ciphers = config.connect.custom_ciphers.len(),
        "starting workload"
    );

    match execute(config, args.seed).await {
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, destination = ?e.destination(), "workload failed");
            Err(e.into())
        },
    }
}

/// Run `config` against a fresh in-process broker.
///
/// A seed selects the simulated environment, otherwise the system clock and
/// OS RNG pace the run. The driver logs the report itself.
async fn execute(config: HarnessConfig, seed: Option<u64>) -> Result<RunReport, HarnessError> {
    let broker = MemoryBroker::new();
    match seed {
        Some(seed) => run(&broker, config, SimEnv::with_seed(seed)).await,
        None => run(&broker, config, SystemEnv::new()).await,
    }
}

async fn run<E: Environment>(
    broker: &MemoryBroker,
    config: HarnessConfig,
    env: E,
) -> Result<RunReport, HarnessError> {
    WorkloadDriver::new(broker.adapter(), config, env).run().await
}
