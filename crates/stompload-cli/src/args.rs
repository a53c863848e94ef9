//! Command-line arguments and their conversion into a [`HarnessConfig`].
//!
//! Every option falls back to a `STOMP_*` environment variable so existing
//! broker test scripts keep working.

use std::time::Duration;

use clap::Parser;
use stompload_core::{
    AckMode, ConfigError, ConnectOptions, HarnessConfig, PayloadShape, StaggerConfig, Topology,
    WorkloadConfig, config::DEFAULT_DESTINATION,
};
use stompload_proto::ProtocolVersion;

/// Cipher suites requested with `--use-custom-ciphers`.
///
/// ECDHE-RSA-AES128-GCM-SHA256, ECDHE-ECDSA-AES128-GCM-SHA256,
/// ECDHE-RSA-AES256-GCM-SHA384.
pub const CUSTOM_CIPHERS: [u16; 3] = [0xc02f, 0xc02b, 0xc030];

/// Concurrent queue workload harness
#[derive(Parser, Debug)]
#[command(name = "stompload")]
#[command(about = "Drive concurrent producers and consumers against a message broker")]
#[command(version)]
pub struct Args {
    /// Broker host
    #[arg(long, env = "STOMP_HOST", default_value = "localhost")]
    pub host: String,

    /// Broker port
    #[arg(long, env = "STOMP_PORT", default_value_t = 61613)]
    pub port: u16,

    /// Protocol level (1.0, 1.1, 1.2)
    #[arg(long, env = "STOMP_PROTOCOL", default_value = "1.2")]
    pub protocol: ProtocolVersion,

    /// Login credential
    #[arg(long, env = "STOMP_LOGIN")]
    pub login: Option<String>,

    /// Passcode credential
    #[arg(long, env = "STOMP_PASSCODE")]
    pub passcode: Option<String>,

    /// Virtual host sent on 1.1+ connects
    #[arg(long, env = "STOMP_VHOST", default_value = "localhost")]
    pub vhost: String,

    /// Heart-beat specification `cx,cy`
    #[arg(long, env = "STOMP_HEARTBEATS")]
    pub heartbeats: Option<String>,

    /// Destination prefix; queues are named `<dest>.<n>`
    #[arg(long, env = "STOMP_DEST", default_value = DEFAULT_DESTINATION)]
    pub dest: String,

    /// Tag inserted between prefix and queue number
    #[arg(long, env = "STOMP_RUNTAG")]
    pub run_tag: Option<String>,

    /// Number of queues
    #[arg(long, env = "STOMP_NQS", default_value_t = 1)]
    pub nqs: u32,

    /// Messages per queue
    #[arg(long, env = "STOMP_NMSGS", default_value_t = 1)]
    pub nmsgs: u64,

    /// Ack mode (auto, client, client-individual)
    #[arg(long, env = "STOMP_ACKMODE", default_value = "auto")]
    pub ackmode: AckMode,

    /// Connection topology (shared, per-worker, split, pooled:N)
    #[arg(long, env = "STOMP_TOPOLOGY", default_value = "shared")]
    pub topology: Topology,

    /// Do not pause between sends
    #[arg(long, env = "STOMP_NOSENDW")]
    pub no_send_wait: bool,

    /// Do not pause between receipts
    #[arg(long, env = "STOMP_NORECVW")]
    pub no_recv_wait: bool,

    /// Scale applied to send pauses
    #[arg(long, env = "STOMP_SENDFACT", default_value_t = 1.0)]
    pub send_factor: f64,

    /// Scale applied to receive pauses
    #[arg(long, env = "STOMP_RECVFACT", default_value_t = 1.0)]
    pub recv_factor: f64,

    /// Maximum message body length
    #[arg(long, env = "STOMP_MDML", default_value_t = 32 * 1024)]
    pub mdml: usize,

    /// Send every body at exactly `--mdml` bytes instead of a random length
    /// in `[1, mdml)`
    #[arg(long, env = "STOMP_FIXEDLEN")]
    pub fixed_payload: bool,

    /// Request broker persistence
    #[arg(long, env = "STOMP_PERSISTENT")]
    pub persistent: bool,

    /// Restrict TLS adapters to a fixed AES-GCM cipher list
    #[arg(long, env = "STOMP_USECUSTOMCIPHERS")]
    pub use_custom_ciphers: bool,

    /// Abort when workers have not finished after this many seconds
    #[arg(long, env = "STOMP_TIMEOUT")]
    pub timeout_secs: Option<u64>,

    /// Seed for reproducible ids and pacing (simulation clock)
    #[arg(long, env = "STOMP_SEED")]
    pub seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Build and validate the run configuration.
    pub fn to_config(&self) -> Result<HarnessConfig, ConfigError> {
        let connect = ConnectOptions {
            host: self.host.clone(),
            port: self.port,
            protocol: self.protocol,
            login: self.login.clone(),
            passcode: self.passcode.clone(),
            vhost: self.vhost.clone(),
            heartbeats: self.heartbeats.clone(),
            custom_ciphers: if self.use_custom_ciphers { CUSTOM_CIPHERS.to_vec() } else { Vec::new() },
        };

        let payload = if self.fixed_payload {
            PayloadShape::Fixed(self.mdml)
        } else {
            PayloadShape::Variable { max: self.mdml }
        };

        let workload = WorkloadConfig {
            queue_count: self.nqs,
            message_count: self.nmsgs,
            ack_mode: self.ackmode,
            destination_prefix: self.dest.clone(),
            run_tag: self.run_tag.clone(),
            send_stagger: StaggerConfig { enabled: !self.no_send_wait, factor: self.send_factor },
            recv_stagger: StaggerConfig { enabled: !self.no_recv_wait, factor: self.recv_factor },
            topology: self.topology,
            payload,
            persistent: self.persistent,
            completion_timeout: self.timeout_secs.map(Duration::from_secs),
        };

        let config = HarnessConfig { connect, workload };
        config.validate()?;
        Ok(config)
    }
}
