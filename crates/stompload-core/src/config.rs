//! Harness configuration.
//!
//! A [`HarnessConfig`] is built once (by the CLI from flags and `STOMP_*`
//! environment variables, or directly by tests), validated, and then handed
//! to the driver by value. Nothing reads configuration after a run starts.

use std::time::Duration;

use stompload_proto::{Headers, ProtocolVersion, header};
use thiserror::Error;

use crate::{ack::AckMode, payload::PayloadShape, topology::Topology};

/// Default queue prefix.
pub const DEFAULT_DESTINATION: &str = "/queue/snge.common.queue";

/// Default virtual host sent on 1.1+ connects.
pub const DEFAULT_VHOST: &str = "localhost";

/// Configuration values that cannot start a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Ack mode is not one of the wire names
    #[error("invalid ack mode: {0} (expected auto, client or client-individual)")]
    InvalidAckMode(String),

    /// Topology name is not recognized
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// At least one queue is required
    #[error("queue count must be at least 1")]
    NoQueues,

    /// At least one message per queue is required
    #[error("message count must be at least 1")]
    NoMessages,

    /// Pooled topology with zero connections
    #[error("connection pool size must be at least 1")]
    EmptyPool,

    /// Stagger factor is negative or not finite
    #[error("invalid {role} stagger factor: {factor}")]
    InvalidFactor {
        /// `send` or `receive`
        role: &'static str,
        /// Rejected factor
        factor: f64,
    },

    /// Fixed payload of zero bytes or variable payload with no room
    #[error("invalid payload shape: {0:?}")]
    InvalidPayload(PayloadShape),

    /// Completion timeout of zero
    #[error("completion timeout must be non-zero")]
    ZeroTimeout,
}

/// Broker endpoint and session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Broker host name or address
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Protocol level to request
    pub protocol: ProtocolVersion,
    /// Optional login credential
    pub login: Option<String>,
    /// Optional passcode credential
    pub passcode: Option<String>,
    /// Virtual host (1.1+)
    pub vhost: String,
    /// Heart-beat specification `cx,cy` (1.1+)
    pub heartbeats: Option<String>,
    /// Cipher suite ids a TLS-capable adapter should restrict itself to
    pub custom_ciphers: Vec<u16>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 61613,
            protocol: ProtocolVersion::default(),
            login: None,
            passcode: None,
            vhost: DEFAULT_VHOST.to_string(),
            heartbeats: None,
            custom_ciphers: Vec::new(),
        }
    }
}

impl ConnectOptions {
    /// `host:port` pair for network adapters.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// CONNECT headers for these options.
    ///
    /// Credentials are sent when set. Levels above 1.0 also negotiate the
    /// version and name the virtual host; heart-beats go out when configured.
    pub fn connect_headers(&self) -> Headers {
        let mut headers = Headers::new();
        if let Some(login) = &self.login {
            headers.push(header::LOGIN, login.as_str());
        }
        if let Some(passcode) = &self.passcode {
            headers.push(header::PASSCODE, passcode.as_str());
        }
        if self.protocol.negotiates() {
            headers.push(header::ACCEPT_VERSION, self.protocol.as_str());
            headers.push(header::HOST, self.vhost.as_str());
            if let Some(heartbeats) = &self.heartbeats {
                headers.push(header::HEART_BEAT, heartbeats.as_str());
            }
        }
        headers
    }
}

/// Stagger settings for one worker role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaggerConfig {
    /// Pause between messages at all
    pub enabled: bool,
    /// Scale applied to every drawn delay
    pub factor: f64,
}

impl Default for StaggerConfig {
    fn default() -> Self {
        Self { enabled: false, factor: 1.0 }
    }
}

impl StaggerConfig {
    /// Stagger enabled with `factor`.
    pub fn enabled(factor: f64) -> Self {
        Self { enabled: true, factor }
    }

    /// Stagger disabled.
    pub fn disabled() -> Self {
        Self::default()
    }
}

/// What the workload does once connections are open.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    /// Number of destinations (one producer and one consumer each)
    pub queue_count: u32,
    /// Messages per destination
    pub message_count: u64,
    /// How consumers confirm receipt
    pub ack_mode: AckMode,
    /// Destination name prefix
    pub destination_prefix: String,
    /// Optional tag inserted between prefix and queue number
    pub run_tag: Option<String>,
    /// Producer pacing
    pub send_stagger: StaggerConfig,
    /// Consumer pacing
    pub recv_stagger: StaggerConfig,
    /// How workers map onto connections
    pub topology: Topology,
    /// Body length policy
    pub payload: PayloadShape,
    /// Request broker persistence of every message
    pub persistent: bool,
    /// Abort the run when the workers have not finished in time
    pub completion_timeout: Option<Duration>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            queue_count: 1,
            message_count: 1,
            ack_mode: AckMode::default(),
            destination_prefix: DEFAULT_DESTINATION.to_string(),
            run_tag: None,
            send_stagger: StaggerConfig::default(),
            recv_stagger: StaggerConfig::default(),
            topology: Topology::default(),
            payload: PayloadShape::default(),
            persistent: false,
            completion_timeout: None,
        }
    }
}

/// Everything a run needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HarnessConfig {
    /// How to reach the broker
    pub connect: ConnectOptions,
    /// What to run against it
    pub workload: WorkloadConfig,
}

impl HarnessConfig {
    /// Check every value the driver relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let workload = &self.workload;
        if workload.queue_count == 0 {
            return Err(ConfigError::NoQueues);
        }
        if workload.message_count == 0 {
            return Err(ConfigError::NoMessages);
        }
        if let Topology::Pooled(0) = workload.topology {
            return Err(ConfigError::EmptyPool);
        }
        for (role, stagger) in [("send", workload.send_stagger), ("receive", workload.recv_stagger)]
        {
            if !stagger.factor.is_finite() || stagger.factor < 0.0 {
                return Err(ConfigError::InvalidFactor { role, factor: stagger.factor });
            }
        }
        match workload.payload {
            PayloadShape::Fixed(0) => return Err(ConfigError::InvalidPayload(workload.payload)),
            PayloadShape::Variable { max } if max < 2 => {
                return Err(ConfigError::InvalidPayload(workload.payload));
            },
            _ => {},
        }
        if workload.completion_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = HarnessConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.workload.destination_prefix, DEFAULT_DESTINATION);
        assert_eq!(config.workload.queue_count, 1);
        assert_eq!(config.workload.ack_mode, AckMode::Auto);
        assert_eq!(config.connect.vhost, "localhost");
    }

    #[test]
    fn rejects_empty_workloads() {
        let mut config = HarnessConfig::default();
        config.workload.queue_count = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoQueues));

        let mut config = HarnessConfig::default();
        config.workload.message_count = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoMessages));
    }

    #[test]
    fn rejects_empty_pool() {
        let mut config = HarnessConfig::default();
        config.workload.topology = Topology::Pooled(0);
        assert_eq!(config.validate(), Err(ConfigError::EmptyPool));
    }

    #[test]
    fn rejects_bad_factors() {
        let mut config = HarnessConfig::default();
        config.workload.recv_stagger = StaggerConfig::enabled(-1.0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidFactor { role: "receive", factor: -1.0 })
        );

        config.workload.recv_stagger = StaggerConfig::enabled(1.0);
        config.workload.send_stagger = StaggerConfig::enabled(f64::INFINITY);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidFactor { role: "send", .. })));
    }

    #[test]
    fn rejects_degenerate_payloads_and_timeouts() {
        let mut config = HarnessConfig::default();
        config.workload.payload = PayloadShape::Variable { max: 1 };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPayload(_))));

        let mut config = HarnessConfig::default();
        config.workload.completion_timeout = Some(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn v1_0_connect_sends_only_credentials() {
        let options = ConnectOptions {
            protocol: ProtocolVersion::V1_0,
            login: Some("guest".to_string()),
            passcode: Some("secret".to_string()),
            heartbeats: Some("0,0".to_string()),
            ..ConnectOptions::default()
        };
        assert_eq!(
            options.connect_headers(),
            Headers::new().with(header::LOGIN, "guest").with(header::PASSCODE, "secret")
        );
    }

    #[test]
    fn v1_2_connect_negotiates_version_and_host() {
        let options = ConnectOptions {
            heartbeats: Some("500,1000".to_string()),
            vhost: "broker.example".to_string(),
            ..ConnectOptions::default()
        };
        let headers = options.connect_headers();
        assert!(!headers.contains(header::LOGIN));
        assert_eq!(headers.value(header::ACCEPT_VERSION), Some("1.2"));
        assert_eq!(headers.value(header::HOST), Some("broker.example"));
        assert_eq!(headers.value(header::HEART_BEAT), Some("500,1000"));
        assert_eq!(options.address(), "localhost:61613");
    }
}
