//! Run statistics.
//!
//! Counters are read from each session after it disconnected, so they cover
//! the full life of the connection including the DISCONNECT frame.

use std::time::Duration;

use crate::adapter::SessionMetrics;

/// Traffic of one connection over its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    /// Connection label (`conn-N` or a worker id)
    pub label: String,
    /// Frames received from the broker
    pub frames_read: u64,
    /// Bytes received from the broker
    pub bytes_read: u64,
    /// Frames sent to the broker
    pub frames_written: u64,
    /// Bytes sent to the broker
    pub bytes_written: u64,
    /// Connection lifetime
    pub elapsed: Duration,
}

impl RunStatistics {
    /// Snapshot `metrics` under `label`.
    pub fn from_metrics(label: impl Into<String>, metrics: SessionMetrics) -> Self {
        Self {
            label: label.into(),
            frames_read: metrics.frames_read,
            bytes_read: metrics.bytes_read,
            frames_written: metrics.frames_written,
            bytes_written: metrics.bytes_written,
            elapsed: metrics.elapsed,
        }
    }

    /// Frames read per second.
    pub fn frames_read_per_sec(&self) -> f64 {
        self.rate(self.frames_read)
    }

    /// Bytes read per second.
    pub fn bytes_read_per_sec(&self) -> f64 {
        self.rate(self.bytes_read)
    }

    /// Frames written per second.
    pub fn frames_written_per_sec(&self) -> f64 {
        self.rate(self.frames_written)
    }

    /// Bytes written per second.
    pub fn bytes_written_per_sec(&self) -> f64 {
        self.rate(self.bytes_written)
    }

    // Zero-length runs report zero rather than infinity.
    fn rate(&self, count: u64) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { count as f64 / secs } else { 0.0 }
    }

    /// Emit the counters and rates at info level.
    pub fn log(&self) {
        tracing::info!(
            connection = %self.label,
            frames_read = self.frames_read,
            bytes_read = self.bytes_read,
            frames_written = self.frames_written,
            bytes_written = self.bytes_written,
            duration_ns = self.elapsed.as_nanos() as u64,
            duration_secs = format_args!("{:.6}", self.elapsed.as_secs_f64()),
            frame_reads_per_sec = format_args!("{:.6}", self.frames_read_per_sec()),
            bytes_read_per_sec = format_args!("{:.6}", self.bytes_read_per_sec()),
            frame_writes_per_sec = format_args!("{:.6}", self.frames_written_per_sec()),
            bytes_written_per_sec = format_args!("{:.6}", self.bytes_written_per_sec()),
            "connection statistics"
        );
    }
}

/// What happened on one destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationOutcome {
    /// Broker-facing destination name
    pub destination: String,
    /// Messages the producer sent
    pub sent: u64,
    /// Messages the consumer received and validated
    pub received: u64,
    /// ACK frames the consumer sent
    pub acked: u64,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// One entry per connection, in the order they were closed
    pub statistics: Vec<RunStatistics>,
    /// One entry per destination, by queue number
    pub destinations: Vec<DestinationOutcome>,
    /// Wall time from first connect to last disconnect
    pub elapsed: Duration,
}

impl RunReport {
    /// Messages sent across all destinations.
    pub fn total_sent(&self) -> u64 {
        self.destinations.iter().map(|d| d.sent).sum()
    }

    /// Messages received across all destinations.
    pub fn total_received(&self) -> u64 {
        self.destinations.iter().map(|d| d.received).sum()
    }

    /// ACK frames sent across all destinations.
    pub fn total_acked(&self) -> u64 {
        self.destinations.iter().map(|d| d.acked).sum()
    }

    /// Frames written across all connections.
    pub fn total_frames_written(&self) -> u64 {
        self.statistics.iter().map(|s| s.frames_written).sum()
    }

    /// Log every connection's statistics and the run totals.
    pub fn log(&self) {
        for stats in &self.statistics {
            stats.log();
        }
        tracing::info!(
            connections = self.statistics.len(),
            destinations = self.destinations.len(),
            sent = self.total_sent(),
            received = self.total_received(),
            acked = self.total_acked(),
            frames_written = self.total_frames_written(),
            elapsed = ?self.elapsed,
            "run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(elapsed: Duration) -> SessionMetrics {
        SessionMetrics {
            frames_read: 10,
            bytes_read: 2_000,
            frames_written: 20,
            bytes_written: 4_000,
            elapsed,
        }
    }

    #[test]
    fn rates_divide_by_elapsed_seconds() {
        let stats = RunStatistics::from_metrics("conn-0", metrics(Duration::from_secs(2)));
        assert_eq!(stats.label, "conn-0");
        assert!((stats.frames_read_per_sec() - 5.0).abs() < f64::EPSILON);
        assert!((stats.bytes_read_per_sec() - 1_000.0).abs() < f64::EPSILON);
        assert!((stats.frames_written_per_sec() - 10.0).abs() < f64::EPSILON);
        assert!((stats.bytes_written_per_sec() - 2_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_duration_reports_zero_rates() {
        let stats = RunStatistics::from_metrics("conn-0", metrics(Duration::ZERO));
        assert_eq!(stats.frames_read_per_sec(), 0.0);
        assert_eq!(stats.bytes_written_per_sec(), 0.0);
    }

    #[test]
    fn report_totals_sum_destinations() {
        let report = RunReport {
            statistics: vec![
                RunStatistics::from_metrics("conn-0", metrics(Duration::from_secs(1))),
                RunStatistics::from_metrics("conn-1", metrics(Duration::from_secs(1))),
            ],
            destinations: vec![
                DestinationOutcome { destination: "a.1".into(), sent: 5, received: 5, acked: 5 },
                DestinationOutcome { destination: "a.2".into(), sent: 5, received: 5, acked: 0 },
            ],
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(report.total_sent(), 10);
        assert_eq!(report.total_received(), 10);
        assert_eq!(report.total_acked(), 5);
        assert_eq!(report.total_frames_written(), 40);
    }
}
