//! Producer worker.
//!
//! Sends messages `1..=count` to one destination, each tagged with the queue
//! number, its sequence number and the producer's sender id. Between sends,
//! but not after the last one, it staggers when send pacing is enabled.

use std::sync::Arc;

use crate::{
    adapter::Session,
    config::StaggerConfig,
    destination::{Destination, Message},
    env::Environment,
    error::HarnessError,
    payload::{Filler, PayloadShape},
    stagger::StaggerScheduler,
};

/// What a producer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerReport {
    /// Destination name
    pub destination: String,
    /// Messages sent
    pub sent: u64,
}

/// Sends one destination's messages over a session.
pub struct Producer<S, E> {
    session: Arc<S>,
    destination: Destination,
    sender_id: String,
    count: u64,
    env: E,
    filler: Filler,
    stagger: StaggerConfig,
    persistent: bool,
}

impl<S: Session, E: Environment> Producer<S, E> {
    /// Producer sending `count` messages to `destination` as `sender_id`.
    pub fn new(
        session: Arc<S>,
        destination: Destination,
        sender_id: String,
        count: u64,
        env: E,
    ) -> Self {
        Self {
            session,
            destination,
            sender_id,
            count,
            env,
            filler: Filler::new(PayloadShape::default()),
            stagger: StaggerConfig::disabled(),
            persistent: false,
        }
    }

    /// Use `filler` for message bodies.
    #[must_use]
    pub fn with_filler(mut self, filler: Filler) -> Self {
        self.filler = filler;
        self
    }

    /// Pace sends with `stagger`.
    #[must_use]
    pub fn with_stagger(mut self, stagger: StaggerConfig) -> Self {
        self.stagger = stagger;
        self
    }

    /// Request broker persistence of every message.
    #[must_use]
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Send every message. The first send error ends the producer.
    pub async fn run(self) -> Result<ProducerReport, HarnessError> {
        let scheduler = StaggerScheduler::new(self.env.clone());
        tracing::debug!(
            destination = %self.destination,
            sender_id = %self.sender_id,
            count = self.count,
            "producer starting"
        );

        for sequence in 1..=self.count {
            let body = self.filler.body(&self.env);
            let message = Message::new(&self.destination, sequence, &self.sender_id, body);
            let headers = message.headers(self.persistent);

            self.session.send(headers, message.payload).await.map_err(|source| {
                HarnessError::Send {
                    destination: self.destination.name().to_string(),
                    sequence,
                    source,
                }
            })?;
            tracing::trace!(destination = %self.destination, sequence, "sent");

            if self.stagger.enabled && sequence < self.count {
                let delay = scheduler.pause(self.stagger.factor).await;
                tracing::trace!(destination = %self.destination, ?delay, "send stagger");
            }
        }

        tracing::debug!(destination = %self.destination, sent = self.count, "producer done");
        Ok(ProducerReport { destination: self.destination.name().to_string(), sent: self.count })
    }
}
