//! Consumer worker.
//!
//! Subscribes to one destination, then receives exactly `count` messages,
//! validating each against the next expected sequence number before
//! acknowledging it according to the ack mode. Afterwards it unsubscribes.
//!
//! ```text
//! Subscribing ─► Receiving(1) ─► [Acking(1)] ─► Receiving(2) ─► … ─► Unsubscribing ─► Done
//!                     │                │
//!                     └──── any failed guard ───► Fatal
//! ```

use std::sync::Arc;

use crate::{
    ack::{AckMode, dialect_for},
    adapter::{AdapterError, Session},
    config::StaggerConfig,
    destination::Destination,
    env::Environment,
    error::HarnessError,
    stagger::StaggerScheduler,
    validation::validate_delivery,
};

/// Where a consumer is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Not yet subscribed
    Subscribing,
    /// Waiting for message `n`
    Receiving(u64),
    /// Acknowledging message `n`
    Acking(u64),
    /// All messages received; removing the subscription
    Unsubscribing,
    /// Finished cleanly
    Done,
    /// Stopped on an error
    Fatal,
}

/// What a consumer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Destination name
    pub destination: String,
    /// Messages received and validated
    pub received: u64,
    /// ACK frames sent
    pub acked: u64,
}

/// Receives and checks one destination's messages.
pub struct Consumer<S, E> {
    session: Arc<S>,
    destination: Destination,
    ack_mode: AckMode,
    count: u64,
    subscription_id: String,
    env: E,
    stagger: StaggerConfig,
    state: ConsumerState,
    received: u64,
    acked: u64,
}

impl<S: Session, E: Environment> Consumer<S, E> {
    /// Consumer expecting `count` messages on `destination`.
    ///
    /// The subscription id is drawn fresh from `env`.
    pub fn new(
        session: Arc<S>,
        destination: Destination,
        ack_mode: AckMode,
        count: u64,
        env: E,
    ) -> Self {
        Self {
            session,
            destination,
            ack_mode,
            count,
            subscription_id: env.unique_id(),
            env,
            stagger: StaggerConfig::disabled(),
            state: ConsumerState::Subscribing,
            received: 0,
            acked: 0,
        }
    }

    /// Pace receipts with `stagger`.
    #[must_use]
    pub fn with_stagger(mut self, stagger: StaggerConfig) -> Self {
        self.stagger = stagger;
        self
    }

    /// Current state.
    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Subscription id used on SUBSCRIBE.
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Receive every message. The first failure moves the consumer to
    /// [`ConsumerState::Fatal`] and is returned.
    pub async fn run(&mut self) -> Result<ConsumerReport, HarnessError> {
        let result = self.drive().await;
        if let Err(err) = &result {
            tracing::debug!(destination = %self.destination, state = ?self.state, error = %err, "consumer failed");
            self.state = ConsumerState::Fatal;
        }
        result
    }

    async fn drive(&mut self) -> Result<ConsumerReport, HarnessError> {
        let dialect = dialect_for(self.session.protocol());
        let name = self.destination.name().to_string();
        let scheduler = StaggerScheduler::new(self.env.clone());

        self.state = ConsumerState::Subscribing;
        let headers = dialect.subscribe_headers(&name, &self.subscription_id, self.ack_mode);
        let mut delivery = self
            .session
            .subscribe(headers)
            .await
            .map_err(|source| HarnessError::Subscribe { destination: name.clone(), source })?;
        tracing::debug!(
            destination = %name,
            subscription = %self.subscription_id,
            ack = %self.ack_mode,
            count = self.count,
            "consumer subscribed"
        );

        for sequence in 1..=self.count {
            self.state = ConsumerState::Receiving(sequence);
            let frame = match delivery.recv().await {
                Some(Ok(frame)) => frame,
                Some(Err(source)) => {
                    return Err(HarnessError::Receive { destination: name, sequence, source });
                },
                None => {
                    return Err(HarnessError::Receive {
                        destination: name,
                        sequence,
                        source: AdapterError::Closed,
                    });
                },
            };

            validate_delivery(&frame, &self.destination, sequence)
                .map_err(|source| HarnessError::Validation { destination: name.clone(), source })?;
            self.received += 1;
            tracing::trace!(destination = %name, sequence, "received");

            if self.ack_mode.requires_ack() {
                self.state = ConsumerState::Acking(sequence);
                let headers =
                    dialect.ack_headers(&frame.headers, &self.subscription_id).map_err(|source| {
                        HarnessError::Validation { destination: name.clone(), source }
                    })?;
                self.session.ack(headers).await.map_err(|source| HarnessError::Ack {
                    destination: name.clone(),
                    sequence,
                    source,
                })?;
                self.acked += 1;
            }

            if self.stagger.enabled && sequence < self.count {
                let delay = scheduler.pause(self.stagger.factor).await;
                tracing::trace!(destination = %name, ?delay, "receive stagger");
            }
        }

        self.state = ConsumerState::Unsubscribing;
        let headers = dialect.unsubscribe_headers(&name, &self.subscription_id);
        self.session
            .unsubscribe(headers)
            .await
            .map_err(|source| HarnessError::Unsubscribe { destination: name.clone(), source })?;

        self.state = ConsumerState::Done;
        tracing::debug!(destination = %name, received = self.received, acked = self.acked, "consumer done");
        Ok(ConsumerReport { destination: name, received: self.received, acked: self.acked })
    }
}
