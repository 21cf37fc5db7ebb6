//! Oracle publisher main loop.
//!
//! ```text
//! Connecting --connect ok--> Running --tick error--> (backoff) --> Connecting
//!     |                         |
//!     +-- fatal error --> exit  +-- cancelled --> Stopped
//! ```
//!
//! Each tick evaluates the inactivity rule, takes one observation, runs the
//! decision policy and, when publishing, hands the signed transaction to a
//! detached delivery task. [`OracleState`] is updated at submission and
//! survives reconnects.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use pusher_delivery::{spawn_delivery, BroadcastChannel, DeliveryConfig};
use pusher_policy::{check_inactivity, should_publish, OracleState, PolicyConfig, PublishDecision};
use pusher_types::PriceObservation;
use pusher_wire::instruction::UpdateInstruction;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PusherConfig;
use crate::error::PusherError;

/// Network handles and signing material for one connection.
#[async_trait]
pub trait Session: Send + Sync {
    type Channel: BroadcastChannel + 'static;

    /// Channel deliveries are sent through.
    fn channel(&self) -> Arc<Self::Channel>;

    /// Take one observation from the configured source.
    async fn observe(&self) -> anyhow::Result<Option<PriceObservation>>;

    /// Wrap `update` in a signed, ready-to-broadcast transaction.
    async fn build_update(
        &self,
        update: &UpdateInstruction,
    ) -> anyhow::Result<<Self::Channel as BroadcastChannel>::Tx>;
}

/// Acquires a fresh [`Session`].
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    /// # Errors
    ///
    /// Fatal errors stop the publisher; session errors are retried after
    /// the reconnect backoff.
    async fn connect(&self) -> Result<Self::Session, PusherError>;
}

/// Timing and policy parameters for the publisher.
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub policy: PolicyConfig,
    pub delivery: DeliveryConfig,
    /// Confidence interval attached to every update (unscaled).
    pub confidence: f64,
    pub fetch_interval: Duration,
    pub reconnect_backoff: Duration,
}

impl PublisherSettings {
    pub fn from_config(config: &PusherConfig) -> Self {
        Self {
            policy: config.policy(),
            delivery: config.delivery(),
            confidence: config.feed.confidence,
            fetch_interval: config.fetch_interval(),
            reconnect_backoff: config.reconnect_backoff(),
        }
    }
}

pub struct Publisher<C> {
    connector: C,
    settings: PublisherSettings,
    state: OracleState,
    cancel: CancellationToken,
}

impl<C: Connector> Publisher<C> {
    pub fn new(connector: C, settings: PublisherSettings, cancel: CancellationToken) -> Self {
        Self {
            connector,
            settings,
            state: OracleState::new(),
            cancel,
        }
    }

    /// What the publisher last submitted.
    pub fn state(&self) -> &OracleState {
        &self.state
    }

    /// Run until cancelled or a fatal error occurs.
    ///
    /// In-flight deliveries are not awaited on shutdown.
    pub async fn run(mut self) -> Result<(), PusherError> {
        let backoff_ms = self.settings.reconnect_backoff.as_millis() as u64;

        while !self.cancel.is_cancelled() {
            debug!("connecting");
            let connected = tokio::select! {
                result = self.connector.connect() => result,
                _ = self.cancel.cancelled() => break,
            };
            let session = match connected {
                Ok(session) => session,
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "publisher cannot start");
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms, "connect failed, retrying");
                    self.pause(self.settings.reconnect_backoff).await;
                    continue;
                }
            };

            info!("publisher running");
            match self.run_session(&session).await {
                Ok(()) => break,
                Err(e) => error!(error = %e, backoff_ms, "tick failed, rebuilding session"),
            }
            drop(session);
            self.pause(self.settings.reconnect_backoff).await;
        }

        let state = self.state();
        info!(
            last_price = state.last_price,
            last_status = %state.last_status,
            "publisher stopped"
        );
        Ok(())
    }

    async fn run_session(&mut self, session: &C::Session) -> Result<(), PusherError> {
        while !self.cancel.is_cancelled() {
            self.tick(session).await?;
            if !self.pause(self.settings.fetch_interval).await {
                break;
            }
        }
        Ok(())
    }

    /// Run one tick. Returns the decision acted on, if any.
    pub async fn tick<S: Session>(
        &mut self,
        session: &S,
    ) -> Result<Option<PublishDecision>, PusherError> {
        let now = Instant::now().into_std();
        if let Some(decision) = check_inactivity(&self.state, &self.settings.policy, now) {
            self.submit(session, &decision).await?;
            return Ok(Some(decision));
        }

        let observation = session
            .observe()
            .await
            .context("fetching observation")
            .map_err(PusherError::Session)?;
        let Some(observation) = observation else {
            debug!("no observation this tick");
            return Ok(None);
        };

        let now = Instant::now().into_std();
        let decision = should_publish(&observation, &self.state, &self.settings.policy, now);
        if !decision.publish {
            debug!(
                price = observation.value,
                last_price = self.state.last_price,
                "within thresholds, not publishing"
            );
            return Ok(None);
        }
        self.submit(session, &decision).await?;
        Ok(Some(decision))
    }

    async fn submit<S: Session>(
        &mut self,
        session: &S,
        decision: &PublishDecision,
    ) -> Result<(), PusherError> {
        let update =
            UpdateInstruction::from_price(decision.price, self.settings.confidence, decision.status)
                .context("encoding update")
                .map_err(PusherError::Session)?;
        let tx = session
            .build_update(&update)
            .await
            .map_err(PusherError::Session)?;

        let channel = session.channel();
        let id = channel.transaction_id(&tx);
        info!(
            %id,
            price = decision.price,
            status = %decision.status,
            reason = ?decision.reason,
            "submitting update"
        );
        // Detached; the task logs its own outcome.
        drop(spawn_delivery(channel, tx, self.settings.delivery.clone()));

        self.state
            .record_submission(decision.price, decision.status, Instant::now().into_std());
        Ok(())
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` if cancelled.
    async fn pause(&self, duration: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancel.cancelled() => false,
        }
    }
}
