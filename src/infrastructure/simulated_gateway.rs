use crate::domain::gateway::{CollectionBehavior, GatewayError, GatewayState};
use crate::domain::ports::PaymentGateway;
use crate::domain::sponsorship::Sponsorship;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCall {
    Pause(CollectionBehavior),
    Resume,
    Cancel,
}

#[derive(Default)]
struct Inner {
    subscriptions: HashMap<String, GatewayState>,
    faults: HashMap<String, GatewayError>,
    calls: Vec<(GatewayCall, String)>,
}

/// An in-process stand-in for the payment gateway.
///
/// Replies with the same error shapes as the remote API, supports injected
/// faults per subscription and an artificial latency for timeout handling.
/// Calls are only logged when [`SimulatedGateway::with_call_log`] is set.
#[derive(Clone, Default)]
pub struct SimulatedGateway {
    inner: Arc<RwLock<Inner>>,
    latency: Option<Duration>,
    log_calls: bool,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Keeps every call for [`SimulatedGateway::calls`].
    pub fn with_call_log(mut self) -> Self {
        self.log_calls = true;
        self
    }

    /// Seeds one subscription per gateway-backed sponsorship, matching its local status.
    pub async fn mirror(&self, sponsorships: &[Sponsorship]) {
        let mut inner = self.inner.write().await;
        for sponsorship in sponsorships {
            if let Some(id) = &sponsorship.external_subscription_id {
                inner
                    .subscriptions
                    .insert(id.clone(), GatewayState::mirroring(sponsorship.status));
            }
        }
    }

    pub async fn set_state(&self, subscription_id: &str, state: GatewayState) {
        let mut inner = self.inner.write().await;
        if state == GatewayState::Missing {
            inner.subscriptions.remove(subscription_id);
        } else {
            inner
                .subscriptions
                .insert(subscription_id.to_string(), state);
        }
    }

    pub async fn state(&self, subscription_id: &str) -> GatewayState {
        let inner = self.inner.read().await;
        inner
            .subscriptions
            .get(subscription_id)
            .copied()
            .unwrap_or(GatewayState::Missing)
    }

    /// Makes every call for `subscription_id` fail with `error` until cleared.
    pub async fn fail_with(&self, subscription_id: &str, error: GatewayError) {
        let mut inner = self.inner.write().await;
        inner.faults.insert(subscription_id.to_string(), error);
    }

    pub async fn clear_fault(&self, subscription_id: &str) {
        let mut inner = self.inner.write().await;
        inner.faults.remove(subscription_id);
    }

    /// Every call received, in order. Empty unless the call log is on.
    pub async fn calls(&self) -> Vec<(GatewayCall, String)> {
        self.inner.read().await.calls.clone()
    }

    async fn execute(&self, call: GatewayCall, subscription_id: &str) -> Result<(), GatewayError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.inner.write().await;
        if self.log_calls {
            inner.calls.push((call, subscription_id.to_string()));
        }
        if let Some(error) = inner.faults.get(subscription_id) {
            return Err(error.clone());
        }

        let current = inner
            .subscriptions
            .get(subscription_id)
            .copied()
            .unwrap_or(GatewayState::Missing);
        let next = match (call, current) {
            (_, GatewayState::Missing) => {
                return Err(GatewayError::resource_missing(subscription_id));
            }
            (GatewayCall::Cancel, GatewayState::Canceled) => {
                return Err(GatewayError::resource_missing(subscription_id));
            }
            (_, GatewayState::Canceled) => return Err(GatewayError::already_canceled()),
            (GatewayCall::Pause(_), _) => GatewayState::Paused,
            (GatewayCall::Resume, _) => GatewayState::Active,
            (GatewayCall::Cancel, _) => GatewayState::Canceled,
        };
        inner
            .subscriptions
            .insert(subscription_id.to_string(), next);
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn pause(
        &self,
        subscription_id: &str,
        behavior: CollectionBehavior,
    ) -> Result<(), GatewayError> {
        self.execute(GatewayCall::Pause(behavior), subscription_id)
            .await
    }

    async fn resume(&self, subscription_id: &str) -> Result<(), GatewayError> {
        self.execute(GatewayCall::Resume, subscription_id).await
    }

    async fn cancel(&self, subscription_id: &str) -> Result<(), GatewayError> {
        self.execute(GatewayCall::Cancel, subscription_id).await
    }
}
