#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal_macros::dec;
use sponsorship_lifecycle::application::reconciler::{BillingReconciler, ReconcilerConfig};
use sponsorship_lifecycle::domain::ports::SponsorshipStore;
use sponsorship_lifecycle::domain::sponsorship::{
    Sponsorship, SponsorshipFilter, SponsorshipId, SponsorshipStatus, SponsorshipType, UserId,
};
use sponsorship_lifecycle::domain::user::{SponsorshipDetail, User};
use sponsorship_lifecycle::error::{LifecycleError, Result};
use sponsorship_lifecycle::infrastructure::in_memory::InMemorySponsorshipStore;
use sponsorship_lifecycle::infrastructure::notifier::RecordingNotifier;
use sponsorship_lifecycle::infrastructure::simulated_gateway::SimulatedGateway;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const SPONSOR_ID: UserId = 1000;

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub fn explorer(id: UserId, resting_since: Option<DateTime<Utc>>) -> User {
    User {
        id,
        username: format!("explorer{id}"),
        email: format!("explorer{id}@example.com"),
        resting_since,
    }
}

pub fn sponsor(id: UserId) -> User {
    User {
        id,
        username: format!("sponsor{id}"),
        email: format!("sponsor{id}@example.com"),
        resting_since: None,
    }
}

pub fn subscription(
    id: SponsorshipId,
    explorer_id: UserId,
    status: SponsorshipStatus,
) -> Sponsorship {
    Sponsorship {
        id,
        public_id: format!("sp_{id}"),
        sponsor_id: SPONSOR_ID,
        sponsored_explorer_id: explorer_id,
        r#type: SponsorshipType::Subscription,
        status,
        amount: dec!(5.00),
        external_subscription_id: Some(format!("sub_{id}")),
        deleted_at: None,
    }
}

/// In-memory store, simulated gateway and recording notifier wired to a reconciler.
pub struct Harness {
    pub store: InMemorySponsorshipStore,
    pub gateway: SimulatedGateway,
    pub notifier: RecordingNotifier,
}

impl Harness {
    pub async fn new() -> Self {
        let store = InMemorySponsorshipStore::new();
        store.store_user(sponsor(SPONSOR_ID)).await.unwrap();
        Self {
            store,
            gateway: SimulatedGateway::new().with_call_log(),
            notifier: RecordingNotifier::new(),
        }
    }

    pub async fn add_explorer(&self, id: UserId, resting_since: Option<DateTime<Utc>>) {
        self.store
            .store_user(explorer(id, resting_since))
            .await
            .unwrap();
    }

    /// Stores the sponsorship and gives the gateway a matching subscription.
    pub async fn add_sponsorship(&self, sponsorship: Sponsorship) {
        self.gateway
            .mirror(std::slice::from_ref(&sponsorship))
            .await;
        self.store.store_sponsorship(sponsorship).await.unwrap();
    }

    pub fn reconciler(&self) -> BillingReconciler {
        self.reconciler_over(Arc::new(self.store.clone()))
    }

    pub fn reconciler_over(&self, store: Arc<dyn SponsorshipStore>) -> BillingReconciler {
        self.reconciler_with(store, ReconcilerConfig::default())
    }

    pub fn reconciler_with(
        &self,
        store: Arc<dyn SponsorshipStore>,
        config: ReconcilerConfig,
    ) -> BillingReconciler {
        BillingReconciler::new(
            store,
            Arc::new(self.gateway.clone()),
            Arc::new(self.notifier.clone()),
            config,
        )
    }

    pub async fn status(&self, id: SponsorshipId) -> SponsorshipStatus {
        self.store
            .all_sponsorships()
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.id == id)
            .map(|s| s.status)
            .unwrap()
    }
}

/// Delegating store with hooks that simulate races and storage faults.
#[derive(Clone)]
pub struct ScriptedStore {
    pub inner: InMemorySponsorshipStore,
    resting_reads: Arc<AtomicUsize>,
    /// Clear the explorer's resting marker right after this many reads.
    clear_resting_after_reads: Option<usize>,
    failing_resting_reads: HashSet<UserId>,
    panicking_resting_reads: HashSet<UserId>,
    failing_updates: HashSet<SponsorshipId>,
    fail_explorer_query: bool,
}

impl ScriptedStore {
    pub fn new(inner: InMemorySponsorshipStore) -> Self {
        Self {
            inner,
            resting_reads: Arc::new(AtomicUsize::new(0)),
            clear_resting_after_reads: None,
            failing_resting_reads: HashSet::new(),
            panicking_resting_reads: HashSet::new(),
            failing_updates: HashSet::new(),
            fail_explorer_query: false,
        }
    }

    pub fn clear_resting_after_reads(mut self, reads: usize) -> Self {
        self.clear_resting_after_reads = Some(reads);
        self
    }

    pub fn fail_resting_reads_for(mut self, explorer_id: UserId) -> Self {
        self.failing_resting_reads.insert(explorer_id);
        self
    }

    pub fn panic_on_resting_reads_for(mut self, explorer_id: UserId) -> Self {
        self.panicking_resting_reads.insert(explorer_id);
        self
    }

    pub fn fail_updates_for(mut self, sponsorship_id: SponsorshipId) -> Self {
        self.failing_updates.insert(sponsorship_id);
        self
    }

    pub fn fail_explorer_query(mut self) -> Self {
        self.fail_explorer_query = true;
        self
    }

    pub fn resting_reads(&self) -> usize {
        self.resting_reads.load(Ordering::SeqCst)
    }
}

fn storage_fault(what: &str) -> LifecycleError {
    LifecycleError::InternalError(Box::new(std::io::Error::other(format!(
        "simulated storage fault: {what}"
    ))))
}

#[async_trait]
impl SponsorshipStore for ScriptedStore {
    async fn find_sponsorships(&self, filter: &SponsorshipFilter) -> Result<Vec<Sponsorship>> {
        self.inner.find_sponsorships(filter).await
    }

    async fn find_sponsorship_details(
        &self,
        filter: &SponsorshipFilter,
    ) -> Result<Vec<SponsorshipDetail>> {
        self.inner.find_sponsorship_details(filter).await
    }

    async fn update_sponsorship_status(
        &self,
        id: SponsorshipId,
        status: SponsorshipStatus,
    ) -> Result<()> {
        if self.failing_updates.contains(&id) {
            return Err(storage_fault("update"));
        }
        self.inner.update_sponsorship_status(id, status).await
    }

    async fn get_resting_since(&self, explorer_id: UserId) -> Result<Option<DateTime<Utc>>> {
        if self.failing_resting_reads.contains(&explorer_id) {
            return Err(storage_fault("resting read"));
        }
        if self.panicking_resting_reads.contains(&explorer_id) {
            panic!("simulated storage crash for explorer {explorer_id}");
        }
        let value = self.inner.get_resting_since(explorer_id).await?;
        let reads = self.resting_reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.clear_resting_after_reads == Some(reads) {
            self.inner.clear_resting_since(explorer_id).await?;
        }
        Ok(value)
    }

    async fn set_resting_since(
        &self,
        explorer_id: UserId,
        resting_since: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.inner.set_resting_since(explorer_id, resting_since).await
    }

    async fn find_resting_explorers(
        &self,
        cutoff: DateTime<Utc>,
        filter: &SponsorshipFilter,
    ) -> Result<Vec<UserId>> {
        if self.fail_explorer_query {
            return Err(storage_fault("explorer query"));
        }
        self.inner.find_resting_explorers(cutoff, filter).await
    }

    async fn store_sponsorship(&self, sponsorship: Sponsorship) -> Result<()> {
        self.inner.store_sponsorship(sponsorship).await
    }

    async fn store_user(&self, user: User) -> Result<()> {
        self.inner.store_user(user).await
    }

    async fn all_sponsorships(&self) -> Result<Vec<Sponsorship>> {
        self.inner.all_sponsorships().await
    }
}
