use crate::domain::ports::SponsorshipStore;
use crate::domain::sponsorship::{
    Sponsorship, SponsorshipFilter, SponsorshipId, SponsorshipStatus, UserId,
};
use crate::domain::user::{SponsorshipDetail, User};
use crate::error::{LifecycleError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for sponsorships and users.
///
/// Sponsorships are kept in id order so passes visit them deterministically.
/// Locks are only held for the duration of a single read or write.
#[derive(Default, Clone)]
pub struct InMemorySponsorshipStore {
    sponsorships: Arc<RwLock<BTreeMap<SponsorshipId, Sponsorship>>>,
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemorySponsorshipStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SponsorshipStore for InMemorySponsorshipStore {
    async fn find_sponsorships(&self, filter: &SponsorshipFilter) -> Result<Vec<Sponsorship>> {
        let sponsorships = self.sponsorships.read().await;
        Ok(sponsorships
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    async fn find_sponsorship_details(
        &self,
        filter: &SponsorshipFilter,
    ) -> Result<Vec<SponsorshipDetail>> {
        let matching = self.find_sponsorships(filter).await?;
        let users = self.users.read().await;
        Ok(matching
            .into_iter()
            .map(|sponsorship| SponsorshipDetail {
                sponsor: users.get(&sponsorship.sponsor_id).map(User::contact),
                explorer_name: users
                    .get(&sponsorship.sponsored_explorer_id)
                    .map(|u| u.username.clone()),
                sponsorship,
            })
            .collect())
    }

    async fn update_sponsorship_status(
        &self,
        id: SponsorshipId,
        status: SponsorshipStatus,
    ) -> Result<()> {
        let mut sponsorships = self.sponsorships.write().await;
        let sponsorship = sponsorships
            .get_mut(&id)
            .ok_or(LifecycleError::SponsorshipNotFound(id))?;
        sponsorship.status = status;
        Ok(())
    }

    async fn get_resting_since(&self, explorer_id: UserId) -> Result<Option<DateTime<Utc>>> {
        let users = self.users.read().await;
        Ok(users.get(&explorer_id).and_then(|u| u.resting_since))
    }

    async fn set_resting_since(
        &self,
        explorer_id: UserId,
        resting_since: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&explorer_id)
            .ok_or(LifecycleError::ExplorerNotFound(explorer_id))?;
        user.resting_since = resting_since;
        Ok(())
    }

    async fn find_resting_explorers(
        &self,
        cutoff: DateTime<Utc>,
        filter: &SponsorshipFilter,
    ) -> Result<Vec<UserId>> {
        let with_sponsorships: BTreeSet<UserId> = self
            .find_sponsorships(filter)
            .await?
            .into_iter()
            .map(|s| s.sponsored_explorer_id)
            .collect();

        let users = self.users.read().await;
        Ok(with_sponsorships
            .into_iter()
            .filter(|id| users.get(id).is_some_and(|u| u.rested_since(cutoff)))
            .collect())
    }

    async fn store_sponsorship(&self, sponsorship: Sponsorship) -> Result<()> {
        let mut sponsorships = self.sponsorships.write().await;
        sponsorships.insert(sponsorship.id, sponsorship);
        Ok(())
    }

    async fn store_user(&self, user: User) -> Result<()> {
        let mut users = self.users.write().await;
        users.insert(user.id, user);
        Ok(())
    }

    async fn all_sponsorships(&self) -> Result<Vec<Sponsorship>> {
        let sponsorships = self.sponsorships.read().await;
        Ok(sponsorships.values().cloned().collect())
    }
}
