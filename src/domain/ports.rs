use super::gateway::{CollectionBehavior, GatewayError};
use super::notification::NotificationEvent;
use super::sponsorship::{Sponsorship, SponsorshipFilter, SponsorshipId, SponsorshipStatus, UserId};
use super::user::{SponsorshipDetail, User};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persistence for sponsorships and the explorers' resting markers.
#[async_trait]
pub trait SponsorshipStore: Send + Sync {
    async fn find_sponsorships(&self, filter: &SponsorshipFilter) -> Result<Vec<Sponsorship>>;

    /// Like `find_sponsorships`, joined with sponsor contact and explorer name.
    async fn find_sponsorship_details(
        &self,
        filter: &SponsorshipFilter,
    ) -> Result<Vec<SponsorshipDetail>>;

    async fn update_sponsorship_status(
        &self,
        id: SponsorshipId,
        status: SponsorshipStatus,
    ) -> Result<()>;

    async fn get_resting_since(&self, explorer_id: UserId) -> Result<Option<DateTime<Utc>>>;

    async fn set_resting_since(
        &self,
        explorer_id: UserId,
        resting_since: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn clear_resting_since(&self, explorer_id: UserId) -> Result<()> {
        self.set_resting_since(explorer_id, None).await
    }

    /// Explorers resting since `cutoff` or earlier that own at least one
    /// sponsorship matching `filter`.
    async fn find_resting_explorers(
        &self,
        cutoff: DateTime<Utc>,
        filter: &SponsorshipFilter,
    ) -> Result<Vec<UserId>>;

    async fn store_sponsorship(&self, sponsorship: Sponsorship) -> Result<()>;
    async fn store_user(&self, user: User) -> Result<()>;
    async fn all_sponsorships(&self) -> Result<Vec<Sponsorship>>;
}

/// The remote subscription API.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn pause(
        &self,
        subscription_id: &str,
        behavior: CollectionBehavior,
    ) -> std::result::Result<(), GatewayError>;
    async fn resume(&self, subscription_id: &str) -> std::result::Result<(), GatewayError>;
    async fn cancel(&self, subscription_id: &str) -> std::result::Result<(), GatewayError>;
}

/// Fire-and-forget delivery of notification events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn emit(&self, event: NotificationEvent) -> Result<()>;
}

pub type SponsorshipStoreRef = Arc<dyn SponsorshipStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type NotifierRef = Arc<dyn Notifier>;
