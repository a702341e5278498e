use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type SponsorshipId = u32;
pub type UserId = u32;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum SponsorshipType {
    OneTimePayment,
    Subscription,
}

/// Local billing status of a sponsorship.
///
/// `Pending` and `Confirmed` belong to the checkout flow and are never
/// written by the reconciler; it only moves records between `Active`,
/// `Paused` and `Canceled`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SponsorshipStatus {
    Pending,
    Confirmed,
    Active,
    Paused,
    Canceled,
}

impl SponsorshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SponsorshipStatus::Pending => "pending",
            SponsorshipStatus::Confirmed => "confirmed",
            SponsorshipStatus::Active => "active",
            SponsorshipStatus::Paused => "paused",
            SponsorshipStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for SponsorshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment relationship from a sponsor to a sponsored explorer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Sponsorship {
    /// Internal identifier, the key for every status write.
    pub id: SponsorshipId,
    /// Identifier exposed to clients and used in notifications.
    pub public_id: String,
    /// The paying user.
    pub sponsor_id: UserId,
    /// The explorer receiving the sponsorship.
    pub sponsored_explorer_id: UserId,
    pub r#type: SponsorshipType,
    pub status: SponsorshipStatus,
    pub amount: Decimal,
    /// Subscription identifier at the payment gateway. One-time payments have none.
    pub external_subscription_id: Option<String>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Sponsorship {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Selection criteria for sponsorship queries.
///
/// Every reconciliation pass and every scheduler scan builds its filter with
/// [`SponsorshipFilter::billable`] or [`SponsorshipFilter::billable_any`], so
/// the soft-delete, type and gateway-id exclusions cannot drift apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SponsorshipFilter {
    pub sponsor_id: Option<UserId>,
    pub sponsored_explorer_id: Option<UserId>,
    pub r#type: Option<SponsorshipType>,
    pub status: Option<SponsorshipStatus>,
    pub requires_external_subscription: bool,
    pub include_deleted: bool,
}

impl SponsorshipFilter {
    /// Live, gateway-backed subscription sponsorships of one explorer in `status`.
    pub fn billable(explorer_id: UserId, status: SponsorshipStatus) -> Self {
        Self {
            sponsored_explorer_id: Some(explorer_id),
            ..Self::billable_any(status)
        }
    }

    /// Same scope as [`SponsorshipFilter::billable`], across all explorers.
    pub fn billable_any(status: SponsorshipStatus) -> Self {
        Self {
            sponsor_id: None,
            sponsored_explorer_id: None,
            r#type: Some(SponsorshipType::Subscription),
            status: Some(status),
            requires_external_subscription: true,
            include_deleted: false,
        }
    }

    pub fn matches(&self, sponsorship: &Sponsorship) -> bool {
        if !self.include_deleted && sponsorship.is_deleted() {
            return false;
        }
        if self.requires_external_subscription
            && sponsorship
                .external_subscription_id
                .as_deref()
                .is_none_or(str::is_empty)
        {
            return false;
        }
        self.sponsor_id.is_none_or(|id| id == sponsorship.sponsor_id)
            && self
                .sponsored_explorer_id
                .is_none_or(|id| id == sponsorship.sponsored_explorer_id)
            && self.r#type.is_none_or(|t| t == sponsorship.r#type)
            && self.status.is_none_or(|s| s == sponsorship.status)
    }
}
