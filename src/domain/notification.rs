use super::sponsorship::{SponsorshipId, UserId};
use rust_decimal::Decimal;
use serde::Serialize;

/// Events the reconciler hands to the notification sender.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    SponsorshipAutoCanceled(AutoCancelNotice),
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::SponsorshipAutoCanceled(_) => "sponsorship_auto_canceled",
        }
    }
}

/// Tells a sponsor their subscription ended because the explorer went quiet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoCancelNotice {
    pub sponsorship_id: SponsorshipId,
    pub sponsorship_public_id: String,
    pub sponsor_id: UserId,
    pub sponsor_email: String,
    pub sponsor_name: String,
    pub explorer_id: UserId,
    pub explorer_name: String,
    pub amount: Decimal,
}
