use super::sponsorship::{Sponsorship, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform user. Explorers and sponsors share this record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// When the explorer was marked resting; `None` while active.
    pub resting_since: Option<DateTime<Utc>>,
}

impl User {
    /// Whether the user has been resting since `cutoff` or earlier.
    pub fn rested_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.resting_since.is_some_and(|since| since <= cutoff)
    }

    pub fn contact(&self) -> SponsorContact {
        SponsorContact {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct SponsorContact {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// A sponsorship joined with what the auto-cancel notification needs.
#[derive(Debug, PartialEq, Clone)]
pub struct SponsorshipDetail {
    pub sponsorship: Sponsorship,
    pub sponsor: Option<SponsorContact>,
    pub explorer_name: Option<String>,
}
