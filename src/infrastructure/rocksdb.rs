use crate::domain::ports::SponsorshipStore;
use crate::domain::sponsorship::{
    Sponsorship, SponsorshipFilter, SponsorshipId, SponsorshipStatus, UserId,
};
use crate::domain::user::{SponsorshipDetail, User};
use crate::error::{LifecycleError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Column Family for sponsorship records.
pub const CF_SPONSORSHIPS: &str = "sponsorships";
/// Column Family for users and their resting markers.
pub const CF_USERS: &str = "users";

/// A persistent store implementation using RocksDB.
///
/// Sponsorships and users live in separate Column Families, keyed by their
/// big-endian id so iteration follows id order. Values are JSON.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("sponsorships" and "users") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_sponsorships = ColumnFamilyDescriptor::new(CF_SPONSORSHIPS, Options::default());
        let cf_users = ColumnFamilyDescriptor::new(CF_USERS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_sponsorships, cf_users])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: u32, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value).map_err(|e| {
            LifecycleError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )))
        })?;
        self.db.put_cf(cf, key.to_be_bytes(), bytes)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: u32) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| {
                LifecycleError::InternalError(Box::new(std::io::Error::other(format!(
                    "RocksDB iteration error: {}",
                    e
                ))))
            })?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LifecycleError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        LifecycleError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

#[async_trait]
impl SponsorshipStore for RocksDBStore {
    async fn find_sponsorships(&self, filter: &SponsorshipFilter) -> Result<Vec<Sponsorship>> {
        Ok(self
            .scan::<Sponsorship>(CF_SPONSORSHIPS)?
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect())
    }

    async fn find_sponsorship_details(
        &self,
        filter: &SponsorshipFilter,
    ) -> Result<Vec<SponsorshipDetail>> {
        let mut details = Vec::new();
        for sponsorship in self.find_sponsorships(filter).await? {
            let sponsor: Option<User> = self.get(CF_USERS, sponsorship.sponsor_id)?;
            let explorer: Option<User> = self.get(CF_USERS, sponsorship.sponsored_explorer_id)?;
            details.push(SponsorshipDetail {
                sponsor: sponsor.map(|u| u.contact()),
                explorer_name: explorer.map(|u| u.username),
                sponsorship,
            });
        }
        Ok(details)
    }

    async fn update_sponsorship_status(
        &self,
        id: SponsorshipId,
        status: SponsorshipStatus,
    ) -> Result<()> {
        let mut sponsorship: Sponsorship = self
            .get(CF_SPONSORSHIPS, id)?
            .ok_or(LifecycleError::SponsorshipNotFound(id))?;
        sponsorship.status = status;
        self.put(CF_SPONSORSHIPS, id, &sponsorship)
    }

    async fn get_resting_since(&self, explorer_id: UserId) -> Result<Option<DateTime<Utc>>> {
        let user: Option<User> = self.get(CF_USERS, explorer_id)?;
        Ok(user.and_then(|u| u.resting_since))
    }

    async fn set_resting_since(
        &self,
        explorer_id: UserId,
        resting_since: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut user: User = self
            .get(CF_USERS, explorer_id)?
            .ok_or(LifecycleError::ExplorerNotFound(explorer_id))?;
        user.resting_since = resting_since;
        self.put(CF_USERS, explorer_id, &user)
    }

    async fn find_resting_explorers(
        &self,
        cutoff: DateTime<Utc>,
        filter: &SponsorshipFilter,
    ) -> Result<Vec<UserId>> {
        let candidates: BTreeSet<UserId> = self
            .find_sponsorships(filter)
            .await?
            .into_iter()
            .map(|s| s.sponsored_explorer_id)
            .collect();

        let mut eligible = Vec::new();
        for explorer_id in candidates {
            let user: Option<User> = self.get(CF_USERS, explorer_id)?;
            if user.is_some_and(|u| u.rested_since(cutoff)) {
                eligible.push(explorer_id);
            }
        }
        Ok(eligible)
    }

    async fn store_sponsorship(&self, sponsorship: Sponsorship) -> Result<()> {
        self.put(CF_SPONSORSHIPS, sponsorship.id, &sponsorship)
    }

    async fn store_user(&self, user: User) -> Result<()> {
        self.put(CF_USERS, user.id, &user)
    }

    async fn all_sponsorships(&self) -> Result<Vec<Sponsorship>> {
        self.scan(CF_SPONSORSHIPS)
    }
}
