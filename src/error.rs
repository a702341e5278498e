use crate::domain::sponsorship::{SponsorshipId, UserId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
    #[error("Sponsorship not found: {0}")]
    SponsorshipNotFound(SponsorshipId),
    #[error("Explorer not found: {0}")]
    ExplorerNotFound(UserId),
    #[error("Notification error: {0}")]
    NotificationError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
