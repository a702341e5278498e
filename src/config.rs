//! Command line and environment configuration.

use crate::application::reconciler::ReconcilerConfig;
use crate::application::scheduler::SchedulerConfig;
use crate::domain::gateway::ErrorClassifier;
use crate::domain::sponsorship::UserId;
use crate::error::{LifecycleError, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Keeps sponsorship subscriptions in step with explorers' resting state.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Sponsorships CSV used to seed the store
    #[arg(long, env = "SPONSORSHIPS_CSV", global = true)]
    pub sponsorships: Option<PathBuf>,

    /// Users CSV used to seed the store
    #[arg(long, env = "USERS_CSV", global = true)]
    pub users: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Upper bound on a single gateway call, in milliseconds
    #[arg(long, env = "GATEWAY_TIMEOUT_MS", default_value_t = 10_000, global = true)]
    pub gateway_timeout_ms: u64,

    /// Only trust structured gateway error codes, never message text
    #[arg(long, env = "STRICT_GATEWAY_CODES", global = true)]
    pub strict_gateway_codes: bool,

    /// Days of resting before active subscriptions are paused
    #[arg(long, env = "PAUSE_AFTER_DAYS", default_value_t = 30, global = true)]
    pub pause_after_days: i64,

    /// Days of resting before paused subscriptions are canceled
    #[arg(long, env = "CANCEL_AFTER_DAYS", default_value_t = 90, global = true)]
    pub cancel_after_days: i64,

    /// UTC hour of the daily pause scan
    #[arg(long, env = "PAUSE_HOUR", default_value_t = 3, global = true)]
    pub pause_hour: u32,

    /// UTC hour of the daily cancel scan
    #[arg(long, env = "CANCEL_HOUR", default_value_t = 4, global = true)]
    pub cancel_hour: u32,

    /// Explorers reconciled concurrently during a scan
    #[arg(long, env = "MAX_CONCURRENCY", default_value_t = 1, global = true)]
    pub max_concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Clock override for one-off scans (RFC 3339)
    #[arg(long, global = true)]
    pub now: Option<DateTime<Utc>>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pause subscriptions of explorers past the pause threshold
    PauseScan,
    /// Cancel paused subscriptions of explorers past the cancel threshold
    CancelScan,
    /// Mark an explorer active again and resume their subscriptions
    Resume {
        #[arg(long)]
        explorer: UserId,
    },
    /// Run the daily scans until interrupted
    Serve,
}

impl Cli {
    pub fn validate(&self) -> Result<()> {
        if self.gateway_timeout_ms == 0 {
            return Err(LifecycleError::ConfigError(
                "gateway timeout must be positive".to_string(),
            ));
        }
        self.scheduler_config().validate()
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            gateway_timeout: std::time::Duration::from_millis(self.gateway_timeout_ms),
            classifier: if self.strict_gateway_codes {
                ErrorClassifier::CodeOnly
            } else {
                ErrorClassifier::CodeOrMessage
            },
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            pause_after: Duration::days(self.pause_after_days),
            cancel_after: Duration::days(self.cancel_after_days),
            pause_hour: self.pause_hour,
            cancel_hour: self.cancel_hour,
            max_concurrency: self.max_concurrency,
        }
    }
}
