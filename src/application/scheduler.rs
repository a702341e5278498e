use super::reconciler::{BillingReconciler, PassReport};
use crate::domain::ports::SponsorshipStoreRef;
use crate::domain::sponsorship::{SponsorshipFilter, SponsorshipStatus, UserId};
use crate::error::{LifecycleError, Result};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

/// Thresholds and timing for the daily scans.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Resting time after which active subscriptions are paused.
    pub pause_after: Duration,
    /// Resting time after which paused subscriptions are canceled.
    pub cancel_after: Duration,
    /// UTC hour of the daily pause scan.
    pub pause_hour: u32,
    /// UTC hour of the daily cancel scan. One hour after the pause scan by default.
    pub cancel_hour: u32,
    /// Explorers reconciled at the same time within one scan.
    pub max_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pause_after: Duration::days(30),
            cancel_after: Duration::days(90),
            pause_hour: 3,
            cancel_hour: 4,
            max_concurrency: 1,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pause_hour > 23 || self.cancel_hour > 23 {
            return Err(LifecycleError::ConfigError(
                "scan hours must be between 0 and 23".to_string(),
            ));
        }
        if self.pause_after <= Duration::zero() || self.cancel_after < self.pause_after {
            return Err(LifecycleError::ConfigError(
                "cancel threshold must be at least the pause threshold, and both positive"
                    .to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(LifecycleError::ConfigError(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Pause,
    Cancel,
}

impl ScanKind {
    fn status(self) -> SponsorshipStatus {
        match self {
            ScanKind::Pause => SponsorshipStatus::Active,
            ScanKind::Cancel => SponsorshipStatus::Paused,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanKind::Pause => "pause",
            ScanKind::Cancel => "cancel",
        }
    }
}

/// Totals for one scan across all eligible explorers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub explorers: usize,
    /// Explorers whose pass returned a report.
    pub completed: usize,
    /// Explorers whose pass returned an error or panicked.
    pub errored: usize,
    /// Ids of the errored explorers, ascending.
    pub errored_explorers: Vec<UserId>,
    pub applied: usize,
    pub repaired: usize,
    pub failed: usize,
}

impl ScanReport {
    fn absorb(&mut self, pass: &PassReport) {
        self.completed += 1;
        self.applied += pass.applied;
        self.repaired += pass.repaired;
        self.failed += pass.failed;
    }

    fn fail(&mut self, explorer_id: UserId) {
        self.errored += 1;
        self.errored_explorers.push(explorer_id);
    }
}

/// Time-driven trigger for the pause and cancel passes.
pub struct RestStateScheduler {
    reconciler: Arc<BillingReconciler>,
    store: SponsorshipStoreRef,
    config: SchedulerConfig,
}

impl RestStateScheduler {
    /// Fails with `ConfigError` when `config` does not validate.
    pub fn new(
        reconciler: Arc<BillingReconciler>,
        store: SponsorshipStoreRef,
        config: SchedulerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reconciler,
            store,
            config,
        })
    }

    pub async fn run_pause_scan(&self, now: DateTime<Utc>) -> Result<ScanReport> {
        self.run_scan(ScanKind::Pause, now).await
    }

    pub async fn run_cancel_scan(&self, now: DateTime<Utc>) -> Result<ScanReport> {
        self.run_scan(ScanKind::Cancel, now).await
    }

    /// Finds the explorers past the scan's threshold and reconciles each one.
    ///
    /// Eligibility is recomputed from live data on every run. A failing
    /// eligibility query is returned as an error; a failure inside one
    /// explorer's pass is logged and counted.
    pub async fn run_scan(&self, kind: ScanKind, now: DateTime<Utc>) -> Result<ScanReport> {
        let threshold = match kind {
            ScanKind::Pause => self.config.pause_after,
            ScanKind::Cancel => self.config.cancel_after,
        };
        let cutoff = now - threshold;
        let explorers = self
            .store
            .find_resting_explorers(cutoff, &SponsorshipFilter::billable_any(kind.status()))
            .await?;

        info!(
            scan = kind.as_str(),
            cutoff = %cutoff,
            explorers = explorers.len(),
            "Starting resting scan"
        );

        let mut report = ScanReport {
            explorers: explorers.len(),
            ..ScanReport::default()
        };
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut task_explorers = HashMap::new();

        for explorer_id in explorers {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let reconciler = Arc::clone(&self.reconciler);
            let handle = tasks.spawn(async move {
                let result = reconcile(&reconciler, kind, explorer_id).await;
                drop(permit);
                (explorer_id, result)
            });
            task_explorers.insert(handle.id(), explorer_id);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(pass))) => report.absorb(&pass),
                Ok((explorer_id, Err(e))) => {
                    report.fail(explorer_id);
                    error!(
                        scan = kind.as_str(),
                        explorer_id,
                        error = %e,
                        "Reconciliation failed for explorer"
                    );
                }
                Err(e) => {
                    let Some(explorer_id) = task_explorers.get(&e.id()).copied() else {
                        error!(scan = kind.as_str(), error = %e, "Reconciliation task failed");
                        continue;
                    };
                    report.fail(explorer_id);
                    error!(
                        scan = kind.as_str(),
                        explorer_id,
                        error = %e,
                        "Reconciliation task panicked"
                    );
                }
            }
        }
        report.errored_explorers.sort_unstable();

        info!(
            scan = kind.as_str(),
            explorers = report.explorers,
            completed = report.completed,
            errored = report.errored,
            applied = report.applied,
            repaired = report.repaired,
            failed = report.failed,
            "Resting scan finished"
        );
        Ok(report)
    }

    /// Starts the daily pause and cancel jobs. Both stop once `shutdown`
    /// flips to `true` or its sender is dropped.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        [
            (ScanKind::Pause, self.config.pause_hour),
            (ScanKind::Cancel, self.config.cancel_hour),
        ]
        .into_iter()
        .map(|(kind, hour)| {
            let scheduler = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { scheduler.run_daily(kind, hour, shutdown).await })
        })
        .collect()
    }

    async fn run_daily(&self, kind: ScanKind, hour: u32, mut shutdown: watch::Receiver<bool>) {
        loop {
            let now = Utc::now();
            let Some(next) = next_run_after(now, hour) else {
                error!(scan = kind.as_str(), hour, "Invalid scan hour, job not scheduled");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(scan = kind.as_str(), next_run = %next, "Scheduled resting scan");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(scan = kind.as_str(), "Stopping resting scan job");
                        return;
                    }
                    continue;
                }
            }

            if let Err(e) = self.run_scan(kind, Utc::now()).await {
                warn!(
                    scan = kind.as_str(),
                    error = %e,
                    "Resting scan abandoned, will retry at next run"
                );
            }
        }
    }
}

async fn reconcile(
    reconciler: &BillingReconciler,
    kind: ScanKind,
    explorer_id: UserId,
) -> Result<PassReport> {
    match kind {
        ScanKind::Pause => reconciler.pause_all_sponsorships(explorer_id).await,
        ScanKind::Cancel => reconciler.cancel_all_paused_sponsorships(explorer_id).await,
    }
}

/// The first `hour:00` UTC strictly after `now`, or `None` if `hour` is not
/// a valid hour of the day.
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    let today = now.date_naive().and_time(time).and_utc();
    Some(if today > now {
        today
    } else {
        today + Duration::days(1)
    })
}
