use crate::domain::gateway::{CollectionBehavior, ErrorClassifier, GatewayError, GatewayFailure};
use crate::domain::notification::{AutoCancelNotice, NotificationEvent};
use crate::domain::ports::{NotifierRef, PaymentGatewayRef, SponsorshipStoreRef};
use crate::domain::sponsorship::{Sponsorship, SponsorshipFilter, SponsorshipStatus, UserId};
use crate::domain::user::SponsorshipDetail;
use crate::error::Result;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Upper bound on a single gateway call.
    pub gateway_timeout: Duration,
    pub classifier: ErrorClassifier,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(10),
            classifier: ErrorClassifier::default(),
        }
    }
}

/// How a single sponsorship came out of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The gateway accepted the call and the local status followed.
    Applied,
    /// The gateway reported the subscription already ended; local status set to canceled.
    Repaired,
    /// Left unchanged for a later pass.
    Failed,
}

/// Summary of one reconciliation pass for one explorer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub selected: usize,
    pub applied: usize,
    pub repaired: usize,
    pub failed: usize,
    /// Records left untouched because the pass aborted.
    pub skipped: usize,
    pub aborted: bool,
    pub resting_cleared: bool,
}

impl PassReport {
    fn new(selected: usize) -> Self {
        Self {
            selected,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Applied => self.applied += 1,
            RecordOutcome::Repaired => self.repaired += 1,
            RecordOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Pause,
    Resume,
    Cancel,
}

impl Transition {
    fn target(self) -> SponsorshipStatus {
        match self {
            Transition::Pause => SponsorshipStatus::Paused,
            Transition::Resume => SponsorshipStatus::Active,
            Transition::Cancel => SponsorshipStatus::Canceled,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Transition::Pause => "pause",
            Transition::Resume => "resume",
            Transition::Cancel => "cancel",
        }
    }
}

/// Keeps local sponsorship status in step with the gateway subscription.
///
/// Every pass works from live store reads. Nothing is cached between calls,
/// so a pause pass and a resume pass racing on the same explorer only
/// coordinate through the explorer's current `resting_since` value.
pub struct BillingReconciler {
    store: SponsorshipStoreRef,
    gateway: PaymentGatewayRef,
    notifier: NotifierRef,
    config: ReconcilerConfig,
}

impl BillingReconciler {
    pub fn new(
        store: SponsorshipStoreRef,
        gateway: PaymentGatewayRef,
        notifier: NotifierRef,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            config,
        }
    }

    /// Re-enables billing for every paused subscription of an explorer that
    /// is no longer resting.
    ///
    /// Each record stands alone: failures are logged and the record stays
    /// `paused` until the next resting-exit event.
    pub async fn resume_all_sponsorships(&self, explorer_id: UserId) -> Result<PassReport> {
        let sponsorships = self
            .store
            .find_sponsorships(&SponsorshipFilter::billable(
                explorer_id,
                SponsorshipStatus::Paused,
            ))
            .await?;

        let mut report = PassReport::new(sponsorships.len());
        for sponsorship in &sponsorships {
            report.record(self.settle(Transition::Resume, sponsorship).await);
        }

        info!(
            explorer_id,
            selected = report.selected,
            applied = report.applied,
            repaired = report.repaired,
            failed = report.failed,
            "Resume pass finished"
        );
        Ok(report)
    }

    /// Pauses billing for every active subscription of a resting explorer.
    ///
    /// The resting marker is read before the pass and again before each
    /// record. Once it is gone the pass stops and leaves the remaining
    /// records to the resume path.
    pub async fn pause_all_sponsorships(&self, explorer_id: UserId) -> Result<PassReport> {
        if !self.still_resting(explorer_id).await? {
            info!(explorer_id, "Explorer no longer resting, skipping pause");
            return Ok(PassReport {
                aborted: true,
                ..PassReport::default()
            });
        }

        let sponsorships = self
            .store
            .find_sponsorships(&SponsorshipFilter::billable(
                explorer_id,
                SponsorshipStatus::Active,
            ))
            .await?;

        let mut report = PassReport::new(sponsorships.len());
        for (index, sponsorship) in sponsorships.iter().enumerate() {
            if !self.still_resting(explorer_id).await? {
                report.aborted = true;
                report.skipped = sponsorships.len() - index;
                info!(
                    explorer_id,
                    skipped = report.skipped,
                    "Explorer resumed activity mid-pass, stopping pause"
                );
                break;
            }
            report.record(self.settle(Transition::Pause, sponsorship).await);
        }

        info!(
            explorer_id,
            selected = report.selected,
            applied = report.applied,
            repaired = report.repaired,
            failed = report.failed,
            "Pause pass finished"
        );
        Ok(report)
    }

    /// Cancels every paused subscription of an explorer past the auto-cancel
    /// threshold and notifies the sponsors.
    ///
    /// The resting marker is cleared only when no record failed. Otherwise it
    /// stays, so the next scan retries the whole set; records canceled in
    /// this pass come back as benign-terminal replies and are repaired.
    pub async fn cancel_all_paused_sponsorships(&self, explorer_id: UserId) -> Result<PassReport> {
        let details = self
            .store
            .find_sponsorship_details(&SponsorshipFilter::billable(
                explorer_id,
                SponsorshipStatus::Paused,
            ))
            .await?;

        if details.is_empty() {
            debug!(explorer_id, "No paused sponsorships to cancel");
            return Ok(PassReport::default());
        }

        let mut report = PassReport::new(details.len());
        for detail in &details {
            let outcome = self.settle(Transition::Cancel, &detail.sponsorship).await;
            if outcome == RecordOutcome::Applied {
                self.notify_auto_cancel(detail).await;
            }
            report.record(outcome);
        }

        if report.failed == 0 {
            self.store.clear_resting_since(explorer_id).await?;
            report.resting_cleared = true;
            info!(
                explorer_id,
                canceled = report.applied + report.repaired,
                "All paused sponsorships canceled, resting marker cleared"
            );
        } else {
            warn!(
                explorer_id,
                failed = report.failed,
                "Some cancellations failed, keeping resting marker for retry"
            );
        }
        Ok(report)
    }

    async fn still_resting(&self, explorer_id: UserId) -> Result<bool> {
        Ok(self.store.get_resting_since(explorer_id).await?.is_some())
    }

    /// Runs one transition and folds store errors into a failed outcome, so
    /// a bad row never stops the rest of the batch.
    async fn settle(&self, transition: Transition, sponsorship: &Sponsorship) -> RecordOutcome {
        match self.apply(transition, sponsorship).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    sponsorship_id = sponsorship.id,
                    explorer_id = sponsorship.sponsored_explorer_id,
                    transition = transition.as_str(),
                    error = %e,
                    "Failed to record sponsorship status"
                );
                RecordOutcome::Failed
            }
        }
    }

    async fn apply(&self, transition: Transition, sponsorship: &Sponsorship) -> Result<RecordOutcome> {
        let Some(subscription_id) = sponsorship.external_subscription_id.as_deref() else {
            warn!(
                sponsorship_id = sponsorship.id,
                "Sponsorship has no gateway subscription"
            );
            return Ok(RecordOutcome::Failed);
        };

        match self.call_gateway(transition, subscription_id).await {
            Ok(()) => {
                self.store
                    .update_sponsorship_status(sponsorship.id, transition.target())
                    .await?;
                debug!(
                    sponsorship_id = sponsorship.id,
                    subscription_id,
                    status = %transition.target(),
                    "Sponsorship updated"
                );
                Ok(RecordOutcome::Applied)
            }
            Err(e) => match self.config.classifier.classify(&e) {
                GatewayFailure::AlreadyTerminal => {
                    info!(
                        sponsorship_id = sponsorship.id,
                        subscription_id,
                        transition = transition.as_str(),
                        error = %e,
                        "Subscription already ended at gateway, marking canceled"
                    );
                    self.store
                        .update_sponsorship_status(sponsorship.id, SponsorshipStatus::Canceled)
                        .await?;
                    Ok(RecordOutcome::Repaired)
                }
                GatewayFailure::Transient => {
                    warn!(
                        sponsorship_id = sponsorship.id,
                        explorer_id = sponsorship.sponsored_explorer_id,
                        subscription_id,
                        transition = transition.as_str(),
                        code = e.code.as_deref().unwrap_or("-"),
                        error = %e,
                        "Gateway call failed, leaving sponsorship for retry"
                    );
                    Ok(RecordOutcome::Failed)
                }
            },
        }
    }

    async fn call_gateway(
        &self,
        transition: Transition,
        subscription_id: &str,
    ) -> std::result::Result<(), GatewayError> {
        let call = async {
            match transition {
                Transition::Pause => {
                    self.gateway
                        .pause(subscription_id, CollectionBehavior::Void)
                        .await
                }
                Transition::Resume => self.gateway.resume(subscription_id).await,
                Transition::Cancel => self.gateway.cancel(subscription_id).await,
            }
        };

        match tokio::time::timeout(self.config.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::timeout(self.config.gateway_timeout)),
        }
    }

    async fn notify_auto_cancel(&self, detail: &SponsorshipDetail) {
        let sponsorship = &detail.sponsorship;
        let Some(sponsor) = &detail.sponsor else {
            warn!(
                sponsorship_id = sponsorship.id,
                sponsor_id = sponsorship.sponsor_id,
                "Sponsor contact missing, skipping auto-cancel notification"
            );
            return;
        };

        let event = NotificationEvent::SponsorshipAutoCanceled(AutoCancelNotice {
            sponsorship_id: sponsorship.id,
            sponsorship_public_id: sponsorship.public_id.clone(),
            sponsor_id: sponsor.id,
            sponsor_email: sponsor.email.clone(),
            sponsor_name: sponsor.username.clone(),
            explorer_id: sponsorship.sponsored_explorer_id,
            explorer_name: detail.explorer_name.clone().unwrap_or_default(),
            amount: sponsorship.amount,
        });

        if let Err(e) = self.notifier.emit(event).await {
            warn!(
                sponsorship_id = sponsorship.id,
                error = %e,
                "Failed to emit auto-cancel notification"
            );
        }
    }
}
