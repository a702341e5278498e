use super::reconciler::BillingReconciler;
use crate::domain::sponsorship::UserId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Changes to an explorer's resting state published by the rest of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestingEvent {
    /// The explorer is active again; their resting marker is already cleared.
    Exited { explorer_id: UserId },
}

/// Resumes sponsorships for every `Exited` event until the channel closes.
pub fn spawn_resting_listener(
    reconciler: Arc<BillingReconciler>,
    mut events: mpsc::Receiver<RestingEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RestingEvent::Exited { explorer_id } => {
                    if let Err(e) = reconciler.resume_all_sponsorships(explorer_id).await {
                        error!(explorer_id, error = %e, "Failed to resume sponsorships");
                    }
                }
            }
        }
        info!("Resting event channel closed");
    })
}
