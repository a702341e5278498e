use crate::domain::notification::NotificationEvent;
use crate::domain::ports::Notifier;
use crate::error::{LifecycleError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

/// Queues events on an unbounded channel so emitting never waits on delivery.
#[derive(Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<NotificationEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn emit(&self, event: NotificationEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|e| LifecycleError::NotificationError(format!("queue closed: {}", e.0.kind())))
    }
}

/// Drains the queue and logs each event. Mail delivery sits behind this in
/// the platform.
pub fn spawn_notification_logger(
    mut receiver: mpsc::UnboundedReceiver<NotificationEvent>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut delivered = 0;
        while let Some(event) = receiver.recv().await {
            let payload = serde_json::to_string(&event).unwrap_or_default();
            info!(kind = event.kind(), payload = %payload, "Notification dispatched");
            delivered += 1;
        }
        delivered
    })
}

/// Keeps every emitted event in memory.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every `emit` fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn emit(&self, event: NotificationEvent) -> Result<()> {
        if self.fail {
            return Err(LifecycleError::NotificationError(format!(
                "{} rejected",
                event.kind()
            )));
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}
