use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ember_types::events::ChangeEvent;

use crate::notifications::NotificationCenter;

/// Local publish/subscribe channel for change events. Stands in for the
/// hosted real-time subscription when none is configured.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Best-effort: events published with no subscriber are dropped.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns change events addressed to the current user into activity flags.
#[derive(Clone)]
pub struct ActivityTracker {
    user_id: Uuid,
    notifications: NotificationCenter,
}

impl ActivityTracker {
    pub fn new(user_id: Uuid, notifications: NotificationCenter) -> Self {
        Self {
            user_id,
            notifications,
        }
    }

    /// Returns `true` if the event changed a flag.
    pub fn apply(&self, event: &ChangeEvent) -> bool {
        if event.recipient_id() != self.user_id {
            return false;
        }
        match event {
            ChangeEvent::ConnectionCreated { counterpart_id, .. } => {
                self.notifications.mark_new_match(*counterpart_id);
            }
            ChangeEvent::MessageCreated { sender_id, .. } => {
                self.notifications.mark_unread(*sender_id);
            }
        }
        true
    }

    /// Consumes events until `shutdown` fires or the channel closes.
    pub fn spawn(
        self,
        mut rx: broadcast::Receiver<ChangeEvent>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(user = %self.user_id, "activity tracker started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => {
                            if self.apply(&event) {
                                debug!(?event, "activity flag set");
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            warn!("activity tracker lagged, skipped {} events", n);
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!(user = %self.user_id, "activity tracker stopped");
        })
    }
}
