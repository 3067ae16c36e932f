use tracing::warn;
use uuid::Uuid;

use ember_backend::{Backend, fallback};
use ember_types::Connection;

use crate::notifications::NotificationCenter;

/// Loads the connections list. A failed fetch falls back to the sample list
/// for this call only; it never switches the client into test-data mode.
///
/// Flags reported by the backend are merged into `notifications`, and the
/// returned list carries the merged flags.
pub async fn load_connections(
    backend: &dyn Backend,
    user_id: Uuid,
    notifications: &NotificationCenter,
) -> Vec<Connection> {
    let mut connections = match backend.get_matches(user_id).await {
        Ok(connections) => connections,
        Err(e) => {
            warn!("fetching matches failed, using sample connections: {}", e);
            fallback::sample_connections()
        }
    };

    for c in &connections {
        if c.is_new_match {
            notifications.mark_new_match(c.profile.id);
        }
        if c.has_new_message {
            notifications.mark_unread(c.profile.id);
        }
    }
    apply_activity(&mut connections, notifications);
    connections
}

/// Copies the current activity flags onto a connections list.
pub fn apply_activity(connections: &mut [Connection], notifications: &NotificationCenter) {
    for c in connections.iter_mut() {
        let activity = notifications.activity(c.profile.id);
        c.is_new_match = activity.new_match;
        c.has_new_message = activity.unread;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::Scope;
    use crate::testing::ScriptedBackend;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn failed_fetch_falls_back_once() {
        let backend = ScriptedBackend::live();
        let notifications = NotificationCenter::with_toast_ttl(None);
        let me = Uuid::new_v4();

        backend.fail_fetches.store(true, Ordering::SeqCst);
        let fallback_list = load_connections(&backend, me, &notifications).await;
        assert_eq!(fallback_list.len(), 3);

        backend.fail_fetches.store(false, Ordering::SeqCst);
        let live = load_connections(&backend, me, &notifications).await;
        // The scripted backend serves a different list, so the second call
        // really went out.
        assert_eq!(live.len(), 2);
        assert!(!backend.is_simulated());
    }

    #[tokio::test]
    async fn cleared_flags_stay_cleared_in_view() {
        let backend = ScriptedBackend::live();
        let notifications = NotificationCenter::with_toast_ttl(None);

        let mut list = load_connections(&backend, Uuid::new_v4(), &notifications).await;
        let flagged = list.iter().find(|c| c.has_new_message).unwrap().profile.id;

        notifications.clear(Scope::Connection(flagged));
        apply_activity(&mut list, &notifications);
        assert!(list.iter().all(|c| !c.has_new_message));
    }
}
