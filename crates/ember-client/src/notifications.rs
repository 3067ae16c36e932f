use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use uuid::Uuid;

/// How long a toast stays up before it removes itself.
pub const DEFAULT_TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub message: String,
}

/// Activity indicators for one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Activity {
    pub new_match: bool,
    pub unread: bool,
}

impl Activity {
    pub fn is_empty(&self) -> bool {
        !self.new_match && !self.unread
    }
}

/// What `clear` applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Toasts,
    Connection(Uuid),
    All,
}

/// Change events for subscribers (views re-render on these).
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Toast(Toast),
    ToastExpired(u64),
    Activity { connection_id: Uuid, activity: Activity },
    Cleared(Scope),
}

#[derive(Default)]
struct State {
    toasts: Vec<Toast>,
    activity: HashMap<Uuid, Activity>,
    next_id: u64,
}

/// Toasts and activity flags, shared by handle. Views receive a clone and
/// call [`NotificationCenter::clear`] instead of broadcasting a global event.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

struct Inner {
    tx: broadcast::Sender<Notice>,
    state: RwLock<State>,
    toast_ttl: Option<Duration>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::with_toast_ttl(Some(DEFAULT_TOAST_TTL))
    }

    /// `None` keeps toasts until cleared.
    pub fn with_toast_ttl(toast_ttl: Option<Duration>) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                tx,
                state: RwLock::new(State::default()),
                toast_ttl,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.inner.tx.subscribe()
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Info, message.into())
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Error, message.into())
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.read().toasts.clone()
    }

    pub fn errors(&self) -> Vec<Toast> {
        self.read()
            .toasts
            .iter()
            .filter(|t| t.kind == ToastKind::Error)
            .cloned()
            .collect()
    }

    pub fn dismiss(&self, id: u64) {
        let removed = {
            let mut state = self.write();
            let before = state.toasts.len();
            state.toasts.retain(|t| t.id != id);
            state.toasts.len() != before
        };
        if removed {
            let _ = self.inner.tx.send(Notice::ToastExpired(id));
        }
    }

    pub fn activity(&self, connection_id: Uuid) -> Activity {
        self.read()
            .activity
            .get(&connection_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn mark_new_match(&self, connection_id: Uuid) {
        self.update_activity(connection_id, |a| a.new_match = true);
    }

    pub fn mark_unread(&self, connection_id: Uuid) {
        self.update_activity(connection_id, |a| a.unread = true);
    }

    /// Connections with at least one flag set.
    pub fn active_connections(&self) -> Vec<Uuid> {
        self.read()
            .activity
            .iter()
            .filter(|(_, a)| !a.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn clear(&self, scope: Scope) {
        {
            let mut state = self.write();
            match scope {
                Scope::Toasts => state.toasts.clear(),
                Scope::Connection(id) => {
                    state.activity.remove(&id);
                }
                Scope::All => {
                    state.toasts.clear();
                    state.activity.clear();
                }
            }
        }
        let _ = self.inner.tx.send(Notice::Cleared(scope));
    }

    fn push(&self, kind: ToastKind, message: String) -> u64 {
        let toast = {
            let mut state = self.write();
            state.next_id += 1;
            let toast = Toast {
                id: state.next_id,
                kind,
                message,
            };
            state.toasts.push(toast.clone());
            toast
        };
        let id = toast.id;
        let _ = self.inner.tx.send(Notice::Toast(toast));

        if let (Some(ttl), Ok(runtime)) = (self.inner.toast_ttl, tokio::runtime::Handle::try_current()) {
            let center = self.clone();
            runtime.spawn(async move {
                tokio::time::sleep(ttl).await;
                center.dismiss(id);
            });
        }
        id
    }

    fn update_activity(&self, connection_id: Uuid, f: impl FnOnce(&mut Activity)) {
        let activity = {
            let mut state = self.write();
            let entry = state.activity.entry(connection_id).or_default();
            f(entry);
            *entry
        };
        let _ = self.inner.tx.send(Notice::Activity {
            connection_id,
            activity,
        });
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}
