//! Optimistic chat for one open conversation. A send shows a provisional
//! `temp-` message before the network call; the answer replaces it by id or
//! removes it and restores the draft.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ember_backend::{Backend, BackendError, fallback};
use ember_types::ChatMessage;
use ember_types::models::TEMP_ID_PREFIX;

use crate::notifications::{NotificationCenter, Scope};

/// Delay before the counterpart's simulated answer shows up.
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("a message is already being sent")]
    SendInFlight,

    #[error("conversation was closed")]
    Closed,

    #[error("failed to send message: {0}")]
    SendFailed(#[source] BackendError),
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// In simulated mode, append a reply from the counterpart this long after
    /// each confirmed send. `None` disables replies.
    pub simulated_reply: Option<Duration>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            simulated_reply: Some(DEFAULT_REPLY_DELAY),
        }
    }
}

#[derive(Default)]
struct ChatState {
    messages: Vec<ChatMessage>,
    draft: String,
    sending: bool,
    loading: bool,
    loaded: bool,
}

/// A send that has been applied locally and awaits the backend.
#[derive(Debug)]
pub struct PendingSend {
    temp_id: String,
    content: String,
    /// The draft exactly as typed; restored if the send fails.
    typed: String,
    token: CancellationToken,
}

impl PendingSend {
    pub fn temp_id(&self) -> &str {
        &self.temp_id
    }
}

pub struct ChatEngine {
    backend: Arc<dyn Backend>,
    notifications: NotificationCenter,
    user_id: Uuid,
    recipient_id: Uuid,
    options: ChatOptions,
    state: Arc<Mutex<ChatState>>,
    counter: AtomicU64,
    scope: Mutex<CancellationToken>,
}

impl ChatEngine {
    pub fn new(
        backend: Arc<dyn Backend>,
        notifications: NotificationCenter,
        user_id: Uuid,
        recipient_id: Uuid,
    ) -> Self {
        Self {
            backend,
            notifications,
            user_id,
            recipient_id,
            options: ChatOptions::default(),
            state: Arc::new(Mutex::new(ChatState::default())),
            counter: AtomicU64::new(0),
            scope: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn recipient_id(&self) -> Uuid {
        self.recipient_id
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    pub fn draft(&self) -> String {
        self.lock().draft.clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.lock().draft = text.into();
    }

    pub fn is_sending(&self) -> bool {
        self.lock().sending
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    /// Whether the send control is enabled.
    pub fn can_send(&self) -> bool {
        let state = self.lock();
        !state.sending && !state.draft.trim().is_empty()
    }

    /// Fetches the history once per open. Returns `false` when the
    /// conversation was already loaded (or loading) and nothing was fetched.
    pub async fn open(&self) -> bool {
        let token = {
            let mut state = self.lock();
            if state.loaded || state.loading {
                return false;
            }
            state.loading = true;
            self.token()
        };

        let result = self.backend.get_messages(self.user_id, self.recipient_id).await;
        if token.is_cancelled() {
            debug!(recipient = %self.recipient_id, "conversation closed during fetch");
            return false;
        }

        let history = match result {
            Ok(history) => history,
            Err(e) => {
                warn!("fetching messages failed, using sample conversation: {}", e);
                fallback::sample_conversation(self.user_id, self.recipient_id)
            }
        };

        {
            let mut state = self.lock();
            info!(recipient = %self.recipient_id, count = history.len(), "conversation opened");
            state.messages = history;
            state.loading = false;
            state.loaded = true;
        }
        self.notifications.clear(Scope::Connection(self.recipient_id));
        true
    }

    /// Drops the list and draft and cancels outstanding continuations. The
    /// next [`open`](Self::open) fetches fresh.
    pub fn close(&self) {
        let mut scope = self.scope.lock().unwrap_or_else(PoisonError::into_inner);
        scope.cancel();
        *scope = CancellationToken::new();
        drop(scope);

        let mut state = self.lock();
        *state = ChatState::default();
        debug!(recipient = %self.recipient_id, "conversation closed");
    }

    /// Sends the current draft.
    pub async fn send(&self) -> Result<ChatMessage, ChatError> {
        let pending = self.begin_send()?;
        self.finish_send(pending).await
    }

    /// Applies a send locally: appends the provisional message, clears the
    /// draft and marks the engine busy. No await happens here.
    pub fn begin_send(&self) -> Result<PendingSend, ChatError> {
        let mut state = self.lock();
        if state.sending {
            return Err(ChatError::SendInFlight);
        }
        let content = state.draft.trim().to_string();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let now = Utc::now();
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let temp_id = format!("{}{}-{}", TEMP_ID_PREFIX, now.timestamp_millis(), seq);

        state.messages.push(ChatMessage {
            id: temp_id.clone(),
            sender_id: self.user_id,
            recipient_id: self.recipient_id,
            content: content.clone(),
            timestamp: now,
            is_from_current_user: true,
        });
        let typed = std::mem::take(&mut state.draft);
        state.sending = true;

        debug!(%temp_id, "optimistic message inserted");
        Ok(PendingSend {
            temp_id,
            content,
            typed,
            token: self.token(),
        })
    }

    /// Resolves a [`PendingSend`] against the backend.
    pub async fn finish_send(&self, pending: PendingSend) -> Result<ChatMessage, ChatError> {
        let PendingSend {
            temp_id,
            content,
            typed,
            token,
        } = pending;

        let result = self
            .backend
            .send_message(self.user_id, self.recipient_id, &content)
            .await;
        if token.is_cancelled() {
            return Err(ChatError::Closed);
        }

        match result {
            Ok(confirmed) => {
                let shown = {
                    let mut state = self.lock();
                    state.sending = false;
                    if self.backend.is_simulated() {
                        find(&state.messages, &temp_id)
                    } else {
                        reconcile(&mut state.messages, &temp_id, confirmed.clone());
                        Some(confirmed)
                    }
                };

                if self.backend.is_simulated() {
                    if let Some(delay) = self.options.simulated_reply {
                        self.schedule_reply(delay, token);
                    }
                }
                shown.ok_or(ChatError::Closed)
            }
            Err(e) => {
                {
                    let mut state = self.lock();
                    state.sending = false;
                    state.messages.retain(|m| m.id != temp_id);
                    state.draft = typed;
                }
                warn!(%temp_id, "send failed, rolled back: {}", e);
                self.notifications.error("Message could not be sent. Please try again.");
                Err(ChatError::SendFailed(e))
            }
        }
    }

    /// Appends a message that arrived over the change channel, unless it is
    /// already in the list.
    pub fn push_incoming(&self, message: ChatMessage) -> bool {
        let mut state = self.lock();
        if !state.loaded || state.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        state.messages.push(message);
        true
    }

    fn schedule_reply(&self, delay: Duration, token: CancellationToken) {
        let state = Arc::clone(&self.state);
        let reply = fallback::simulated_reply(self.user_id, self.recipient_id);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                        state.messages.push(ChatMessage {
                            timestamp: Utc::now(),
                            ..reply
                        });
                    }
                }
            }
        });
    }

    fn token(&self) -> CancellationToken {
        self.scope
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ChatEngine {
    fn drop(&mut self) {
        self.scope
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }
}

fn find(messages: &[ChatMessage], id: &str) -> Option<ChatMessage> {
    messages.iter().find(|m| m.id == id).cloned()
}

/// Swaps the provisional entry for the confirmed one. If the confirmed
/// message already arrived through another path, the provisional entry is
/// dropped instead so the durable id appears once.
fn reconcile(messages: &mut Vec<ChatMessage>, temp_id: &str, confirmed: ChatMessage) {
    if messages.iter().any(|m| m.id == confirmed.id) {
        messages.retain(|m| m.id != temp_id);
        return;
    }
    match messages.iter_mut().find(|m| m.id == temp_id) {
        Some(entry) => *entry = confirmed,
        None => warn!(%temp_id, "provisional message vanished before confirmation"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use ember_backend::{SimulatedBackend, SimulationConfig};

    fn engine(backend: Arc<dyn Backend>) -> (ChatEngine, NotificationCenter) {
        let notifications = NotificationCenter::with_toast_ttl(None);
        let engine = ChatEngine::new(backend, notifications.clone(), Uuid::new_v4(), Uuid::new_v4());
        (engine, notifications)
    }

    #[tokio::test(start_paused = true)]
    async fn optimistic_entry_precedes_network_result() {
        let backend = Arc::new(ScriptedBackend::live().with_latency(Duration::from_secs(1)));
        let (chat, _) = engine(backend);
        chat.open().await;
        let before = chat.len();

        chat.set_draft("hello");
        let pending = chat.begin_send().unwrap();

        let messages = chat.messages();
        assert_eq!(messages.len(), before + 1);
        assert_eq!(messages.last().unwrap().id, pending.temp_id());
        assert!(messages.last().unwrap().is_provisional());
        assert!(chat.draft().is_empty());
        assert!(chat.is_sending());
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_id_replaces_temp_id() {
        let backend = Arc::new(ScriptedBackend::live());
        let (chat, _) = engine(backend);
        chat.open().await;

        chat.set_draft("hi");
        let pending = chat.begin_send().unwrap();
        let temp_id = pending.temp_id().to_string();
        let confirmed = chat.finish_send(pending).await.unwrap();

        let messages = chat.messages();
        assert_eq!(messages.iter().filter(|m| m.id == confirmed.id).count(), 1);
        assert!(messages.iter().all(|m| m.id != temp_id));
        assert!(!chat.is_sending());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_rolls_back_and_restores_draft() {
        let backend = Arc::new(ScriptedBackend::live());
        backend.fail_sends.store(true, Ordering::SeqCst);
        let (chat, notifications) = engine(backend);
        chat.open().await;
        let before = chat.len();

        chat.set_draft("are you free friday?");
        let err = chat.send().await.unwrap_err();

        assert!(matches!(err, ChatError::SendFailed(_)));
        assert_eq!(chat.len(), before);
        assert_eq!(chat.draft(), "are you free friday?");
        assert_eq!(notifications.errors().len(), 1);
        assert!(chat.can_send());
    }

    #[tokio::test(start_paused = true)]
    async fn rollback_keeps_surrounding_whitespace() {
        let backend = Arc::new(ScriptedBackend::live());
        backend.fail_sends.store(true, Ordering::SeqCst);
        let (chat, _) = engine(backend.clone());
        chat.open().await;

        chat.set_draft("  hi there\n");
        let pending = chat.begin_send().unwrap();
        assert_eq!(chat.messages().last().unwrap().content, "hi there");
        assert!(chat.finish_send(pending).await.is_err());
        assert_eq!(chat.draft(), "  hi there\n");
    }

    #[tokio::test(start_paused = true)]
    async fn second_send_is_refused_while_busy() {
        let backend = Arc::new(ScriptedBackend::live().with_latency(Duration::from_millis(200)));
        let (chat, _) = engine(backend.clone());
        chat.open().await;

        chat.set_draft("one");
        let pending = chat.begin_send().unwrap();
        chat.set_draft("two");
        assert!(!chat.can_send());
        assert!(matches!(chat.begin_send(), Err(ChatError::SendInFlight)));
        assert_eq!(chat.draft(), "two");

        chat.finish_send(pending).await.unwrap();
        assert_eq!(backend.sends.load(Ordering::SeqCst), 1);
        assert!(chat.can_send());
    }

    #[tokio::test(start_paused = true)]
    async fn blank_drafts_are_rejected() {
        let (chat, _) = engine(Arc::new(ScriptedBackend::live()));
        chat.open().await;
        let before = chat.len();

        chat.set_draft("   \n");
        assert!(!chat.can_send());
        assert!(matches!(chat.send().await, Err(ChatError::EmptyMessage)));
        assert_eq!(chat.len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn temp_ids_are_unique_for_rapid_sends() {
        let (chat, _) = engine(Arc::new(ScriptedBackend::live()));
        chat.open().await;

        let mut ids = Vec::new();
        for text in ["a", "b", "c"] {
            chat.set_draft(text);
            let pending = chat.begin_send().unwrap();
            ids.push(pending.temp_id().to_string());
            chat.finish_send(pending).await.unwrap();
        }
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reopen_without_close_does_not_refetch() {
        let backend = Arc::new(ScriptedBackend::live());
        let (chat, _) = engine(backend.clone());

        assert!(chat.open().await);
        assert!(!chat.open().await);
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);

        chat.close();
        assert!(chat.is_empty());
        assert!(chat.open().await);
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_uses_sample_conversation() {
        let backend = Arc::new(ScriptedBackend::live());
        backend.fail_fetches.store(true, Ordering::SeqCst);
        let (chat, _) = engine(backend);

        assert!(chat.open().await);
        assert_eq!(chat.len(), 2);
        assert!(chat.is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn close_during_send_discards_result() {
        let backend = Arc::new(ScriptedBackend::live().with_latency(Duration::from_millis(100)));
        let (chat, _) = engine(backend);
        chat.open().await;

        chat.set_draft("bye");
        let pending = chat.begin_send().unwrap();
        chat.close();

        assert!(matches!(chat.finish_send(pending).await, Err(ChatError::Closed)));
        assert!(chat.is_empty());
        assert!(!chat.is_sending());
    }

    #[tokio::test(start_paused = true)]
    async fn opening_clears_unread_flag() {
        let (chat, notifications) = engine(Arc::new(ScriptedBackend::live()));
        notifications.mark_unread(chat.recipient_id());

        chat.open().await;
        assert!(notifications.activity(chat.recipient_id()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn incoming_messages_are_deduplicated() {
        let (chat, _) = engine(Arc::new(ScriptedBackend::live()));
        chat.open().await;
        let before = chat.len();

        let message = fallback::simulated_reply(Uuid::new_v4(), chat.recipient_id());
        assert!(chat.push_incoming(message.clone()));
        assert!(!chat.push_incoming(message));
        assert_eq!(chat.len(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_conversation_gets_simulated_reply() {
        let backend = Arc::new(SimulatedBackend::new(SimulationConfig::default()));
        let ana = fallback::sample_profile("Ana").unwrap();
        let me = Uuid::new_v4();
        let notifications = NotificationCenter::with_toast_ttl(None);
        let chat = ChatEngine::new(backend, notifications, me, ana.id);

        chat.open().await;
        assert_eq!(chat.len(), 2);

        chat.set_draft("hi");
        let sent = chat.send().await.unwrap();
        assert_eq!(chat.len(), 3);
        // Simulated mode keeps the provisional entry.
        assert!(sent.is_provisional());

        tokio::time::sleep(Duration::from_millis(490)).await;
        assert_eq!(chat.len(), 3);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let messages = chat.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3].sender_id, ana.id);
        assert!(!messages[3].is_from_current_user);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_reply_is_dropped_after_close() {
        let backend = Arc::new(ScriptedBackend::simulated());
        let (chat, _) = engine(backend);
        chat.open().await;

        chat.set_draft("hi");
        chat.send().await.unwrap();
        chat.close();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(chat.is_empty());
    }

    #[test]
    fn reconcile_matches_by_id_not_position() {
        let me = Uuid::new_v4();
        let them = Uuid::new_v4();
        let mut list = fallback::sample_conversation(me, them);
        let temp = ChatMessage {
            id: "temp-1-1".into(),
            sender_id: me,
            recipient_id: them,
            content: "x".into(),
            timestamp: Utc::now(),
            is_from_current_user: true,
        };
        list.push(temp.clone());
        list.push(fallback::simulated_reply(me, them));

        let confirmed = ChatMessage {
            id: "srv-9".into(),
            ..temp
        };
        reconcile(&mut list, "temp-1-1", confirmed);
        assert_eq!(list[2].id, "srv-9");
        assert_eq!(list.len(), 4);
    }
}
