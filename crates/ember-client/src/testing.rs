use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use ember_backend::{Backend, BackendError, fallback};
use ember_types::api::RecordSwipeResponse;
use ember_types::{ChatMessage, Connection, Photo, PhotoUpload, SwipeDirection};

#[derive(Default)]
pub struct ScriptedBackend {
    pub simulated: bool,
    pub latency: Duration,
    pub fail_fetches: AtomicBool,
    pub fail_sends: AtomicBool,
    pub fail_swipes: AtomicBool,
    pub fail_photos: AtomicBool,
    /// Photo calls sleep this long; used to trip the operation timeout.
    pub photo_latency: Mutex<Duration>,
    pub matches_with: Mutex<HashSet<Uuid>>,
    pub swipes: Mutex<Vec<(Uuid, SwipeDirection)>>,
    pub fetches: AtomicUsize,
    pub sends: AtomicUsize,
}

impl ScriptedBackend {
    pub fn live() -> Self {
        Self::default()
    }

    pub fn simulated() -> Self {
        Self {
            simulated: true,
            latency: Duration::from_millis(300),
            ..Default::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn match_with(&self, id: Uuid) {
        self.matches_with.lock().unwrap().insert(id);
    }

    fn unavailable() -> BackendError {
        BackendError::Unavailable("scripted failure".into())
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn get_matches(&self, _user_id: Uuid) -> Result<Vec<Connection>, BackendError> {
        tokio::time::sleep(self.latency).await;
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(fallback::sample_connections().into_iter().skip(1).collect())
    }

    async fn get_messages(
        &self,
        user_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Vec<ChatMessage>, BackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let mut history = fallback::sample_conversation(user_id, recipient_id);
        history.truncate(1);
        Ok(history)
    }

    async fn send_message(
        &self,
        user_id: Uuid,
        recipient_id: Uuid,
        content: &str,
    ) -> Result<ChatMessage, BackendError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(ChatMessage {
            id: format!("srv-{}", n + 1),
            sender_id: user_id,
            recipient_id,
            content: content.to_string(),
            timestamp: Utc::now(),
            is_from_current_user: true,
        })
    }

    async fn record_swipe(
        &self,
        _user_id: Uuid,
        card_id: Uuid,
        direction: SwipeDirection,
    ) -> Result<RecordSwipeResponse, BackendError> {
        tokio::time::sleep(self.latency).await;
        self.swipes.lock().unwrap().push((card_id, direction));
        if self.fail_swipes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let matched = direction.is_like() && self.matches_with.lock().unwrap().contains(&card_id);
        Ok(RecordSwipeResponse { matched })
    }

    async fn update_photos(&self, _user_id: Uuid, photos: &[Photo]) -> Result<Vec<Photo>, BackendError> {
        let delay = *self.photo_latency.lock().unwrap();
        tokio::time::sleep(delay).await;
        if self.fail_photos.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(photos.to_vec())
    }

    async fn upload_photo(&self, _user_id: Uuid, upload: &PhotoUpload) -> Result<Photo, BackendError> {
        let delay = *self.photo_latency.lock().unwrap();
        tokio::time::sleep(delay).await;
        if self.fail_photos.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(Photo {
            id: Uuid::new_v4(),
            url: format!("/uploads/{}", upload.file_name),
            position: 0,
        })
    }

    fn is_simulated(&self) -> bool {
        self.simulated
    }
}
