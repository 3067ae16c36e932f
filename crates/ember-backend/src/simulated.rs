use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use ember_types::api::RecordSwipeResponse;
use ember_types::{ChatMessage, Connection, Photo, PhotoUpload, Profile, SwipeDirection};

use crate::{Backend, BackendError, fallback};

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Delay before any simulated call answers.
    pub latency: Duration,
    /// Profiles that already liked the current user; a right swipe on them matches.
    pub mutual_likes: HashSet<Uuid>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        // Every other sample profile likes back.
        let mutual_likes = fallback::sample_profiles()
            .iter()
            .step_by(2)
            .map(|p| p.id)
            .collect();
        Self {
            latency: Duration::from_millis(300),
            mutual_likes,
        }
    }
}

#[derive(Default)]
struct SimState {
    connections: Vec<Connection>,
    conversations: HashMap<Uuid, Vec<ChatMessage>>,
    photos: Vec<Photo>,
    offline: bool,
}

/// Answers every backend operation in memory, seeded with sample data.
pub struct SimulatedBackend {
    config: SimulationConfig,
    profiles: Vec<Profile>,
    state: Mutex<SimState>,
}

impl SimulatedBackend {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            profiles: fallback::sample_profiles(),
            state: Mutex::new(SimState {
                connections: fallback::sample_connections(),
                photos: fallback::sample_photos("me", 3),
                ..Default::default()
            }),
        }
    }

    /// While offline every call fails with [`BackendError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn photos(&self) -> Vec<Photo> {
        self.lock().photos.clone()
    }

    async fn round_trip(&self) -> Result<(), BackendError> {
        tokio::time::sleep(self.config.latency).await;
        if self.lock().offline {
            return Err(BackendError::Unavailable("simulated backend is offline".into()));
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

#[async_trait]
impl Backend for SimulatedBackend {
    async fn get_matches(&self, _user_id: Uuid) -> Result<Vec<Connection>, BackendError> {
        self.round_trip().await?;
        Ok(self.lock().connections.clone())
    }

    async fn get_messages(
        &self,
        user_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Vec<ChatMessage>, BackendError> {
        self.round_trip().await?;
        let mut state = self.lock();
        let history = state
            .conversations
            .entry(recipient_id)
            .or_insert_with(|| fallback::sample_conversation(user_id, recipient_id));
        Ok(history.clone())
    }

    async fn send_message(
        &self,
        user_id: Uuid,
        recipient_id: Uuid,
        content: &str,
    ) -> Result<ChatMessage, BackendError> {
        self.round_trip().await?;
        let message = ChatMessage {
            id: format!("sim-{}", Uuid::new_v4()),
            sender_id: user_id,
            recipient_id,
            content: content.to_string(),
            timestamp: Utc::now(),
            is_from_current_user: true,
        };
        self.lock()
            .conversations
            .entry(recipient_id)
            .or_insert_with(|| fallback::sample_conversation(user_id, recipient_id))
            .push(message.clone());
        Ok(message)
    }

    async fn record_swipe(
        &self,
        _user_id: Uuid,
        card_id: Uuid,
        direction: SwipeDirection,
    ) -> Result<RecordSwipeResponse, BackendError> {
        self.round_trip().await?;
        let matched = direction.is_like() && self.config.mutual_likes.contains(&card_id);

        if matched {
            let mut state = self.lock();
            let known = state.connections.iter().any(|c| c.profile.id == card_id);
            if let (false, Some(profile)) = (known, self.profiles.iter().find(|p| p.id == card_id)) {
                state.connections.insert(
                    0,
                    Connection {
                        profile: profile.clone(),
                        is_new_match: true,
                        has_new_message: false,
                    },
                );
            }
        }

        debug!(%card_id, %direction, matched, "simulated swipe recorded");
        Ok(RecordSwipeResponse { matched })
    }

    async fn update_photos(&self, _user_id: Uuid, photos: &[Photo]) -> Result<Vec<Photo>, BackendError> {
        self.round_trip().await?;
        let stored: Vec<Photo> = photos
            .iter()
            .enumerate()
            .map(|(i, p)| Photo {
                position: i as u32,
                ..p.clone()
            })
            .collect();
        self.lock().photos = stored.clone();
        Ok(stored)
    }

    async fn upload_photo(&self, _user_id: Uuid, upload: &PhotoUpload) -> Result<Photo, BackendError> {
        self.round_trip().await?;
        let mut state = self.lock();
        let photo = Photo {
            id: Uuid::new_v4(),
            url: format!("/uploads/{}", upload.file_name),
            position: state.photos.len() as u32,
        };
        state.photos.push(photo.clone());
        Ok(photo)
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
