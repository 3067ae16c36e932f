pub mod fallback;
pub mod http;
pub mod simulated;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use ember_types::api::RecordSwipeResponse;
use ember_types::{ChatMessage, Connection, Photo, PhotoUpload, SwipeDirection};

pub use http::HttpBackend;
pub use simulated::{SimulatedBackend, SimulationConfig};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("request timed out")]
    Timeout,

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Connections of `user_id`, newest first.
    async fn get_matches(&self, user_id: Uuid) -> Result<Vec<Connection>, BackendError>;

    /// Conversation between the two users, oldest first.
    async fn get_messages(
        &self,
        user_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Vec<ChatMessage>, BackendError>;

    /// Stores a message and returns it with its durable id and timestamp.
    async fn send_message(
        &self,
        user_id: Uuid,
        recipient_id: Uuid,
        content: &str,
    ) -> Result<ChatMessage, BackendError>;

    async fn record_swipe(
        &self,
        user_id: Uuid,
        card_id: Uuid,
        direction: SwipeDirection,
    ) -> Result<RecordSwipeResponse, BackendError>;

    /// Replaces the user's photo list, order included.
    async fn update_photos(&self, user_id: Uuid, photos: &[Photo]) -> Result<Vec<Photo>, BackendError>;

    async fn upload_photo(&self, user_id: Uuid, upload: &PhotoUpload) -> Result<Photo, BackendError>;

    /// True when remote operations are answered locally (test-data mode).
    fn is_simulated(&self) -> bool {
        false
    }
}
