use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatMessage, Photo, SwipeDirection};

// -- Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    pub content: String,
}

/// A stored message as the backend returns it. Whether it belongs to the
/// current user is decided client-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl MessageResponse {
    pub fn into_message(self, current_user_id: Uuid) -> ChatMessage {
        ChatMessage {
            is_from_current_user: self.sender_id == current_user_id,
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            content: self.content,
            timestamp: self.created_at,
        }
    }
}

// -- Swipes --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordSwipeRequest {
    pub card_id: Uuid,
    pub direction: SwipeDirection,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RecordSwipeResponse {
    #[serde(rename = "match")]
    pub matched: bool,
}

// -- Photos --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePhotosRequest {
    pub photos: Vec<Photo>,
}

/// Photo upload body. `data` is the base64-encoded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadPhotoRequest {
    pub file_name: String,
    pub content_type: String,
    pub data: String,
}
