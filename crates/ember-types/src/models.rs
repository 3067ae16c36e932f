use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix reserved for provisional message ids. Server ids never start with it.
pub const TEMP_ID_PREFIX: &str = "temp-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
}

impl SwipeDirection {
    /// A right swipe is a like; a left swipe is a pass.
    pub fn is_like(self) -> bool {
        matches!(self, Self::Right)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl std::fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SwipeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Self::Left),
            "right" | "r" => Ok(Self::Right),
            other => Err(format!("unknown swipe direction '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub url: String,
    pub position: u32,
}

/// A photo file picked by the user, not yet stored remotely.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub age: u8,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

/// A matched profile plus the activity flags shown in the connections list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub profile: Profile,
    #[serde(default)]
    pub is_new_match: bool,
    #[serde(default)]
    pub has_new_message: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_from_current_user: bool,
}

impl ChatMessage {
    /// True for an optimistic entry that has not been confirmed by the backend.
    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}
