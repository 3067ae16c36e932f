use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Insert notifications delivered over the change channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChangeEvent {
    /// A mutual match was stored for `recipient_id` with `counterpart_id`
    ConnectionCreated {
        recipient_id: Uuid,
        counterpart_id: Uuid,
    },

    /// A message from `sender_id` was stored for `recipient_id`
    MessageCreated {
        recipient_id: Uuid,
        sender_id: Uuid,
        message_id: String,
    },
}

impl ChangeEvent {
    /// The user this event is addressed to. Subscribers filter on it.
    pub fn recipient_id(&self) -> Uuid {
        match self {
            Self::ConnectionCreated { recipient_id, .. } => *recipient_id,
            Self::MessageCreated { recipient_id, .. } => *recipient_id,
        }
    }

    /// The other party: the new match or the message author.
    pub fn counterpart_id(&self) -> Uuid {
        match self {
            Self::ConnectionCreated { counterpart_id, .. } => *counterpart_id,
            Self::MessageCreated { sender_id, .. } => *sender_id,
        }
    }
}
