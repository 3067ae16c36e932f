use chrono::{Duration, Utc};
use rand::seq::IndexedRandom;
use uuid::Uuid;

use ember_types::{ChatMessage, Connection, Photo, Profile};

struct Sample {
    id: u128,
    name: &'static str,
    age: u8,
    bio: &'static str,
    location: &'static str,
    country: &'static str,
    interests: &'static [&'static str],
}

const SAMPLES: &[Sample] = &[
    Sample {
        id: 0x0e3b_0001,
        name: "Ana",
        age: 28,
        bio: "Coffee first, adventures second.",
        location: "Lisbon",
        country: "Portugal",
        interests: &["surfing", "photography", "fado"],
    },
    Sample {
        id: 0x0e3b_0002,
        name: "Michael",
        age: 31,
        bio: "Weekend hiker, weekday coder.",
        location: "Toronto",
        country: "Canada",
        interests: &["hiking", "board games", "cooking"],
    },
    Sample {
        id: 0x0e3b_0003,
        name: "Sofia",
        age: 26,
        bio: "Looking for someone to share tapas with.",
        location: "Madrid",
        country: "Spain",
        interests: &["dancing", "travel", "art"],
    },
    Sample {
        id: 0x0e3b_0004,
        name: "James",
        age: 29,
        bio: "Runner. Reader. Terrible at karaoke.",
        location: "London",
        country: "United Kingdom",
        interests: &["running", "books", "music"],
    },
    Sample {
        id: 0x0e3b_0005,
        name: "Yuki",
        age: 27,
        bio: "Ramen critic and amateur potter.",
        location: "Tokyo",
        country: "Japan",
        interests: &["ceramics", "food", "anime"],
    },
    Sample {
        id: 0x0e3b_0006,
        name: "Lucas",
        age: 30,
        bio: "Will teach you to make a proper caipirinha.",
        location: "São Paulo",
        country: "Brazil",
        interests: &["football", "music", "beaches"],
    },
];

const REPLIES: &[&str] = &[
    "Haha, that's great!",
    "Tell me more!",
    "I was just thinking about that.",
    "Sounds fun, when are you free?",
    "That made my day 😊",
];

/// Placeholder photos for a profile, positions `0..count`.
pub fn sample_photos(slug: &str, count: u32) -> Vec<Photo> {
    (0..count)
        .map(|position| Photo {
            id: Uuid::new_v4(),
            url: format!("/sample/{}-{}.jpg", slug, position + 1),
            position,
        })
        .collect()
}

/// The sample card deck.
pub fn sample_profiles() -> Vec<Profile> {
    SAMPLES
        .iter()
        .map(|s| Profile {
            id: Uuid::from_u128(s.id),
            name: s.name.to_string(),
            age: s.age,
            bio: s.bio.to_string(),
            location: s.location.to_string(),
            country: s.country.to_string(),
            interests: s.interests.iter().map(|i| i.to_string()).collect(),
            photos: sample_photos(&s.name.to_lowercase(), 2),
        })
        .collect()
}

pub fn sample_profile(name: &str) -> Option<Profile> {
    sample_profiles()
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Sample connections list: the first three profiles, the first one flagged
/// as a fresh match and the second with an unread message.
pub fn sample_connections() -> Vec<Connection> {
    sample_profiles()
        .into_iter()
        .take(3)
        .enumerate()
        .map(|(i, profile)| Connection {
            profile,
            is_new_match: i == 0,
            has_new_message: i == 1,
        })
        .collect()
}

/// A two-message seeded history between `user_id` and `recipient_id`.
pub fn sample_conversation(user_id: Uuid, recipient_id: Uuid) -> Vec<ChatMessage> {
    let now = Utc::now();
    vec![
        ChatMessage {
            id: format!("sample-{}-1", recipient_id.simple()),
            sender_id: recipient_id,
            recipient_id: user_id,
            content: "Hey! How's your week going?".to_string(),
            timestamp: now - Duration::minutes(12),
            is_from_current_user: false,
        },
        ChatMessage {
            id: format!("sample-{}-2", recipient_id.simple()),
            sender_id: user_id,
            recipient_id,
            content: "Pretty good! Just got back from a hike.".to_string(),
            timestamp: now - Duration::minutes(9),
            is_from_current_user: true,
        },
    ]
}

/// A canned answer from `recipient_id` to the current user.
pub fn simulated_reply(user_id: Uuid, recipient_id: Uuid) -> ChatMessage {
    let content = REPLIES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or("😊");
    ChatMessage {
        id: format!("sim-{}", Uuid::new_v4()),
        sender_id: recipient_id,
        recipient_id: user_id,
        content: content.to_string(),
        timestamp: Utc::now(),
        is_from_current_user: false,
    }
}
