pub mod activity;
pub mod chat;
pub mod connections;
pub mod deck;
pub mod notifications;
pub mod photos;
pub mod profile;

#[cfg(test)]
mod testing;

pub use activity::{ActivityTracker, ChangeFeed};
pub use chat::{ChatEngine, ChatError, ChatOptions};
pub use connections::load_connections;
pub use deck::{CardDeck, DeckController, DeckView, SwipeOutcome};
pub use notifications::{NotificationCenter, Scope};
pub use photos::{PhotoError, PhotoManager};
pub use profile::{ProfileError, ProfileStore, ProfileUpdate};
