pub mod api;
pub mod events;
pub mod models;

pub use models::{ChatMessage, Connection, Photo, PhotoUpload, Profile, SwipeDirection};
