use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

use ember_types::{Photo, Profile};

pub const MAX_NAME_CHARS: usize = 50;
pub const MAX_BIO_CHARS: usize = 500;
pub const MIN_AGE: u8 = 18;
pub const MAX_AGE: u8 = 120;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("name is required")]
    EmptyName,

    #[error("name is longer than {max} characters")]
    NameTooLong { max: usize },

    #[error("age must be between {min} and {max}")]
    AgeOutOfRange { min: u8, max: u8 },

    #[error("bio is longer than {max} characters")]
    BioTooLong { max: usize },

    #[error("a profile needs at least one photo")]
    NoPhotos,
}

/// Fields to change; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub age: Option<u8>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub country: Option<String>,
    pub interests: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct ProfileStore {
    tx: Arc<watch::Sender<Profile>>,
}

impl ProfileStore {
    pub fn new(profile: Profile) -> Self {
        let (tx, _) = watch::channel(profile);
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Profile {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Profile> {
        self.tx.subscribe()
    }

    /// Validates the merged profile and stores it. Nothing is stored if any
    /// field is invalid.
    pub fn save_profile(&self, update: ProfileUpdate) -> Result<Profile, ProfileError> {
        let mut next = self.snapshot();
        if let Some(name) = update.name {
            next.name = name.trim().to_string();
        }
        if let Some(age) = update.age {
            next.age = age;
        }
        if let Some(bio) = update.bio {
            next.bio = bio.trim().to_string();
        }
        if let Some(location) = update.location {
            next.location = location.trim().to_string();
        }
        if let Some(country) = update.country {
            next.country = country;
        }
        if let Some(interests) = update.interests {
            next.interests = interests
                .into_iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect();
        }

        validate(&next)?;
        self.tx.send_replace(next.clone());
        info!(profile = %next.id, "profile saved");
        Ok(next)
    }

    pub fn set_photos(&self, photos: Vec<Photo>) -> Result<(), ProfileError> {
        if photos.is_empty() {
            return Err(ProfileError::NoPhotos);
        }
        self.tx.send_modify(|p| p.photos = photos);
        Ok(())
    }
}

pub fn validate(profile: &Profile) -> Result<(), ProfileError> {
    let name_len = profile.name.chars().count();
    if name_len == 0 {
        return Err(ProfileError::EmptyName);
    }
    if name_len > MAX_NAME_CHARS {
        return Err(ProfileError::NameTooLong { max: MAX_NAME_CHARS });
    }
    if !(MIN_AGE..=MAX_AGE).contains(&profile.age) {
        return Err(ProfileError::AgeOutOfRange {
            min: MIN_AGE,
            max: MAX_AGE,
        });
    }
    if profile.bio.chars().count() > MAX_BIO_CHARS {
        return Err(ProfileError::BioTooLong { max: MAX_BIO_CHARS });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_backend::fallback;

    fn store() -> ProfileStore {
        ProfileStore::new(fallback::sample_profile("Ana").unwrap())
    }

    #[test]
    fn invalid_update_blocks_save() {
        let store = store();
        let before = store.snapshot();

        let err = store
            .save_profile(ProfileUpdate {
                name: Some("   ".into()),
                bio: Some("new bio".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, ProfileError::EmptyName);
        assert_eq!(store.snapshot(), before);

        let err = store
            .save_profile(ProfileUpdate {
                age: Some(17),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ProfileError::AgeOutOfRange { .. }));
    }

    #[test]
    fn valid_update_is_published() {
        let store = store();
        let mut rx = store.subscribe();

        let saved = store
            .save_profile(ProfileUpdate {
                bio: Some("  Sunsets and surf.  ".into()),
                interests: Some(vec!["surf".into(), " ".into()]),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(saved.bio, "Sunsets and surf.");
        assert_eq!(saved.interests, vec!["surf".to_string()]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().bio, "Sunsets and surf.");
    }

    #[test]
    fn photo_list_cannot_be_emptied() {
        let store = store();
        assert_eq!(store.set_photos(vec![]), Err(ProfileError::NoPhotos));
        assert_eq!(store.snapshot().photos.len(), 2);
    }

    #[test]
    fn long_bio_is_rejected() {
        let store = store();
        let err = store
            .save_profile(ProfileUpdate {
                bio: Some("x".repeat(MAX_BIO_CHARS + 1)),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, ProfileError::BioTooLong { max: MAX_BIO_CHARS });
    }
}
