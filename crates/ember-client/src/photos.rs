use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use ember_backend::{Backend, BackendError};
use ember_types::{Photo, PhotoUpload};

use crate::notifications::NotificationCenter;
use crate::profile::ProfileStore;

pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("you need at least one photo")]
    LastPhoto,

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("photo is {size} bytes, the limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("another photo operation is in progress")]
    Busy,

    #[error("photo operation timed out")]
    Timeout,

    #[error("photo update failed: {0}")]
    Remote(#[source] BackendError),
}

struct DragState {
    index: usize,
    original: Vec<Photo>,
}

#[derive(Default)]
struct PhotoState {
    photos: Vec<Photo>,
    drag: Option<DragState>,
    adding: bool,
    deleting: bool,
    saving_order: bool,
}

impl PhotoState {
    /// Only one mutation of the list may be in flight, and a drag counts.
    fn busy(&self) -> bool {
        self.adding || self.deleting || self.saving_order || self.drag.is_some()
    }
}

/// Photo list editing. The list never drops below one photo, and add,
/// delete and reorder exclude each other until the running one settles or
/// times out.
pub struct PhotoManager {
    backend: Arc<dyn Backend>,
    notifications: NotificationCenter,
    profile: Option<ProfileStore>,
    user_id: Uuid,
    timeout: Duration,
    state: Mutex<PhotoState>,
}

impl PhotoManager {
    pub fn new(
        backend: Arc<dyn Backend>,
        notifications: NotificationCenter,
        user_id: Uuid,
        photos: Vec<Photo>,
    ) -> Self {
        Self {
            backend,
            notifications,
            profile: None,
            user_id,
            timeout: DEFAULT_OPERATION_TIMEOUT,
            state: Mutex::new(PhotoState {
                photos: renumber(photos),
                ..Default::default()
            }),
        }
    }

    /// Mirrors every committed list into the profile store.
    pub fn with_profile_store(mut self, store: ProfileStore) -> Self {
        self.profile = Some(store);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn photos(&self) -> Vec<Photo> {
        self.lock().photos.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().photos.is_empty()
    }

    pub fn is_adding(&self) -> bool {
        self.lock().adding
    }

    pub fn is_deleting(&self) -> bool {
        self.lock().deleting
    }

    pub fn dragging(&self) -> Option<usize> {
        self.lock().drag.as_ref().map(|d| d.index)
    }

    /// Starts dragging the photo at `index`. Returns `false` for an
    /// out-of-range index or while another photo operation is running.
    pub fn begin_drag(&self, index: usize) -> bool {
        let mut state = self.lock();
        if index >= state.photos.len() || state.busy() {
            return false;
        }
        let original = state.photos.clone();
        state.drag = Some(DragState { index, original });
        true
    }

    /// Called on every drag-over: moves the dragged photo to `target`
    /// immediately. `target` is clamped to the list.
    pub fn drag_over(&self, target: usize) {
        let mut state = self.lock();
        let len = state.photos.len();
        let Some(from) = state.drag.as_ref().map(|d| d.index) else {
            return;
        };
        if len == 0 || from >= len {
            state.drag = None;
            return;
        }
        let to = target.min(len - 1);
        if from == to {
            return;
        }

        let photo = state.photos.remove(from);
        state.photos.insert(to, photo);
        let photos = std::mem::take(&mut state.photos);
        state.photos = renumber(photos);
        if let Some(drag) = state.drag.as_mut() {
            drag.index = to;
        }
    }

    /// Ends the drag and persists the new order if it changed. On failure
    /// the order from before the drag is restored.
    pub async fn end_drag(&self) -> Result<bool, PhotoError> {
        let (original, photos) = {
            let mut state = self.lock();
            let Some(drag) = state.drag.take() else {
                return Ok(false);
            };
            if same_order(&drag.original, &state.photos) {
                return Ok(false);
            }
            if state.busy() {
                state.photos = drag.original;
                return Err(PhotoError::Busy);
            }
            state.saving_order = true;
            (drag.original, state.photos.clone())
        };

        let result = self.remote(self.backend.update_photos(self.user_id, &photos)).await;

        let mut state = self.lock();
        state.saving_order = false;
        match result {
            Ok(stored) => {
                state.photos = renumber(stored);
                let committed = state.photos.clone();
                drop(state);
                self.sync_profile(committed);
                Ok(true)
            }
            Err(e) => {
                state.photos = original;
                drop(state);
                warn!("saving photo order failed: {}", e);
                self.notifications.error("Could not save photo order.");
                Err(e)
            }
        }
    }

    /// Deletes the photo at `index`. A stale index is a no-op (`Ok(false)`).
    pub async fn delete(&self, index: usize) -> Result<bool, PhotoError> {
        let (photo_id, remaining) = {
            let mut state = self.lock();
            if index >= state.photos.len() {
                debug!(index, "delete ignored, index out of range");
                return Ok(false);
            }
            if state.photos.len() <= 1 {
                drop(state);
                self.notifications.error(PhotoError::LastPhoto.to_string());
                return Err(PhotoError::LastPhoto);
            }
            if state.busy() {
                return Err(PhotoError::Busy);
            }
            state.deleting = true;

            let photo_id = state.photos[index].id;
            let remaining: Vec<Photo> = state
                .photos
                .iter()
                .filter(|p| p.id != photo_id)
                .cloned()
                .collect();
            (photo_id, renumber(remaining))
        };

        let result = self.remote(self.backend.update_photos(self.user_id, &remaining)).await;

        let mut state = self.lock();
        state.deleting = false;
        match result {
            Ok(stored) if !stored.is_empty() => {
                state.photos = renumber(stored);
                let committed = state.photos.clone();
                drop(state);
                debug!(%photo_id, "photo deleted");
                self.sync_profile(committed);
                Ok(true)
            }
            Ok(_) => {
                drop(state);
                warn!(%photo_id, "backend returned an empty photo list, keeping local list");
                self.notifications.error(PhotoError::LastPhoto.to_string());
                Err(PhotoError::LastPhoto)
            }
            Err(e) => {
                drop(state);
                warn!(%photo_id, "deleting photo failed: {}", e);
                self.notifications.error("Could not delete photo.");
                Err(e)
            }
        }
    }

    /// Validates and uploads a new photo, appending it to the list.
    pub async fn add(&self, upload: PhotoUpload) -> Result<Photo, PhotoError> {
        if let Err(e) = validate_upload(&upload) {
            self.notifications.error(e.to_string());
            return Err(e);
        }
        {
            let mut state = self.lock();
            if state.busy() {
                return Err(PhotoError::Busy);
            }
            state.adding = true;
        }

        let result = self.remote(self.backend.upload_photo(self.user_id, &upload)).await;

        let mut state = self.lock();
        state.adding = false;
        match result {
            Ok(photo) => {
                let photo = Photo {
                    position: state.photos.len() as u32,
                    ..photo
                };
                state.photos.push(photo.clone());
                let committed = state.photos.clone();
                drop(state);
                self.sync_profile(committed);
                Ok(photo)
            }
            Err(e) => {
                drop(state);
                warn!(file = %upload.file_name, "uploading photo failed: {}", e);
                self.notifications.error("Could not upload photo.");
                Err(e)
            }
        }
    }

    async fn remote<T>(
        &self,
        call: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, PhotoError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(PhotoError::Remote(e)),
            Err(_) => Err(PhotoError::Timeout),
        }
    }

    fn sync_profile(&self, photos: Vec<Photo>) {
        if let Some(store) = &self.profile {
            if let Err(e) = store.set_photos(photos) {
                warn!("profile photo sync skipped: {}", e);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, PhotoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn validate_upload(upload: &PhotoUpload) -> Result<(), PhotoError> {
    let content_type = upload.content_type.to_ascii_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(PhotoError::UnsupportedType(upload.content_type.clone()));
    }
    if upload.bytes.len() > MAX_PHOTO_BYTES {
        return Err(PhotoError::TooLarge {
            size: upload.bytes.len(),
            max: MAX_PHOTO_BYTES,
        });
    }
    Ok(())
}

fn renumber(photos: Vec<Photo>) -> Vec<Photo> {
    photos
        .into_iter()
        .enumerate()
        .map(|(i, p)| Photo {
            position: i as u32,
            ..p
        })
        .collect()
}

fn same_order(a: &[Photo], b: &[Photo]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id == y.id)
}
