use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use ember_types::api::{
    MessageResponse, RecordSwipeRequest, RecordSwipeResponse, SendMessageRequest,
    UpdatePhotosRequest, UploadPhotoRequest,
};
use ember_types::{ChatMessage, Connection, Photo, PhotoUpload, SwipeDirection};

use crate::{Backend, BackendError};

/// JSON-over-HTTP client for the hosted backend functions.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, BackendError> {
        let resp = self.authorize(req).send().await.map_err(map_transport)?;
        let resp = check_status(resp).await?;
        resp.json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

fn map_transport(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Http(err)
    }
}

async fn check_status(resp: Response) -> Result<Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    warn!("backend returned {} for {}", status, body);
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn get_matches(&self, user_id: Uuid) -> Result<Vec<Connection>, BackendError> {
        let req = self.client.get(self.url(&format!("/users/{}/matches", user_id)));
        self.send(req).await
    }

    async fn get_messages(
        &self,
        user_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Vec<ChatMessage>, BackendError> {
        let req = self
            .client
            .get(self.url(&format!("/users/{}/messages/{}", user_id, recipient_id)));
        let rows: Vec<MessageResponse> = self.send(req).await?;
        Ok(rows.into_iter().map(|m| m.into_message(user_id)).collect())
    }

    async fn send_message(
        &self,
        user_id: Uuid,
        recipient_id: Uuid,
        content: &str,
    ) -> Result<ChatMessage, BackendError> {
        let req = self
            .client
            .post(self.url(&format!("/users/{}/messages", user_id)))
            .json(&SendMessageRequest {
                recipient_id,
                content: content.to_string(),
            });
        let stored: MessageResponse = self.send(req).await?;
        debug!(id = %stored.id, "message stored");
        Ok(stored.into_message(user_id))
    }

    async fn record_swipe(
        &self,
        user_id: Uuid,
        card_id: Uuid,
        direction: SwipeDirection,
    ) -> Result<RecordSwipeResponse, BackendError> {
        let req = self
            .client
            .post(self.url(&format!("/users/{}/swipes", user_id)))
            .json(&RecordSwipeRequest { card_id, direction });
        self.send(req).await
    }

    async fn update_photos(&self, user_id: Uuid, photos: &[Photo]) -> Result<Vec<Photo>, BackendError> {
        let req = self
            .client
            .put(self.url(&format!("/users/{}/photos", user_id)))
            .json(&UpdatePhotosRequest {
                photos: photos.to_vec(),
            });
        self.send(req).await
    }

    async fn upload_photo(&self, user_id: Uuid, upload: &PhotoUpload) -> Result<Photo, BackendError> {
        let req = self
            .client
            .post(self.url(&format!("/users/{}/photos", user_id)))
            .json(&UploadPhotoRequest {
                file_name: upload.file_name.clone(),
                content_type: upload.content_type.clone(),
                data: B64.encode(&upload.bytes),
            });
        self.send(req).await
    }
}
