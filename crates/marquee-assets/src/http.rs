use std::time::Duration;

use async_trait::async_trait;
use marquee_types::{AssetReference, DeletionHandle, Upload};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{AssetError, AssetResult};
use crate::policy::{key_from_handle, object_key, public_url, UploadPolicy};
use crate::traits::AssetStore;

/// Remote object store speaking a minimal S3-style REST dialect.
///
/// - `PUT {endpoint}/{key}` with the raw bytes stores an object.
/// - `DELETE {endpoint}/{key}` removes it; `404` means it was already gone.
///
/// Public URLs are `public_base_url` joined with the key. An optional bearer
/// token is sent on every request.
#[derive(Debug, Clone)]
pub struct HttpAssetStore {
    client: Client,
    endpoint: String,
    public_base_url: String,
    token: Option<String>,
    policy: UploadPolicy,
}

impl HttpAssetStore {
    pub fn new(
        endpoint: impl Into<String>,
        public_base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
        policy: UploadPolicy,
    ) -> AssetResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssetError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            public_base_url: public_base_url.into(),
            token,
            policy,
        })
    }

    fn object_url(&self, key: &str) -> String {
        public_url(&self.endpoint, key)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Map a non-success response to an error, reading the body for context.
async fn failure(response: reqwest::Response) -> AssetError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.trim())
    };
    if status.is_client_error() {
        AssetError::Rejected(detail)
    } else {
        AssetError::Transport(detail)
    }
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn store(&self, upload: &Upload, folder: &str) -> AssetResult<AssetReference> {
        let format = self.policy.check(upload)?;
        let key = object_key(folder, format)?;
        let request = self
            .client
            .put(self.object_url(&key))
            .header(CONTENT_TYPE, format.mime_type())
            .body(upload.bytes.clone());
        let response = self.authorize(request).send().await.map_err(|e| {
            warn!(key = %key, error = %e, "object store upload failed");
            AssetError::Transport(e.to_string())
        })?;
        if !response.status().is_success() {
            return Err(failure(response).await);
        }
        debug!(key = %key, size = upload.len(), "remote asset stored");
        Ok(AssetReference::owned(
            public_url(&self.public_base_url, &key),
            DeletionHandle::new(key),
        ))
    }

    async fn remove(&self, handle: &DeletionHandle) -> AssetResult<()> {
        let key = key_from_handle(handle)?;
        let request = self.client.delete(self.object_url(key));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| AssetError::Transport(e.to_string()))?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(AssetError::NotFound(handle.clone())),
            _ => Err(failure(response).await),
        }
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::body::Bytes;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::put;
    use axum::Router;

    use super::*;
    use crate::policy::fixtures::png;

    type Objects = Arc<Mutex<HashMap<String, (Vec<u8>, Option<String>)>>>;

    async fn put_object(
        State(objects): State<Objects>,
        Path(key): Path<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> StatusCode {
        if key.starts_with("full/") {
            return StatusCode::INSUFFICIENT_STORAGE;
        }
        if key.starts_with("strict/") {
            return StatusCode::UNPROCESSABLE_ENTITY;
        }
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        objects.lock().unwrap().insert(key, (body.to_vec(), auth));
        StatusCode::CREATED
    }

    async fn delete_object(State(objects): State<Objects>, Path(key): Path<String>) -> StatusCode {
        match objects.lock().unwrap().remove(&key) {
            Some(_) => StatusCode::NO_CONTENT,
            None => StatusCode::NOT_FOUND,
        }
    }

    async fn spawn_object_store() -> (SocketAddr, Objects) {
        let objects: Objects = Arc::default();
        let app = Router::new()
            .route("/objects/*key", put(put_object).delete(delete_object))
            .with_state(objects.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, objects)
    }

    fn client_for(addr: SocketAddr, token: Option<&str>) -> HttpAssetStore {
        HttpAssetStore::new(
            format!("http://{addr}/objects"),
            "https://cdn.example/festival",
            token.map(str::to_string),
            Duration::from_secs(5),
            UploadPolicy::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn store_puts_object_and_returns_public_url() {
        let (addr, objects) = spawn_object_store().await;
        let store = client_for(addr, Some("s3cret"));
        let upload = png("poster");

        let asset = store.store(&upload, "marquee/events").await.unwrap();
        let handle = asset.handle.clone().unwrap();
        assert_eq!(
            asset.url,
            format!("https://cdn.example/festival/{}", handle.as_str())
        );

        let objects = objects.lock().unwrap();
        let (bytes, auth) = objects.get(handle.as_str()).expect("object uploaded");
        assert_eq!(bytes, &upload.bytes.to_vec());
        assert_eq!(auth.as_deref(), Some("Bearer s3cret"));
    }

    #[tokio::test]
    async fn remove_deletes_and_maps_404_to_not_found() {
        let (addr, objects) = spawn_object_store().await;
        let store = client_for(addr, None);
        let handle = store
            .store(&png("logo"), "marquee/events")
            .await
            .unwrap()
            .handle
            .unwrap();

        store.remove(&handle).await.unwrap();
        assert!(objects.lock().unwrap().is_empty());
        assert!(store.remove(&handle).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn client_errors_are_rejections() {
        let (addr, _) = spawn_object_store().await;
        let store = client_for(addr, None);
        let err = store.store(&png("x"), "strict/events").await.unwrap_err();
        assert!(err.is_rejection(), "{err}");
    }

    #[tokio::test]
    async fn server_errors_are_transport_failures() {
        let (addr, _) = spawn_object_store().await;
        let store = client_for(addr, None);
        let err = store.store(&png("x"), "full/events").await.unwrap_err();
        assert!(matches!(err, AssetError::Transport(_)), "{err}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let store = client_for(addr, None);
        let err = store.store(&png("x"), "marquee/events").await.unwrap_err();
        assert!(matches!(err, AssetError::Transport(_)), "{err}");
    }

    #[tokio::test]
    async fn policy_is_checked_before_any_request() {
        let (addr, objects) = spawn_object_store().await;
        let store = client_for(addr, None);
        let err = store
            .store(&Upload::new(b"text".to_vec()), "marquee/events")
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert!(objects.lock().unwrap().is_empty());
    }
}
