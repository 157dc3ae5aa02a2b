//! Google Drive v3 remote store backed by the app-data folder.

use reqwest::{header, Client, StatusCode};
use serde::Deserialize;

use crate::auth::AuthProvider;
use crate::util::compact_text;

use super::{FileRef, RemoteError, RemoteResult, RemoteStore};

const FILES_ENDPOINT: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_ENDPOINT: &str = "https://www.googleapis.com/upload/drive/v3/files";
const APP_DATA_SPACE: &str = "appDataFolder";
const MULTIPART_BOUNDARY: &str = "foo_bar_baz";

/// Drive-backed remote store.
///
/// Every blob lives in the account's app-data folder, so the app only ever
/// sees files it created itself. The bearer token is taken from the injected
/// auth provider per request.
#[derive(Clone)]
pub struct DriveStore<A: AuthProvider> {
    auth: A,
    client: Client,
}

impl<A: AuthProvider> DriveStore<A> {
    pub fn new(auth: A) -> RemoteResult<Self> {
        Ok(Self {
            auth,
            client: Client::builder().build()?,
        })
    }

    fn bearer(&self) -> RemoteResult<String> {
        self.auth.access_token().ok_or(RemoteError::NotSignedIn)
    }
}

impl<A: AuthProvider> RemoteStore for DriveStore<A> {
    async fn find_named(&self, name: &str) -> RemoteResult<Option<FileRef>> {
        let token = self.bearer()?;
        let query = build_name_query(name);

        let response = self
            .client
            .get(FILES_ENDPOINT)
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("spaces", APP_DATA_SPACE),
                ("fields", "files(id, name)"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let payload = response.json::<FileListResponse>().await?;
        Ok(payload
            .files
            .into_iter()
            .next()
            .map(|file| FileRef::new(file.id)))
    }

    async fn read(&self, file: &FileRef) -> RemoteResult<Vec<u8>> {
        let token = self.bearer()?;

        let response = self
            .client
            .get(format!("{FILES_ENDPOINT}/{}", file.id()))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn create(&self, name: &str, bytes: Vec<u8>) -> RemoteResult<FileRef> {
        let token = self.bearer()?;
        let metadata = serde_json::json!({
            "name": name,
            "parents": [APP_DATA_SPACE],
        });
        let body = build_multipart_body(&metadata.to_string(), &bytes);

        let response = self
            .client
            .post(UPLOAD_ENDPOINT)
            .bearer_auth(token)
            .query(&[("uploadType", "multipart")])
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary=\"{MULTIPART_BOUNDARY}\""),
            )
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let created = response.json::<FileResource>().await?;
        tracing::debug!(file = %created.id, "created remote data file");
        Ok(FileRef::new(created.id))
    }

    async fn update(&self, file: &FileRef, bytes: Vec<u8>) -> RemoteResult<FileRef> {
        let token = self.bearer()?;

        let response = self
            .client
            .patch(format!("{UPLOAD_ENDPOINT}/{}", file.id()))
            .bearer_auth(token)
            .query(&[("uploadType", "media")])
            .header(header::CONTENT_TYPE, "application/json")
            .body(bytes)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let updated = response.json::<UpdateResponse>().await?;
        Ok(updated.id.map_or_else(|| file.clone(), FileRef::new))
    }
}

/// Build the Drive search query matching the one named data file.
fn build_name_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name='{escaped}' and parents in '{APP_DATA_SPACE}'")
}

/// Assemble a `multipart/related` upload body: metadata part, then content.
fn build_multipart_body(metadata: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    body.extend_from_slice(metadata.as_bytes());
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--").as_bytes());
    body
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<FileResource>,
}

#[derive(Debug, Deserialize)]
struct FileResource {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveErrorBody {
    error: Option<DriveErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct DriveErrorDetail {
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<DriveErrorBody>(body) {
        if let Some(message) = payload.error.and_then(|detail| detail.message) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
