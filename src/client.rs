//! Google Drive API client: metadata, folder listings and media downloads.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;
use url::Url;

use crate::auth::Authenticator;
use crate::error::{DriveError, Result};
use crate::models::{ApiErrorResponse, FileListResponse, FileMetadata};

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Fields requested for every resource.
const RESOURCE_FIELDS: &str = "id, name, mimeType, size";

/// Fields requested for every listing page.
const LISTING_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size)";

/// The three provider operations the downloader depends on.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Fetch name, MIME type and size of a single resource.
    async fn get_metadata(&self, id: &str) -> Result<FileMetadata>;

    /// Fetch one page of a folder's non-trashed children.
    async fn list_page(&self, folder_id: &str, page_token: Option<&str>)
        -> Result<FileListResponse>;

    /// Start downloading a file's content.
    async fn open_media(&self, id: &str) -> Result<MediaDownload>;
}

/// One piece of a download in progress.
#[derive(Debug, Clone)]
pub struct MediaChunk {
    pub bytes: Bytes,
    /// Bytes received so far, this chunk included.
    pub received: u64,
    pub total: Option<u64>,
}

impl MediaChunk {
    /// Fraction of the file received, when the total size is known.
    pub fn progress(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.received as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// A file download polled chunk by chunk until it reports completion.
pub struct MediaDownload {
    stream: BoxStream<'static, Result<Bytes>>,
    received: u64,
    total: Option<u64>,
}

impl MediaDownload {
    pub fn new(stream: BoxStream<'static, Result<Bytes>>, total: Option<u64>) -> Self {
        Self {
            stream,
            received: 0,
            total,
        }
    }

    /// Expected size in bytes, if the provider announced one.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Use `size` as the expected total when the response carried none.
    pub fn or_total(mut self, size: Option<u64>) -> Self {
        self.total = self.total.or(size);
        self
    }

    /// Wait for the next chunk; `None` once the download is complete.
    pub async fn next_chunk(&mut self) -> Result<Option<MediaChunk>> {
        match self.stream.next().await {
            Some(bytes) => {
                let bytes = bytes?;
                self.received += bytes.len() as u64;
                Ok(Some(MediaChunk {
                    bytes,
                    received: self.received,
                    total: self.total,
                }))
            }
            None => Ok(None),
        }
    }
}

/// Client for the Google Drive REST API.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    base_url: String,
}

impl DriveClient {
    /// Create a new DriveClient talking to the public Drive API.
    pub fn new(auth: Authenticator) -> Self {
        Self {
            auth,
            http: Client::new(),
            base_url: DRIVE_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// URL of the `files` collection, or of one resource in it.
    ///
    /// The ID is pushed as a single percent-encoded path segment.
    fn endpoint(&self, id: Option<&str>) -> Result<Url> {
        if let Some(id @ ("" | "." | "..")) = id {
            return Err(DriveError::NotFound(format!("{:?}: not a valid resource ID", id)));
        }

        let mut url = Url::parse(&self.base_url).map_err(|e| {
            DriveError::ConfigError(format!("invalid API base URL {}: {}", self.base_url, e))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                let message = format!("API base URL cannot hold a path: {}", self.base_url);
                DriveError::ConfigError(message)
            })?;
            segments.pop_if_empty().push("files");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn get_metadata(&self, id: &str) -> Result<FileMetadata> {
        let url = self.endpoint(Some(id))?;
        let token = self.auth.get_access_token().await?;
        debug!("GET metadata {}", id);

        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", RESOURCE_FIELDS)])
            .send()
            .await?;

        let response = check_status(response, id).await?;
        Ok(response.json().await?)
    }

    async fn list_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<FileListResponse> {
        let url = self.endpoint(None)?;
        let token = self.auth.get_access_token().await?;
        let query = format!("'{}' in parents and trashed = false", folder_id);
        debug!("LIST {} (page token: {:?})", folder_id, page_token);

        let mut request = self
            .http
            .get(url)
            .bearer_auth(&token)
            .query(&[
                ("q", query.as_str()),
                ("spaces", "drive"),
                ("includeItemsFromAllDrives", "true"),
                ("supportsAllDrives", "true"),
                ("fields", LISTING_FIELDS),
            ]);

        if let Some(page_token) = page_token {
            request = request.query(&[("pageToken", page_token)]);
        }

        let response = check_status(request.send().await?, folder_id).await?;
        Ok(response.json().await?)
    }

    async fn open_media(&self, id: &str) -> Result<MediaDownload> {
        let url = self.endpoint(Some(id))?;
        let token = self.auth.get_access_token().await?;
        debug!("GET media {}", id);

        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await?;

        let response = check_status(response, id).await?;
        let total = response.content_length();
        let stream = response.bytes_stream().map_err(DriveError::from).boxed();

        Ok(MediaDownload::new(stream, total))
    }
}

/// Turn a non-success response into the matching error.
async fn check_status(response: Response, id: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ApiErrorResponse>(&error_body) {
        Ok(api_error) => (api_error.error.code, api_error.error.message),
        Err(_) => (status.as_u16(), error_body),
    };

    Err(match status {
        StatusCode::NOT_FOUND => DriveError::NotFound(format!("{}: {}", id, message)),
        StatusCode::FORBIDDEN => DriveError::PermissionDenied(format!("{}: {}", id, message)),
        StatusCode::UNAUTHORIZED => DriveError::AuthenticationError(message),
        _ => DriveError::ApiError {
            status: code,
            message,
        },
    })
}
