//! Data models for Google Drive API responses and credentials.

use serde::{Deserialize, Serialize};

/// MIME type Google Drive assigns to folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Metadata for a file or folder as returned by the Drive API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: Option<u64>,
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Whether a resource is a plain file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    File,
    Folder,
}

impl ResourceKind {
    /// Classify a Drive MIME type.
    pub fn from_mime_type(mime_type: Option<&str>) -> Self {
        match mime_type {
            Some(FOLDER_MIME_TYPE) => ResourceKind::Folder,
            _ => ResourceKind::File,
        }
    }
}

/// Typed snapshot of a remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMetadata {
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
    /// Absent for folders and for Google-native documents.
    pub size: Option<u64>,
    pub mime_type: Option<String>,
}

impl ResourceMetadata {
    pub fn is_folder(&self) -> bool {
        self.kind == ResourceKind::Folder
    }
}

impl From<FileMetadata> for ResourceMetadata {
    fn from(meta: FileMetadata) -> Self {
        Self {
            kind: ResourceKind::from_mime_type(meta.mime_type.as_deref()),
            id: meta.id,
            name: meta.name,
            size: meta.size,
            mime_type: meta.mime_type,
        }
    }
}

impl std::fmt::Display for ResourceMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size_str = self
            .size
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        let kind = match self.kind {
            ResourceKind::File => "file",
            ResourceKind::Folder => "folder",
        };
        write!(f, "{}\t{}\t{}\t{}", self.id, kind, size_str, self.name)
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Response from the files.list API endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileMetadata>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// Service account credentials from JSON file.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

/// OAuth client secrets for an installed (desktop) application.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Shapes a `credentials.json` file can take.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CredentialsFile {
    Installed { installed: ClientSecrets },
    Web { web: ClientSecrets },
    ServiceAccount(ServiceAccountCredentials),
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Access token as held in memory and in the token cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as seconds since the Unix epoch; `None` never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl AccessToken {
    /// True when the token stays valid for at least `buffer_secs` past `now`.
    pub fn is_valid_at(&self, now: u64, buffer_secs: u64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > now.saturating_add(buffer_secs),
            None => true,
        }
    }
}
