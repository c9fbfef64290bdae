//! drive_fetch - Download files and folder trees from Google Drive.
//!
//! This library provides functionality to:
//! - Extract a Drive ID from a share link or raw ID
//! - Resolve whether an ID names a file or a folder
//! - Mirror a folder tree to local disk without overwriting existing files
//!
//! # Example
//!
//! ```no_run
//! use drive_fetch::{Authenticator, DriveClient, Downloader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_credentials_file("credentials.json", "token.json")?;
//!     let client = DriveClient::new(auth);
//!
//!     let summary = Downloader::new(client, "downloads")
//!         .download("https://drive.google.com/drive/folders/1AbCdEfGhIjKlMnOpQrStUv")
//!         .await?;
//!     println!("Saved to {}", summary.path.display());
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod models;
pub mod naming;
pub mod progress;
pub mod resolver;
pub mod url_parser;

// Re-exports for convenience
pub use auth::{Authenticator, CredentialStore};
pub use client::{DriveApi, DriveClient, MediaDownload};
pub use config::Config;
pub use download::{DownloadSummary, Downloader};
pub use error::{DriveError, Result};
pub use models::{ResourceKind, ResourceMetadata};
pub use url_parser::extract_id;
