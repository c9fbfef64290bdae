//! Credential handling for the Google Drive API.
//!
//! Every source of credentials implements [`CredentialStore`], an explicit
//! load / refresh / save contract. [`Authenticator`] sits on top of a store,
//! keeps the current access token in memory and refreshes it shortly before
//! it expires.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::error::{DriveError, Result};
use crate::models::{
    AccessToken, ClientSecrets, CredentialsFile, ServiceAccountCredentials, TokenResponse,
};

/// Google OAuth2 token endpoint.
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Read-only Google Drive scope.
const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Refresh this many seconds before the token actually expires.
const EXPIRY_BUFFER_SECS: u64 = 60;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Source of access tokens with an explicit persistence contract.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read previously persisted credentials, if there are any.
    async fn load(&self) -> Result<Option<AccessToken>>;

    /// Obtain a fresh token, starting from `current` when one is known.
    async fn refresh(&self, current: Option<&AccessToken>) -> Result<AccessToken>;

    /// Persist a token so the next run can reuse it.
    async fn save(&self, token: &AccessToken) -> Result<()>;
}

/// Hands out valid access tokens backed by a [`CredentialStore`].
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    cached_token: Arc<RwLock<Option<AccessToken>>>,
}

impl Authenticator {
    /// Create a new authenticator over a credential store.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Authenticate with a bearer token obtained elsewhere.
    pub fn with_static_token(token: impl Into<String>) -> Self {
        Self::new(Arc::new(StaticTokenStore::new(token)))
    }

    /// Build an authenticator from a `credentials.json` file.
    ///
    /// Service account keys are used directly. OAuth client secrets for an
    /// installed application persist their tokens in `token_cache`.
    pub fn from_credentials_file<P: AsRef<Path>, Q: AsRef<Path>>(
        credentials: P,
        token_cache: Q,
    ) -> Result<Self> {
        let credentials = credentials.as_ref();
        let content = fs::read_to_string(credentials).map_err(|e| {
            DriveError::AuthenticationError(format!(
                "cannot read credentials file {}: {}",
                credentials.display(),
                e
            ))
        })?;
        let parsed: CredentialsFile = serde_json::from_str(&content).map_err(|e| {
            DriveError::AuthenticationError(format!(
                "unrecognised credentials file {}: {}",
                credentials.display(),
                e
            ))
        })?;

        let store: Arc<dyn CredentialStore> = match parsed {
            CredentialsFile::Installed { installed: secrets }
            | CredentialsFile::Web { web: secrets } => {
                debug!("Using OAuth client credentials from {}", credentials.display());
                Arc::new(InstalledAppStore::new(secrets, token_cache.as_ref()))
            }
            CredentialsFile::ServiceAccount(account) => {
                debug!("Using service account {}", account.client_email);
                Arc::new(ServiceAccountStore::new(account))
            }
        };
        Ok(Self::new(store))
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        let now = unix_now();

        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_valid_at(now, EXPIRY_BUFFER_SECS) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;

        if cached.is_none() {
            *cached = self.store.load().await?;
        }
        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(now, EXPIRY_BUFFER_SECS) {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.store.refresh(cached.as_ref()).await?;
        self.store.save(&fresh).await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);

        Ok(access_token)
    }
}

/// A bearer token supplied directly, e.g. from the environment.
pub struct StaticTokenStore {
    token: String,
}

impl StaticTokenStore {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialStore for StaticTokenStore {
    async fn load(&self) -> Result<Option<AccessToken>> {
        Ok(Some(AccessToken {
            access_token: self.token.clone(),
            refresh_token: None,
            expires_at: None,
        }))
    }

    async fn refresh(&self, _current: Option<&AccessToken>) -> Result<AccessToken> {
        Err(DriveError::AuthenticationError(
            "a static access token cannot be refreshed".to_string(),
        ))
    }

    async fn save(&self, _token: &AccessToken) -> Result<()> {
        Ok(())
    }
}

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Service account key; tokens are minted on demand and never persisted.
pub struct ServiceAccountStore {
    credentials: ServiceAccountCredentials,
    client: Client,
}

impl ServiceAccountStore {
    pub fn new(credentials: ServiceAccountCredentials) -> Self {
        Self {
            credentials,
            client: Client::new(),
        }
    }

    fn token_uri(&self) -> &str {
        self.credentials.token_uri.as_deref().unwrap_or(TOKEN_URI)
    }
}

#[async_trait]
impl CredentialStore for ServiceAccountStore {
    async fn load(&self) -> Result<Option<AccessToken>> {
        Ok(None)
    }

    /// Exchange a signed JWT assertion for an access token.
    async fn refresh(&self, _current: Option<&AccessToken>) -> Result<AccessToken> {
        let now = unix_now();

        let claims = Claims {
            iss: self.credentials.client_email.clone(),
            scope: DRIVE_READONLY_SCOPE.to_string(),
            aud: self.token_uri().to_string(),
            iat: now,
            exp: now + 3600, // 1 hour
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];

        let token = request_token(&self.client, self.token_uri(), &params).await?;
        Ok(AccessToken {
            access_token: token.access_token,
            refresh_token: None,
            expires_at: Some(now + token.expires_in),
        })
    }

    async fn save(&self, _token: &AccessToken) -> Result<()> {
        Ok(())
    }
}

/// OAuth installed-application flow with a JSON token cache on disk.
pub struct InstalledAppStore {
    secrets: ClientSecrets,
    cache_path: PathBuf,
    client: Client,
}

impl InstalledAppStore {
    pub fn new(secrets: ClientSecrets, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            secrets,
            cache_path: cache_path.into(),
            client: Client::new(),
        }
    }

    /// Build the consent URL the user opens in a browser.
    pub fn consent_url(&self, redirect_uri: &str, state: &str) -> Result<Url> {
        let mut url = Url::parse(&self.secrets.auth_uri).map_err(|e| {
            DriveError::AuthenticationError(format!("invalid auth_uri: {}", e))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.secrets.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", DRIVE_READONLY_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        Ok(url)
    }

    /// Ask the user for consent and catch the redirect on a loopback port.
    async fn authorize_interactively(&self) -> Result<AccessToken> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let state = new_state();
        let consent_url = self.consent_url(&redirect_uri, &state)?;

        println!("Open this URL in your browser to authorize access:\n\n{}\n", consent_url);

        // Browsers may preconnect or ask for a favicon before the redirect arrives.
        let code = loop {
            let (mut stream, _) = listener.accept().await?;
            let request = read_request(&mut stream).await.unwrap_or_default();

            match parse_redirect(&request, &state) {
                Ok(Redirect::Unrelated) => {
                    let _ = stream.write_all(REPLY_NOT_FOUND).await;
                }
                Ok(Redirect::Code(code)) => {
                    let _ = stream.write_all(REPLY_GRANTED).await;
                    let _ = stream.shutdown().await;
                    break code;
                }
                Err(e) => {
                    let _ = stream.write_all(REPLY_FAILED).await;
                    let _ = stream.shutdown().await;
                    return Err(e);
                }
            }
        };

        let now = unix_now();
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        let token = request_token(&self.client, &self.secrets.token_uri, &params).await?;
        info!("Authorization granted");

        Ok(AccessToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Some(now + token.expires_in),
        })
    }

    async fn refresh_with(&self, refresh_token: &str) -> Result<AccessToken> {
        let now = unix_now();
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
        ];
        let token = request_token(&self.client, &self.secrets.token_uri, &params).await?;
        debug!("Access token refreshed");

        Ok(AccessToken {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
            expires_at: Some(now + token.expires_in),
        })
    }
}

#[async_trait]
impl CredentialStore for InstalledAppStore {
    async fn load(&self) -> Result<Option<AccessToken>> {
        let content = match tokio::fs::read_to_string(&self.cache_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DriveError::filesystem(&self.cache_path, e)),
        };
        match serde_json::from_str(&content) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                debug!("Ignoring unreadable token cache {}: {}", self.cache_path.display(), e);
                Ok(None)
            }
        }
    }

    async fn refresh(&self, current: Option<&AccessToken>) -> Result<AccessToken> {
        match current.and_then(|t| t.refresh_token.as_deref()) {
            Some(refresh_token) => self.refresh_with(refresh_token).await,
            None => self.authorize_interactively().await,
        }
    }

    async fn save(&self, token: &AccessToken) -> Result<()> {
        let content = serde_json::to_string_pretty(token)?;
        tokio::fs::write(&self.cache_path, content)
            .await
            .map_err(|e| DriveError::filesystem(&self.cache_path, e))
    }
}

/// POST a form to a token endpoint and decode the token response.
async fn request_token(
    client: &Client,
    token_uri: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = client.post(token_uri).form(params).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::AuthenticationError(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }

    Ok(response.json().await?)
}

const REPLY_GRANTED: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\
Connection: close\r\n\r\nAuthorization complete. You may close this window.\r\n";

const REPLY_FAILED: &[u8] = b"HTTP/1.1 400 Bad Request\r\nContent-Type: text/plain\r\n\
Connection: close\r\n\r\nAuthorization failed. Return to the terminal for details.\r\n";

const REPLY_NOT_FOUND: &[u8] =
    b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Random value tying the redirect to the consent request we issued.
fn new_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Read an HTTP request head from the loopback connection.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() >= 8192 || buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// What arrived on the loopback listener.
#[derive(Debug, PartialEq, Eq)]
enum Redirect {
    /// The consent redirect, carrying the authorization code.
    Code(String),
    /// Anything else: preconnects, favicon requests, stray paths.
    Unrelated,
}

/// Pull the authorization code out of the redirect's HTTP request line.
///
/// Only requests for `/` with a query count as the redirect; its `state`
/// must match the one sent with the consent URL.
fn parse_redirect(request: &str, expected_state: &str) -> Result<Redirect> {
    let Some(target) = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
    else {
        return Ok(Redirect::Unrelated);
    };

    let Ok(url) = Url::parse(&format!("http://127.0.0.1{}", target)) else {
        return Ok(Redirect::Unrelated);
    };
    if url.path() != "/" || url.query().is_none() {
        return Ok(Redirect::Unrelated);
    }

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(DriveError::AuthenticationError(format!(
                    "authorization refused: {}",
                    value
                )))
            }
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(DriveError::AuthenticationError(
            "authorization redirect state does not match the consent request".to_string(),
        ));
    }

    code.map(Redirect::Code).ok_or_else(|| {
        DriveError::AuthenticationError("authorization redirect carried no code".to_string())
    })
}
