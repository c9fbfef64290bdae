//! drive_fetch CLI - Download a Google Drive file or folder by link or ID.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use drive_fetch::{Authenticator, Config, DriveClient, DriveError, Downloader};

/// Download files and folders from Google Drive.
#[derive(Parser)]
#[command(name = "drive_fetch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File or folder link, or a raw ID. Prompted for when omitted.
    link: Option<String>,

    /// Path to a TOML configuration file.
    #[arg(long, env = "DRIVE_FETCH_CONFIG")]
    config: Option<PathBuf>,

    /// Path to OAuth client secrets or a service account key.
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Path of the OAuth token cache.
    #[arg(long, env = "DRIVE_TOKEN_CACHE")]
    token_cache: Option<PathBuf>,

    /// Directory downloads are written under.
    #[arg(long, short = 'o', env = "DRIVE_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Use this bearer token instead of a credentials file.
    #[arg(long, env = "DRIVE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Do not draw progress bars.
    #[arg(long)]
    no_progress: bool,

    /// Enable debug logging.
    #[arg(long, short = 'd')]
    debug: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration.
    fn merge_into_config(&self, config: &mut Config) {
        if let Some(ref path) = self.credentials {
            config.credentials_file = path.clone();
        }
        if let Some(ref path) = self.token_cache {
            config.token_file = path.clone();
        }
        if let Some(ref dir) = self.download_dir {
            config.download_dir = dir.clone();
        }
        if self.no_progress {
            config.show_progress = false;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<DriveError>() {
        Some(DriveError::ConfigError(_) | DriveError::ConfigParseError(_)) => 2,
        Some(DriveError::AuthenticationError(_) | DriveError::JwtError(_)) => 3,
        Some(
            DriveError::NotFound(_)
            | DriveError::PermissionDenied(_)
            | DriveError::ApiError { .. }
            | DriveError::HttpError(_)
            | DriveError::ParseError(_),
        ) => 4,
        Some(
            DriveError::FilesystemError { .. }
            | DriveError::InvalidName(_)
            | DriveError::FolderCycle(_),
        ) => 5,
        _ => 1,
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    let mut config = match cli.config {
        Some(ref path) => Config::load(path)?,
        None => Config::default(),
    };
    cli.merge_into_config(&mut config);

    // Authenticate before asking for input so credential problems surface first.
    let auth = match cli.access_token {
        Some(ref token) => Authenticator::with_static_token(token.clone()),
        None => {
            Authenticator::from_credentials_file(&config.credentials_file, &config.token_file)?
        }
    };
    auth.get_access_token().await?;

    let client = DriveClient::new(auth).with_base_url(config.api_base_url.clone());
    let downloader =
        Downloader::new(client, &config.download_dir).show_progress(config.show_progress);

    let link = match cli.link {
        Some(link) => link,
        None => prompt("Enter Google Drive file/folder link or ID: ")?,
    };

    let summary = downloader
        .download(&link)
        .await
        .with_context(|| format!("Failed to download {}", link.trim()))?;

    println!("Download complete!");
    println!(
        "Saved to: {} ({} file(s), {} folder(s))",
        summary.path.display(),
        summary.files,
        summary.folders
    );

    Ok(())
}

/// Read one trimmed line from stdin.
fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}
