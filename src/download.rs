//! Download orchestration: resolve a link, then fetch a file or mirror a
//! folder tree under the download root.

use std::path::{Path, PathBuf};
use std::vec;

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::client::DriveApi;
use crate::error::{DriveError, Result};
use crate::models::{format_size, ResourceMetadata};
use crate::naming::{unique_path, validate_name};
use crate::progress::{download_bar, percent};
use crate::resolver::{get_metadata, list_children};
use crate::url_parser::extract_id;

/// What a finished download produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// The downloaded file, or the top-level directory of a folder.
    pub path: PathBuf,
    pub files: usize,
    pub folders: usize,
    pub bytes: u64,
}

/// A folder whose children are still being processed.
struct Frame {
    dir: PathBuf,
    /// IDs from the top folder down to this one, inclusive.
    ancestors: Vec<String>,
    children: vec::IntoIter<ResourceMetadata>,
}

/// Resolves links and writes what they point at below a root directory.
pub struct Downloader<A> {
    api: A,
    download_dir: PathBuf,
    show_progress: bool,
}

impl<A: DriveApi> Downloader<A> {
    pub fn new(api: A, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            download_dir: download_dir.into(),
            show_progress: true,
        }
    }

    /// Enable or disable per-file progress bars.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Download whatever `link_or_id` names.
    ///
    /// Files land directly in the download root; folders are mirrored into
    /// `<root>/<folder name>`. The first error aborts the run and leaves
    /// everything written so far in place.
    pub async fn download(&self, link_or_id: &str) -> Result<DownloadSummary> {
        let id = extract_id(link_or_id);
        debug!("Extracted ID {} from {:?}", id, link_or_id);

        fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| DriveError::filesystem(&self.download_dir, e))?;

        let resource = get_metadata(&self.api, &id).await?;
        info!("Resolved {}", resource);

        let mut summary = DownloadSummary::default();
        let path = if resource.is_folder() {
            let target = self.download_dir.join(validate_name(&resource.name)?);
            self.download_folder(&id, &target, &mut summary).await?;
            target
        } else {
            self.download_file(&resource, &self.download_dir, &mut summary)
                .await?
        };
        summary.path = path;

        info!(
            "Finished {}: {} file(s), {} folder(s), {}",
            summary.path.display(),
            summary.files,
            summary.folders,
            format_size(summary.bytes)
        );
        Ok(summary)
    }

    /// Mirror a remote folder into `target`, depth-first in listing order.
    pub async fn download_folder(
        &self,
        folder_id: &str,
        target: &Path,
        summary: &mut DownloadSummary,
    ) -> Result<()> {
        let root = self
            .open_folder(folder_id, target.to_path_buf(), Vec::new(), summary)
            .await?;
        let mut stack = vec![root];

        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };
            let Some(child) = frame.children.next() else {
                stack.pop();
                continue;
            };
            let dir = frame.dir.clone();

            if child.is_folder() {
                if frame.ancestors.contains(&child.id) {
                    return Err(DriveError::FolderCycle(child.id));
                }
                let ancestors = frame.ancestors.clone();
                let sub_dir = dir.join(validate_name(&child.name)?);
                let sub = self.open_folder(&child.id, sub_dir, ancestors, summary).await?;
                stack.push(sub);
            } else {
                self.download_file(&child, &dir, summary).await?;
            }
        }

        Ok(())
    }

    async fn open_folder(
        &self,
        folder_id: &str,
        dir: PathBuf,
        mut ancestors: Vec<String>,
        summary: &mut DownloadSummary,
    ) -> Result<Frame> {
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| DriveError::filesystem(&dir, e))?;
        info!("Folder {}", dir.display());

        let children = list_children(&self.api, folder_id).await?;
        debug!("{} item(s) in {}", children.len(), folder_id);
        summary.folders += 1;
        ancestors.push(folder_id.to_string());

        Ok(Frame {
            dir,
            ancestors,
            children: children.into_iter(),
        })
    }

    /// Fetch one file into `dest_dir` under a collision-free name.
    pub async fn download_file(
        &self,
        file: &ResourceMetadata,
        dest_dir: &Path,
        summary: &mut DownloadSummary,
    ) -> Result<PathBuf> {
        let target = unique_path(&dest_dir.join(validate_name(&file.name)?));
        info!("Downloading {}", target.display());

        let mut media = self.api.open_media(&file.id).await?.or_total(file.size);
        let mut out = File::create(&target)
            .await
            .map_err(|e| DriveError::filesystem(&target, e))?;

        let bar = download_bar(&file.name, media.total().is_some(), self.show_progress);
        let mut written = 0u64;

        while let Some(chunk) = media.next_chunk().await? {
            out.write_all(&chunk.bytes)
                .await
                .map_err(|e| DriveError::filesystem(&target, e))?;
            written = chunk.received;
            match chunk.progress() {
                Some(fraction) => bar.set_position(percent(fraction)),
                None => bar.set_position(chunk.received),
            }
        }

        out.flush()
            .await
            .map_err(|e| DriveError::filesystem(&target, e))?;
        bar.finish();

        summary.files += 1;
        summary.bytes += written;
        Ok(target)
    }
}
