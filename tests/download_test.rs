//! End-to-end download scenarios against an in-memory Drive.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use drive_fetch::error::{DriveError, Result};
use drive_fetch::models::{FileListResponse, FileMetadata, FOLDER_MIME_TYPE};
use drive_fetch::resolver::{get_metadata, is_folder, list_children};
use drive_fetch::{DriveApi, Downloader, MediaDownload};

/// A fake Drive: resources, paginated listings, file contents and a call log.
#[derive(Default)]
struct FakeDrive {
    resources: HashMap<String, FileMetadata>,
    /// Folder ID -> pages of child IDs.
    pages: HashMap<String, Vec<Vec<String>>>,
    contents: HashMap<String, Vec<u8>>,
    broken_media: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeDrive {
    fn file(mut self, id: &str, name: &str, content: &[u8]) -> Self {
        self.resources.insert(
            id.to_string(),
            FileMetadata {
                id: id.to_string(),
                name: name.to_string(),
                mime_type: Some("application/octet-stream".to_string()),
                size: Some(content.len() as u64),
            },
        );
        self.contents.insert(id.to_string(), content.to_vec());
        self
    }

    fn folder(mut self, id: &str, name: &str, pages: &[&[&str]]) -> Self {
        self.resources.insert(
            id.to_string(),
            FileMetadata {
                id: id.to_string(),
                name: name.to_string(),
                mime_type: Some(FOLDER_MIME_TYPE.to_string()),
                size: None,
            },
        );
        self.pages.insert(
            id.to_string(),
            pages
                .iter()
                .map(|page| page.iter().map(|c| c.to_string()).collect())
                .collect(),
        );
        self
    }

    fn broken(mut self, id: &str) -> Self {
        self.broken_media.push(id.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn get_metadata(&self, id: &str) -> Result<FileMetadata> {
        self.record(format!("get {}", id));
        self.resources
            .get(id)
            .cloned()
            .ok_or_else(|| DriveError::NotFound(id.to_string()))
    }

    async fn list_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<FileListResponse> {
        self.record(format!("list {} {:?}", folder_id, page_token));
        let pages = self
            .pages
            .get(folder_id)
            .ok_or_else(|| DriveError::NotFound(folder_id.to_string()))?;

        let index: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let files: Vec<FileMetadata> = pages
            .get(index)
            .map(|ids| ids.iter().map(|id| self.resources[id].clone()).collect())
            .unwrap_or_default();
        let next_page_token = (index + 1 < pages.len()).then(|| (index + 1).to_string());

        Ok(FileListResponse {
            files,
            next_page_token,
        })
    }

    async fn open_media(&self, id: &str) -> Result<MediaDownload> {
        self.record(format!("media {}", id));
        if self.broken_media.iter().any(|b| b == id) {
            return Err(DriveError::ApiError {
                status: 500,
                message: "backend error".to_string(),
            });
        }

        let content = self
            .contents
            .get(id)
            .cloned()
            .ok_or_else(|| DriveError::NotFound(id.to_string()))?;
        let total = content.len() as u64;
        let chunks: Vec<Result<Bytes>> = content
            .chunks(4)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        Ok(MediaDownload::new(futures::stream::iter(chunks).boxed(), Some(total)))
    }
}

const FILE_ID: &str = "ABCDEFGHIJ0123456789abcd";
const PHOTOS_ID: &str = "PHOTOSphotos0123456789xy";
const YEAR_ID: &str = "YEAR2024year0123456789xy";

fn downloader(drive: FakeDrive, root: &Path) -> Downloader<FakeDrive> {
    Downloader::new(drive, root).show_progress(false)
}

fn photos_drive() -> FakeDrive {
    FakeDrive::default()
        .folder(PHOTOS_ID, "Photos", &[&[YEAR_ID, "b-jpg"]])
        .folder(YEAR_ID, "2024", &[&["a-jpg"]])
        .file("a-jpg", "a.jpg", b"jpeg a")
        .file("b-jpg", "b.jpg", b"jpeg b")
}

mod single_file {
    use super::*;

    #[tokio::test]
    async fn test_file_link_lands_in_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("downloads");
        let drive = FakeDrive::default().file(FILE_ID, "report.pdf", b"%PDF-1.7 report");
        let downloader = downloader(drive, &root);

        let link = format!(
            "https://drive.example.com/file/d/{}/view?usp=sharing",
            FILE_ID
        );
        let summary = downloader.download(&link).await.unwrap();

        assert_eq!(summary.path, root.join("report.pdf"));
        assert_eq!(summary.files, 1);
        assert_eq!(summary.bytes, 15);
        assert_eq!(fs::read(root.join("report.pdf")).unwrap(), b"%PDF-1.7 report");
    }

    #[tokio::test]
    async fn test_existing_file_is_not_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("downloads");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("report.pdf"), b"old").unwrap();

        let drive = FakeDrive::default().file(FILE_ID, "report.pdf", b"new");
        let downloader = downloader(drive, &root);

        let summary = downloader.download(FILE_ID).await.unwrap();
        assert_eq!(summary.path, root.join("report_1.pdf"));

        let again = downloader.download(FILE_ID).await.unwrap();
        assert_eq!(again.path, root.join("report_2.pdf"));

        assert_eq!(fs::read(root.join("report.pdf")).unwrap(), b"old");
        assert_eq!(fs::read(root.join("report_1.pdf")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_empty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let drive = FakeDrive::default().file(FILE_ID, "empty.txt", b"");
        let downloader = downloader(drive, tmp.path());

        let summary = downloader.download(FILE_ID).await.unwrap();

        assert_eq!(summary.bytes, 0);
        assert!(tmp.path().join("empty.txt").is_file());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let downloader = downloader(FakeDrive::default(), tmp.path());

        let err = downloader.download("nope").await.unwrap_err();

        assert!(matches!(err, DriveError::NotFound(ref id) if id == "nope"));
    }
}

mod folders {
    use super::*;

    #[tokio::test]
    async fn test_folder_tree_is_mirrored() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("downloads");
        let downloader = downloader(photos_drive(), &root);

        let summary = downloader.download(PHOTOS_ID).await.unwrap();

        assert_eq!(summary.path, root.join("Photos"));
        assert_eq!(summary.files, 2);
        assert_eq!(summary.folders, 2);
        assert_eq!(fs::read(root.join("Photos/2024/a.jpg")).unwrap(), b"jpeg a");
        assert_eq!(fs::read(root.join("Photos/b.jpg")).unwrap(), b"jpeg b");
    }

    #[tokio::test]
    async fn test_depth_first_listing_order() {
        let tmp = tempfile::tempdir().unwrap();
        let downloader = downloader(photos_drive(), tmp.path());

        downloader.download(PHOTOS_ID).await.unwrap();

        assert_eq!(
            downloader.api().calls(),
            vec![
                format!("get {}", PHOTOS_ID),
                format!("list {} None", PHOTOS_ID),
                format!("list {} None", YEAR_ID),
                "media a-jpg".to_string(),
                "media b-jpg".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_names_in_folder_are_deconflicted() {
        let tmp = tempfile::tempdir().unwrap();
        let drive = FakeDrive::default()
            .folder(PHOTOS_ID, "Photos", &[&["one", "two"]])
            .file("one", "same.txt", b"first")
            .file("two", "same.txt", b"second");
        let downloader = downloader(drive, tmp.path());

        downloader.download(PHOTOS_ID).await.unwrap();

        assert_eq!(fs::read(tmp.path().join("Photos/same.txt")).unwrap(), b"first");
        assert_eq!(fs::read(tmp.path().join("Photos/same_1.txt")).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_empty_folder_still_created() {
        let tmp = tempfile::tempdir().unwrap();
        let drive = FakeDrive::default().folder(PHOTOS_ID, "Empty", &[&[]]);
        let downloader = downloader(drive, tmp.path());

        let summary = downloader.download(PHOTOS_ID).await.unwrap();

        assert_eq!(summary.files, 0);
        assert!(tmp.path().join("Empty").is_dir());
    }

    #[tokio::test]
    async fn test_failure_aborts_without_rollback() {
        let tmp = tempfile::tempdir().unwrap();
        let drive = FakeDrive::default()
            .folder(PHOTOS_ID, "Photos", &[&["f1", "f2", "f3"]])
            .file("f1", "one.txt", b"one")
            .file("f2", "two.txt", b"two")
            .file("f3", "three.txt", b"three")
            .broken("f2");
        let downloader = downloader(drive, tmp.path());

        let err = downloader.download(PHOTOS_ID).await.unwrap_err();

        assert!(matches!(err, DriveError::ApiError { status: 500, .. }));
        assert_eq!(fs::read(tmp.path().join("Photos/one.txt")).unwrap(), b"one");
        assert!(!tmp.path().join("Photos/three.txt").exists());

        let calls = downloader.api().calls();
        assert!(calls.contains(&"media f2".to_string()));
        assert!(!calls.contains(&"media f3".to_string()));
    }

    #[tokio::test]
    async fn test_cycle_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let drive = FakeDrive::default()
            .folder(PHOTOS_ID, "Photos", &[&[YEAR_ID]])
            .folder(YEAR_ID, "2024", &[&[PHOTOS_ID]]);
        let downloader = downloader(drive, tmp.path());

        let err = downloader.download(PHOTOS_ID).await.unwrap_err();

        assert!(matches!(err, DriveError::FolderCycle(ref id) if id == PHOTOS_ID));
    }

    #[tokio::test]
    async fn test_separator_in_remote_name_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let drive = FakeDrive::default()
            .folder(PHOTOS_ID, "Photos", &[&["evil"]])
            .file("evil", "../escape.txt", b"x");
        let downloader = downloader(drive, tmp.path());

        let err = downloader.download(PHOTOS_ID).await.unwrap_err();

        assert!(matches!(err, DriveError::InvalidName(_)));
        assert!(!tmp.path().join("escape.txt").exists());
    }
}

mod resolver {
    use super::*;

    #[tokio::test]
    async fn test_pagination_concatenates_pages() {
        let drive = FakeDrive::default()
            .folder(PHOTOS_ID, "Photos", &[&["p1a", "p1b"], &["p2a"], &["p3a", "p3b"]])
            .file("p1a", "1a", b"")
            .file("p1b", "1b", b"")
            .file("p2a", "2a", b"")
            .file("p3a", "3a", b"")
            .file("p3b", "3b", b"");

        let children = list_children(&drive, PHOTOS_ID).await.unwrap();

        let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["1a", "1b", "2a", "3a", "3b"]);
        assert_eq!(
            drive.calls(),
            vec![
                format!("list {} None", PHOTOS_ID),
                format!("list {} Some(\"1\")", PHOTOS_ID),
                format!("list {} Some(\"2\")", PHOTOS_ID),
            ]
        );
    }

    #[tokio::test]
    async fn test_metadata_is_not_cached() {
        let drive = photos_drive();

        assert!(is_folder(&drive, PHOTOS_ID).await.unwrap());
        let metadata = get_metadata(&drive, PHOTOS_ID).await.unwrap();
        assert_eq!(metadata.name, "Photos");
        assert_eq!(metadata.size, None);

        let gets = drive.calls().iter().filter(|c| c.starts_with("get ")).count();
        assert_eq!(gets, 2);
    }

    #[tokio::test]
    async fn test_file_is_not_folder() {
        let drive = photos_drive();
        assert!(!is_folder(&drive, "a-jpg").await.unwrap());
    }
}
