//! Metadata resolution and folder listing on top of [`DriveApi`].

use tracing::{debug, warn};

use crate::client::DriveApi;
use crate::error::Result;
use crate::models::ResourceMetadata;

/// Resolve an ID to a typed metadata snapshot. Never cached.
pub async fn get_metadata(api: &dyn DriveApi, id: &str) -> Result<ResourceMetadata> {
    let metadata = api.get_metadata(id).await?;
    if metadata.id != id {
        // Shortcuts and moved items can answer with a different canonical ID.
        warn!("Requested {} but the provider answered with {}", id, metadata.id);
    }
    Ok(metadata.into())
}

/// Check whether an ID names a folder.
pub async fn is_folder(api: &dyn DriveApi, id: &str) -> Result<bool> {
    Ok(get_metadata(api, id).await?.is_folder())
}

/// List every direct child of a folder, in the order the provider returns them.
///
/// Pages are fetched one at a time until the provider stops handing out a
/// continuation token; the whole listing is held in memory.
pub async fn list_children(api: &dyn DriveApi, folder_id: &str) -> Result<Vec<ResourceMetadata>> {
    let mut children = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = api.list_page(folder_id, page_token.as_deref()).await?;
        pages += 1;
        debug!("Folder {} page {}: {} item(s)", folder_id, pages, page.files.len());
        children.extend(page.files.into_iter().map(ResourceMetadata::from));

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(children)
}
