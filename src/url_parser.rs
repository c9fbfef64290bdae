//! Extraction of Google Drive IDs from share links and raw IDs.

use regex::Regex;
use std::sync::LazyLock;

/// Link shapes that carry an ID, tried in order.
static LINK_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        // File share link: .../file/d/<ID>/view
        Regex::new(r"/d/([a-zA-Z0-9_-]{20,})").expect("Invalid file link regex"),
        // Folder share link: .../drive/folders/<ID>
        Regex::new(r"/folders/([a-zA-Z0-9_-]{20,})").expect("Invalid folder link regex"),
        // Query parameter: ...open?id=<ID> or ...&id=<ID>
        Regex::new(r"[?&]id=([a-zA-Z0-9_-]{20,})").expect("Invalid query link regex"),
    ]
});

/// Any run of ID characters long enough to be a Drive ID.
static BARE_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9_-]{20,}").expect("Invalid token regex"));

/// Extract a Google Drive ID from a link or a raw ID.
///
/// Supports the following forms:
/// - `https://drive.google.com/file/d/<ID>/view`
/// - `https://drive.google.com/drive/folders/<ID>`
/// - `https://drive.google.com/open?id=<ID>` (also `&id=<ID>`)
/// - Raw ID string
///
/// Link-shaped matches win over the generic token search, so an unrelated
/// long token elsewhere in a URL is never picked first. When nothing
/// qualifies the trimmed input is returned as-is; a bad ID surfaces later
/// as a provider error.
///
/// # Examples
///
/// ```
/// use drive_fetch::url_parser::extract_id;
///
/// let id = extract_id("https://drive.google.com/drive/folders/1AbCdEfGhIjKlMnOpQrStUv");
/// assert_eq!(id, "1AbCdEfGhIjKlMnOpQrStUv");
///
/// assert_eq!(extract_id("  short-id "), "short-id");
/// ```
pub fn extract_id(url_or_id: &str) -> String {
    let trimmed = url_or_id.trim();

    for pattern in LINK_PATTERNS.iter() {
        if let Some(id) = pattern.captures(trimmed).and_then(|c| c.get(1)) {
            return id.as_str().to_string();
        }
    }

    match BARE_TOKEN_REGEX.find(trimmed) {
        Some(token) => token.as_str().to_string(),
        None => trimmed.to_string(),
    }
}
