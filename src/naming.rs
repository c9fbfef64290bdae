//! Local file naming: collision-free paths and remote name checks.

use std::ffi::OsString;
use std::path::{is_separator, Path, PathBuf};

use crate::error::{DriveError, Result};

/// Return `desired` if nothing exists there, otherwise the first free
/// `stem_N.ext` sibling, counting up from 1.
///
/// The check is not atomic; callers write sequentially.
pub fn unique_path(desired: &Path) -> PathBuf {
    if !desired.exists() {
        return desired.to_path_buf();
    }

    let stem = desired.file_stem().unwrap_or_default();
    let ext = desired.extension();
    let parent = desired.parent().unwrap_or(Path::new(""));

    let mut counter: u64 = 1;
    loop {
        let mut name = OsString::from(stem);
        name.push(format!("_{}", counter));
        if let Some(ext) = ext {
            name.push(".");
            name.push(ext);
        }

        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Reject remote names that would not stay a single path segment.
///
/// Anything else is mirrored verbatim, even if the local filesystem
/// later refuses it.
pub fn validate_name(name: &str) -> Result<&str> {
    if name.is_empty() || name == "." || name == ".." || name.chars().any(is_separator) {
        return Err(DriveError::InvalidName(name.to_string()));
    }
    Ok(name)
}
