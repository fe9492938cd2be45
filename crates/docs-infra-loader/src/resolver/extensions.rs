//! Extension and index-file probing against a directory listing.
//!
//! Probing works on a listing that was already read, so callers decide how
//! often a directory is touched. Only the index fallback needs a second read
//! (of the candidate directory itself).

use std::path::{Path, PathBuf};

use crate::runtime::{DirectoryEntry, DirectoryReader};

use super::ResolveError;

/// Default lookup order for extension-less specifiers.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx"];

/// Code extensions that are dropped from rewritten import specifiers.
pub const CODE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx"];

fn has_file(entries: &[DirectoryEntry], name: &str) -> bool {
    entries.iter().any(|e| e.is_file && e.name == name)
}

fn has_directory(entries: &[DirectoryEntry], name: &str) -> bool {
    entries.iter().any(|e| e.is_directory && e.name == name)
}

/// Try `name + ext` for each extension in order. The first hit wins,
/// whatever position the entries have in the listing.
pub fn try_extensions(
    dir: &Path,
    name: &str,
    entries: &[DirectoryEntry],
    extensions: &[String],
) -> Option<PathBuf> {
    // A specifier written with its extension (`./styles.css`) names the file directly.
    if Path::new(name).extension().is_some() && has_file(entries, name) {
        return Some(dir.join(name));
    }

    extensions
        .iter()
        .map(|ext| format!("{name}{ext}"))
        .find(|candidate| has_file(entries, candidate))
        .map(|candidate| dir.join(candidate))
}

/// Treat `dir/name` as a directory and try `index + ext` inside it.
pub async fn try_index_files<R: DirectoryReader + ?Sized>(
    dir: &Path,
    name: &str,
    entries: &[DirectoryEntry],
    extensions: &[String],
    reader: &R,
) -> Result<Option<PathBuf>, ResolveError> {
    if !has_directory(entries, name) {
        return Ok(None);
    }

    let index_dir = dir.join(name);
    let index_entries =
        reader
            .read_dir(&index_dir)
            .await
            .map_err(|source| ResolveError::DirectoryUnreadable {
                dir: index_dir.clone(),
                source,
            })?;

    Ok(extensions
        .iter()
        .map(|ext| format!("index{ext}"))
        .find(|candidate| has_file(&index_entries, candidate))
        .map(|candidate| index_dir.join(candidate)))
}

/// Resolve `dir/name` against an already-read listing of `dir`.
///
/// A direct file match always beats a directory index, even when the
/// directory entry comes first in the listing.
pub async fn resolve_in_listing<R: DirectoryReader + ?Sized>(
    base: &Path,
    dir: &Path,
    name: &str,
    entries: &[DirectoryEntry],
    extensions: &[String],
    reader: &R,
) -> Result<PathBuf, ResolveError> {
    if let Some(path) = try_extensions(dir, name, entries, extensions) {
        return Ok(path);
    }

    if let Some(path) = try_index_files(dir, name, entries, extensions, reader).await? {
        return Ok(path);
    }

    Err(ResolveError::ModuleNotFound {
        base: base.to_path_buf(),
        tried: extensions.to_vec(),
    })
}
