//! In-memory runtime for tests.
//!
//! `MemoryRuntime` holds a virtual file tree keyed by absolute path. Parent
//! directories are derived from the file paths, so registering
//! `/src/lib/index.ts` makes `/src` and `/src/lib` listable. Every
//! `read_dir` call is counted per directory, which lets tests assert that
//! batched resolution reads each directory only once.

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{DirectoryEntry, DirectoryReader, Runtime, RuntimeError, RuntimeResult};

#[derive(Debug, Default)]
pub struct MemoryRuntime {
    files: BTreeMap<PathBuf, String>,
    unreadable: FxHashSet<PathBuf>,
    listing_order: FxHashMap<PathBuf, Vec<String>>,
    dir_reads: Mutex<FxHashMap<PathBuf, usize>>,
    file_reads: Mutex<FxHashMap<PathBuf, usize>>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a runtime from `(absolute path, content)` pairs.
    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut runtime = Self::new();
        for (path, content) in files {
            runtime.add_file(path, content);
        }
        runtime
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    /// Make `read_file` (or `read_dir` for a directory) fail for `path`.
    pub fn mark_unreadable(&mut self, path: impl Into<PathBuf>) {
        self.unreadable.insert(path.into());
    }

    /// Force the listing order of a directory. Names not mentioned keep
    /// their default (sorted) position after the forced ones.
    pub fn set_listing_order(&mut self, dir: impl Into<PathBuf>, names: &[&str]) {
        self.listing_order
            .insert(dir.into(), names.iter().map(|n| n.to_string()).collect());
    }

    /// Number of `read_dir` calls made for `dir`.
    pub fn dir_reads(&self, dir: impl AsRef<Path>) -> usize {
        self.dir_reads
            .lock()
            .get(dir.as_ref())
            .copied()
            .unwrap_or(0)
    }

    /// Total `read_dir` calls across all directories.
    pub fn total_dir_reads(&self) -> usize {
        self.dir_reads.lock().values().sum()
    }

    /// Number of `read_file` calls made for `path`.
    pub fn file_reads(&self, path: impl AsRef<Path>) -> usize {
        self.file_reads
            .lock()
            .get(path.as_ref())
            .copied()
            .unwrap_or(0)
    }

    fn is_directory(&self, path: &Path) -> bool {
        self.files
            .keys()
            .any(|file| file != path && file.starts_with(path))
    }
}

#[async_trait]
impl DirectoryReader for MemoryRuntime {
    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<DirectoryEntry>> {
        *self.dir_reads.lock().entry(path.to_path_buf()).or_default() += 1;

        if self.unreadable.contains(path) {
            return Err(RuntimeError::Io(format!(
                "permission denied: {}",
                path.display()
            )));
        }
        if self.files.contains_key(path) {
            return Err(RuntimeError::NotADirectory(path.to_path_buf()));
        }
        if !self.is_directory(path) {
            return Err(RuntimeError::FileNotFound(path.to_path_buf()));
        }

        let mut entries: BTreeMap<String, DirectoryEntry> = BTreeMap::new();
        for file in self.files.keys() {
            let Ok(rest) = file.strip_prefix(path) else {
                continue;
            };
            let mut components = rest.components();
            let Some(first) = components.next() else {
                continue;
            };
            let name = first.as_os_str().to_string_lossy().to_string();
            let entry = if components.next().is_some() {
                DirectoryEntry::directory(name.clone())
            } else {
                DirectoryEntry::file(name.clone())
            };
            entries.entry(name).or_insert(entry);
        }

        let mut listing = Vec::with_capacity(entries.len());
        if let Some(order) = self.listing_order.get(path) {
            for name in order {
                if let Some(entry) = entries.remove(name) {
                    listing.push(entry);
                }
            }
        }
        listing.extend(entries.into_values());
        Ok(listing)
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<String> {
        *self.file_reads.lock().entry(path.to_path_buf()).or_default() += 1;

        if self.unreadable.contains(path) {
            return Err(RuntimeError::Io(format!(
                "permission denied: {}",
                path.display()
            )));
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }
}
