//! Native runtime implementation backed by `tokio::fs`.

use async_trait::async_trait;
use std::path::Path;

use super::{DirectoryEntry, DirectoryReader, Runtime, RuntimeError, RuntimeResult};

/// Runtime that reads from the local filesystem.
///
/// # Example
///
/// ```rust,no_run
/// use docs_infra_loader::runtime::{DirectoryReader, NativeRuntime};
/// use std::path::Path;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let runtime = NativeRuntime::new();
/// let entries = runtime.read_dir(Path::new("/tmp")).await?;
/// println!("{} entries", entries.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

fn map_io_error(path: &Path, err: std::io::Error, action: &str) -> RuntimeError {
    match err.kind() {
        std::io::ErrorKind::NotFound => RuntimeError::FileNotFound(path.to_path_buf()),
        std::io::ErrorKind::NotADirectory => RuntimeError::NotADirectory(path.to_path_buf()),
        _ => RuntimeError::Io(format!("Failed to {} {}: {}", action, path.display(), err)),
    }
}

#[async_trait]
impl DirectoryReader for NativeRuntime {
    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<DirectoryEntry>> {
        let mut reader = tokio::fs::read_dir(path)
            .await
            .map_err(|e| map_io_error(path, e, "read directory"))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| map_io_error(path, e, "read directory"))?
        {
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };

            // Follow symlinks so a linked file still counts as a file.
            let (is_file, is_directory) = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => (meta.is_file(), meta.is_dir()),
                Err(_) => match entry.file_type().await {
                    Ok(ft) => (ft.is_file(), ft.is_dir()),
                    Err(_) => continue,
                },
            };

            entries.push(DirectoryEntry {
                name,
                is_file,
                is_directory,
            });
        }

        Ok(entries)
    }
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| map_io_error(path, e, "read"))
    }
}
