//! Module path resolution.
//!
//! Turns an extension-less base path (`/src/components/Button`) into the file
//! that backs it by looking at directory listings instead of stat-ing every
//! candidate:
//!
//! 1. List the parent directory of the base path
//! 2. Try `<name><ext>` for each configured extension, in order
//! 3. Fall back to `<name>/index<ext>` when `<name>` is a directory
//!
//! [`resolve_module_paths`] batches many lookups so each distinct parent
//! directory is listed at most once.

mod extensions;

pub use extensions::{
    CODE_EXTENSIONS, DEFAULT_EXTENSIONS, resolve_in_listing, try_extensions, try_index_files,
};

use futures::future::join_all;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::runtime::{DirectoryReader, RuntimeError};

/// Resolution failure for a single base path.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(
        "Could not resolve module at path '{}'. Tried extensions: {}",
        .base.display(),
        .tried.join(", ")
    )]
    ModuleNotFound { base: PathBuf, tried: Vec<String> },

    #[error("Failed to read directory '{}': {source}", .dir.display())]
    DirectoryUnreadable {
        dir: PathBuf,
        #[source]
        source: RuntimeError,
    },

    #[error("Invalid module path '{}': no parent directory or file name", .0.display())]
    InvalidPath(PathBuf),
}

/// Options for module resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Extensions tried in order, each including the leading dot.
    pub extensions: Vec<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl ResolveOptions {
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }
}

fn split_base(base: &Path) -> Result<(&Path, &str), ResolveError> {
    let dir = base
        .parent()
        .ok_or_else(|| ResolveError::InvalidPath(base.to_path_buf()))?;
    let name = base
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ResolveError::InvalidPath(base.to_path_buf()))?;
    Ok((dir, name))
}

/// Resolve a single base path to a concrete file.
///
/// # Errors
///
/// Returns [`ResolveError::DirectoryUnreadable`] when the parent directory
/// cannot be listed and [`ResolveError::ModuleNotFound`] (listing every
/// extension tried) when no candidate exists.
pub async fn resolve_module_path<R: DirectoryReader + ?Sized>(
    base: &Path,
    reader: &R,
    options: &ResolveOptions,
) -> Result<PathBuf, ResolveError> {
    let (dir, name) = split_base(base)?;
    let entries = reader
        .read_dir(dir)
        .await
        .map_err(|source| ResolveError::DirectoryUnreadable {
            dir: dir.to_path_buf(),
            source,
        })?;

    resolve_in_listing(base, dir, name, &entries, &options.extensions, reader).await
}

/// Resolve many base paths, listing each parent directory at most once.
///
/// Paths that fail to resolve (or whose directory cannot be read) are left
/// out of the returned map; absence means failure. The map keeps the input
/// order.
pub async fn resolve_module_paths<R: DirectoryReader + ?Sized>(
    bases: &[PathBuf],
    reader: &R,
    options: &ResolveOptions,
) -> IndexMap<PathBuf, PathBuf> {
    let mut by_dir: IndexMap<&Path, Vec<&Path>> = IndexMap::new();
    for base in bases {
        match split_base(base) {
            Ok((dir, _)) => {
                let group = by_dir.entry(dir).or_default();
                if !group.contains(&base.as_path()) {
                    group.push(base.as_path());
                }
            }
            Err(err) => debug!("skipping {}: {}", base.display(), err),
        }
    }

    let groups = by_dir.into_iter().map(|(dir, group)| async move {
        let entries = match reader.read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %dir.display(), "directory unreadable: {}", err);
                return Vec::new();
            }
        };

        let mut resolved = Vec::with_capacity(group.len());
        for base in group {
            let Ok((_, name)) = split_base(base) else {
                continue;
            };
            match resolve_in_listing(base, dir, name, &entries, &options.extensions, reader).await
            {
                Ok(path) => resolved.push((base.to_path_buf(), path)),
                Err(err) => debug!("{}", err),
            }
        }
        resolved
    });

    let mut results: IndexMap<PathBuf, PathBuf> =
        join_all(groups).await.into_iter().flatten().collect();

    // Restore caller order (groups interleave paths from different directories).
    let mut ordered = IndexMap::with_capacity(results.len());
    for base in bases {
        if let Some(path) = results.shift_remove(base) {
            ordered.insert(base.clone(), path);
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::test_utils::MemoryRuntime;

    fn project() -> MemoryRuntime {
        MemoryRuntime::with_files([
            ("/p/src/Button.tsx", ""),
            ("/p/src/Button/index.ts", ""),
            ("/p/src/utils.js", ""),
            ("/p/src/utils.ts", ""),
            ("/p/src/hooks/index.jsx", ""),
            ("/p/src/styles.css", ""),
            ("/p/src/data.json", ""),
        ])
    }

    #[tokio::test]
    async fn test_direct_file_beats_index_even_when_directory_listed_first() {
        let mut runtime = project();
        runtime.set_listing_order("/p/src", &["Button", "Button.tsx"]);

        let resolved = resolve_module_path(
            Path::new("/p/src/Button"),
            &runtime,
            &ResolveOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(resolved, PathBuf::from("/p/src/Button.tsx"));
    }

    #[tokio::test]
    async fn test_extension_order_wins_over_listing_order() {
        let mut runtime = project();
        runtime.set_listing_order("/p/src", &["utils.js", "utils.ts"]);

        let ts_first = resolve_module_path(
            Path::new("/p/src/utils"),
            &runtime,
            &ResolveOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(ts_first, PathBuf::from("/p/src/utils.ts"));

        let js_first = resolve_module_path(
            Path::new("/p/src/utils"),
            &runtime,
            &ResolveOptions::with_extensions([".js", ".ts"]),
        )
        .await
        .unwrap();
        assert_eq!(js_first, PathBuf::from("/p/src/utils.js"));
    }

    #[tokio::test]
    async fn test_index_fallback() {
        let runtime = project();
        let resolved = resolve_module_path(
            Path::new("/p/src/hooks"),
            &runtime,
            &ResolveOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(resolved, PathBuf::from("/p/src/hooks/index.jsx"));
    }

    #[tokio::test]
    async fn test_explicit_extension_matches_exact_file() {
        let runtime = project();
        let css = resolve_module_path(
            Path::new("/p/src/styles.css"),
            &runtime,
            &ResolveOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(css, PathBuf::from("/p/src/styles.css"));
    }

    #[tokio::test]
    async fn test_not_found_lists_extensions() {
        let runtime = project();
        let err = resolve_module_path(
            Path::new("/p/src/Missing"),
            &runtime,
            &ResolveOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ResolveError::ModuleNotFound { .. }));
        let msg = err.to_string();
        assert!(msg.contains("/p/src/Missing"));
        assert!(msg.contains(".ts, .tsx, .js, .jsx"));
    }

    #[tokio::test]
    async fn test_unreadable_directory_fails() {
        let mut runtime = project();
        runtime.mark_unreadable("/p/src");
        let err = resolve_module_path(
            Path::new("/p/src/utils"),
            &runtime,
            &ResolveOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ResolveError::DirectoryUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_batch_reads_shared_directory_once() {
        let runtime = project();
        let bases = vec![
            PathBuf::from("/p/src/Button"),
            PathBuf::from("/p/src/utils"),
            PathBuf::from("/p/src/styles.css"),
            PathBuf::from("/p/src/data.json"),
        ];

        let resolved = resolve_module_paths(&bases, &runtime, &ResolveOptions::default()).await;

        assert_eq!(resolved.len(), 4);
        assert_eq!(runtime.dir_reads("/p/src"), 1);
        assert_eq!(runtime.total_dir_reads(), 1);
    }

    #[tokio::test]
    async fn test_batch_omits_failures_and_keeps_order() {
        let runtime = project();
        let bases = vec![
            PathBuf::from("/p/src/utils"),
            PathBuf::from("/p/missing-dir/thing"),
            PathBuf::from("/p/src/Nope"),
            PathBuf::from("/p/src/Button"),
        ];

        let resolved = resolve_module_paths(&bases, &runtime, &ResolveOptions::default()).await;

        let keys: Vec<_> = resolved.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![PathBuf::from("/p/src/utils"), PathBuf::from("/p/src/Button")]
        );
        assert!(!resolved.contains_key(Path::new("/p/src/Nope")));
    }
}
