//! Flat file naming.
//!
//! Every loaded file ends up in one logical directory under its basename.
//! Two files collide when they would be imported through the same
//! specifier: `a/Foo.ts` and `b/Foo.tsx` both become `./Foo`. The first
//! file keeps its name; later ones get `<stem>-<n><ext>` with the smallest
//! free `n >= 2`.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::resolver::CODE_EXTENSIONS;

/// Split a file name into `(stem, extension, is_code)`.
fn split_name(name: &str) -> (&str, &str, bool) {
    for ext in CODE_EXTENSIONS {
        if let Some(stem) = name.strip_suffix(ext) {
            if !stem.is_empty() {
                return (stem, &name[stem.len()..], true);
            }
        }
    }
    match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], &name[i..], false),
        _ => (name, "", false),
    }
}

/// The specifier spelling a file gets once flattened (code extensions dropped).
fn import_key(name: &str) -> String {
    let (stem, _, is_code) = split_name(name);
    if is_code {
        stem.to_string()
    } else {
        name.to_string()
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Assign a collision-free flat name to each path, in order.
pub fn assign_flat_names(paths: &[PathBuf]) -> IndexMap<PathBuf, String> {
    let mut taken: FxHashSet<String> = FxHashSet::default();
    let mut names = IndexMap::with_capacity(paths.len());

    for path in paths {
        let name = basename(path);
        if taken.insert(import_key(&name)) {
            names.insert(path.clone(), name);
            continue;
        }

        let (stem, ext, _) = split_name(&name);
        let mut n = 2;
        let renamed = loop {
            let candidate = format!("{stem}-{n}{ext}");
            if taken.insert(import_key(&candidate)) {
                break candidate;
            }
            n += 1;
        };
        warn!(
            path = %path.display(),
            "flat name '{}' already used, renamed to '{}'",
            name,
            renamed
        );
        names.insert(path.clone(), renamed);
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(paths: &[&str]) -> Vec<String> {
        let paths: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
        assign_flat_names(&paths).into_values().collect()
    }

    #[test]
    fn test_unique_basenames_kept() {
        assert_eq!(
            names(&["/a/Demo.tsx", "/a/Foo.ts", "/b/styles.css"]),
            vec!["Demo.tsx", "Foo.ts", "styles.css"]
        );
    }

    #[test]
    fn test_same_basename_disambiguated() {
        assert_eq!(
            names(&["/a/Demo.tsx", "/a/utils.ts", "/b/utils.ts", "/c/utils.ts"]),
            vec!["Demo.tsx", "utils.ts", "utils-2.ts", "utils-3.ts"]
        );
    }

    #[test]
    fn test_code_extension_variants_collide() {
        assert_eq!(
            names(&["/a/Foo.ts", "/b/Foo.tsx"]),
            vec!["Foo.ts", "Foo-2.tsx"]
        );
    }

    #[test]
    fn test_non_code_extensions_are_distinct() {
        assert_eq!(
            names(&["/a/data.json", "/b/data.css", "/c/data.json"]),
            vec!["data.json", "data.css", "data-2.json"]
        );
    }

    #[test]
    fn test_entry_name_reserved() {
        assert_eq!(
            names(&["/a/index.ts", "/a/lib/index.ts"]),
            vec!["index.ts", "index-2.ts"]
        );
    }
}
