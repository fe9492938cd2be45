//! Import specifier rewriting for flattened file sets.
//!
//! Once an entry file and its dependencies are shown side by side in one
//! directory, every relative import has to point at a sibling. This module
//! rewrites only the specifier text of imports, re-exports, `require`
//! calls and CSS `@import` rules; every other byte of the source is kept.
//!
//! ```
//! use docs_infra_loader::rewrite::{rewrite_imports, ImportPathMapping};
//!
//! let mut mapping = ImportPathMapping::new();
//! mapping.insert("../shared/Foo", "./Foo.ts");
//!
//! let out = rewrite_imports("import Foo from '../shared/Foo';", &mapping);
//! assert_eq!(out, "import Foo from './Foo';");
//! ```

mod scanner;

pub use scanner::{SpecifierKind, SpecifierSpan, scan_specifiers};

use indexmap::IndexMap;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasher;

use crate::resolver::CODE_EXTENSIONS;

/// `true` for `./x` and `../x` specifiers.
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

fn is_external_url(specifier: &str) -> bool {
    specifier.starts_with("http://")
        || specifier.starts_with("https://")
        || specifier.starts_with("//")
}

/// Drop a trailing `.ts/.tsx/.js/.jsx`; other extensions are kept.
pub fn strip_code_extension(specifier: &str) -> &str {
    CODE_EXTENSIONS
        .iter()
        .find_map(|ext| specifier.strip_suffix(ext))
        .filter(|stem| !stem.is_empty() && !stem.ends_with('/'))
        .unwrap_or(specifier)
}

/// Something that knows the new spelling of an import specifier.
pub trait RewriteTargets {
    /// The replacement for `specifier`, or `None` to leave it untouched.
    fn target_for(&self, specifier: &str) -> Option<Cow<'_, str>>;
}

/// Original specifier → same-directory specifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPathMapping {
    entries: IndexMap<String, String>,
}

impl ImportPathMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.entries.insert(from.into(), to.into());
    }

    pub fn get(&self, specifier: &str) -> Option<&str> {
        self.entries.get(specifier).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for ImportPathMapping {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl RewriteTargets for ImportPathMapping {
    fn target_for(&self, specifier: &str) -> Option<Cow<'_, str>> {
        self.get(specifier).map(Cow::Borrowed)
    }
}

impl<S: BuildHasher> RewriteTargets for HashMap<String, String, S> {
    fn target_for(&self, specifier: &str) -> Option<Cow<'_, str>> {
        self.get(specifier).map(|s| Cow::Borrowed(s.as_str()))
    }
}

impl RewriteTargets for IndexMap<String, String> {
    fn target_for(&self, specifier: &str) -> Option<Cow<'_, str>> {
        self.get(specifier).map(|s| Cow::Borrowed(s.as_str()))
    }
}

/// A plain set of known specifiers: each member becomes `./<basename>`.
impl<S: BuildHasher> RewriteTargets for HashSet<String, S> {
    fn target_for(&self, specifier: &str) -> Option<Cow<'_, str>> {
        if !self.contains(specifier) {
            return None;
        }
        let name = specifier.rsplit('/').next().unwrap_or(specifier);
        Some(Cow::Owned(format!("./{name}")))
    }
}

impl<T: RewriteTargets + ?Sized> RewriteTargets for &T {
    fn target_for(&self, specifier: &str) -> Option<Cow<'_, str>> {
        (**self).target_for(specifier)
    }
}

/// Rewrite relative import specifiers found in `targets`.
///
/// Specifiers are located with the textual scanner. Bare package specifiers,
/// external URLs and relative specifiers missing from `targets` are left as
/// written. Code extensions are dropped from the new specifier; `.json`,
/// `.css` and friends are kept.
pub fn rewrite_imports<T: RewriteTargets + ?Sized>(source: &str, targets: &T) -> String {
    rewrite_spans(source, &scan_specifiers(source), targets)
}

/// Rewrite the specifiers at already-located `spans`.
///
/// `spans` must be sorted by position; overlapping spans are skipped. Use
/// this with the spans an [`ImportExtractor`](crate::ImportExtractor)
/// reports so rewriting sees exactly the imports that were followed.
pub fn rewrite_spans<T: RewriteTargets + ?Sized>(
    source: &str,
    spans: &[SpecifierSpan],
    targets: &T,
) -> String {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for span in spans {
        if span.span.start < cursor || span.span.end > source.len() {
            continue;
        }
        if !is_relative_specifier(&span.specifier) || is_external_url(&span.specifier) {
            continue;
        }
        let Some(target) = targets.target_for(&span.specifier) else {
            continue;
        };
        out.push_str(&source[cursor..span.span.start]);
        out.push_str(strip_code_extension(&target));
        cursor = span.span.end;
    }
    out.push_str(&source[cursor..]);
    out
}
