//! Variant loading with relative dependencies.
//!
//! Starting from an entry file, the loader follows relative imports, loads
//! every file it can reach within the depth and file budgets, and flattens
//! the result into one logical directory with imports rewritten to match.
//!
//! # Traversal
//!
//! Siblings at the same depth are resolved and read concurrently. A file is
//! claimed (inserted into the visited set) *before* it is read, so two
//! branches that discover the same dependency never both schedule it. The
//! visited set is only touched between awaits.
//!
//! # Limits
//!
//! - `max_depth`: files at depth `max_depth` are loaded but not expanded
//! - `max_files`: total loaded files, **entry included**
//!
//! Hitting a limit truncates silently; it is not an error.

mod flatten;
mod variant;

pub use flatten::assign_flat_names;
pub use variant::{LoadedVariant, VariantCode, VariantExtraFile};

use futures::future::{BoxFuture, join_all};
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use path_clean::PathClean;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::extract::{ImportExtractor, SourceImportExtractor, relative_unique};
use crate::resolver::{ResolveOptions, resolve_module_paths};
use crate::rewrite::{ImportPathMapping, SpecifierSpan, rewrite_spans};
use crate::runtime::{Runtime, RuntimeError};

/// Default maximum import depth followed from the entry.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Default maximum number of files in one variant (entry included).
pub const DEFAULT_MAX_FILES: usize = 50;

/// Errors that abort a load. Dependency failures never do; they become
/// warnings on the result.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read entry file '{}': {source}", .path.display())]
    EntryUnreadable {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },

    #[error("Invalid entry path '{}': expected a file path", .0.display())]
    InvalidEntry(PathBuf),
}

/// Options for [`load_variant_code_with_dependencies`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    pub max_depth: usize,
    pub max_files: usize,
    pub include_dependencies: bool,
    pub resolve: ResolveOptions,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_files: DEFAULT_MAX_FILES,
            include_dependencies: true,
            resolve: ResolveOptions::default(),
        }
    }
}

#[derive(Debug, Default)]
struct LoadState {
    /// Claimed files in discovery order; the entry is first.
    visited: IndexSet<PathBuf>,
    failed: FxHashSet<PathBuf>,
    sources: FxHashMap<PathBuf, String>,
    /// Per file: specifier as written → resolved absolute path.
    imports: FxHashMap<PathBuf, IndexMap<String, PathBuf>>,
    /// Per file: where the extractor found each specifier.
    locations: FxHashMap<PathBuf, Vec<SpecifierSpan>>,
    warnings: Vec<String>,
}

struct LoadContext<'a, R: ?Sized> {
    runtime: &'a R,
    extractor: &'a dyn ImportExtractor,
    options: &'a LoaderOptions,
    state: Mutex<LoadState>,
}

impl<'a, R: Runtime + ?Sized> LoadContext<'a, R> {
    fn warn_skip(&self, message: String) {
        warn!("{}", message);
        self.state.lock().warnings.push(message);
    }

    /// Expand `file`: resolve its imports, claim unvisited targets within
    /// budget, then read and expand the claimed ones concurrently.
    fn expand<'s>(&'s self, file: PathBuf, source: String, depth: usize) -> BoxFuture<'s, ()> {
        Box::pin(async move {
            if depth >= self.options.max_depth {
                return;
            }
            if self.state.lock().visited.len() >= self.options.max_files {
                return;
            }

            let spans = match self.extractor.locate(&source, &file) {
                Ok(spans) => spans,
                Err(err) => {
                    self.warn_skip(format!("Skipping imports of '{}': {}", file.display(), err));
                    return;
                }
            };
            let specifiers = relative_unique(spans.iter().map(|s| s.specifier.clone()));
            if specifiers.is_empty() {
                return;
            }

            let Some(dir) = file.parent() else {
                return;
            };
            let bases: Vec<PathBuf> = specifiers.iter().map(|s| dir.join(s).clean()).collect();
            let resolved = resolve_module_paths(&bases, self.runtime, &self.options.resolve).await;

            let claimed = {
                let mut state = self.state.lock();
                let mut file_imports = IndexMap::new();
                for (specifier, base) in specifiers.iter().zip(&bases) {
                    match resolved.get(base) {
                        Some(target) => {
                            file_imports.insert(specifier.clone(), target.clone());
                        }
                        None => debug!(
                            from = %file.display(),
                            "unresolved import '{}'", specifier
                        ),
                    }
                }

                let mut claimed = Vec::new();
                for target in file_imports.values() {
                    if state.visited.contains(target) {
                        continue;
                    }
                    if state.visited.len() >= self.options.max_files {
                        debug!(max_files = self.options.max_files, "file budget exhausted");
                        break;
                    }
                    state.visited.insert(target.clone());
                    claimed.push(target.clone());
                }
                state.imports.insert(file.clone(), file_imports);
                state.locations.insert(file.clone(), spans);
                claimed
            };

            let children = claimed.into_iter().map(|dep| async move {
                match self.runtime.read_file(&dep).await {
                    Ok(content) => {
                        self.state.lock().sources.insert(dep.clone(), content.clone());
                        self.expand(dep, content, depth + 1).await;
                    }
                    Err(err) => {
                        self.state.lock().failed.insert(dep.clone());
                        self.warn_skip(format!("Skipping dependency '{}': {}", dep.display(), err));
                    }
                }
            });
            join_all(children).await;
        })
    }
}

/// Loader with a configurable import extractor.
#[derive(Debug, Clone)]
pub struct VariantLoader {
    options: LoaderOptions,
    extractor: Arc<dyn ImportExtractor>,
}

impl VariantLoader {
    pub fn new(options: LoaderOptions) -> Self {
        Self {
            options,
            extractor: Arc::new(SourceImportExtractor),
        }
    }

    /// Replace the import extractor (e.g. with a bundler-aware one).
    pub fn with_extractor(mut self, extractor: Arc<dyn ImportExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Load `entry` and its relative dependencies.
    ///
    /// # Errors
    ///
    /// Only a missing or unreadable entry is fatal. Unreadable or unparsable
    /// dependencies are skipped and reported in [`LoadedVariant::warnings`].
    pub async fn load<R: Runtime + ?Sized>(
        &self,
        entry: &Path,
        runtime: &R,
    ) -> Result<LoadedVariant, LoadError> {
        let entry = entry.clean();
        if entry.file_name().is_none() {
            return Err(LoadError::InvalidEntry(entry));
        }

        let entry_source =
            runtime
                .read_file(&entry)
                .await
                .map_err(|source| LoadError::EntryUnreadable {
                    path: entry.clone(),
                    source,
                })?;

        if !self.options.include_dependencies {
            let flat = assign_flat_names(std::slice::from_ref(&entry));
            let file_name = flat.get(&entry).cloned().unwrap_or_default();
            return Ok(LoadedVariant {
                variant: VariantCode {
                    file_name: file_name.clone(),
                    source: entry_source,
                    extra_files: IndexMap::new(),
                    files_order: vec![file_name],
                },
                visited_files: vec![entry],
                warnings: Vec::new(),
            });
        }

        let mut state = LoadState::default();
        state.visited.insert(entry.clone());
        state.sources.insert(entry.clone(), entry_source.clone());

        let context = LoadContext {
            runtime,
            extractor: self.extractor.as_ref(),
            options: &self.options,
            state: Mutex::new(state),
        };
        context.expand(entry.clone(), entry_source, 0).await;

        let state = context.state.into_inner();
        debug!(
            entry = %entry.display(),
            files = state.visited.len() - state.failed.len(),
            "variant dependencies collected"
        );
        Ok(flatten_variant(&entry, state))
    }
}

/// Build the flattened variant from a finished traversal.
fn flatten_variant(entry: &Path, mut state: LoadState) -> LoadedVariant {
    let loaded: Vec<PathBuf> = state
        .visited
        .iter()
        .filter(|p| !state.failed.contains(*p) && state.sources.contains_key(*p))
        .cloned()
        .collect();
    let flat_names = assign_flat_names(&loaded);

    let mut rewritten: IndexMap<PathBuf, String> = IndexMap::with_capacity(loaded.len());
    for path in &loaded {
        let source = state.sources.remove(path).unwrap_or_default();
        let mapping: ImportPathMapping = state
            .imports
            .get(path)
            .into_iter()
            .flatten()
            .filter_map(|(specifier, target)| {
                flat_names
                    .get(target)
                    .map(|name| (specifier.clone(), format!("./{name}")))
            })
            .collect();
        let spans = state.locations.get(path).map(Vec::as_slice).unwrap_or_default();
        let source = if mapping.is_empty() {
            source
        } else {
            rewrite_spans(&source, spans, &mapping)
        };
        rewritten.insert(path.clone(), source);
    }

    let file_name = flat_names.get(entry).cloned().unwrap_or_default();
    let source = rewritten.shift_remove(entry).unwrap_or_default();
    let extra_files: IndexMap<String, VariantExtraFile> = rewritten
        .into_iter()
        .filter_map(|(path, source)| {
            flat_names
                .get(&path)
                .map(|name| (name.clone(), VariantExtraFile { source }))
        })
        .collect();

    let mut files_order = Vec::with_capacity(extra_files.len() + 1);
    files_order.push(file_name.clone());
    files_order.extend(extra_files.keys().cloned());

    LoadedVariant {
        variant: VariantCode {
            file_name,
            source,
            extra_files,
            files_order,
        },
        visited_files: loaded,
        warnings: state.warnings,
    }
}

/// Load `entry` with the default import extractor.
///
/// # Example
///
/// ```rust,no_run
/// use docs_infra_loader::{LoaderOptions, NativeRuntime, load_variant_code_with_dependencies};
/// use std::path::Path;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let loaded = load_variant_code_with_dependencies(
///     Path::new("/docs/demos/Button/Demo.tsx"),
///     &NativeRuntime::new(),
///     &LoaderOptions::default(),
/// )
/// .await?;
/// println!("{:?}", loaded.variant.files_order);
/// # Ok(())
/// # }
/// ```
pub async fn load_variant_code_with_dependencies<R: Runtime + ?Sized>(
    entry: &Path,
    runtime: &R,
    options: &LoaderOptions,
) -> Result<LoadedVariant, LoadError> {
    VariantLoader::new(options.clone()).load(entry, runtime).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::test_utils::MemoryRuntime;

    async fn load(runtime: &MemoryRuntime, entry: &str, options: LoaderOptions) -> LoadedVariant {
        load_variant_code_with_dependencies(Path::new(entry), runtime, &options)
            .await
            .unwrap()
    }

    fn visited(loaded: &LoadedVariant) -> Vec<String> {
        loaded
            .visited_files
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_shared_dependency_flattened_and_rewritten() {
        let runtime = MemoryRuntime::with_files([
            ("/docs/demo/Demo.tsx", "import Foo from '../shared/Foo';\nexport default Foo;\n"),
            ("/docs/shared/Foo.ts", "export default 1;\n"),
        ]);

        let loaded = load(&runtime, "/docs/demo/Demo.tsx", LoaderOptions::default()).await;

        assert_eq!(
            visited(&loaded),
            vec!["/docs/demo/Demo.tsx", "/docs/shared/Foo.ts"]
        );
        assert_eq!(
            loaded.variant.source,
            "import Foo from './Foo';\nexport default Foo;\n"
        );
        assert_eq!(loaded.variant.file_name, "Demo.tsx");
        assert_eq!(loaded.variant.files_order, vec!["Demo.tsx", "Foo.ts"]);
        assert_eq!(
            loaded.variant.extra_files["Foo.ts"].source,
            "export default 1;\n"
        );
    }

    #[tokio::test]
    async fn test_cycle_terminates_with_each_file_once() {
        let runtime = MemoryRuntime::with_files([
            ("/p/A.ts", "import { b } from './B';\nexport const a = 1;\n"),
            ("/p/B.ts", "import { a } from './A';\nexport const b = 2;\n"),
        ]);

        let loaded = load(&runtime, "/p/A.ts", LoaderOptions::default()).await;

        assert_eq!(visited(&loaded), vec!["/p/A.ts", "/p/B.ts"]);
        assert_eq!(runtime.file_reads("/p/A.ts"), 1);
        assert_eq!(runtime.file_reads("/p/B.ts"), 1);
        assert_eq!(
            loaded.variant.extra_files["B.ts"].source,
            "import { a } from './A';\nexport const b = 2;\n"
        );
    }

    #[tokio::test]
    async fn test_max_depth_one_stops_after_direct_imports() {
        let runtime = MemoryRuntime::with_files([
            ("/p/A.ts", "import './B';"),
            ("/p/B.ts", "import './C';"),
            ("/p/C.ts", "export {};"),
        ]);
        let options = LoaderOptions {
            max_depth: 1,
            ..LoaderOptions::default()
        };

        let loaded = load(&runtime, "/p/A.ts", options).await;

        assert_eq!(visited(&loaded), vec!["/p/A.ts", "/p/B.ts"]);
        assert_eq!(runtime.file_reads("/p/C.ts"), 0);
        // C was never loaded, so B keeps its original import.
        assert_eq!(loaded.variant.extra_files["B.ts"].source, "import './C';");
    }

    #[tokio::test]
    async fn test_max_files_counts_entry() {
        let runtime = MemoryRuntime::with_files([
            ("/p/Entry.ts", "import './One';\nimport './Two';\nimport './Three';\n"),
            ("/p/One.ts", ""),
            ("/p/Two.ts", ""),
            ("/p/Three.ts", ""),
        ]);
        let options = LoaderOptions {
            max_files: 2,
            ..LoaderOptions::default()
        };

        let loaded = load(&runtime, "/p/Entry.ts", options).await;

        // Entry + exactly one dependency.
        assert_eq!(loaded.visited_files.len(), 2);
        assert_eq!(loaded.variant.extra_files.len(), 1);
        assert_eq!(visited(&loaded), vec!["/p/Entry.ts", "/p/One.ts"]);
    }

    #[tokio::test]
    async fn test_diamond_dependency_loaded_once() {
        let runtime = MemoryRuntime::with_files([
            ("/p/Entry.ts", "import './Left';\nimport './Right';\n"),
            ("/p/Left.ts", "import './Shared';"),
            ("/p/Right.ts", "import './Shared';"),
            ("/p/Shared.ts", "export const shared = true;"),
        ]);

        let loaded = load(&runtime, "/p/Entry.ts", LoaderOptions::default()).await;

        assert_eq!(loaded.visited_files.len(), 4);
        assert_eq!(runtime.file_reads("/p/Shared.ts"), 1);
    }

    #[tokio::test]
    async fn test_unreadable_dependency_is_skipped() {
        let mut runtime = MemoryRuntime::with_files([
            ("/p/Entry.ts", "import './Good';\nimport './Bad';\n"),
            ("/p/Good.ts", ""),
            ("/p/Bad.ts", ""),
        ]);
        runtime.mark_unreadable("/p/Bad.ts");

        let loaded = load(&runtime, "/p/Entry.ts", LoaderOptions::default()).await;

        assert_eq!(visited(&loaded), vec!["/p/Entry.ts", "/p/Good.ts"]);
        assert!(loaded.has_warnings());
        assert!(loaded.warnings[0].contains("Bad.ts"));
        assert_eq!(
            loaded.variant.source,
            "import './Good';\nimport './Bad';\n"
        );
    }

    #[tokio::test]
    async fn test_unparsable_dependency_keeps_file_but_skips_subtree() {
        let runtime = MemoryRuntime::with_files([
            ("/p/Entry.ts", "import './Broken';"),
            ("/p/Broken.ts", "import { from './Deeper'"),
            ("/p/Deeper.ts", ""),
        ]);

        let loaded = load(&runtime, "/p/Entry.ts", LoaderOptions::default()).await;

        assert_eq!(visited(&loaded), vec!["/p/Entry.ts", "/p/Broken.ts"]);
        assert_eq!(loaded.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_entry_is_fatal() {
        let runtime = MemoryRuntime::new();
        let err = load_variant_code_with_dependencies(
            Path::new("/p/Missing.ts"),
            &runtime,
            &LoaderOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LoadError::EntryUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_include_dependencies_false_returns_entry_only() {
        let runtime = MemoryRuntime::with_files([
            ("/p/Entry.ts", "import '../lib/Dep';"),
            ("/lib/Dep.ts", ""),
        ]);
        let options = LoaderOptions {
            include_dependencies: false,
            ..LoaderOptions::default()
        };

        let loaded = load(&runtime, "/p/Entry.ts", options).await;

        assert_eq!(visited(&loaded), vec!["/p/Entry.ts"]);
        assert_eq!(loaded.variant.source, "import '../lib/Dep';");
        assert!(loaded.variant.extra_files.is_empty());
    }

    #[tokio::test]
    async fn test_basename_collision_disambiguated_and_rewritten() {
        let runtime = MemoryRuntime::with_files([
            (
                "/p/demo/Demo.tsx",
                "import a from '../a/utils';\nimport b from '../b/utils';\n",
            ),
            ("/p/a/utils.ts", "export default 'a';"),
            ("/p/b/utils.ts", "import c from './helpers/utils';\nexport default c;"),
            ("/p/b/helpers/utils.js", "export default 'c';"),
        ]);

        let loaded = load(&runtime, "/p/demo/Demo.tsx", LoaderOptions::default()).await;

        assert_eq!(loaded.visited_files.len(), 4);
        assert_eq!(
            loaded.variant.source,
            "import a from './utils';\nimport b from './utils-2';\n"
        );
        assert_eq!(
            loaded.variant.extra_files["utils-2.ts"].source,
            "import c from './utils-3';\nexport default c;"
        );
        assert!(loaded.variant.extra_files.contains_key("utils-3.js"));
    }

    #[tokio::test]
    async fn test_css_dependencies_followed() {
        let runtime = MemoryRuntime::with_files([
            ("/p/demo/Demo.tsx", "import '../styles/demo.css';"),
            ("/p/styles/demo.css", "@import './tokens.css';\n.demo {}"),
            ("/p/styles/tokens.css", ":root {}"),
        ]);

        let loaded = load(&runtime, "/p/demo/Demo.tsx", LoaderOptions::default()).await;

        assert_eq!(
            loaded.variant.files_order,
            vec!["Demo.tsx", "demo.css", "tokens.css"]
        );
        assert_eq!(loaded.variant.source, "import './demo.css';");
    }

    #[tokio::test]
    async fn test_imports_with_comments_rewritten() {
        let entry = "import {\n  Foo, // the widget\n} from '../shared/Foo';\n\
                     const Lazy = import(/* webpackChunkName: \"lazy\" */ '../shared/Lazy');\n";
        let runtime = MemoryRuntime::with_files([
            ("/docs/demo/Demo.tsx", entry),
            ("/docs/shared/Foo.ts", "export const Foo = 1;\n"),
            ("/docs/shared/Lazy.ts", "export default 2;\n"),
        ]);

        let loaded = load(&runtime, "/docs/demo/Demo.tsx", LoaderOptions::default()).await;

        assert_eq!(
            loaded.variant.files_order,
            vec!["Demo.tsx", "Foo.ts", "Lazy.ts"]
        );
        assert!(!loaded.variant.source.contains("../shared/"));
        assert!(loaded.variant.source.contains("} from './Foo';"));
        assert!(
            loaded
                .variant
                .source
                .contains("import(/* webpackChunkName: \"lazy\" */ './Lazy')")
        );
    }
}
