#![cfg_attr(docsrs, feature(doc_cfg))]

//! # docs-infra-loader
//!
//! Loads a documentation code sample ("variant") together with the relative
//! files it imports, and flattens them into a single logical directory.
//!
//! The pieces can be used on their own:
//!
//! - [`resolver`]: extension and index-file probing over directory listings,
//!   batched so each directory is read once
//! - [`rewrite`]: rewrites relative import specifiers in place
//! - [`extract`]: finds the relative imports of a file
//! - [`loader`]: the traversal that ties them together
//!
//! ```rust,no_run
//! use docs_infra_loader::{LoaderOptions, NativeRuntime, load_variant_code_with_dependencies};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), docs_infra_loader::LoadError> {
//! let loaded = load_variant_code_with_dependencies(
//!     Path::new("/repo/docs/demos/Button/Demo.tsx"),
//!     &NativeRuntime::new(),
//!     &LoaderOptions::default(),
//! )
//! .await?;
//! for name in &loaded.variant.files_order {
//!     println!("{name}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod extract;
pub mod loader;
pub mod resolver;
pub mod rewrite;
pub mod runtime;

pub use extract::{ExtractError, ImportExtractor, SourceImportExtractor};
pub use loader::{
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_FILES, LoadError, LoadedVariant, LoaderOptions, VariantCode,
    VariantExtraFile, VariantLoader, load_variant_code_with_dependencies,
};
pub use resolver::{ResolveError, ResolveOptions, resolve_module_path, resolve_module_paths};
pub use rewrite::{ImportPathMapping, RewriteTargets, SpecifierSpan, rewrite_imports, rewrite_spans};
pub use runtime::{DirectoryEntry, DirectoryReader, NativeRuntime, Runtime, RuntimeError};
