//! Import extraction.
//!
//! The loader only needs to know which relative modules a file pulls in.
//! JS/TS sources are parsed with Oxc so that strings and comments that merely
//! look like imports are ignored; everything else (CSS, MDX, unknown
//! extensions) goes through the textual specifier scanner.

use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, CallExpression, Expression, ImportExpression, ModuleDeclaration, StringLiteral,
};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::{Parser, ParserReturn};
use oxc_span::SourceType;
use rustc_hash::FxHashSet;

use crate::rewrite::{SpecifierKind, SpecifierSpan, is_relative_specifier, scan_specifiers};

/// Extensions parsed as JavaScript/TypeScript.
const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Failed to parse '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

/// Finds the imports of a file.
pub trait ImportExtractor: Send + Sync + std::fmt::Debug {
    /// Every specifier occurrence, bare ones included, with the byte span of
    /// its text (quotes excluded), sorted by position.
    fn locate(&self, source: &str, path: &Path) -> Result<Vec<SpecifierSpan>, ExtractError>;

    /// Relative specifiers (`./x`, `../x`) in source order, without duplicates.
    fn extract(&self, source: &str, path: &Path) -> Result<Vec<String>, ExtractError> {
        let spans = self.locate(source, path)?;
        Ok(relative_unique(spans.into_iter().map(|s| s.specifier)))
    }
}

/// Default extractor: Oxc for scripts, textual scanning for everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceImportExtractor;

impl SourceImportExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ImportExtractor for SourceImportExtractor {
    fn locate(&self, source: &str, path: &Path) -> Result<Vec<SpecifierSpan>, ExtractError> {
        let is_script = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext));

        if is_script {
            locate_script(source, path)
        } else {
            Ok(scan_specifiers(source))
        }
    }
}

/// Relative specifiers only, first occurrence wins.
pub(crate) fn relative_unique(specifiers: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = FxHashSet::default();
    specifiers
        .into_iter()
        .filter(|s| is_relative_specifier(s))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// The specifier text of a string literal, quotes excluded.
fn literal_span(lit: &StringLiteral<'_>, kind: SpecifierKind) -> SpecifierSpan {
    let start = lit.span.start as usize + 1;
    let end = (lit.span.end as usize).saturating_sub(1).max(start);
    SpecifierSpan {
        specifier: lit.value.to_string(),
        span: start..end,
        kind,
    }
}

/// Collects `import()` and `require()` targets anywhere in the tree.
#[derive(Default)]
struct CallCollector {
    spans: Vec<SpecifierSpan>,
}

impl<'a> Visit<'a> for CallCollector {
    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &expr.source {
            self.spans.push(literal_span(lit, SpecifierKind::Dynamic));
        }
        walk::walk_import_expression(self, expr);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::Identifier(ident) = &call.callee {
            if ident.name.as_str() == "require" && call.arguments.len() == 1 {
                if let Some(Argument::StringLiteral(lit)) = call.arguments.first() {
                    self.spans.push(literal_span(lit, SpecifierKind::Require));
                }
            }
        }
        walk::walk_call_expression(self, call);
    }
}

fn locate_script(source: &str, path: &Path) -> Result<Vec<SpecifierSpan>, ExtractError> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::tsx());

    let ParserReturn {
        program,
        errors,
        panicked,
        ..
    } = Parser::new(&allocator, source, source_type).parse();

    if panicked || !errors.is_empty() {
        let message = errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "parser aborted".to_string());
        return Err(ExtractError::Parse {
            path: path.to_path_buf(),
            message,
        });
    }

    let mut found: Vec<SpecifierSpan> = Vec::new();
    for stmt in program.body.iter() {
        let Some(module_decl) = stmt.as_module_declaration() else {
            continue;
        };
        match module_decl {
            ModuleDeclaration::ImportDeclaration(import) => {
                found.push(literal_span(&import.source, SpecifierKind::Static));
            }
            ModuleDeclaration::ExportNamedDeclaration(named) => {
                if let Some(src) = &named.source {
                    found.push(literal_span(src, SpecifierKind::ReExport));
                }
            }
            ModuleDeclaration::ExportAllDeclaration(all) => {
                found.push(literal_span(&all.source, SpecifierKind::ReExport));
            }
            _ => {}
        }
    }

    let mut calls = CallCollector::default();
    calls.visit_program(&program);
    found.extend(calls.spans);

    found.sort_by_key(|s| s.span.start);
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_relative_script_imports_in_order() {
        let source = r#"
import React from 'react';
import { Button } from './Button';
import type { Theme } from '../theme/types';
export { helper } from './helpers';
export * from './constants';
const Lazy = React.lazy(() => import('./Lazy'));
const legacy = require('./legacy');
const again = require('./Button');
"#;
        let specifiers = SourceImportExtractor
            .extract(source, Path::new("/demo/Demo.tsx"))
            .unwrap();

        assert_eq!(
            specifiers,
            vec![
                "./Button",
                "../theme/types",
                "./helpers",
                "./constants",
                "./Lazy",
                "./legacy",
            ]
        );
    }

    #[test]
    fn test_ignores_imports_in_strings_and_comments() {
        let source = r#"
// import Hidden from './Hidden';
const text = "import Fake from './Fake'";
import Real from './Real';
"#;
        let specifiers = SourceImportExtractor
            .extract(source, Path::new("/demo/index.js"))
            .unwrap();
        assert_eq!(specifiers, vec!["./Real"]);
    }

    #[test]
    fn test_css_uses_scanner() {
        let source = concat!(
            "@import './base.css';\n",
            "@import url(https://cdn.example.com/a.css);\n",
            ".a { color: red; }",
        );
        let specifiers = SourceImportExtractor
            .extract(source, Path::new("/demo/styles.css"))
            .unwrap();
        assert_eq!(specifiers, vec!["./base.css"]);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = SourceImportExtractor
            .extract("import { from './broken'", Path::new("/demo/Broken.ts"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse { .. }));
        assert!(err.to_string().contains("Broken.ts"));
    }

    #[test]
    fn test_locate_spans_ignore_comments_inside_imports() {
        let source = concat!(
            "import {\n  Foo, // the widget\n} from '../shared/Foo';\n",
            "const Lazy = import(/* webpackChunkName: \"lazy\" */ '../shared/Lazy');\n",
        );
        let spans = SourceImportExtractor
            .locate(source, Path::new("/demo/Demo.tsx"))
            .unwrap();

        let located: Vec<(&str, SpecifierKind)> = spans
            .iter()
            .map(|s| (&source[s.span.clone()], s.kind))
            .collect();
        assert_eq!(
            located,
            vec![
                ("../shared/Foo", SpecifierKind::Static),
                ("../shared/Lazy", SpecifierKind::Dynamic),
            ]
        );
    }

    #[test]
    fn test_locate_keeps_bare_specifiers() {
        let spans = SourceImportExtractor
            .locate("import React from 'react';", Path::new("/demo/a.ts"))
            .unwrap();
        assert_eq!(spans[0].specifier, "react");
        assert_eq!(spans[0].kind, SpecifierKind::Static);
    }
}
