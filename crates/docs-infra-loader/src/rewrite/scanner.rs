//! Textual scanner for module specifiers.
//!
//! Finds the byte span of every specifier string in static imports,
//! `export ... from`, dynamic `import()`, `require()` and CSS `@import`
//! rules. Spans exclude the quotes so a rewrite only ever touches the
//! specifier text itself.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Where a specifier was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `import x from '...'`, `import '...'`
    Static,
    /// `export { x } from '...'`, `export * from '...'`
    ReExport,
    /// `import('...')`
    Dynamic,
    /// `require('...')`
    Require,
    /// CSS `@import '...'` / `@import url(...)`
    CssImport,
}

/// A specifier occurrence in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecifierSpan {
    pub specifier: String,
    pub span: Range<usize>,
    pub kind: SpecifierKind,
}

const QUOTED: &str = r#"(?:'([^'\n]*)'|"([^"\n]*)")"#;

static STATIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\bimport\s+(?:type\s+)?(?:[\w$*{{}}\s,]+?\s*from\s*)?{QUOTED}"
    ))
    .expect("static import pattern is valid")
});

static EXPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\bexport\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{{[^}}]*\}})\s*from\s*{QUOTED}"
    ))
    .expect("export-from pattern is valid")
});

static DYNAMIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\bimport\s*\(\s*{QUOTED}\s*[,)]"))
        .expect("dynamic import pattern is valid")
});

static REQUIRE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\brequire\s*\(\s*{QUOTED}\s*\)")).expect("require pattern is valid")
});

static CSS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"@import\s+(?:"#,
        r#"url\(\s*(?:'([^'\n]*)'|"([^"\n]*)"|([^'"\s)]+))\s*\)"#,
        r#"|'([^'\n]*)'|"([^"\n]*)")"#,
    ))
    .expect("css import pattern is valid")
});

/// First participating capture group (the specifier without quotes).
fn specifier_group<'s>(caps: &Captures<'s>) -> Option<regex::Match<'s>> {
    (1..caps.len()).find_map(|i| caps.get(i))
}

/// `foo.import(...)` and `obj.require(...)` are method calls, not module loads.
fn is_member_call(source: &str, keyword_start: usize) -> bool {
    source[..keyword_start]
        .chars()
        .next_back()
        .is_some_and(|c| c == '.')
}

fn collect(
    source: &str,
    pattern: &Regex,
    kind: SpecifierKind,
    check_member: bool,
    out: &mut Vec<SpecifierSpan>,
) {
    for caps in pattern.captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if check_member && is_member_call(source, whole.start()) {
            continue;
        }
        if let Some(m) = specifier_group(&caps) {
            out.push(SpecifierSpan {
                specifier: m.as_str().to_string(),
                span: m.range(),
                kind,
            });
        }
    }
}

/// Scan `source` for module specifiers, sorted by position.
///
/// When two patterns report the same span (`@import './a.css'` looks like a
/// side-effect import too) the first kind found is kept.
pub fn scan_specifiers(source: &str) -> Vec<SpecifierSpan> {
    let mut spans = Vec::new();
    collect(source, &CSS_IMPORT, SpecifierKind::CssImport, false, &mut spans);
    collect(source, &STATIC_IMPORT, SpecifierKind::Static, true, &mut spans);
    collect(source, &EXPORT_FROM, SpecifierKind::ReExport, false, &mut spans);
    collect(source, &DYNAMIC_IMPORT, SpecifierKind::Dynamic, true, &mut spans);
    collect(source, &REQUIRE_CALL, SpecifierKind::Require, true, &mut spans);

    spans.sort_by_key(|s| (s.span.start, s.span.end));

    let mut result: Vec<SpecifierSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        match result.last() {
            Some(prev) if span.span.start < prev.span.end => continue,
            _ => result.push(span),
        }
    }
    result
}
