//! Go source access built on tree-sitter.
//!
//! [`GoFile`] owns a parsed file and exposes the handful of syntactic facts
//! gokart needs: the package clause, import specs and blocks, the `main`
//! function and trailing comments. Byte ranges are kept so callers can
//! splice edits into the original text without disturbing anything else.

pub mod constraints;
pub mod imports;

use std::ops::Range;
use std::path::{Path, PathBuf};

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

use crate::error::{Error, Result};

pub use constraints::BuildContext;

/// Tree-sitter query for import specs, standalone or grouped.
const IMPORT_QUERY: &str = r#"
(import_spec
  name: (_)? @alias
  path: (_) @path
) @spec
"#;

/// Tree-sitter query for the package clause.
const PACKAGE_QUERY: &str = r#"
(package_clause
  (package_identifier) @package_name
) @clause
"#;

/// The tree-sitter Go grammar.
pub fn language() -> Language {
    tree_sitter_go::LANGUAGE.into()
}

/// A position-carrying view of one syntax node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub bytes: Range<usize>,
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
}

impl Span {
    fn from_node(node: Node) -> Self {
        Self {
            bytes: node.byte_range(),
            start_row: node.start_position().row,
            start_col: node.start_position().column,
            end_row: node.end_position().row,
        }
    }
}

/// The `package` clause of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageClause {
    pub name: String,
    pub name_span: Span,
    pub clause_span: Span,
}

/// One import spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Alias as written (`f`, `.` or `_`), if any.
    pub alias: Option<String>,
    /// Unquoted import path.
    pub path: String,
    /// Span of the quoted path literal.
    pub path_span: Span,
    /// Span of the whole spec.
    pub spec_span: Span,
}

/// A parenthesized `import ( ... )` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBlock {
    /// Span of the `import_spec_list` node, parentheses included.
    pub span: Span,
}

/// A comment node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub span: Span,
}

/// A parsed Go source file.
pub struct GoFile {
    path: PathBuf,
    source: String,
    tree: Tree,
}

impl std::fmt::Debug for GoFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoFile").field("path", &self.path).finish()
    }
}

impl GoFile {
    /// Parse Go source. Syntax errors do not fail parsing; see
    /// [`GoFile::has_errors`].
    pub fn parse<P: AsRef<Path>>(path: P, source: String) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut parser = Parser::new();
        parser
            .set_language(&language())
            .map_err(|e| Error::rewrite(&path, e.to_string()))?;
        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| Error::rewrite(&path, "parser produced no tree"))?;
        Ok(Self { path, source, tree })
    }

    /// Read and parse a file from disk.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::parse(path, source)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn into_source(self) -> String {
        self.source
    }

    /// Whether the tree contains error or missing nodes.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    fn text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn query(&self, source: &str) -> Result<Query> {
        Query::new(&language(), source).map_err(|e| Error::rewrite(&self.path, e.to_string()))
    }

    /// The package clause, if the file has one.
    pub fn package(&self) -> Result<Option<PackageClause>> {
        let query = self.query(PACKAGE_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, self.tree.root_node(), self.source.as_bytes());

        if let Some(m) = matches.next() {
            let mut name = None;
            let mut clause = None;
            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "package_name" => name = Some(capture.node),
                    "clause" => clause = Some(capture.node),
                    _ => {}
                }
            }
            if let (Some(name), Some(clause)) = (name, clause) {
                return Ok(Some(PackageClause {
                    name: self.text(name).to_string(),
                    name_span: Span::from_node(name),
                    clause_span: Span::from_node(clause),
                }));
            }
        }
        Ok(None)
    }

    /// Every import spec, in source order.
    pub fn imports(&self) -> Result<Vec<ImportSpec>> {
        let query = self.query(IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, self.tree.root_node(), self.source.as_bytes());

        let mut specs = Vec::new();
        while let Some(m) = matches.next() {
            let mut alias = None;
            let mut path = None;
            let mut spec = None;
            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "alias" => alias = Some(self.text(capture.node).to_string()),
                    "path" => path = Some(capture.node),
                    "spec" => spec = Some(capture.node),
                    _ => {}
                }
            }
            if let (Some(path), Some(spec)) = (path, spec) {
                specs.push(ImportSpec {
                    alias,
                    path: unquote(self.text(path)),
                    path_span: Span::from_node(path),
                    spec_span: Span::from_node(spec),
                });
            }
        }
        specs.sort_by_key(|s| s.spec_span.bytes.start);
        Ok(specs)
    }

    /// Every parenthesized import group.
    pub fn import_blocks(&self) -> Vec<ImportBlock> {
        let root = self.tree.root_node();
        let mut blocks = Vec::new();
        let mut cursor = root.walk();
        for decl in root.children(&mut cursor) {
            if decl.kind() != "import_declaration" {
                continue;
            }
            let mut inner = decl.walk();
            for child in decl.children(&mut inner) {
                if child.kind() == "import_spec_list" {
                    blocks.push(ImportBlock {
                        span: Span::from_node(child),
                    });
                }
            }
        }
        blocks
    }

    /// Span of the name of the top-level function `name` when it takes no
    /// parameters, returns nothing and has no type parameters.
    pub fn entry_function(&self, name: &str) -> Option<Span> {
        let root = self.tree.root_node();
        let mut cursor = root.walk();
        let found = root.children(&mut cursor).find_map(|decl| {
            if decl.kind() != "function_declaration" {
                return None;
            }
            let ident = decl.child_by_field_name("name")?;
            if self.text(ident) != name
                || decl.child_by_field_name("result").is_some()
                || decl.child_by_field_name("type_parameters").is_some()
            {
                return None;
            }
            let params = decl.child_by_field_name("parameters")?;
            (params.named_child_count() == 0).then(|| Span::from_node(ident))
        });
        found
    }

    /// Every comment in the file, in source order.
    pub fn comments(&self) -> Vec<Comment> {
        let mut out = Vec::new();
        collect_comments(self.tree.root_node(), &self.source, &mut out);
        out
    }

    /// Comments inside the byte range `within`, in source order.
    pub fn comments_in(&self, within: &Range<usize>) -> Vec<Comment> {
        self.comments()
            .into_iter()
            .filter(|c| c.span.bytes.start >= within.start && c.span.bytes.end <= within.end)
            .collect()
    }

    /// Package name, entry presence and flag usage for one file.
    pub fn summary(&self) -> Result<FileSummary> {
        let package = self.package()?.map(|p| p.name);
        let has_entry = match package.as_deref() {
            Some("main") => self.entry_function("main").is_some(),
            Some(crate::amalgomate::PACKAGE_NAME) => {
                self.entry_function(crate::amalgomate::ENTRY_ROUTINE).is_some()
            }
            _ => false,
        };
        let imports_flag = self.imports()?.iter().any(|i| i.path == "flag");
        Ok(FileSummary {
            package,
            has_entry,
            imports_flag,
        })
    }
}

/// Facts about one file used during amalgomation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileSummary {
    pub package: Option<String>,
    pub has_entry: bool,
    pub imports_flag: bool,
}

fn collect_comments(node: Node, source: &str, out: &mut Vec<Comment>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "comment" {
            out.push(Comment {
                text: child.utf8_text(source.as_bytes()).unwrap_or("").to_string(),
                span: Span::from_node(child),
            });
        } else if child.child_count() > 0 {
            collect_comments(child, source, out);
        }
    }
}

/// Strip the quotes from a Go string literal.
pub fn unquote(literal: &str) -> String {
    let trimmed = literal.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| trimmed.strip_prefix('`').and_then(|s| s.strip_suffix('`')))
        .unwrap_or(trimmed)
        .to_string()
}

/// Read the package name from the package clause without building a tree.
///
/// Skips leading line and block comments; returns `None` when the first
/// token is not `package`.
pub fn scan_package_clause(source: &str) -> Option<String> {
    let mut rest = source;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.split_once('\n').map(|(_, r)| r).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, r)| r)?;
        } else {
            break;
        }
    }
    let after = rest.strip_prefix("package")?;
    if !after.starts_with(|c: char| c.is_whitespace() || c == '/') {
        return None;
    }
    let after = after.trim_start();
    let name: String = after
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}

/// Whether an import path belongs to the standard library: its first
/// element has no dot.
pub fn is_std_import(path: &str) -> bool {
    let first = path.split('/').next().unwrap_or(path);
    !first.contains('.')
}

/// Whether a file name is a Go source file gokart should consider.
pub fn is_go_source(name: &str) -> bool {
    name.ends_with(".go") && !name.starts_with('.') && !name.starts_with('_')
}

/// Whether a file name is a Go test file.
pub fn is_test_file(name: &str) -> bool {
    name.ends_with("_test.go")
}

const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough", "for",
    "func", "go", "goto", "if", "import", "interface", "map", "package", "range", "return",
    "select", "struct", "switch", "type", "var",
];

/// Whether `ident` is a Go keyword.
pub fn is_keyword(ident: &str) -> bool {
    GO_KEYWORDS.contains(&ident)
}
