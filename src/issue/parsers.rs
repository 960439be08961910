//! Line parsers for tool output.
//!
//! Each parser decides which lines open a new issue and how the text of one
//! issue is turned into an [`Issue`]. The aggregator in
//! [`super::aggregate`] drives them line by line.

use std::path::Path;

use crate::error::{Error, Result};
use crate::paths::{normalize_reported, PathType, Workspace};

use super::Issue;

/// Capability set shared by every output format.
pub trait LineParser: Send + Sync {
    /// Whether `line` begins a new issue.
    fn is_start(&self, line: &str) -> bool;

    /// Build an issue from the text of one issue (possibly several lines
    /// joined with `\n`).
    fn parse_one(&self, text: &str, base_dir: &Path) -> Result<Issue>;

    /// Whether a non-start line continues the issue before it.
    fn continues(&self, _line: &str) -> bool {
        false
    }

    /// Handle a line that neither starts nor continues an issue.
    fn orphan(&self, line: &str, _base_dir: &Path) -> Result<Issue> {
        Err(Error::IssueParse {
            line: line.to_string(),
            reason: "line does not start an issue".to_string(),
        })
    }
}

/// How reported paths are resolved onto the base directory.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    pub path_type: PathType,
    pub workspace: Option<Workspace>,
}

impl PathResolver {
    pub fn new(path_type: PathType, workspace: Option<Workspace>) -> Self {
        Self {
            path_type,
            workspace,
        }
    }

    fn resolve(&self, raw: &str, base_dir: &Path) -> String {
        normalize_reported(raw, self.path_type, base_dir, self.workspace.as_ref())
    }
}

/// The output formats gokart understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    /// `{path}:{line}[:{column}]: {message}`
    Standard,
    /// Standard, where every non-start line continues the previous issue.
    MultiLine,
    /// Standard after skipping a leading label and whitespace.
    AfterFirstWhitespace,
    /// Whole line is the message.
    Raw,
    /// Standard, but the location must end with `:`.
    Strict,
    /// Standard, where indented lines continue the previous issue and other
    /// lines become location-less issues.
    IndentedContinuation,
}

impl ParserKind {
    pub fn build(self, resolver: PathResolver) -> Box<dyn LineParser> {
        match self {
            ParserKind::Standard => Box::new(Standard::new(resolver)),
            ParserKind::MultiLine => Box::new(MultiLine(Standard::new(resolver))),
            ParserKind::AfterFirstWhitespace => Box::new(AfterFirstWhitespace(Standard::new(resolver))),
            ParserKind::Raw => Box::new(Raw),
            ParserKind::Strict => Box::new(Standard {
                resolver,
                strict: true,
            }),
            ParserKind::IndentedContinuation => {
                Box::new(IndentedContinuation(Standard::new(resolver)))
            }
        }
    }
}

/// A parsed `{path}:{line}[:{column}]` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Location<'a> {
    path: &'a str,
    line: u32,
    column: u32,
}

/// Split the first whitespace-delimited token from the rest.
fn split_first_token(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], &text[i..]),
        None => (text, ""),
    }
}

fn parse_location(token: &str, strict: bool) -> Option<Location<'_>> {
    let loc = match token.strip_suffix(':') {
        Some(loc) => loc,
        None if strict => return None,
        None => token,
    };
    let mut parts = loc.rsplitn(3, ':');
    let last = parts.next()?;
    let mid = parts.next()?;
    let first = parts.next();

    let last_num = last.parse::<u32>().ok()?;
    match (first, mid.parse::<u32>()) {
        (Some(path), Ok(line)) => (!path.is_empty()).then_some(Location {
            path,
            line,
            column: last_num,
        }),
        _ => {
            let path = &loc[..loc.len() - last.len() - 1];
            (!path.is_empty()).then_some(Location {
                path,
                line: last_num,
                column: 0,
            })
        }
    }
}

/// Parser for the standard `{path}:{line}[:{column}]: {message}` form.
pub struct Standard {
    resolver: PathResolver,
    strict: bool,
}

impl Standard {
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            resolver,
            strict: false,
        }
    }

    fn location<'a>(&self, line: &'a str) -> Option<(Location<'a>, &'a str)> {
        if line.starts_with(char::is_whitespace) {
            return None;
        }
        let (token, rest) = split_first_token(line);
        parse_location(token, self.strict).map(|loc| (loc, rest))
    }
}

impl LineParser for Standard {
    fn is_start(&self, line: &str) -> bool {
        self.location(line).is_some()
    }

    fn parse_one(&self, text: &str, base_dir: &Path) -> Result<Issue> {
        let (loc, rest) = self.location(text).ok_or_else(|| Error::IssueParse {
            line: text.to_string(),
            reason: "expected {path}:{line}[:{column}]: {message}".to_string(),
        })?;
        let path = self.resolver.resolve(loc.path, base_dir);
        Ok(Issue::new(path, loc.line, loc.column, rest, base_dir))
    }
}

/// Standard issues that may span several lines.
pub struct MultiLine(Standard);

impl LineParser for MultiLine {
    fn is_start(&self, line: &str) -> bool {
        self.0.is_start(line)
    }

    fn parse_one(&self, text: &str, base_dir: &Path) -> Result<Issue> {
        self.0.parse_one(text, base_dir)
    }

    fn continues(&self, _line: &str) -> bool {
        true
    }
}

/// Standard issues preceded by a label such as `deadcode:`.
pub struct AfterFirstWhitespace(Standard);

impl AfterFirstWhitespace {
    fn after_label(line: &str) -> Option<&str> {
        let (_, rest) = split_first_token(line);
        let rest = rest.trim_start();
        (!rest.is_empty()).then_some(rest)
    }
}

impl LineParser for AfterFirstWhitespace {
    fn is_start(&self, line: &str) -> bool {
        Self::after_label(line).is_some_and(|rest| self.0.is_start(rest))
    }

    fn parse_one(&self, text: &str, base_dir: &Path) -> Result<Issue> {
        let rest = Self::after_label(text).ok_or_else(|| Error::IssueParse {
            line: text.to_string(),
            reason: "expected a label followed by a location".to_string(),
        })?;
        self.0.parse_one(rest, base_dir)
    }
}

/// Every line is an issue message.
pub struct Raw;

impl LineParser for Raw {
    fn is_start(&self, _line: &str) -> bool {
        true
    }

    fn parse_one(&self, text: &str, base_dir: &Path) -> Result<Issue> {
        Ok(Issue::message_only(text, base_dir))
    }
}

/// Standard issues with indented notes; unlocated lines stand alone.
pub struct IndentedContinuation(Standard);

impl LineParser for IndentedContinuation {
    fn is_start(&self, line: &str) -> bool {
        self.0.is_start(line)
    }

    fn parse_one(&self, text: &str, base_dir: &Path) -> Result<Issue> {
        self.0.parse_one(text, base_dir)
    }

    fn continues(&self, line: &str) -> bool {
        line.starts_with(['\t', ' '])
    }

    fn orphan(&self, line: &str, base_dir: &Path) -> Result<Issue> {
        Ok(Issue::message_only(line, base_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relative(kind: ParserKind) -> Box<dyn LineParser> {
        kind.build(PathResolver::default())
    }

    #[test]
    fn test_standard_line() {
        let parser = relative(ParserKind::Standard);
        let line = "foo/bar.go:12:4: undeclared name x";
        assert!(parser.is_start(line));
        let issue = parser.parse_one(line, Path::new("/proj")).unwrap();
        assert_eq!(issue.path(), "foo/bar.go");
        assert_eq!(issue.line(), 12);
        assert_eq!(issue.column(), 4);
        assert_eq!(issue.message(), "undeclared name x");
        assert_eq!(issue.to_string(), line);
    }

    #[test]
    fn test_standard_without_column() {
        let parser = relative(ParserKind::Standard);
        let issue = parser.parse_one("./a.go:7: oops", Path::new("/proj")).unwrap();
        assert_eq!((issue.path(), issue.line(), issue.column()), ("a.go", 7, 0));
    }

    #[test]
    fn test_standard_rejects_unlocated() {
        let parser = relative(ParserKind::Standard);
        assert!(!parser.is_start("some text"));
        assert!(!parser.is_start("\tfoo.go:1:1: x"));
        assert!(matches!(
            parser.parse_one("some text", Path::new("/proj")),
            Err(Error::IssueParse { .. })
        ));
    }

    #[test]
    fn test_absolute_paths_are_relativized() {
        let parser = ParserKind::Standard.build(PathResolver::new(PathType::Absolute, None));
        let issue = parser
            .parse_one("/proj/pkg/a.go:3:2:\tdefer f.Close()", Path::new("/proj"))
            .unwrap();
        assert_eq!(issue.path(), "pkg/a.go");
        assert_eq!(issue.message(), "defer f.Close()");
    }

    #[test]
    fn test_workspace_relative_paths() {
        let ws = Workspace::gopath("/gopath");
        let parser = ParserKind::Standard.build(PathResolver::new(PathType::WorkspaceRelative, Some(ws)));
        let issue = parser
            .parse_one("example.com/p/a.go:1:1: x", Path::new("/gopath/src/example.com/p"))
            .unwrap();
        assert_eq!(issue.path(), "a.go");
    }

    #[test]
    fn test_strict_requires_colon() {
        let parser = relative(ParserKind::Strict);
        assert!(parser.is_start("a.go:1:1: exported X should have comment"));
        assert!(!parser.is_start("a.go:1:1 exported X"));
    }

    #[test]
    fn test_after_first_whitespace() {
        let parser = relative(ParserKind::AfterFirstWhitespace);
        let line = "deadcode: a.go:3:6: helper is unused";
        assert!(parser.is_start(line));
        let issue = parser.parse_one(line, Path::new("/proj")).unwrap();
        assert_eq!(issue.to_string(), "a.go:3:6: helper is unused");
    }

    #[test]
    fn test_raw() {
        let parser = relative(ParserKind::Raw);
        let issue = parser.parse_one("pkg/unformatted.go", Path::new("/proj")).unwrap();
        assert_eq!(issue.path(), "");
        assert_eq!(issue.message(), "pkg/unformatted.go");
    }

    #[test]
    fn test_continuation_rules() {
        let multi = relative(ParserKind::MultiLine);
        assert!(multi.continues("anything"));
        let indented = relative(ParserKind::IndentedContinuation);
        assert!(indented.continues("\thave (int)"));
        assert!(!indented.continues("vet: error"));
        assert!(indented.orphan("vet: error", Path::new("/p")).is_ok());
        assert!(relative(ParserKind::Standard).orphan("x", Path::new("/p")).is_err());
    }

    #[test]
    fn test_parse_location_forms() {
        assert_eq!(
            parse_location("a.go:1:2:", true),
            Some(Location { path: "a.go", line: 1, column: 2 })
        );
        assert_eq!(
            parse_location("a.go:9", false),
            Some(Location { path: "a.go", line: 9, column: 0 })
        );
        assert_eq!(
            parse_location("dir:x/a.go:9:", false),
            Some(Location { path: "dir:x/a.go", line: 9, column: 0 })
        );
        assert_eq!(parse_location("a.go", false), None);
        assert_eq!(parse_location(":1:2:", false), None);
    }
}
