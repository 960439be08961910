//! Go build constraint evaluation.
//!
//! Handles the three ways a Go file opts in or out of a build:
//! - `//go:build <expr>` lines (boolean expressions over tags)
//! - legacy `// +build` lines (space = OR, comma = AND, `!` = NOT)
//! - `_GOOS`, `_GOARCH` and `_GOOS_GOARCH` file name suffixes
//!
//! `//go:build` takes precedence over `// +build` when both are present.

use std::collections::HashSet;

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// The target a set of files is being selected for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    goos: String,
    goarch: String,
    cgo: bool,
    tags: HashSet<String>,
}

impl BuildContext {
    /// Create a context for an explicit target.
    pub fn new(goos: &str, goarch: &str) -> Self {
        Self {
            goos: goos.to_string(),
            goarch: goarch.to_string(),
            cgo: false,
            tags: HashSet::new(),
        }
    }

    /// Context for `GOOS`/`GOARCH` from the environment, falling back to the
    /// host platform.
    pub fn from_env() -> Self {
        let goos = std::env::var("GOOS")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| host_goos().to_string());
        let goarch = std::env::var("GOARCH")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| host_goarch().to_string());
        let cgo = std::env::var("CGO_ENABLED").map(|v| v == "1").unwrap_or(false);
        let mut ctx = Self::new(&goos, &goarch);
        ctx.cgo = cgo;
        ctx
    }

    /// Add custom build tags (as passed to `go build -tags`).
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn goos(&self) -> &str {
        &self.goos
    }

    pub fn goarch(&self) -> &str {
        &self.goarch
    }

    /// Whether a single tag is satisfied.
    pub fn matches_tag(&self, tag: &str) -> bool {
        if tag == self.goos || tag == self.goarch || self.tags.contains(tag) {
            return true;
        }
        match tag {
            "gc" => true,
            "cgo" => self.cgo,
            "unix" => UNIX_OS.contains(&self.goos.as_str()),
            "linux" => self.goos == "android",
            "solaris" => self.goos == "illumos",
            "darwin" => self.goos == "ios",
            _ => tag.strip_prefix("go1.").map(is_release_number).unwrap_or(false),
        }
    }

    /// Whether a file with this name and content takes part in the build.
    pub fn matches_file(&self, file_name: &str, source: &str) -> bool {
        self.matches_file_name(file_name) && self.matches_header(source)
    }

    /// Apply the `_GOOS`/`_GOARCH` suffix rules.
    pub fn matches_file_name(&self, file_name: &str) -> bool {
        let stem = file_name.split('.').next().unwrap_or(file_name);
        let rest = match stem.find('_') {
            Some(i) => &stem[i..],
            None => return true,
        };
        let mut parts: Vec<&str> = rest.split('_').collect();
        if parts.last() == Some(&"test") {
            parts.pop();
        }
        let n = parts.len();
        if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            return self.matches_tag(parts[n - 2]) && self.matches_tag(parts[n - 1]);
        }
        if n >= 1 {
            let last = parts[n - 1];
            if KNOWN_OS.contains(&last) || KNOWN_ARCH.contains(&last) {
                return self.matches_tag(last);
            }
        }
        true
    }

    /// Evaluate the constraint comments that precede the package clause.
    pub fn matches_header(&self, source: &str) -> bool {
        let header = constraint_lines(source);

        if let Some(expr) = header.iter().find_map(|l| l.strip_prefix("//go:build")) {
            return match Expr::parse(expr) {
                Some(e) => e.eval(&|tag| self.matches_tag(tag)),
                None => {
                    log::warn!("ignoring malformed build constraint: //go:build{}", expr);
                    false
                }
            };
        }

        header
            .iter()
            .filter_map(|l| l.strip_prefix("//").map(str::trim_start))
            .filter_map(|l| l.strip_prefix("+build"))
            .all(|line| self.matches_plus_build(line))
    }

    fn matches_plus_build(&self, line: &str) -> bool {
        line.split_whitespace().any(|alternative| {
            alternative.split(',').all(|term| match term.strip_prefix('!') {
                Some(tag) => !self.matches_tag(tag),
                None => self.matches_tag(term),
            })
        })
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::from_env()
    }
}

fn is_release_number(minor: &str) -> bool {
    !minor.is_empty() && minor.chars().all(|c| c.is_ascii_digit())
}

fn host_goos() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn host_goarch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        "wasm32" => "wasm",
        other => other,
    }
}

/// Collect the `//` comment lines that precede the package clause.
fn constraint_lines(source: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut in_block = false;
    for line in source.lines() {
        let trimmed = line.trim();
        if in_block {
            if trimmed.contains("*/") {
                in_block = false;
            }
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("//") {
            lines.push(trimmed);
            continue;
        }
        if trimmed.starts_with("/*") {
            in_block = !trimmed.contains("*/");
            continue;
        }
        break;
    }
    lines
}

/// A parsed `//go:build` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Tag(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn parse(input: &str) -> Option<Expr> {
        let tokens = tokenize(input)?;
        let mut pos = 0;
        let expr = parse_or(&tokens, &mut pos)?;
        (pos == tokens.len()).then_some(expr)
    }

    fn eval(&self, tag: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Expr::Tag(t) => tag(t),
            Expr::Not(e) => !e.eval(tag),
            Expr::And(a, b) => a.eval(tag) && b.eval(tag),
            Expr::Or(a, b) => a.eval(tag) || b.eval(tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(c) {
                    return None;
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut tag = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        tag.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Tag(tag));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

fn parse_or(tokens: &[Token], pos: &mut usize) -> Option<Expr> {
    let mut left = parse_and(tokens, pos)?;
    while tokens.get(*pos) == Some(&Token::Or) {
        *pos += 1;
        let right = parse_and(tokens, pos)?;
        left = Expr::Or(Box::new(left), Box::new(right));
    }
    Some(left)
}

fn parse_and(tokens: &[Token], pos: &mut usize) -> Option<Expr> {
    let mut left = parse_not(tokens, pos)?;
    while tokens.get(*pos) == Some(&Token::And) {
        *pos += 1;
        let right = parse_not(tokens, pos)?;
        left = Expr::And(Box::new(left), Box::new(right));
    }
    Some(left)
}

fn parse_not(tokens: &[Token], pos: &mut usize) -> Option<Expr> {
    match tokens.get(*pos)? {
        Token::Not => {
            *pos += 1;
            Some(Expr::Not(Box::new(parse_not(tokens, pos)?)))
        }
        Token::Open => {
            *pos += 1;
            let inner = parse_or(tokens, pos)?;
            if tokens.get(*pos) != Some(&Token::Close) {
                return None;
            }
            *pos += 1;
            Some(inner)
        }
        Token::Tag(t) => {
            *pos += 1;
            Some(Expr::Tag(t.clone()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> BuildContext {
        BuildContext::new("linux", "amd64")
    }

    #[test]
    fn test_go_build_expressions() {
        let ctx = linux().with_tags(["integration"]);
        assert!(ctx.matches_header("//go:build linux\n\npackage a\n"));
        assert!(!ctx.matches_header("//go:build ignore\n\npackage a\n"));
        assert!(ctx.matches_header("//go:build (darwin || linux) && !386\n\npackage a\n"));
        assert!(ctx.matches_header("//go:build integration && go1.18\n\npackage a\n"));
        assert!(!ctx.matches_header("//go:build windows || (darwin && cgo)\n\npackage a\n"));
    }

    #[test]
    fn test_plus_build_lines() {
        let ctx = linux();
        assert!(ctx.matches_header("// +build linux darwin\n\npackage a\n"));
        assert!(!ctx.matches_header("// +build linux,386\n\npackage a\n"));
        assert!(!ctx.matches_header("// +build linux\n// +build ignore\n\npackage a\n"));
        assert!(ctx.matches_header("// +build !windows\n\npackage a\n"));
    }

    #[test]
    fn test_go_build_wins_over_plus_build() {
        let ctx = linux();
        let src = "//go:build linux\n// +build windows\n\npackage a\n";
        assert!(ctx.matches_header(src));
    }

    #[test]
    fn test_constraints_after_package_are_ignored() {
        let ctx = linux();
        assert!(ctx.matches_header("package a\n\n//go:build ignore\n"));
        assert!(ctx.matches_header("/* license */\npackage a\n"));
    }

    #[test]
    fn test_file_name_suffixes() {
        let ctx = linux();
        assert!(ctx.matches_file_name("a.go"));
        assert!(ctx.matches_file_name("linux.go"));
        assert!(ctx.matches_file_name("a_linux.go"));
        assert!(!ctx.matches_file_name("a_windows.go"));
        assert!(ctx.matches_file_name("a_linux_amd64_test.go"));
        assert!(!ctx.matches_file_name("a_linux_arm64.go"));
        assert!(!ctx.matches_file_name("a_arm.go"));
        assert!(ctx.matches_file_name("a_helper.go"));
    }

    #[test]
    fn test_unix_tag() {
        assert!(BuildContext::new("darwin", "arm64").matches_tag("unix"));
        assert!(!BuildContext::new("windows", "amd64").matches_tag("unix"));
    }

    #[test]
    fn test_malformed_expression_excludes_file() {
        let ctx = linux();
        assert!(!ctx.matches_header("//go:build linux &&\n\npackage a\n"));
    }
}
