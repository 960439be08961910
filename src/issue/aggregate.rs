//! Turns tool output into issues.

use std::io::BufRead;
use std::path::Path;

use regex::Regex;

use crate::error::Result;
use crate::filter::cached_regex;

use super::{Issue, LineParser};

/// Raw-line pre-filter applied before parsing. A line matching any pattern
/// is dropped.
#[derive(Debug, Clone, Default)]
pub struct LinePrefilter {
    patterns: Vec<Regex>,
}

impl LinePrefilter {
    pub fn new(patterns: &[&str]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| cached_regex(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Drops the `# package` headers and `exit status N` trailers the go
    /// command wraps around tool output.
    pub fn go_tool_framing() -> Result<Self> {
        Self::new(&[r"^#", r"^exit status \d+$"])
    }

    pub fn drops(&self, line: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(line))
    }
}

/// Parse every issue from `reader`.
///
/// Blank lines are skipped and pre-filtered lines dropped. A start line
/// opens an issue; other lines either continue it or go to
/// [`LineParser::orphan`].
pub fn parse_issues<R: BufRead>(
    reader: R,
    parser: &dyn LineParser,
    prefilter: Option<&LinePrefilter>,
    base_dir: &Path,
) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();
    let mut current: Option<String> = None;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        if prefilter.is_some_and(|p| p.drops(line)) {
            continue;
        }

        if parser.is_start(line) {
            if let Some(text) = current.replace(line.to_string()) {
                issues.push(parser.parse_one(&text, base_dir)?);
            }
            continue;
        }

        match current.as_mut() {
            Some(text) if parser.continues(line) => {
                text.push('\n');
                text.push_str(line);
            }
            _ => {
                if let Some(text) = current.take() {
                    issues.push(parser.parse_one(&text, base_dir)?);
                }
                issues.push(parser.orphan(line, base_dir)?);
            }
        }
    }

    if let Some(text) = current {
        issues.push(parser.parse_one(&text, base_dir)?);
    }
    log::debug!("parsed {} issue(s)", issues.len());
    Ok(issues)
}

/// Parse issues from captured output.
pub fn parse_output(
    output: &str,
    parser: &dyn LineParser,
    prefilter: Option<&LinePrefilter>,
    base_dir: &Path,
) -> Result<Vec<Issue>> {
    parse_issues(output.as_bytes(), parser, prefilter, base_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::issue::{ParserKind, PathResolver};
    use pretty_assertions::assert_eq;

    fn parse(kind: ParserKind, output: &str, prefilter: Option<&LinePrefilter>) -> Result<Vec<Issue>> {
        let parser = kind.build(PathResolver::default());
        parse_output(output, parser.as_ref(), prefilter, Path::new("/proj"))
    }

    #[test]
    fn test_standard_output() {
        let out = "a.go:1:1: first\n\nb/c.go:2:3: second\n";
        let issues = parse(ParserKind::Standard, out, None).unwrap();
        let rendered: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
        assert_eq!(rendered, vec!["a.go:1:1: first", "b/c.go:2:3: second"]);
    }

    #[test]
    fn test_standard_rejects_stray_lines() {
        let err = parse(ParserKind::Standard, "a.go:1:1: x\ngarbage\n", None).unwrap_err();
        assert!(matches!(err, Error::IssueParse { .. }));
    }

    #[test]
    fn test_multi_line_joins() {
        let out = "a.go:3:2: cannot use x\n\thave int\n\twant string\nb.go:1:1: other\n";
        let issues = parse(ParserKind::MultiLine, out, None).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].message(), "cannot use x\n\thave int\n\twant string");

        let reparsed = parse(ParserKind::MultiLine, &issues[0].to_string(), None).unwrap();
        assert_eq!(reparsed, vec![issues[0].clone()]);
    }

    #[test]
    fn test_go_vet_framing() {
        let out = "# example.com/p\n./a.go:4:2: unreachable code\n\tnote\nvet: analysis skipped\nexit status 1\n";
        let prefilter = LinePrefilter::go_tool_framing().unwrap();
        let issues = parse(ParserKind::IndentedContinuation, out, Some(&prefilter)).unwrap();
        let rendered: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["a.go:4:2: unreachable code\n\tnote", "vet: analysis skipped"]
        );
    }

    #[test]
    fn test_raw_output() {
        let issues = parse(ParserKind::Raw, "a.go\nb/c.go\n", None).unwrap();
        let messages: Vec<&str> = issues.iter().map(|i| i.message()).collect();
        assert_eq!(messages, vec!["a.go", "b/c.go"]);
    }

    #[test]
    fn test_round_trip_each_parser() {
        let cases = [
            (ParserKind::Standard, "foo/bar.go:12:4: undeclared name x"),
            (ParserKind::Strict, "foo/bar.go:12:4: exported F should have comment"),
            (ParserKind::MultiLine, "foo/bar.go:12: too many errors"),
            (ParserKind::Raw, "foo/bar.go"),
            (ParserKind::IndentedContinuation, "foo/bar.go:1:1: x"),
        ];
        for (kind, line) in cases {
            let issues = parse(kind, line, None).unwrap();
            let again = parse(kind, &issues[0].to_string(), None).unwrap();
            assert_eq!(again, issues, "{:?}", kind);
        }
    }

    #[test]
    fn test_leading_label_is_not_rendered() {
        // The label before the first whitespace is dropped, so the rendering
        // re-parses with the standard parser instead.
        let line = "deadcode: foo/bar.go:12:4: helper is unused";
        let issues = parse(ParserKind::AfterFirstWhitespace, line, None).unwrap();
        assert_eq!(issues[0].to_string(), "foo/bar.go:12:4: helper is unused");

        let again = parse(ParserKind::Standard, &issues[0].to_string(), None).unwrap();
        assert_eq!(again, issues);
    }
}
