//! Post-processing of `go test` console output.

use std::io::{self, Write};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FAILED_MARKER: Regex =
        Regex::new(r"^FAIL\t(.+) (\[(?:setup|build) failed\]$)").unwrap();
}

/// Pad the package column of `ok` and `FAIL` summary lines to `width`.
///
/// Returns the rewritten line and, for `FAIL` lines, the failed package.
pub fn align_line(line: &str, width: usize) -> (String, Option<String>) {
    let line = FAILED_MARKER.replace(line, "FAIL\t$1\t$2");
    let fields: Vec<&str> = line.split('\t').collect();
    let failed = match fields.as_slice() {
        ["FAIL", pkg, ..] => Some(package_field(pkg)),
        _ => None,
    };
    if fields.len() < 3 || !(fields[0] == "ok" || fields[0] == "FAIL") {
        return (line.into_owned(), failed);
    }
    let mut out = Vec::with_capacity(fields.len());
    out.push(fields[0].to_string());
    out.push(format!("{:<width$}", fields[1], width = width));
    out.extend(fields[2..].iter().map(|f| f.to_string()));
    (out.join("\t"), failed)
}

/// Package name from a summary field, without a trailing ` [...]` marker.
fn package_field(field: &str) -> String {
    let field = field.trim();
    match field.split_once(" [") {
        Some((pkg, rest)) if rest.ends_with(']') => pkg.to_string(),
        _ => field.to_string(),
    }
}

/// Line-buffering writer that aligns summary lines and records failures.
pub struct AligningWriter<W: Write> {
    inner: W,
    width: usize,
    pending: Vec<u8>,
    failed: Vec<String>,
}

impl<W: Write> AligningWriter<W> {
    pub fn new(inner: W, width: usize) -> Self {
        Self {
            inner,
            width,
            pending: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Packages seen on `FAIL` lines, in order.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    /// Flush any unterminated line and return the failed packages.
    pub fn finish(mut self) -> io::Result<Vec<String>> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.emit(&rest, false)?;
        }
        self.inner.flush()?;
        Ok(self.failed)
    }

    fn emit(&mut self, line: &[u8], newline: bool) -> io::Result<()> {
        let text = String::from_utf8_lossy(line);
        let (aligned, failed) = align_line(&text, self.width);
        if let Some(pkg) = failed {
            if !self.failed.contains(&pkg) {
                self.failed.push(pkg);
            }
        }
        self.inner.write_all(aligned.as_bytes())?;
        if newline {
            self.inner.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl<W: Write> Write for AligningWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&line[..line.len() - 1], true)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes everything to both `a` and `b`.
pub struct Tee<A, B> {
    pub a: A,
    pub b: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.a.write_all(buf)?;
        self.b.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_align_line() {
        let (line, failed) = align_line("ok\tex.com/a\t0.01s", 12);
        assert_eq!(line, "ok\tex.com/a     \t0.01s");
        assert_eq!(failed, None);

        let (line, failed) = align_line("FAIL\tex.com/long/b\t0.20s", 12);
        assert_eq!(line, "FAIL\tex.com/long/b\t0.20s");
        assert_eq!(failed.as_deref(), Some("ex.com/long/b"));
    }

    #[test]
    fn test_setup_failed_gets_a_tab() {
        let (line, failed) = align_line("FAIL\tex.com/a [setup failed]", 10);
        assert_eq!(line, "FAIL\tex.com/a  \t[setup failed]");
        assert_eq!(failed.as_deref(), Some("ex.com/a"));
    }

    #[test]
    fn test_build_failed_is_a_failure() {
        let (line, failed) = align_line("FAIL\texample.com/proj/db [build failed]", 20);
        assert_eq!(line, "FAIL\texample.com/proj/db \t[build failed]");
        assert_eq!(failed.as_deref(), Some("example.com/proj/db"));
    }

    #[test]
    fn test_two_field_fail_line_is_a_failure() {
        let (line, failed) = align_line("FAIL\tex.com/a [no test files]", 20);
        assert_eq!(line, "FAIL\tex.com/a [no test files]");
        assert_eq!(failed.as_deref(), Some("ex.com/a"));
    }

    #[test]
    fn test_other_lines_untouched() {
        for line in ["=== RUN   TestX", "ok  not tabbed", "FAIL", "--- FAIL: TestX (0.00s)"] {
            assert_eq!(align_line(line, 30), (line.to_string(), None));
        }
    }

    #[test]
    fn test_writer_splits_lines_across_writes() {
        let mut console = Vec::new();
        let mut raw = Vec::new();
        let failed = {
            let mut tee = Tee {
                a: AligningWriter::new(&mut console, 6),
                b: &mut raw,
            };
            tee.write_all(b"ok\tp/a\t0.1s\nFA").unwrap();
            tee.write_all(b"IL\tp/bb\t0.2s\nexit status 1").unwrap();
            tee.a.finish().unwrap()
        };
        assert_eq!(
            String::from_utf8(console).unwrap(),
            "ok\tp/a   \t0.1s\nFAIL\tp/bb  \t0.2s\nexit status 1"
        );
        assert_eq!(
            String::from_utf8(raw).unwrap(),
            "ok\tp/a\t0.1s\nFAIL\tp/bb\t0.2s\nexit status 1"
        );
        assert_eq!(failed, vec!["p/bb".to_string()]);
    }
}
