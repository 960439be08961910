//! Conversion of `go test -v` output to a JUnit XML report.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

use crate::error::{Error, Result};

lazy_static! {
    static ref RUN_LINE: Regex = Regex::new(r"^=== RUN\s+(\S+)").unwrap();
    static ref RESULT_LINE: Regex =
        Regex::new(r"^\s*--- (PASS|FAIL|SKIP): (\S+) \(([0-9.]+)s\)").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub time: f64,
    pub outcome: Outcome,
    pub output: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestSuite {
    pub name: String,
    pub time: f64,
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn failures(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome == Outcome::Fail).count()
    }

    pub fn skipped(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome == Outcome::Skip).count()
    }
}

/// Parse verbose test output into one suite per package summary line.
pub fn parse(output: &str) -> Vec<TestSuite> {
    let mut suites = Vec::new();
    let mut cases: Vec<TestCase> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    // Case that receives output lines.
    let mut current: Option<usize> = None;

    for line in output.lines() {
        if let Some(caps) = RUN_LINE.captures(line) {
            let name = caps[1].to_string();
            let idx = *index.entry(name.clone()).or_insert_with(|| {
                cases.push(TestCase {
                    name,
                    time: 0.0,
                    outcome: Outcome::Fail,
                    output: Vec::new(),
                });
                cases.len() - 1
            });
            current = Some(idx);
            continue;
        }
        if let Some(caps) = RESULT_LINE.captures(line) {
            let name = caps[2].to_string();
            let idx = *index.entry(name.clone()).or_insert_with(|| {
                cases.push(TestCase {
                    name,
                    time: 0.0,
                    outcome: Outcome::Fail,
                    output: Vec::new(),
                });
                cases.len() - 1
            });
            let case = &mut cases[idx];
            case.outcome = match &caps[1] {
                "PASS" => Outcome::Pass,
                "SKIP" => Outcome::Skip,
                _ => Outcome::Fail,
            };
            case.time = caps[3].parse().unwrap_or(0.0);
            current = None;
            continue;
        }
        if let Some((name, time, marker)) = package_summary(line) {
            let mut suite = TestSuite {
                name,
                time,
                cases: std::mem::take(&mut cases),
            };
            if let Some(marker) = marker {
                suite.cases.push(TestCase {
                    name: marker,
                    time: 0.0,
                    outcome: Outcome::Fail,
                    output: Vec::new(),
                });
            }
            suites.push(suite);
            index.clear();
            current = None;
            continue;
        }
        if line.starts_with("=== ") || line == "PASS" || line == "FAIL" {
            continue;
        }
        if let Some(idx) = current {
            cases[idx].output.push(line.trim().to_string());
        }
    }
    suites
}

/// `(package, seconds, failure marker)` for `ok`, `FAIL` and `?` lines.
fn package_summary(line: &str) -> Option<(String, f64, Option<String>)> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 2 {
        return None;
    }
    let verdict = fields[0].trim_end();
    if !matches!(verdict, "ok" | "FAIL" | "?") {
        return None;
    }
    let (name, marker) = match fields[1].split_once(" [") {
        Some((name, rest)) => (name.to_string(), Some(format!("[{}", rest))),
        None => (fields[1].trim().to_string(), None),
    };
    let marker = marker.or_else(|| {
        fields
            .get(2)
            .filter(|f| f.starts_with('[') && verdict == "FAIL")
            .map(|f| f.to_string())
    });
    let time = fields
        .get(2)
        .and_then(|f| f.trim().strip_suffix('s'))
        .and_then(|t| t.parse().ok())
        .unwrap_or(0.0);
    Some((name, time, marker))
}

fn xml_err(e: xml::writer::Error) -> Error {
    Error::Io(io::Error::other(e.to_string()))
}

/// Write `suites` as a JUnit document.
pub fn write_report<W: Write>(suites: &[TestSuite], sink: W) -> Result<()> {
    let mut w = EmitterConfig::new().perform_indent(true).create_writer(sink);
    w.write(XmlEvent::start_element("testsuites")).map_err(xml_err)?;
    for suite in suites {
        write_suite(&mut w, suite)?;
    }
    w.write(XmlEvent::end_element()).map_err(xml_err)?;
    w.into_inner().flush()?;
    Ok(())
}

fn write_suite<W: Write>(w: &mut EventWriter<W>, suite: &TestSuite) -> Result<()> {
    let tests = suite.cases.len().to_string();
    let failures = suite.failures().to_string();
    let skipped = suite.skipped().to_string();
    let time = format!("{:.3}", suite.time);
    w.write(
        XmlEvent::start_element("testsuite")
            .attr("name", &suite.name)
            .attr("tests", &tests)
            .attr("failures", &failures)
            .attr("skipped", &skipped)
            .attr("time", &time),
    )
    .map_err(xml_err)?;

    for case in &suite.cases {
        let time = format!("{:.3}", case.time);
        w.write(
            XmlEvent::start_element("testcase")
                .attr("classname", &suite.name)
                .attr("name", &case.name)
                .attr("time", &time),
        )
        .map_err(xml_err)?;
        match case.outcome {
            Outcome::Pass => {}
            Outcome::Skip => {
                w.write(XmlEvent::start_element("skipped")).map_err(xml_err)?;
                w.write(XmlEvent::end_element()).map_err(xml_err)?;
            }
            Outcome::Fail => {
                let message = case
                    .output
                    .iter()
                    .find(|l| !l.is_empty())
                    .cloned()
                    .unwrap_or_else(|| "failed".to_string());
                w.write(XmlEvent::start_element("failure").attr("message", &message))
                    .map_err(xml_err)?;
                if !case.output.is_empty() {
                    w.write(XmlEvent::characters(&case.output.join("\n")))
                        .map_err(xml_err)?;
                }
                w.write(XmlEvent::end_element()).map_err(xml_err)?;
            }
        }
        w.write(XmlEvent::end_element()).map_err(xml_err)?;
    }
    w.write(XmlEvent::end_element()).map_err(xml_err)?;
    Ok(())
}

/// Convert raw `go test -v` output and write the report to `path`.
pub fn write_file(path: &Path, output: &str) -> Result<()> {
    let suites = parse(output);
    log::debug!("writing {} test suite(s) to {}", suites.len(), path.display());
    write_report(&suites, BufWriter::new(File::create(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "=== RUN   TestAdd
--- PASS: TestAdd (0.00s)
=== RUN   TestSub
    math_test.go:12: got 1, want <2>
--- FAIL: TestSub (0.01s)
=== RUN   TestSkip
    math_test.go:20: not on this platform
--- SKIP: TestSkip (0.00s)
FAIL
exit status 1
FAIL\texample.com/p/math\t0.015s
=== RUN   TestOther
--- PASS: TestOther (0.00s)
PASS
ok  \texample.com/p/other\t0.002s
?   \texample.com/p/empty\t[no test files]
FAIL\texample.com/p/broken [setup failed]
";

    #[test]
    fn test_parse_suites() {
        let suites = parse(OUTPUT);
        let names: Vec<&str> = suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "example.com/p/math",
                "example.com/p/other",
                "example.com/p/empty",
                "example.com/p/broken"
            ]
        );

        let math = &suites[0];
        assert_eq!(math.cases.len(), 3);
        assert_eq!(math.failures(), 1);
        assert_eq!(math.skipped(), 1);
        assert_eq!(math.cases[1].output, vec!["math_test.go:12: got 1, want <2>".to_string()]);
        assert!((math.time - 0.015).abs() < 1e-9);

        assert_eq!(suites[1].failures(), 0);
        assert!(suites[2].cases.is_empty());
        assert_eq!(suites[3].failures(), 1);
        assert_eq!(suites[3].cases[0].name, "[setup failed]");
    }

    #[test]
    fn test_report_is_escaped_xml() {
        let mut out = Vec::new();
        write_report(&parse(OUTPUT), &mut out).unwrap();
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains("<testsuites>"));
        assert!(xml.contains("name=\"example.com/p/math\""));
        assert!(xml.contains("tests=\"3\""));
        assert!(xml.contains("&lt;2>") || xml.contains("&lt;2&gt;"));
        assert!(!xml.contains("want <2>"));
    }
}
