//! The generated `amalgomated.go` dispatch file.

use std::collections::{BTreeMap, BTreeSet};

use crate::gosrc::imports::{render_block, ImportEntry};
use crate::gosrc::is_keyword;

use super::{DISPATCH_MAP_VAR, ENTRY_ROUTINE};

/// Header line of every generated file.
pub const GENERATED_HEADER: &str = "// Code generated by gokart amalgomate. DO NOT EDIT.";

/// Generated function that runs the program named by a `_name` argument.
pub const RUN_FUNC: &str = "Run";

/// Identifiers the dispatch file declares or imports itself.
const RESERVED: &[&str] = &[DISPATCH_MAP_VAR, RUN_FUNC, "os", "strings"];

const RUN_SOURCE: &str = r#"
// Run runs the program named by os.Args[1] when it carries the "_" prefix,
// with os.Args rewritten to what that program sees standalone. Each extra
// leading "_" is one more layer of impersonation. Run reports whether a
// program ran.
func Run() bool {
	if len(os.Args) < 2 || !strings.HasPrefix(os.Args[1], "_") {
		return false
	}
	name := strings.TrimLeft(os.Args[1], "_")
	program, ok := Instance[name]
	if !ok {
		return false
	}
	os.Args = append([]string{name}, os.Args[2:]...)
	program()
	return true
}
"#;

/// Turn a program name into a Go identifier.
pub fn sanitize_alias(name: &str) -> String {
    let mut alias: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if alias.starts_with(|c: char| c.is_ascii_digit()) {
        alias.insert(0, '_');
    }
    if is_keyword(&alias) {
        alias.push('_');
    }
    alias
}

/// Assign an import alias to every entry package.
///
/// `programs` maps program name to entry import path. A package used by
/// several programs takes the alias of the lexicographically first one.
/// Returns entry import path to alias.
pub fn assign_aliases(programs: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut taken: BTreeSet<String> = RESERVED.iter().map(|s| s.to_string()).collect();
    let mut aliases = BTreeMap::new();
    for (name, import) in programs {
        if aliases.contains_key(import) {
            continue;
        }
        let base = sanitize_alias(name);
        let mut alias = base.clone();
        let mut n = 2;
        while taken.contains(&alias) {
            alias = format!("{}{}", base, n);
            n += 1;
        }
        taken.insert(alias.clone());
        aliases.insert(import.clone(), alias);
    }
    aliases
}

/// Render the dispatch file.
///
/// `programs` maps program name to entry import path; `aliases` maps entry
/// import path to alias; `local_prefix` is the output package import path.
pub fn render(
    package: &str,
    programs: &BTreeMap<String, String>,
    aliases: &BTreeMap<String, String>,
    local_prefix: &str,
) -> String {
    let mut entries: Vec<ImportEntry> = aliases
        .iter()
        .map(|(import, alias)| ImportEntry::new(Some(alias.clone()), import))
        .collect();
    entries.push(ImportEntry::new(None, "os"));
    entries.push(ImportEntry::new(None, "strings"));

    let mut out = String::new();
    out.push_str(GENERATED_HEADER);
    out.push_str("\n\npackage ");
    out.push_str(package);
    out.push_str("\n\nimport ");
    out.push_str(&render_block(&entries, &[], local_prefix));
    out.push_str("\n\nvar ");
    out.push_str(DISPATCH_MAP_VAR);
    out.push_str(" = map[string]func(){\n");

    let width = programs.keys().map(|n| n.len() + 3).max().unwrap_or(0);
    for (name, import) in programs {
        let key = format!("\"{}\":", name);
        let alias = aliases.get(import).map(String::as_str).unwrap_or(name);
        out.push_str(&format!(
            "\t{:<width$} func() {{ {}.{}() }},\n",
            key,
            alias,
            ENTRY_ROUTINE,
            width = width
        ));
    }
    out.push_str("}\n");
    out.push_str(RUN_SOURCE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sanitize_alias() {
        assert_eq!(sanitize_alias("go-lint"), "go_lint");
        assert_eq!(sanitize_alias("2fa"), "_2fa");
        assert_eq!(sanitize_alias("type"), "type_");
        assert_eq!(sanitize_alias("gofmt"), "gofmt");
    }

    #[test]
    fn test_assign_aliases_dedupes_packages() {
        let mut programs = BTreeMap::new();
        programs.insert("b-tool".to_string(), "out/internal/x/tool".to_string());
        programs.insert("a-tool".to_string(), "out/internal/x/tool".to_string());
        programs.insert("a_tool".to_string(), "out/internal/y".to_string());
        let aliases = assign_aliases(&programs);
        assert_eq!(aliases["out/internal/x/tool"], "a_tool");
        assert_eq!(aliases["out/internal/y"], "a_tool2");
    }

    #[test]
    fn test_aliases_avoid_generated_names() {
        let mut programs = BTreeMap::new();
        programs.insert("os".to_string(), "out/internal/x/os".to_string());
        programs.insert("strings".to_string(), "out/internal/x/strings".to_string());
        let aliases = assign_aliases(&programs);
        assert_eq!(aliases["out/internal/x/os"], "os2");
        assert_eq!(aliases["out/internal/x/strings"], "strings2");
    }

    #[test]
    fn test_render() {
        let mut programs = BTreeMap::new();
        programs.insert("gofmt".to_string(), "example.com/out/internal/example.com/x/gofmt".to_string());
        programs.insert(
            "ptimports".to_string(),
            "example.com/out/internal/example.com/x/ptimports".to_string(),
        );
        let aliases = assign_aliases(&programs);
        let out = render("out", &programs, &aliases, "example.com/out");
        let parsed = crate::gosrc::GoFile::parse("amalgomated.go", out.clone()).unwrap();
        assert!(!parsed.has_errors());
        assert_eq!(
            out,
            r#"// Code generated by gokart amalgomate. DO NOT EDIT.

package out

import (
	"os"
	"strings"

	gofmt "example.com/out/internal/example.com/x/gofmt"
	ptimports "example.com/out/internal/example.com/x/ptimports"
)

var Instance = map[string]func(){
	"gofmt":     func() { gofmt.AmalgomatedMain() },
	"ptimports": func() { ptimports.AmalgomatedMain() },
}

// Run runs the program named by os.Args[1] when it carries the "_" prefix,
// with os.Args rewritten to what that program sees standalone. Each extra
// leading "_" is one more layer of impersonation. Run reports whether a
// program ran.
func Run() bool {
	if len(os.Args) < 2 || !strings.HasPrefix(os.Args[1], "_") {
		return false
	}
	name := strings.TrimLeft(os.Args[1], "_")
	program, ok := Instance[name]
	if !ok {
		return false
	}
	os.Args = append([]string{name}, os.Args[2:]...)
	program()
	return true
}
"#
        );
    }
}
