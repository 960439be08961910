//! Conversions between absolute paths, workspace import paths and
//! directory-relative paths.
//!
//! A [`Workspace`] is either a classic `$GOPATH/src` tree (import prefix is
//! empty) or a Go module (source root is the module directory and the
//! import prefix is the module path). All conversions are lexical; nothing
//! here touches the filesystem except [`Workspace::discover`] and
//! [`Workspace::resolve_dir`].

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// How a tool reports file paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathType {
    /// Rooted at the filesystem root.
    Absolute,
    /// Rooted at the workspace source directory (an import-path-like path).
    WorkspaceRelative,
    /// Relative to the directory the tool ran in.
    #[default]
    Relative,
}

/// The canonical source tree that import paths are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    src_root: PathBuf,
    import_prefix: String,
    fallbacks: Vec<PathBuf>,
}

impl Workspace {
    /// A `$GOPATH` workspace: import paths are relative to `<gopath>/src`.
    pub fn gopath<P: AsRef<Path>>(gopath: P) -> Self {
        Self {
            src_root: clean(&gopath.as_ref().join("src")),
            import_prefix: String::new(),
            fallbacks: Vec::new(),
        }
    }

    /// A module workspace rooted at `root` with module path `module_path`.
    pub fn module<P: AsRef<Path>>(root: P, module_path: &str) -> Self {
        let root = clean(root.as_ref());
        Self {
            fallbacks: vec![root.join("vendor")],
            src_root: root,
            import_prefix: module_path.trim_end_matches('/').to_string(),
        }
    }

    /// The `$GOPATH` workspace from the environment, defaulting to `$HOME/go`
    /// the way the Go toolchain does.
    pub fn from_env() -> Result<Self> {
        if let Some(gopath) = std::env::var_os("GOPATH") {
            if let Some(first) = std::env::split_paths(&gopath).find(|p| !p.as_os_str().is_empty()) {
                return Ok(Self::gopath(first));
            }
        }
        match std::env::var_os("HOME") {
            Some(home) => Ok(Self::gopath(PathBuf::from(home).join("go"))),
            None => Err(Error::config("GOPATH is not set and HOME is unknown")),
        }
    }

    /// Find the workspace containing `dir`: the nearest enclosing Go module,
    /// or the `$GOPATH` workspace when there is none.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = absolute(dir.as_ref())?;
        for ancestor in dir.ancestors() {
            let go_mod = ancestor.join("go.mod");
            if go_mod.is_file() {
                let content = fs::read_to_string(&go_mod)?;
                let module_path = parse_module_path(&content).ok_or_else(|| {
                    Error::config(format!("no module declaration found in {}", go_mod.display()))
                })?;
                let mut ws = Self::module(ancestor, &module_path);
                if let Ok(gopath) = Self::from_env() {
                    ws.fallbacks.push(gopath.src_root);
                }
                return Ok(ws);
            }
        }
        Self::from_env()
    }

    /// The directory workspace-relative paths are rooted at.
    pub fn src_root(&self) -> &Path {
        &self.src_root
    }

    /// Import path prefix of the source root (empty for `$GOPATH`).
    pub fn import_prefix(&self) -> &str {
        &self.import_prefix
    }

    /// Convert an absolute path to its workspace-relative (import) path.
    pub fn to_import_path<P: AsRef<Path>>(&self, abs: P) -> Result<String> {
        let abs = clean(abs.as_ref());
        let rel = abs
            .strip_prefix(&self.src_root)
            .map_err(|_| Error::PathEscapesWorkspace {
                path: abs.clone(),
                workspace: self.src_root.clone(),
            })?;
        let rel = to_slash(rel);
        Ok(join_import(&self.import_prefix, &rel))
    }

    /// Convert a workspace-relative path to an absolute path.
    pub fn to_absolute(&self, import_path: &str) -> Result<PathBuf> {
        let import_path = import_path.trim_matches('/');
        if self.import_prefix.is_empty() {
            return Ok(clean(&self.src_root.join(import_path)));
        }
        match strip_import_prefix(import_path, &self.import_prefix) {
            Some(rest) => Ok(clean(&self.src_root.join(rest))),
            None => Err(Error::PathEscapesWorkspace {
                path: PathBuf::from(import_path),
                workspace: self.src_root.clone(),
            }),
        }
    }

    /// Locate the directory for an import path, trying the workspace itself,
    /// then vendored copies, then `$GOPATH`.
    pub fn resolve_dir(&self, import_path: &str) -> Result<PathBuf> {
        if let Ok(dir) = self.to_absolute(import_path) {
            if dir.is_dir() {
                return Ok(dir);
            }
        }
        for fallback in &self.fallbacks {
            let dir = clean(&fallback.join(import_path));
            if dir.is_dir() {
                return Ok(dir);
            }
        }
        Err(Error::config(format!(
            "cannot find directory for package {:?} in workspace {}",
            import_path,
            self.src_root.display()
        )))
    }
}

/// Extract the module path from go.mod content.
pub fn parse_module_path(go_mod: &str) -> Option<String> {
    go_mod.lines().map(str::trim).find_map(|line| {
        let rest = line.strip_prefix("module")?;
        if !rest.starts_with(|c: char| c.is_whitespace()) {
            return None;
        }
        let module = rest.split("//").next().unwrap_or("").trim().trim_matches('"');
        (!module.is_empty()).then(|| module.to_string())
    })
}

/// Relativize `path` against `base`, failing if the result would climb
/// above `base`.
pub fn relativize<P: AsRef<Path>, B: AsRef<Path>>(path: P, base: B) -> Result<PathBuf> {
    let path = clean(path.as_ref());
    let base = clean(base.as_ref());
    let escapes = || Error::PathEscapesBase {
        path: path.clone(),
        base: base.clone(),
    };
    let rel = pathdiff::diff_paths(&path, &base).ok_or_else(escapes)?;
    if matches!(rel.components().next(), Some(Component::ParentDir)) {
        return Err(escapes());
    }
    Ok(rel)
}

/// Resolve a path as reported by a tool to the form stored on issues:
/// relative to `base_dir` with forward slashes when possible, otherwise as
/// reported.
pub fn normalize_reported(
    raw: &str,
    path_type: PathType,
    base_dir: &Path,
    workspace: Option<&Workspace>,
) -> String {
    let raw = raw.strip_prefix("./").unwrap_or(raw);
    if raw.is_empty() {
        return String::new();
    }
    let abs = match path_type {
        PathType::Relative if !Path::new(raw).is_absolute() => {
            return to_slash(&clean(Path::new(raw)));
        }
        PathType::WorkspaceRelative => match workspace.map(|ws| ws.to_absolute(raw)) {
            Some(Ok(abs)) => abs,
            _ => return raw.to_string(),
        },
        _ => PathBuf::from(raw),
    };
    match relativize(&abs, base_dir) {
        Ok(rel) => to_slash(&rel),
        Err(_) => raw.to_string(),
    }
}

/// Lexically normalize a path: drop `.` components and fold `..`.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if last_is_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Make a path absolute against the current directory without touching
/// symlinks.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(clean(path))
    } else {
        Ok(clean(&std::env::current_dir()?.join(path)))
    }
}

/// Render a relative path with `/` separators.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir => Some(String::new()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Join an import prefix and a relative remainder.
pub fn join_import(prefix: &str, rest: &str) -> String {
    match (prefix.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, rest),
    }
}

/// If `path` is `prefix` or lies under it, return the remainder.
pub fn strip_import_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if path == prefix {
        return Some("");
    }
    path.strip_prefix(prefix)?.strip_prefix('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gopath_round_trip() {
        let ws = Workspace::gopath("/home/dev/go");
        let import = ws
            .to_import_path("/home/dev/go/src/example.com/x/gofmt")
            .unwrap();
        assert_eq!(import, "example.com/x/gofmt");
        assert_eq!(
            ws.to_absolute(&import).unwrap(),
            PathBuf::from("/home/dev/go/src/example.com/x/gofmt")
        );
    }

    #[test]
    fn test_path_escapes_workspace() {
        let ws = Workspace::gopath("/home/dev/go");
        let err = ws.to_import_path("/opt/elsewhere/pkg").unwrap_err();
        assert!(matches!(err, Error::PathEscapesWorkspace { .. }));
    }

    #[test]
    fn test_module_workspace() {
        let ws = Workspace::module("/src/proj", "example.com/proj");
        assert_eq!(ws.to_import_path("/src/proj").unwrap(), "example.com/proj");
        assert_eq!(
            ws.to_import_path("/src/proj/cmd/tool").unwrap(),
            "example.com/proj/cmd/tool"
        );
        assert_eq!(
            ws.to_absolute("example.com/proj/cmd/tool").unwrap(),
            PathBuf::from("/src/proj/cmd/tool")
        );
        assert!(ws.to_absolute("example.com/projector").is_err());
    }

    #[test]
    fn test_relativize_rejects_parent() {
        assert_eq!(
            relativize("/proj/foo/bar.go", "/proj").unwrap(),
            PathBuf::from("foo/bar.go")
        );
        let err = relativize("/other/bar.go", "/proj").unwrap_err();
        assert!(matches!(err, Error::PathEscapesBase { .. }));
    }

    #[test]
    fn test_normalize_reported() {
        let base = Path::new("/proj");
        assert_eq!(
            normalize_reported("./foo/bar.go", PathType::Relative, base, None),
            "foo/bar.go"
        );
        assert_eq!(
            normalize_reported("/proj/foo/bar.go", PathType::Absolute, base, None),
            "foo/bar.go"
        );
        assert_eq!(
            normalize_reported("/usr/lib/go/src/fmt/print.go", PathType::Absolute, base, None),
            "/usr/lib/go/src/fmt/print.go"
        );

        let ws = Workspace::gopath("/gopath");
        let base = Path::new("/gopath/src/example.com/proj");
        assert_eq!(
            normalize_reported(
                "example.com/proj/pkg/a.go",
                PathType::WorkspaceRelative,
                base,
                Some(&ws)
            ),
            "pkg/a.go"
        );
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(clean(Path::new("/..")), PathBuf::from("/"));
    }

    #[test]
    fn test_parse_module_path() {
        let go_mod = "// comment\nmodule example.com/proj // trailing\n\ngo 1.21\n";
        assert_eq!(parse_module_path(go_mod).as_deref(), Some("example.com/proj"));
        assert_eq!(parse_module_path("modules x\n"), None);
    }

    #[test]
    fn test_discover_module() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.mod"), "module example.com/proj\n").unwrap();
        std::fs::create_dir_all(temp.path().join("pkg/a")).unwrap();

        let ws = Workspace::discover(temp.path().join("pkg/a")).unwrap();
        assert_eq!(ws.import_prefix(), "example.com/proj");
        assert_eq!(
            ws.to_import_path(temp.path().join("pkg/a")).unwrap(),
            "example.com/proj/pkg/a"
        );
    }

    #[test]
    fn test_strip_import_prefix() {
        assert_eq!(strip_import_prefix("a/b/c", "a/b"), Some("c"));
        assert_eq!(strip_import_prefix("a/b", "a/b"), Some(""));
        assert_eq!(strip_import_prefix("a/bc", "a/b"), None);
    }
}
