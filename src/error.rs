//! Error taxonomy shared by the amalgomator, the check driver and the test
//! orchestrator.
//!
//! Library code returns [`Result`]; the CLI layer wraps these in `anyhow`
//! with the identity of the task that failed.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by gokart operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration document could not be decoded or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An absolute path is not inside the workspace source directory.
    #[error("path {path} escapes workspace {workspace}")]
    PathEscapesWorkspace { path: PathBuf, workspace: PathBuf },

    /// Relativizing a path would climb above its base directory.
    #[error("path {path} is not within {base}")]
    PathEscapesBase { path: PathBuf, base: PathBuf },

    /// A source file could not be parsed, rewritten or re-emitted.
    #[error("rewriting {path}: {reason}")]
    Rewrite { path: PathBuf, reason: String },

    /// An amalgomated program has no `main` function in its entry package.
    #[error("program {program}: no main function found in {dir}")]
    MissingMain { program: String, dir: PathBuf },

    /// A destination directory already exists.
    #[error("destination {0} already exists")]
    DirectoryCollision(PathBuf),

    /// A directory declares more than one Go package.
    #[error("multiple packages in directory {dir}: {names}")]
    MultiplePackages { dir: PathBuf, names: String },

    /// A tool could not be started.
    #[error("failed to start {tool}: {source}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// A tool was terminated without an exit status.
    #[error("{tool} was terminated by a signal")]
    ToolSignaled { tool: String },

    /// Tool output did not match the parser configured for it.
    #[error("unable to parse output line {line:?}: {reason}")]
    IssueParse { line: String, reason: String },

    /// A placeholder test file could not be written.
    #[error("writing placeholder {path}: {source}")]
    PlaceholderWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Shorthand for a rewrite error.
    pub fn rewrite(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Rewrite {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
        match e.into_io_error() {
            Some(io) => Error::Io(io),
            None => Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("filesystem loop detected at {}", path),
            )),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<globset::Error> for Error {
    fn from(e: globset::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = Error::MissingMain {
            program: "gofmt".to_string(),
            dir: PathBuf::from("/tmp/out/gofmt"),
        };
        assert_eq!(
            err.to_string(),
            "program gofmt: no main function found in /tmp/out/gofmt"
        );
    }

    #[test]
    fn test_yaml_error_is_config() {
        let yaml_err = serde_yaml::from_str::<Vec<String>>("{").unwrap_err();
        assert!(matches!(Error::from(yaml_err), Error::Config(_)));
    }
}
