//! Analysis checks.
//!
//! Every check gokart knows is described by a [`CheckDefinition`]: how to
//! invoke it, which argument form means "every package", and how to parse
//! what it prints. The [`driver`] turns a definition plus configuration into
//! issues; [`builtin`] holds the checks gokart implements itself.

pub mod builtin;
pub mod driver;

use crate::error::Result;
use crate::issue::{LinePrefilter, ParserKind};
use crate::paths::PathType;

pub use driver::{CheckResult, Driver, PackageSelection};

/// How a check is pointed at packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Accepts a list of packages.
    PerPackage,
    /// Only runs on the whole tree.
    WholeTree,
    /// Takes source files; each package becomes its non-test `.go` files.
    PerFile,
}

/// Argument form meaning "every package".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllForm {
    /// `./...`
    Recursive,
    /// `.`
    Dot,
    /// One argument per discovered package.
    Enumerate,
}

/// What gets executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    /// An external tool and its leading arguments.
    External {
        command: &'static str,
        args: &'static [&'static str],
    },
    /// A routine in gokart's own dispatcher, reached by re-executing gokart
    /// as `_name`.
    Builtin,
}

/// Lines dropped before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefilter {
    None,
    /// `# pkg` headers and `exit status N` lines from the go command.
    GoToolFraming,
}

impl Prefilter {
    pub fn build(self) -> Result<Option<LinePrefilter>> {
        match self {
            Prefilter::None => Ok(None),
            Prefilter::GoToolFraming => LinePrefilter::go_tool_framing().map(Some),
        }
    }
}

/// A check gokart can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckDefinition {
    pub name: &'static str,
    pub program: Program,
    pub parser: ParserKind,
    pub path_type: PathType,
    pub prefilter: Prefilter,
    pub invocation: Invocation,
    pub all_form: AllForm,
}

/// Known checks, in the order they run.
pub static DEFINITIONS: &[CheckDefinition] = &[
    CheckDefinition {
        name: "compiles",
        program: Program::External {
            command: "go",
            args: &["build", "-o", "/dev/null"],
        },
        parser: ParserKind::MultiLine,
        path_type: PathType::Relative,
        prefilter: Prefilter::GoToolFraming,
        invocation: Invocation::PerPackage,
        all_form: AllForm::Recursive,
    },
    CheckDefinition {
        name: "deadcode",
        program: Program::External {
            command: "deadcode",
            args: &[],
        },
        parser: ParserKind::AfterFirstWhitespace,
        path_type: PathType::Relative,
        prefilter: Prefilter::None,
        invocation: Invocation::PerPackage,
        all_form: AllForm::Enumerate,
    },
    CheckDefinition {
        name: "errcheck",
        program: Program::External {
            command: "errcheck",
            args: &["-abspath"],
        },
        parser: ParserKind::Standard,
        path_type: PathType::Absolute,
        prefilter: Prefilter::None,
        invocation: Invocation::PerPackage,
        all_form: AllForm::Recursive,
    },
    CheckDefinition {
        name: "extimport",
        program: Program::Builtin,
        parser: ParserKind::Standard,
        path_type: PathType::Relative,
        prefilter: Prefilter::None,
        invocation: Invocation::PerPackage,
        all_form: AllForm::Enumerate,
    },
    CheckDefinition {
        name: "gofmt",
        program: Program::External {
            command: "gofmt",
            args: &["-l"],
        },
        parser: ParserKind::Raw,
        path_type: PathType::Relative,
        prefilter: Prefilter::None,
        invocation: Invocation::PerFile,
        all_form: AllForm::Enumerate,
    },
    CheckDefinition {
        name: "golint",
        program: Program::External {
            command: "golint",
            args: &[],
        },
        parser: ParserKind::Strict,
        path_type: PathType::Relative,
        prefilter: Prefilter::None,
        invocation: Invocation::PerPackage,
        all_form: AllForm::Recursive,
    },
    CheckDefinition {
        name: "govet",
        program: Program::External {
            command: "go",
            args: &["vet"],
        },
        parser: ParserKind::IndentedContinuation,
        path_type: PathType::Relative,
        prefilter: Prefilter::GoToolFraming,
        invocation: Invocation::PerPackage,
        all_form: AllForm::Recursive,
    },
    CheckDefinition {
        name: "importalias",
        program: Program::Builtin,
        parser: ParserKind::Standard,
        path_type: PathType::Relative,
        prefilter: Prefilter::None,
        invocation: Invocation::WholeTree,
        all_form: AllForm::Dot,
    },
    CheckDefinition {
        name: "ineffassign",
        program: Program::External {
            command: "ineffassign",
            args: &[],
        },
        parser: ParserKind::Standard,
        path_type: PathType::Absolute,
        prefilter: Prefilter::None,
        invocation: Invocation::WholeTree,
        all_form: AllForm::Dot,
    },
    CheckDefinition {
        name: "novendor",
        program: Program::Builtin,
        parser: ParserKind::Raw,
        path_type: PathType::Relative,
        prefilter: Prefilter::None,
        invocation: Invocation::WholeTree,
        all_form: AllForm::Dot,
    },
];

/// Look up a check by name.
pub fn definition(name: &str) -> Option<&'static CheckDefinition> {
    DEFINITIONS.iter().find(|d| d.name == name)
}

/// Names of every known check, in run order.
pub fn check_names() -> Vec<&'static str> {
    DEFINITIONS.iter().map(|d| d.name).collect()
}
