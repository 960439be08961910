//! Command-line interface for gokart.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::amalgomate::{Amalgomator, Options};
use crate::check::{Driver, PackageSelection};
use crate::config::{AmalgomateConfig, CheckConfig, TestConfig};
use crate::filter::Exclude;
use crate::gosrc::BuildContext;
use crate::gotest::Orchestrator;
use crate::packages;
use crate::paths::Workspace;
use crate::report::{self, Format};

/// Exit codes. Hard failures share status 1 with findings.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 1;

/// Build, check and test tooling for Go projects.
///
/// `gokart amalgomate` merges standalone Go programs into one vendored
/// tree; `check` runs linters and reports their issues in a common form;
/// `test` runs `go test` over every package, including packages that have
/// no tests of their own.
#[derive(Parser)]
#[command(name = "gokart")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log debug output and print full error chains
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge Go programs into one tree with a dispatch file
    Amalgomate(AmalgomateArgs),
    /// Run static checks
    Check(CheckArgs),
    /// Run go test over the project's packages
    Test(TestArgs),
    /// List the packages under a root
    Packages(PackagesArgs),
}

impl Commands {
    /// Task name used in error messages.
    pub fn task(&self) -> &'static str {
        match self {
            Commands::Amalgomate(_) => "amalgomate",
            Commands::Check(_) => "check",
            Commands::Test(_) => "test",
            Commands::Packages(_) => "packages",
        }
    }
}

/// Arguments for the amalgomate command.
#[derive(Args)]
pub struct AmalgomateArgs {
    /// Path to the amalgomation YAML file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Directory receiving the dispatch file and the internal/ tree
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Package clause of the dispatch file (default: output dir name)
    #[arg(short, long)]
    pub package: Option<String>,

    /// Go root holding the standard library's flag package
    #[arg(long)]
    pub goroot: Option<PathBuf>,
}

/// Flags shared by commands that work on a project root.
#[derive(Args)]
pub struct RootArgs {
    /// Project root
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Configuration file (default: discovered under the root)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Packages to check, relative to the root (default: all)
    pub packages: Vec<String>,

    #[command(flatten)]
    pub root: RootArgs,

    /// Run only these checks
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Run checks concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: Format,
}

/// Arguments for the test command.
#[derive(Args)]
pub struct TestArgs {
    /// Packages to test, relative to the root (default: all)
    pub packages: Vec<String>,

    #[command(flatten)]
    pub root: RootArgs,

    /// Test only packages with these tags (`all`, `none` or configured tags)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Also write a JUnit XML report
    #[arg(long)]
    pub junit_output: Option<PathBuf>,

    /// Arguments passed through to go test
    #[arg(last = true)]
    pub go_args: Vec<String>,
}

/// Arguments for the packages command.
#[derive(Args)]
pub struct PackagesArgs {
    /// Project root
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,
}

/// Run the amalgomate command.
pub fn run_amalgomate(args: &AmalgomateArgs) -> anyhow::Result<i32> {
    let config = AmalgomateConfig::parse_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let workspace = Workspace::discover(&args.output_dir)?;
    let options = Options {
        output_dir: args.output_dir.clone(),
        package: args.package.clone(),
        goroot: args.goroot.clone(),
    };
    let manifest = Amalgomator::new(config, workspace, options).run()?;
    report::print_manifest(&manifest);
    Ok(EXIT_SUCCESS)
}

/// Run the check command.
pub fn run_check(args: &CheckArgs) -> anyhow::Result<i32> {
    let root = resolve_root(&args.root.root)?;
    let config = CheckConfig::load(args.root.config.as_deref(), &root)?;
    let driver = Driver::new(&root, config)?.parallel(args.parallel);
    let results = driver.run(&args.only, &PackageSelection::from_args(&args.packages))?;

    let stdout = std::io::stdout();
    match args.format {
        Format::Text => {
            report::write_text(&results, stdout.lock())?;
            report::print_check_summary(&results);
        }
        Format::Json => report::write_json(driver.root(), &results, stdout.lock())?,
    }

    if results.iter().all(|r| r.passed()) {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the test command.
pub fn run_test(args: &TestArgs) -> anyhow::Result<i32> {
    let root = resolve_root(&args.root.root)?;
    let config = TestConfig::load(args.root.config.as_deref(), &root)?;
    let orchestrator = Orchestrator::new(&root, &config)?
        .tags(args.tags.clone())
        .junit_output(args.junit_output.clone())
        .go_args(args.go_args.clone());

    let report = orchestrator.run(
        &PackageSelection::from_args(&args.packages),
        std::io::stdout().lock(),
    )?;
    report::print_test_summary(&report);

    if report.passed() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the packages command.
pub fn run_packages(args: &PackagesArgs) -> anyhow::Result<i32> {
    let root = resolve_root(&args.root)?;
    for package in packages::enumerate(&root, &Exclude::default(), &BuildContext::default())? {
        println!("{}", package.arg());
    }
    Ok(EXIT_SUCCESS)
}

fn resolve_root(root: &Path) -> anyhow::Result<PathBuf> {
    root.canonicalize()
        .with_context(|| format!("cannot access root {}", root.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_test_args() {
        let cli = Cli::parse_from([
            "gokart", "test", "./a", "--tags", "unit,db", "--junit-output", "out.xml", "--", "-race",
        ]);
        assert_eq!(cli.command.task(), "test");
        match cli.command {
            Commands::Test(args) => {
                assert_eq!(args.packages, vec!["./a".to_string()]);
                assert_eq!(args.tags, vec!["unit".to_string(), "db".to_string()]);
                assert_eq!(args.junit_output, Some(PathBuf::from("out.xml")));
                assert_eq!(args.go_args, vec!["-race".to_string()]);
            }
            _ => panic!("expected test command"),
        }
    }

    #[test]
    fn test_parse_check_args() {
        let cli = Cli::parse_from([
            "gokart", "--debug", "check", "--only", "govet,golint", "--format", "json", "--parallel",
        ]);
        assert!(cli.debug);
        match cli.command {
            Commands::Check(args) => {
                assert!(args.packages.is_empty());
                assert_eq!(args.only, vec!["govet".to_string(), "golint".to_string()]);
                assert_eq!(args.format, Format::Json);
                assert!(args.parallel);
                assert_eq!(args.root.root, PathBuf::from("."));
            }
            _ => panic!("expected check command"),
        }
    }

    #[test]
    fn test_amalgomate_requires_config() {
        assert!(Cli::try_parse_from(["gokart", "amalgomate", "--output-dir", "out"]).is_err());
    }
}
