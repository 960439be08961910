//! Configuration documents.
//!
//! Three YAML documents drive gokart: the amalgomation input, the check
//! configuration and the test configuration. Each is decoded with serde and
//! validated up front so bad patterns fail at start-up, not mid-run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filter::{self, BoxFilter, Exclude};

/// Check configuration file names searched in the project root.
pub const CHECK_CONFIG_NAMES: &[&str] = &["check.yml", ".gokart/check.yml"];

/// Test configuration file names searched in the project root.
pub const TEST_CONFIG_NAMES: &[&str] = &["test.yml", ".gokart/test.yml"];

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

/// Find the first existing configuration file under `root`.
pub fn discover(root: &Path, names: &[&str]) -> Option<PathBuf> {
    names.iter().map(|n| root.join(n)).find(|p| p.is_file())
}

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    serde_yaml::from_str(&content)
        .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
}

/// Load an explicitly named document, else a discovered one, else defaults.
fn load_or_default<T>(explicit: Option<&Path>, root: &Path, names: &[&str]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    match explicit {
        Some(path) => read_yaml(path),
        None => match discover(root, names) {
            Some(path) => {
                log::debug!("using configuration {}", path.display());
                read_yaml(&path)
            }
            None => Ok(T::default()),
        },
    }
}

// ---------------------------------------------------------------------------
// Amalgomation input
// ---------------------------------------------------------------------------

/// Input to the amalgomator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AmalgomateConfig {
    #[serde(default)]
    pub packages: BTreeMap<String, ProgramSpec>,
}

/// One program to amalgomate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramSpec {
    /// Workspace import path of the entry package.
    pub main: String,
    /// How many directories above the entry package the project root is.
    #[serde(rename = "distance-to-project-pkg", default)]
    pub distance_to_project_pkg: usize,
}

impl ProgramSpec {
    /// Import path of the project root this program belongs to.
    pub fn project_import_path(&self) -> Result<String> {
        let parts: Vec<&str> = self.main.trim_matches('/').split('/').collect();
        if self.distance_to_project_pkg >= parts.len() {
            return Err(Error::config(format!(
                "distance-to-project-pkg {} is too large for {}",
                self.distance_to_project_pkg, self.main
            )));
        }
        Ok(parts[..parts.len() - self.distance_to_project_pkg].join("/"))
    }
}

impl AmalgomateConfig {
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = read_yaml(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.packages.is_empty() {
            return Err(Error::config("packages must not be empty"));
        }
        for (name, spec) in &self.packages {
            if !NAME_RE.is_match(name) {
                return Err(Error::config(format!(
                    "invalid program name {:?}: must match [A-Za-z0-9_-]+",
                    name
                )));
            }
            if spec.main.trim_matches('/').is_empty() {
                return Err(Error::config(format!("program {}: main must not be empty", name)));
            }
            spec.project_import_path()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Exclude descriptor
// ---------------------------------------------------------------------------

/// Names and paths to leave out of package discovery and issue output.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExcludeConfig {
    /// Regexps matched against single path components.
    #[serde(default)]
    pub names: Vec<String>,
    /// Globs matched against root-relative subtrees.
    #[serde(default)]
    pub paths: Vec<String>,
}

impl ExcludeConfig {
    pub fn compile(&self) -> Result<Exclude> {
        Exclude::new(&self.names, &self.paths)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.paths.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Check configuration
// ---------------------------------------------------------------------------

/// Kind of a per-check filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Message,
    Name,
    Path,
}

/// A per-check filter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(rename = "type")]
    pub kind: FilterKind,
    pub value: String,
}

impl FilterConfig {
    pub fn compile(&self) -> Result<BoxFilter> {
        match self.kind {
            FilterKind::Message => filter::message(&self.value),
            FilterKind::Name => filter::name(&self.value),
            FilterKind::Path => filter::path(&self.value),
        }
    }
}

/// Settings for one check.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CheckSettings {
    #[serde(default)]
    pub skip: bool,
    /// Extra arguments placed before the package arguments.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

/// The check configuration document.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CheckConfig {
    #[serde(default)]
    pub checks: BTreeMap<String, CheckSettings>,
    #[serde(default)]
    pub exclude: ExcludeConfig,
}

impl CheckConfig {
    /// Load from `explicit`, or discover under `root`, and validate.
    pub fn load(explicit: Option<&Path>, root: &Path) -> Result<Self> {
        let config: Self = load_or_default(explicit, root, CHECK_CONFIG_NAMES)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, settings) in &self.checks {
            if crate::check::definition(name).is_none() {
                return Err(Error::config(format!(
                    "unknown check {:?} (known: {})",
                    name,
                    crate::check::check_names().join(", ")
                )));
            }
            for f in &settings.filters {
                f.compile()?;
            }
        }
        self.exclude.compile()?;
        Ok(())
    }

    /// Settings for `name`, defaults when not configured.
    pub fn settings(&self, name: &str) -> CheckSettings {
        self.checks.get(name).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Test configuration
// ---------------------------------------------------------------------------

/// Selects every package.
pub const TAG_ALL: &str = "all";
/// Selects packages matching no tag.
pub const TAG_NONE: &str = "none";

/// The test configuration document.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Tag name to the packages it covers.
    #[serde(default)]
    pub tags: BTreeMap<String, ExcludeConfig>,
    #[serde(default)]
    pub exclude: ExcludeConfig,
}

impl TestConfig {
    pub fn load(explicit: Option<&Path>, root: &Path) -> Result<Self> {
        let config: Self = load_or_default(explicit, root, TEST_CONFIG_NAMES)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (tag, matcher) in &self.tags {
            if !NAME_RE.is_match(tag) || tag == TAG_ALL || tag == TAG_NONE {
                return Err(Error::config(format!(
                    "invalid tag name {:?}: must match [A-Za-z0-9_-]+ and not be {:?} or {:?}",
                    tag, TAG_ALL, TAG_NONE
                )));
            }
            matcher.compile()?;
        }
        self.exclude.compile()?;
        Ok(())
    }

    /// Check that every requested tag is defined or reserved.
    pub fn validate_selection(&self, requested: &[String]) -> Result<()> {
        for tag in requested {
            if tag != TAG_ALL && tag != TAG_NONE && !self.tags.contains_key(tag) {
                return Err(Error::config(format!("unknown tag {:?}", tag)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amalgomate_config() {
        let yaml = r#"
packages:
  gofmt:
    main: example.com/x/gofmt
  ptimports:
    main: example.com/x/ptimports/cmd/ptimports
    distance-to-project-pkg: 2
"#;
        let config: AmalgomateConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.packages.len(), 2);
        let pt = &config.packages["ptimports"];
        assert_eq!(pt.project_import_path().unwrap(), "example.com/x/ptimports");
        assert_eq!(
            config.packages["gofmt"].project_import_path().unwrap(),
            "example.com/x/gofmt"
        );
    }

    #[test]
    fn test_amalgomate_config_rejects_bad_input() {
        let empty: AmalgomateConfig = serde_yaml::from_str("packages: {}").unwrap();
        assert!(matches!(empty.validate(), Err(Error::Config(_))));

        let bad_name: AmalgomateConfig =
            serde_yaml::from_str("packages:\n  \"bad name\":\n    main: a/b\n").unwrap();
        assert!(bad_name.validate().is_err());

        let too_far: AmalgomateConfig = serde_yaml::from_str(
            "packages:\n  x:\n    main: a/b\n    distance-to-project-pkg: 2\n",
        )
        .unwrap();
        assert!(too_far.validate().is_err());

        assert!(serde_yaml::from_str::<AmalgomateConfig>("pkgs: {}").is_err());
    }

    #[test]
    fn test_check_config() {
        let yaml = r#"
checks:
  golint:
    filters:
      - type: message
        value: "should have comment"
  errcheck:
    skip: true
exclude:
  names: ["mocks"]
  paths: ["generated/**"]
"#;
        let config: CheckConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert!(config.settings("errcheck").skip);
        assert_eq!(config.settings("golint").filters.len(), 1);
        assert_eq!(config.settings("govet"), CheckSettings::default());
    }

    #[test]
    fn test_unknown_check_is_config_error() {
        let config: CheckConfig = serde_yaml::from_str("checks:\n  nosuch: {}\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_filter_pattern_is_rejected() {
        let yaml = "checks:\n  golint:\n    filters:\n      - type: name\n        value: \"(\"\n";
        let config: CheckConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_test_config_tags() {
        let yaml = "tags:\n  integration:\n    names: [\"integration\"]\n";
        let config: TestConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        config
            .validate_selection(&["integration".to_string(), "none".to_string()])
            .unwrap();
        assert!(config.validate_selection(&["slow".to_string()]).is_err());

        let reserved: TestConfig = serde_yaml::from_str("tags:\n  all: {}\n").unwrap();
        assert!(reserved.validate().is_err());
    }

    #[test]
    fn test_discovery() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(discover(temp.path(), CHECK_CONFIG_NAMES).is_none());
        let loaded = CheckConfig::load(None, temp.path()).unwrap();
        assert!(loaded.checks.is_empty());

        fs::create_dir_all(temp.path().join(".gokart")).unwrap();
        fs::write(
            temp.path().join(".gokart/check.yml"),
            "checks:\n  gofmt:\n    skip: true\n",
        )
        .unwrap();
        assert_eq!(
            discover(temp.path(), CHECK_CONFIG_NAMES).unwrap(),
            temp.path().join(".gokart/check.yml")
        );
        assert!(CheckConfig::load(None, temp.path()).unwrap().settings("gofmt").skip);
    }
}
