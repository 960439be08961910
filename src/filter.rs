//! Issue filters.
//!
//! A filter answers one question about an issue: should it be dropped?
//! Filters compose with [`any`], [`all`] and [`not`], and a chain drops an
//! issue as soon as one member does.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::RwLock;

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Result;
use crate::issue::Issue;

lazy_static! {
    static ref REGEX_CACHE: RwLock<HashMap<String, Regex>> = RwLock::new(HashMap::new());
}

/// Compile `pattern`, reusing a previous compilation of the same string.
pub fn cached_regex(pattern: &str) -> Result<Regex> {
    if let Ok(cache) = REGEX_CACHE.read() {
        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }
    }
    let re = Regex::new(pattern)?;
    if let Ok(mut cache) = REGEX_CACHE.write() {
        cache.insert(pattern.to_string(), re.clone());
    }
    Ok(re)
}

/// A predicate over issues; `true` means drop.
pub trait Filter: Send + Sync + fmt::Debug {
    fn drops(&self, issue: &Issue) -> bool;
}

pub type BoxFilter = Box<dyn Filter>;

/// Drops issues whose path has a component fully matching a regexp.
#[derive(Debug)]
pub struct NameFilter {
    pattern: Regex,
}

impl Filter for NameFilter {
    fn drops(&self, issue: &Issue) -> bool {
        any_component_matches(&self.pattern, Path::new(issue.path()))
    }
}

/// Drops issues located in a subtree matching a glob.
#[derive(Debug)]
pub struct PathFilter {
    globs: GlobSet,
}

impl Filter for PathFilter {
    fn drops(&self, issue: &Issue) -> bool {
        !issue.path().is_empty() && in_subtree(&self.globs, Path::new(issue.path()))
    }
}

/// Drops issues whose message matches a regexp.
#[derive(Debug)]
pub struct MessageFilter {
    pattern: Regex,
}

impl Filter for MessageFilter {
    fn drops(&self, issue: &Issue) -> bool {
        self.pattern.is_match(issue.message())
    }
}

#[derive(Debug)]
struct AnyFilter(Vec<BoxFilter>);

impl Filter for AnyFilter {
    fn drops(&self, issue: &Issue) -> bool {
        self.0.iter().any(|f| f.drops(issue))
    }
}

#[derive(Debug)]
struct AllFilter(Vec<BoxFilter>);

impl Filter for AllFilter {
    fn drops(&self, issue: &Issue) -> bool {
        !self.0.is_empty() && self.0.iter().all(|f| f.drops(issue))
    }
}

#[derive(Debug)]
struct NotFilter(BoxFilter);

impl Filter for NotFilter {
    fn drops(&self, issue: &Issue) -> bool {
        !self.0.drops(issue)
    }
}

/// Name-pattern filter. The pattern must match a whole path component.
pub fn name(pattern: &str) -> Result<BoxFilter> {
    Ok(Box::new(NameFilter {
        pattern: anchored(pattern)?,
    }))
}

/// Path-subtree filter.
pub fn path(glob: &str) -> Result<BoxFilter> {
    Ok(Box::new(PathFilter {
        globs: glob_set([glob])?,
    }))
}

/// Message filter.
pub fn message(pattern: &str) -> Result<BoxFilter> {
    Ok(Box::new(MessageFilter {
        pattern: cached_regex(pattern)?,
    }))
}

/// Drops when any member drops.
pub fn any(filters: Vec<BoxFilter>) -> BoxFilter {
    Box::new(AnyFilter(filters))
}

/// Drops when every member drops. An empty set drops nothing.
pub fn all(filters: Vec<BoxFilter>) -> BoxFilter {
    Box::new(AllFilter(filters))
}

/// Inverts a filter.
pub fn not(filter: BoxFilter) -> BoxFilter {
    Box::new(NotFilter(filter))
}

/// Keep the issues no filter drops, in their original order.
pub fn apply(issues: Vec<Issue>, filters: &[BoxFilter]) -> Vec<Issue> {
    issues
        .into_iter()
        .filter(|issue| !filters.iter().any(|f| f.drops(issue)))
        .collect()
}

fn anchored(pattern: &str) -> Result<Regex> {
    cached_regex(&format!("^(?:{})$", pattern))
}

fn glob_set<'a, I: IntoIterator<Item = &'a str>>(globs: I) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(compile_glob(glob)?);
    }
    Ok(builder.build()?)
}

fn compile_glob(glob: &str) -> Result<Glob> {
    let glob = glob.trim_start_matches("./").trim_end_matches('/');
    Ok(GlobBuilder::new(glob).literal_separator(true).build()?)
}

fn any_component_matches(pattern: &Regex, path: &Path) -> bool {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .any(|c| pattern.is_match(c))
}

fn in_subtree(globs: &GlobSet, path: &Path) -> bool {
    path.ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .any(|p| globs.is_match(p))
}

/// Compiled exclude descriptor: name patterns on single path components
/// and path globs on subtrees, both relative to a project root.
#[derive(Debug, Clone, Default)]
pub struct Exclude {
    names: Vec<Regex>,
    name_patterns: Vec<String>,
    paths: Option<GlobSet>,
    path_patterns: Vec<String>,
}

impl Exclude {
    pub fn new(names: &[String], paths: &[String]) -> Result<Self> {
        let compiled = names
            .iter()
            .map(|n| anchored(n))
            .collect::<Result<Vec<_>>>()?;
        let globs = if paths.is_empty() {
            None
        } else {
            Some(glob_set(paths.iter().map(String::as_str))?)
        };
        Ok(Self {
            names: compiled,
            name_patterns: names.to_vec(),
            paths: globs,
            path_patterns: paths.to_vec(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.paths.is_none()
    }

    /// Whether a root-relative path is excluded.
    pub fn matches(&self, rel: &Path) -> bool {
        if self.names.iter().any(|re| any_component_matches(re, rel)) {
            return true;
        }
        match &self.paths {
            Some(globs) => in_subtree(globs, rel),
            None => false,
        }
    }

    /// The same exclusions as issue filters.
    pub fn filters(&self) -> Result<Vec<BoxFilter>> {
        let mut filters = Vec::new();
        for n in &self.name_patterns {
            filters.push(name(n)?);
        }
        if !self.path_patterns.is_empty() {
            filters.push(Box::new(PathFilter {
                globs: glob_set(self.path_patterns.iter().map(String::as_str))?,
            }) as BoxFilter);
        }
        Ok(filters)
    }
}
