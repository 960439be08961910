//! Import block grouping.
//!
//! Renders a parenthesized import block as three groups (standard library,
//! third-party, workspace-local) separated by blank lines and sorted by
//! path, carrying each spec's comments along with it.

use std::cmp::Ordering;

use super::{is_std_import, GoFile, ImportBlock};
use crate::error::Result;
use crate::paths::strip_import_prefix;

/// Which group an import belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImportGroup {
    Std,
    ThirdParty,
    Local,
}

impl ImportGroup {
    /// Classify `path`; `local_prefix` is the import path of the tree that
    /// counts as workspace-local (empty disables the local group).
    pub fn classify(path: &str, local_prefix: &str) -> Self {
        if !local_prefix.is_empty() && strip_import_prefix(path, local_prefix).is_some() {
            ImportGroup::Local
        } else if is_std_import(path) {
            ImportGroup::Std
        } else {
            ImportGroup::ThirdParty
        }
    }
}

/// One spec within a block, with the comments that travel with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub alias: Option<String>,
    pub path: String,
    /// Path literal exactly as it should be written, quotes included.
    pub literal: String,
    pub leading: Vec<String>,
    pub trailing: Option<String>,
}

impl ImportEntry {
    pub fn new(alias: Option<String>, path: &str) -> Self {
        Self {
            alias,
            path: path.to_string(),
            literal: format!("\"{}\"", path),
            leading: Vec::new(),
            trailing: None,
        }
    }

    fn render_into(&self, out: &mut String) {
        for comment in &self.leading {
            out.push('\t');
            out.push_str(comment);
            out.push('\n');
        }
        out.push('\t');
        if let Some(alias) = &self.alias {
            out.push_str(alias);
            out.push(' ');
        }
        out.push_str(&self.literal);
        if let Some(trailing) = &self.trailing {
            out.push(' ');
            out.push_str(trailing);
        }
        out.push('\n');
    }

    fn order(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.alias.cmp(&other.alias))
    }
}

/// Render `( ... )` for the given entries. `dangling` comments follow the
/// last group.
pub fn render_block(entries: &[ImportEntry], dangling: &[String], local_prefix: &str) -> String {
    let mut groups: [Vec<&ImportEntry>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for entry in entries {
        let idx = match ImportGroup::classify(&entry.path, local_prefix) {
            ImportGroup::Std => 0,
            ImportGroup::ThirdParty => 1,
            ImportGroup::Local => 2,
        };
        groups[idx].push(entry);
    }

    let mut out = String::from("(\n");
    let mut first = true;
    for group in groups.iter_mut().filter(|g| !g.is_empty()) {
        group.sort_by(|a, b| a.order(b));
        if !first {
            out.push('\n');
        }
        first = false;
        for entry in group.iter() {
            entry.render_into(&mut out);
        }
    }
    if !dangling.is_empty() {
        if !first {
            out.push('\n');
        }
        for comment in dangling {
            out.push('\t');
            out.push_str(comment);
            out.push('\n');
        }
    }
    out.push(')');
    out
}

/// Collect the entries of one block from a parsed file. Returns `None` for
/// an empty block.
pub fn block_entries(file: &GoFile, block: &ImportBlock) -> Result<Option<(Vec<ImportEntry>, Vec<String>)>> {
    let range = &block.span.bytes;
    let specs: Vec<_> = file
        .imports()?
        .into_iter()
        .filter(|s| s.spec_span.bytes.start >= range.start && s.spec_span.bytes.end <= range.end)
        .collect();
    if specs.is_empty() {
        return Ok(None);
    }

    enum Item {
        Spec(usize),
        Comment(usize),
    }
    let comments = file.comments_in(range);
    let mut items: Vec<(usize, Item)> = specs
        .iter()
        .enumerate()
        .map(|(i, s)| (s.spec_span.bytes.start, Item::Spec(i)))
        .chain(
            comments
                .iter()
                .enumerate()
                .map(|(i, c)| (c.span.bytes.start, Item::Comment(i))),
        )
        .collect();
    items.sort_by_key(|(start, _)| *start);

    let source = file.source();
    let mut entries: Vec<ImportEntry> = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut last_spec_row: Option<usize> = None;
    for (_, item) in items {
        match item {
            Item::Spec(i) => {
                let spec = &specs[i];
                entries.push(ImportEntry {
                    alias: spec.alias.clone(),
                    path: spec.path.clone(),
                    literal: source[spec.path_span.bytes.clone()].to_string(),
                    leading: std::mem::take(&mut pending),
                    trailing: None,
                });
                last_spec_row = Some(spec.spec_span.end_row);
            }
            Item::Comment(i) => {
                let comment = &comments[i];
                let same_row = last_spec_row == Some(comment.span.start_row);
                match entries.last_mut() {
                    Some(entry) if same_row && entry.trailing.is_none() && pending.is_empty() => {
                        entry.trailing = Some(comment.text.clone());
                    }
                    _ => pending.push(comment.text.clone()),
                }
            }
        }
    }
    Ok(Some((entries, pending)))
}

/// Regroup every parenthesized import block of `file`, returning the new
/// source text.
pub fn regroup(file: &GoFile, local_prefix: &str) -> Result<String> {
    let mut edits = Vec::new();
    for block in file.import_blocks() {
        if let Some((entries, dangling)) = block_entries(file, &block)? {
            edits.push((block.span.bytes.clone(), render_block(&entries, &dangling, local_prefix)));
        }
    }
    Ok(apply_edits(file.source(), edits))
}

/// Apply non-overlapping byte-range replacements.
pub fn apply_edits(source: &str, mut edits: Vec<(std::ops::Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| std::cmp::Reverse(range.start));
    let mut out = source.to_string();
    for (range, replacement) in edits {
        out.replace_range(range, &replacement);
    }
    out
}
