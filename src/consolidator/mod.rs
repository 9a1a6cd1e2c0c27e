//! Flattens a source tree into one annotated text document.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub mod filter;
pub mod git;
pub mod walk;

pub use filter::{classify, Exclusion, Inclusion};
pub use git::RepoMetadata;

use crate::config::ConsolidatorConfig;
use crate::utils;

const RULE: &str =
    "================================================================================";
const THIN_RULE: &str =
    "--------------------------------------------------------------------------------";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub relative_path: String,
    pub inclusion: Inclusion,
}

impl FileEntry {
    pub fn is_included(&self) -> bool {
        self.inclusion == Inclusion::Included
    }
}

#[derive(Debug, Clone)]
pub struct Consolidation {
    pub metadata: RepoMetadata,
    pub entries: Vec<FileEntry>,
}

impl Consolidation {
    pub fn included(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter().filter(|e| e.is_included())
    }
}

#[derive(Debug, Clone)]
pub struct ConsolidationSummary {
    pub output: PathBuf,
    pub listed: usize,
    pub included: usize,
    pub read_errors: usize,
}

/// Best-effort absolute form of a path that may not exist yet.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|p| p.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

/// Lists the tree (tracked files first, directory walk as fallback) and
/// classifies every path. The output file itself is never listed.
pub fn plan(cfg: &ConsolidatorConfig) -> Result<Consolidation> {
    let root = &cfg.root;
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let metadata = git::repo_metadata(root);
    let mut paths = match git::tracked_files(root) {
        Some(files) => files,
        None => {
            warn!(
                "{} is not a git work tree, walking the directory instead",
                root.display()
            );
            walk::walk_files(root)
        }
    };
    paths.sort();
    paths.dedup();

    let output = resolve(&cfg.output_file);
    let entries = paths
        .into_iter()
        .filter(|rel| resolve(&root.join(rel)) != output)
        .map(|rel| {
            let inclusion = classify(&root.join(&rel), cfg);
            FileEntry {
                relative_path: rel,
                inclusion,
            }
        })
        .collect();

    Ok(Consolidation { metadata, entries })
}

fn write_header<W: Write>(
    out: &mut W,
    consolidation: &Consolidation,
    now: DateTime<Utc>,
) -> std::io::Result<()> {
    let meta = &consolidation.metadata;
    let mut message = meta.last_commit_message.lines();
    writeln!(out, "{}", RULE)?;
    writeln!(out, "REPOSITORY: {}", meta.name)?;
    writeln!(out, "BRANCH: {}", meta.branch)?;
    writeln!(out, "LAST COMMIT: {}", message.next().unwrap_or_default())?;
    for line in message {
        writeln!(out, "    {}", line)?;
    }
    writeln!(
        out,
        "GENERATED: {}",
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    )?;
    writeln!(out, "FILES LISTED: {}", consolidation.entries.len())?;
    writeln!(out, "FILES INCLUDED: {}", consolidation.included().count())?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)
}

fn write_structure<W: Write>(out: &mut W, consolidation: &Consolidation) -> std::io::Result<()> {
    writeln!(out, "DIRECTORY STRUCTURE")?;
    writeln!(out, "{}", RULE)?;
    for entry in &consolidation.entries {
        match &entry.inclusion {
            Inclusion::Included => writeln!(out, "{}", entry.relative_path)?,
            Inclusion::Excluded(reason) => {
                writeln!(out, "{}  [excluded: {}]", entry.relative_path, reason)?
            }
        }
    }
    writeln!(out)
}

/// Writes one content block. Returns false when the file could not be read.
fn write_file_block<W: Write>(out: &mut W, root: &Path, entry: &FileEntry) -> std::io::Result<bool> {
    let path = Path::new(&entry.relative_path);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_else(|| "(none)".to_string());

    writeln!(out, "{}", THIN_RULE)?;
    writeln!(out, "FILE: {}", entry.relative_path)?;
    writeln!(out, "NAME: {}", name)?;
    writeln!(out, "EXTENSION: {}", extension)?;
    writeln!(out, "{}", THIN_RULE)?;

    let ok = match fs::read(root.join(path)) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            out.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                writeln!(out)?;
            }
            true
        }
        Err(e) => {
            warn!("Failed to read {}: {}", entry.relative_path, e);
            writeln!(out, "[Error reading file: {}]", e)?;
            false
        }
    };
    writeln!(out)?;
    Ok(ok)
}

/// Renders `consolidation` into `out`. Returns the number of unreadable files.
pub fn render<W: Write>(
    out: &mut W,
    consolidation: &Consolidation,
    root: &Path,
    now: DateTime<Utc>,
) -> std::io::Result<usize> {
    write_header(out, consolidation, now)?;
    write_structure(out, consolidation)?;

    writeln!(out, "FILE CONTENTS")?;
    writeln!(out, "{}", RULE)?;
    let mut read_errors = 0;
    for entry in consolidation.included() {
        if !write_file_block(out, root, entry)? {
            read_errors += 1;
        }
    }
    Ok(read_errors)
}

pub fn consolidate(cfg: &ConsolidatorConfig, now: DateTime<Utc>) -> Result<ConsolidationSummary> {
    let consolidation = plan(cfg)?;
    info!(
        "Repository {} on {}: {} file(s) listed, {} included",
        consolidation.metadata.name,
        consolidation.metadata.branch,
        consolidation.entries.len(),
        consolidation.included().count()
    );

    if let Some(parent) = cfg.output_file.parent() {
        utils::ensure_directory(parent)?;
    }
    let file = File::create(&cfg.output_file)
        .with_context(|| format!("failed to create {}", cfg.output_file.display()))?;
    let mut out = BufWriter::new(file);
    let read_errors = render(&mut out, &consolidation, &cfg.root, now)
        .with_context(|| format!("failed to write {}", cfg.output_file.display()))?;
    out.flush()?;

    Ok(ConsolidationSummary {
        output: cfg.output_file.clone(),
        listed: consolidation.entries.len(),
        included: consolidation.included().count(),
        read_errors,
    })
}
