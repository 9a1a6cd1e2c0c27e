use log::debug;
use regex::Regex;
use std::path::Path;
use std::process::Command;

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoMetadata {
    pub name: String,
    pub branch: String,
    pub last_commit_message: String,
}

fn git_raw(root: &Path, args: &[&str]) -> Option<Vec<u8>> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .map_err(|e| debug!("git {} could not start: {}", args.join(" "), e))
        .ok()?;
    if !output.status.success() {
        debug!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }
    Some(output.stdout)
}

fn git(root: &Path, args: &[&str]) -> Option<String> {
    git_raw(root, args)
        .map(|out| String::from_utf8_lossy(&out).trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `git@host:org/name.git`, `https://host/org/name` and similar all yield `name`.
pub fn name_from_remote(url: &str) -> Option<String> {
    let re = Regex::new(r"([^/:\\]+?)(?:\.git)?/*$").ok()?;
    re.captures(url.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

fn basename(path: &str) -> Option<String> {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

pub fn repo_metadata(root: &Path) -> RepoMetadata {
    let name = git(root, &["remote", "get-url", "origin"])
        .and_then(|url| name_from_remote(&url))
        .or_else(|| git(root, &["rev-parse", "--show-toplevel"]).and_then(|top| basename(&top)))
        .or_else(|| {
            root.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| UNKNOWN.to_string());

    RepoMetadata {
        name,
        branch: git(root, &["rev-parse", "--abbrev-ref", "HEAD"])
            .unwrap_or_else(|| UNKNOWN.to_string()),
        last_commit_message: git(root, &["log", "-1", "--pretty=%B"])
            .unwrap_or_else(|| UNKNOWN.to_string()),
    }
}

/// Paths known to the index, relative to `root`. `None` when `root` is not
/// inside a work tree, git is unavailable, or nothing under `root` is tracked
/// (an untracked directory inside some other repository).
pub fn tracked_files(root: &Path) -> Option<Vec<String>> {
    let out = git_raw(root, &["ls-files", "-z"])?;
    let files: Vec<String> = out
        .split(|b| *b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect();
    if files.is_empty() {
        None
    } else {
        Some(files)
    }
}
