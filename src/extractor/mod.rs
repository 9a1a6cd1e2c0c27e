//! Flattens user export documents into a single CSV table.

use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::ExtractorConfig;
use crate::utils;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub phone_type: String,
    pub routing_profile_id: String,
    pub tag_value: String,
}

impl UserRecord {
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.username.is_empty()
    }

    fn to_row(&self) -> [&str; 7] {
        [
            self.id.as_str(),
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.username.as_str(),
            self.phone_type.as_str(),
            self.routing_profile_id.as_str(),
            self.tag_value.as_str(),
        ]
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{path} has no '{key}' key, skipping")]
    MissingKey { path: PathBuf, key: String },
    #[error("'{key}' in {path} is not a list, skipping")]
    NotAList { path: PathBuf, key: String },
}

/// A record that was present in a document but rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dropped {
    pub index: usize,
    pub id: String,
    pub username: String,
}

#[derive(Debug, Default)]
pub struct FileOutcome {
    pub records: Vec<UserRecord>,
    pub dropped: Vec<Dropped>,
}

#[derive(Debug, Default)]
pub struct ExtractSummary {
    pub files_seen: usize,
    pub files_skipped: usize,
    pub rows_written: usize,
    pub warnings: Vec<String>,
}

pub fn csv_header(tag_key: &str) -> [&str; 7] {
    [
        "Id",
        "FirstName",
        "LastName",
        "Username",
        "PhoneType",
        "RoutingProfileId",
        tag_key,
    ]
}

fn text_at(value: &Value, pointer: &str) -> String {
    match value.pointer(pointer) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Escapes a key for use as a single JSON pointer segment.
fn pointer_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

pub fn project_user(value: &Value, tag_key: &str) -> UserRecord {
    UserRecord {
        id: text_at(value, "/Id"),
        first_name: text_at(value, "/IdentityInfo/FirstName"),
        last_name: text_at(value, "/IdentityInfo/LastName"),
        username: text_at(value, "/Username"),
        phone_type: text_at(value, "/PhoneConfig/PhoneType"),
        routing_profile_id: text_at(value, "/RoutingProfileId"),
        tag_value: text_at(value, &format!("/Tags/{}", pointer_segment(tag_key))),
    }
}

pub fn extract_file(path: &Path, cfg: &ExtractorConfig) -> Result<FileOutcome, ExtractError> {
    let content = fs::read(path).map_err(|source| ExtractError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document: Value = serde_json::from_slice(&content).map_err(|source| ExtractError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let users = document
        .get(&cfg.users_key)
        .ok_or_else(|| ExtractError::MissingKey {
            path: path.to_path_buf(),
            key: cfg.users_key.clone(),
        })?
        .as_array()
        .ok_or_else(|| ExtractError::NotAList {
            path: path.to_path_buf(),
            key: cfg.users_key.clone(),
        })?;

    let mut outcome = FileOutcome::default();
    for (index, user) in users.iter().enumerate() {
        let record = project_user(user, &cfg.tag_key);
        if record.is_valid() {
            outcome.records.push(record);
        } else {
            outcome.dropped.push(Dropped {
                index,
                id: record.id,
                username: record.username,
            });
        }
    }
    Ok(outcome)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Regular files directly under `dir` with a recognised extension, sorted by name.
pub fn input_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read input directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn run(cfg: &ExtractorConfig) -> Result<ExtractSummary> {
    let files = input_files(&cfg.input_dir, &cfg.extensions)?;
    info!(
        "Processing {} file(s) from {}",
        files.len(),
        cfg.input_dir.display()
    );

    let mut writer = utils::create_csv(&cfg.output_csv, &csv_header(&cfg.tag_key))?;
    let mut summary = ExtractSummary::default();

    for path in &files {
        summary.files_seen += 1;
        match extract_file(path, cfg) {
            Ok(outcome) => {
                for dropped in &outcome.dropped {
                    let message = format!(
                        "{}: user #{} dropped, Id={:?} Username={:?} (both are required)",
                        path.display(),
                        dropped.index,
                        dropped.id,
                        dropped.username
                    );
                    warn!("{}", message);
                    summary.warnings.push(message);
                }
                for record in &outcome.records {
                    writer.write_record(record.to_row())?;
                    summary.rows_written += 1;
                }
            }
            Err(e) => {
                warn!("{}", e);
                summary.warnings.push(e.to_string());
                summary.files_skipped += 1;
            }
        }
    }

    writer.flush()?;
    info!(
        "Wrote {} row(s) to {} ({} warning(s))",
        summary.rows_written,
        cfg.output_csv.display(),
        summary.warnings.len()
    );
    Ok(summary)
}
