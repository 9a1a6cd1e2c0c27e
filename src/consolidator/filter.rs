use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use crate::config::ConsolidatorConfig;

/// Extensions whose content is never copied into the dump.
pub const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "icns", "tif", "tiff", "webp", "psd", "heic",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "jar", "war", "whl", "egg",
    // executables and compiled objects
    "exe", "dll", "so", "dylib", "bin", "o", "a", "obj", "lib", "class", "pyc", "pyo", "pyd",
    "wasm", "rlib",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // media
    "mp3", "mp4", "wav", "ogg", "flac", "avi", "mov", "mkv", "webm",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt",
    // data stores
    "db", "sqlite", "sqlite3", "pkl", "parquet", "npy", "npz",
];

/// Directory names pruned by the fallback walk.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "target",
    "dist",
    "build",
    ".idea",
    ".vscode",
    ".mypy_cache",
    ".pytest_cache",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    Missing,
    NotAFile,
    BinaryExtension(String),
    TooLarge(u64),
    BinaryContent,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::Missing => write!(f, "missing from disk"),
            Exclusion::NotAFile => write!(f, "not a regular file"),
            Exclusion::BinaryExtension(ext) => write!(f, "binary extension .{}", ext),
            Exclusion::TooLarge(size) => write!(f, "too large, {} bytes", size),
            Exclusion::BinaryContent => write!(f, "binary content"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inclusion {
    Included,
    Excluded(Exclusion),
}

pub fn is_binary_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    BINARY_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// True when a null byte shows up in the first `limit` bytes.
pub fn sniff_binary(path: &Path, limit: usize) -> std::io::Result<bool> {
    let mut head = Vec::with_capacity(limit);
    File::open(path)?.take(limit as u64).read_to_end(&mut head)?;
    Ok(head.contains(&0))
}

/// A file whose sniff fails is still included; its read error surfaces in the dump.
pub fn classify(path: &Path, cfg: &ConsolidatorConfig) -> Inclusion {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return Inclusion::Excluded(Exclusion::Missing),
    };
    if !metadata.is_file() {
        return Inclusion::Excluded(Exclusion::NotAFile);
    }
    if let Some(ext) = is_binary_extension(path) {
        return Inclusion::Excluded(Exclusion::BinaryExtension(ext));
    }
    if metadata.len() >= cfg.max_file_size {
        return Inclusion::Excluded(Exclusion::TooLarge(metadata.len()));
    }
    match sniff_binary(path, cfg.sniff_bytes) {
        Ok(true) => Inclusion::Excluded(Exclusion::BinaryContent),
        _ => Inclusion::Included,
    }
}
