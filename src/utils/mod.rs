use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::Path;

pub fn ensure_directory(path: &Path) -> Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Truncates (or creates) `path` and writes `header` as the first record.
pub fn create_csv(path: &Path, header: &[&str]) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(header)?;
    Ok(writer)
}

/// Renders a relative path with `/` separators regardless of platform.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn create_csv_makes_parent_and_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let mut writer = create_csv(&path, &["A", "B"]).unwrap();
        writer.write_record(["1", "two, with comma"]).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "A,B\n1,\"two, with comma\"\n");
    }

    #[test]
    fn slash_path_joins_components() {
        let path: PathBuf = ["src", "bin", "main.rs"].iter().collect();
        assert_eq!(slash_path(&path), "src/bin/main.rs");
    }
}
