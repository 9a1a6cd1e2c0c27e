use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use env_logger::fmt::Formatter;
use env_logger::{Builder, Env, Target};
use log::Record;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Sends every formatted line to stderr and to an append-only log file.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// `<RFC3339> [LEVEL] target: message`
pub fn format_record(buf: &mut Formatter, record: &Record<'_>) -> io::Result<()> {
    writeln!(
        buf,
        "{} [{}] {}: {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        record.level(),
        record.target(),
        record.args()
    )
}

/// Logger configuration without installing it. `RUST_LOG` wins over the
/// `info` default.
///
/// When `log_file` is given the file is opened in append mode, so lines from
/// earlier runs are kept.
pub fn builder(log_file: Option<&Path>) -> Result<Builder> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(format_record);

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            crate::utils::ensure_directory(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(TeeWriter { file })));
    }
    Ok(builder)
}

/// Installs the global logger.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    builder(log_file)?
        .try_init()
        .context("a global logger is already installed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn tee_writes_to_file_and_keeps_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tee.log");
        std::fs::write(&path, "earlier\n").unwrap();

        let file = OpenOptions::new().append(true).open(&path).unwrap();
        let mut tee = TeeWriter { file };
        tee.write_all(b"later\n").unwrap();
        tee.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }

    #[test]
    fn builder_creates_missing_log_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run.log");
        builder(Some(&path)).unwrap();
        assert!(path.exists());
    }
}
