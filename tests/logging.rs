use log::warn;
use regex::Regex;
use std::fs;
use tempfile::TempDir;

use ops_toolkit::logging;

// The global logger can be installed once per process, so this file holds a
// single test.
#[test]
fn warnings_are_appended_to_the_log_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logs").join("user_extract.log");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "2024-01-01T00:00:00Z [INFO] extractor: previous run\n").unwrap();

    logging::init(Some(&path)).unwrap();
    warn!(target: "extractor", "export.json: user #1 dropped");
    log::logger().flush();

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "2024-01-01T00:00:00Z [INFO] extractor: previous run");

    let line = Regex::new(
        r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z \[WARN\] extractor: export\.json: user #1 dropped$",
    )
    .unwrap();
    assert!(
        lines[1..].iter().any(|l| line.is_match(l)),
        "no formatted warning in {:?}",
        content
    );

    assert!(logging::init(None).is_err());
}
