use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

use ops_toolkit::auditor::client::{FunctionSummary, ProductSummary, RoleSummary};
use ops_toolkit::auditor::mock::MockInventory;
use ops_toolkit::auditor::{run_all, Page, ResourceKind};
use ops_toolkit::config::AuditorConfig;

#[tokio::test]
async fn writes_four_reports() {
    let dir = TempDir::new().unwrap();
    let cfg = AuditorConfig {
        output_dir: dir.path().join("audit"),
        ..AuditorConfig::default()
    };
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let mock = MockInventory::new()
        .with_function_pages(vec![Page::last(vec![FunctionSummary {
            name: "worker".into(),
            ..Default::default()
        }])])
        .with_log_event("/aws/lambda/worker", Some(now - Duration::days(400)))
        .with_role_pages(vec![Page::last(vec![RoleSummary {
            name: "deployer".into(),
            arn: "arn:aws:iam::1:role/deployer".into(),
            create_date: None,
        }])])
        .with_product_pages(vec![Page::last(vec![ProductSummary {
            id: "prod-9".into(),
            name: "Bucket".into(),
            created: Some(now - Duration::days(5)),
            ..Default::default()
        }])]);

    let outcomes = run_all(&mock, &cfg, now).await.unwrap();
    let kinds: Vec<_> = outcomes.iter().map(|o| o.kind).collect();
    assert_eq!(kinds, ResourceKind::ALL.to_vec());
    let rows: Vec<_> = outcomes.iter().map(|o| o.rows).collect();
    assert_eq!(rows, vec![1, 1, 0, 1]);

    for outcome in &outcomes {
        assert!(outcome.path.exists(), "{} missing", outcome.path.display());
    }

    let functions = std::fs::read_to_string(dir.path().join("audit/lambda_functions_audit.csv")).unwrap();
    assert!(functions.contains("worker,,,2023-04-28T00:00:00Z,400,12-24 months,"));

    let enis = std::fs::read_to_string(dir.path().join("audit/network_interfaces_audit.csv")).unwrap();
    assert_eq!(enis.lines().count(), 1);

    let roles = std::fs::read_to_string(dir.path().join("audit/iam_roles_audit.csv")).unwrap();
    assert!(roles.contains("Never used,Role has never been used"));
}

#[tokio::test]
async fn failure_stops_the_run() {
    let dir = TempDir::new().unwrap();
    let cfg = AuditorConfig {
        output_dir: dir.path().to_path_buf(),
        ..AuditorConfig::default()
    };
    let mock = MockInventory::new()
        .with_function_pages(vec![Page::last(vec![FunctionSummary {
            name: "flaky".into(),
            ..Default::default()
        }])])
        .with_log_failure("/aws/lambda/flaky");

    let err = run_all(&mock, &cfg, Utc::now()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("/aws/lambda/flaky"));
    assert!(!dir.path().join("iam_roles_audit.csv").exists());
}
