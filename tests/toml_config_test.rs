use library_analytics::domain::ports::{CatalogSource, ConfigProvider, RecordPolicy};
use library_analytics::utils::validation::Validate;
use library_analytics::{LocalStorage, ReportEngine, ReportPipeline, TomlConfig};
use std::path::Path;
use tempfile::TempDir;

fn write_catalog(dir: &Path) {
    std::fs::write(
        dir.join("books.csv"),
        "book_id,title,author,isbn\nB001,Emma,Jane Austen,\nB002,Persuasion,Jane Austen,\nB003,Dune,Frank Herbert,\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("members.csv"),
        "member_id,name,email\nM001,Alice Johnson,alice@example.com\nM002,Bob Smith,\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("checkouts.csv"),
        "member_id,book_id,date\nM001,B003,2025-10-01\nM002,B003,2025-10-02\nM002,B001,2025-10-03 10:00:00\n",
    )
    .unwrap();
}

fn config_for(data_dir: &Path, out_dir: &Path, extra: &str) -> String {
    format!(
        r#"
[report]
name = "branch-weekly"
description = "Weekly circulation report"
version = "1.0"

[source]
type = "local"
data_dir = "{}"

[analytics]
top_limit = 2

[load]
output_path = "{}"
output_formats = ["json", "csv"]
report_filename = "weekly.json"
{}
"#,
        data_dir.display(),
        out_dir.display(),
        extra
    )
}

#[tokio::test]
async fn test_toml_driven_report_run() {
    let data_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    write_catalog(data_dir.path());

    let config_path = out_dir.path().join("report.toml");
    std::fs::write(&config_path, config_for(data_dir.path(), out_dir.path(), "")).unwrap();

    let config = TomlConfig::from_file(&config_path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.top_limit(), 2);
    assert_eq!(config.record_policy(), RecordPolicy::Skip);

    let engine = ReportEngine::new(ReportPipeline::new(LocalStorage::new("."), config));
    let outcome = engine.run().await.unwrap();

    assert!(outcome.output_path.ends_with("weekly.json"));
    assert_eq!(outcome.statistics.total_checkouts, 3);
    assert_eq!(outcome.statistics.average_checkouts_per_book, 1.0);

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out_dir.path().join("weekly.json")).unwrap(),
    )
    .unwrap();
    let popular = report["most_popular_books"].as_array().unwrap();
    assert_eq!(popular.len(), 2);
    assert_eq!(popular[0]["title"], "Dune");
    assert_eq!(report["most_active_members"][0]["member_id"], "M002");

    let members_csv = std::fs::read_to_string(out_dir.path().join("active_members.csv")).unwrap();
    assert_eq!(members_csv.lines().nth(1), Some("M002,Bob Smith,,2,2"));
}

#[tokio::test]
async fn test_toml_compression_section_produces_archive() {
    let data_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    write_catalog(data_dir.path());

    let extra = r#"
[load.compression]
enabled = true
filename = "weekly.zip"
"#;
    let config = TomlConfig::from_toml_str(&config_for(data_dir.path(), out_dir.path(), extra))
        .unwrap();
    assert_eq!(config.archive_name(), Some("weekly.zip"));

    let engine = ReportEngine::new(ReportPipeline::new(LocalStorage::new("."), config));
    let outcome = engine.run().await.unwrap();

    assert!(outcome.output_path.ends_with("weekly.zip"));
    assert!(!out_dir.path().join("weekly.json").exists());

    let zip_data = std::fs::read(out_dir.path().join("weekly.zip")).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    assert!(archive.by_name("weekly.json").is_ok());
    assert!(archive.by_name("ingest_summary.json").is_ok());
}

#[tokio::test]
async fn test_toml_fail_policy_aborts_run() {
    let data_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    write_catalog(data_dir.path());
    std::fs::write(
        data_dir.path().join("returns.csv"),
        "member_id,book_id,date\nM001,B003,yesterday\n",
    )
    .unwrap();

    let extra = r#"
[error_handling]
on_invalid_record = "fail"
"#;
    let config = TomlConfig::from_toml_str(&config_for(data_dir.path(), out_dir.path(), extra))
        .unwrap();
    assert_eq!(config.record_policy(), RecordPolicy::Fail);

    let engine = ReportEngine::new(ReportPipeline::new(LocalStorage::new("."), config));
    let err = engine.run().await.unwrap_err();

    assert_eq!(err.severity().exit_code(), 1);
    assert!(err.recovery_suggestion().contains("returns.csv"));
}

#[test]
fn test_env_substitution_selects_http_source() {
    std::env::set_var("LIBRARY_ANALYTICS_TEST_FEED", "https://catalog.example.org/export");

    let config = TomlConfig::from_toml_str(
        r#"
[report]
name = "remote"

[source]
type = "http"
endpoint = "${LIBRARY_ANALYTICS_TEST_FEED}"
fallback_to_sample = true

[load]
output_path = "./output"
"#,
    )
    .unwrap();

    config.validate().unwrap();
    assert_eq!(
        config.source(),
        CatalogSource::Http {
            endpoint: "https://catalog.example.org/export".to_string()
        }
    );
    assert!(config.fallback_to_sample());
}
