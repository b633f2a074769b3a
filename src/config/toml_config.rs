use crate::core::analytics::DEFAULT_TOP_LIMIT;
use crate::core::pipeline::{DEFAULT_ARCHIVE_NAME, DEFAULT_REPORT_FILENAME};
use crate::domain::ports::{CatalogSource, ConfigProvider, OutputFormat, RecordPolicy};
use crate::utils::error::{AnalyticsError, Result};
use crate::utils::logger;
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub report: ReportMeta,
    pub source: SourceConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
    pub error_handling: Option<ErrorHandlingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// `local`, `http` 或 `sample`
    pub r#type: String,
    pub data_dir: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub fallback_to_sample: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub top_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<String>,
    pub report_filename: Option<String>,
    pub compression: Option<CompressionConfig>,
}

fn default_output_formats() -> Vec<String> {
    vec!["json".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    /// `skip` 或 `fail`
    pub on_invalid_record: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }

    /// 替換環境變數 (例如 ${CATALOG_URL})；未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is a valid regex")
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("report.name", &self.report.name)?;
        validation::validate_one_of("source.type", &self.source.r#type, &["local", "http", "sample"])?;

        match self.source.r#type.as_str() {
            "http" => {
                let endpoint = validation::validate_required_field(
                    "source.endpoint",
                    &self.source.endpoint,
                )?;
                validation::validate_url("source.endpoint", endpoint)?;
            }
            "local" => {
                let data_dir = validation::validate_required_field(
                    "source.data_dir",
                    &self.source.data_dir,
                )?;
                validation::validate_path("source.data_dir", data_dir)?;
            }
            _ => {}
        }

        if let Some(timeout) = self.source.timeout_seconds {
            validation::validate_range("source.timeout_seconds", timeout, 1, 300)?;
        }
        if let Some(limit) = self.analytics.top_limit {
            validation::validate_positive_number("analytics.top_limit", limit, 1)?;
        }

        validation::validate_path("load.output_path", &self.load.output_path)?;
        validation::validate_file_name("load.report_filename", self.report_filename())?;
        for format in &self.load.output_formats {
            validation::validate_one_of("load.output_formats", format, OutputFormat::NAMES)?;
        }
        if let Some(archive) = self.archive_name() {
            validation::validate_file_name("load.compression.filename", archive)?;
        }

        if let Some(level) = self.log_level() {
            validation::validate_one_of("monitoring.log_level", level, logger::LOG_LEVELS)?;
        }

        if let Some(policy) = self
            .error_handling
            .as_ref()
            .and_then(|e| e.on_invalid_record.as_deref())
        {
            validation::validate_one_of("error_handling.on_invalid_record", policy, &["skip", "fail"])?;
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }
}

impl ConfigProvider for TomlConfig {
    fn source(&self) -> CatalogSource {
        match self.source.r#type.as_str() {
            "http" => CatalogSource::Http {
                endpoint: self.source.endpoint.clone().unwrap_or_default(),
            },
            "sample" => CatalogSource::Sample,
            _ => CatalogSource::Local {
                data_dir: self
                    .source
                    .data_dir
                    .clone()
                    .unwrap_or_else(|| ".".to_string()),
            },
        }
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn report_filename(&self) -> &str {
        self.load
            .report_filename
            .as_deref()
            .unwrap_or(DEFAULT_REPORT_FILENAME)
    }

    fn top_limit(&self) -> usize {
        self.analytics.top_limit.unwrap_or(DEFAULT_TOP_LIMIT)
    }

    fn output_formats(&self) -> Vec<OutputFormat> {
        self.load
            .output_formats
            .iter()
            .filter_map(|f| OutputFormat::parse(f))
            .collect()
    }

    fn archive_name(&self) -> Option<&str> {
        match &self.load.compression {
            Some(c) if c.enabled => Some(c.filename.as_deref().unwrap_or(DEFAULT_ARCHIVE_NAME)),
            _ => None,
        }
    }

    fn fallback_to_sample(&self) -> bool {
        self.source.fallback_to_sample.unwrap_or(false)
    }

    fn record_policy(&self) -> RecordPolicy {
        match self
            .error_handling
            .as_ref()
            .and_then(|e| e.on_invalid_record.as_deref())
        {
            Some("fail") => RecordPolicy::Fail,
            _ => RecordPolicy::Skip,
        }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

impl std::str::FromStr for TomlConfig {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_toml_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[report]
name = "branch-usage"
description = "Monthly usage report"

[source]
type = "local"
data_dir = "./data"

[analytics]
top_limit = 5

[load]
output_path = "./reports"
output_formats = ["json", "csv"]
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.report.name, "branch-usage");
        assert_eq!(
            config.source(),
            CatalogSource::Local {
                data_dir: "./data".to_string()
            }
        );
        assert_eq!(config.top_limit(), 5);
        assert_eq!(config.report_filename(), DEFAULT_REPORT_FILENAME);
        assert_eq!(config.archive_name(), None);
        assert_eq!(config.record_policy(), RecordPolicy::Skip);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(!config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_is_validated() {
        let warn = format!("{}\n[monitoring]\nenabled = false\nlog_level = \"warn\"\n", BASIC);
        let config = TomlConfig::from_toml_str(&warn).unwrap();
        assert_eq!(config.log_level(), Some("warn"));
        assert!(config.validate().is_ok());

        let loud = format!("{}\n[monitoring]\nenabled = false\nlog_level = \"loud\"\n", BASIC);
        let err = TomlConfig::from_toml_str(&loud).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("monitoring.log_level"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("LIBRARY_ANALYTICS_TEST_ENDPOINT", "https://catalog.example.com/export");

        let toml_content = r#"
[report]
name = "remote"

[source]
type = "http"
endpoint = "${LIBRARY_ANALYTICS_TEST_ENDPOINT}"
fallback_to_sample = true

[load]
output_path = "./out"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.source(),
            CatalogSource::Http {
                endpoint: "https://catalog.example.com/export".to_string()
            }
        );
        assert!(config.fallback_to_sample());
        assert_eq!(config.output_formats(), vec![OutputFormat::Json]);

        std::env::remove_var("LIBRARY_ANALYTICS_TEST_ENDPOINT");
    }

    #[test]
    fn test_unset_env_var_is_left_in_place() {
        let toml_content = r#"
[report]
name = "remote"

[source]
type = "http"
endpoint = "${LIBRARY_ANALYTICS_SURELY_UNSET_VAR}"

[load]
output_path = "./out"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.source.endpoint.as_deref(),
            Some("${LIBRARY_ANALYTICS_SURELY_UNSET_VAR}")
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_http_source_requires_endpoint() {
        let toml_content = r#"
[report]
name = "remote"

[source]
type = "http"

[load]
output_path = "./out"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingConfigError { .. }));
    }

    #[test]
    fn test_compression_and_error_policy() {
        let toml_content = r#"
[report]
name = "bundle"

[source]
type = "sample"

[load]
output_path = "./out"

[load.compression]
enabled = true

[monitoring]
enabled = true
log_level = "debug"

[error_handling]
on_invalid_record = "fail"
"#;

        let config: TomlConfig = toml_content.parse().unwrap();
        assert_eq!(config.source(), CatalogSource::Sample);
        assert_eq!(config.archive_name(), Some(DEFAULT_ARCHIVE_NAME));
        assert_eq!(config.record_policy(), RecordPolicy::Fail);
        assert!(config.monitoring_enabled());
        assert_eq!(config.log_level(), Some("debug"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let bad_format = BASIC.replace(r#"["json", "csv"]"#, r#"["xml"]"#);
        assert!(TomlConfig::from_toml_str(&bad_format).unwrap().validate().is_err());

        let bad_type = BASIC.replace(r#"type = "local""#, r#"type = "ftp""#);
        assert!(TomlConfig::from_toml_str(&bad_type).unwrap().validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_a_config_error() {
        let err = TomlConfig::from_toml_str("[report\nname = ").unwrap_err();
        assert!(matches!(err, AnalyticsError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.report.name, "branch-usage");
    }
}
