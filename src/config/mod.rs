pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::pipeline::{DEFAULT_ARCHIVE_NAME, DEFAULT_REPORT_FILENAME};
#[cfg(feature = "cli")]
use crate::domain::ports::{CatalogSource, ConfigProvider, OutputFormat, RecordPolicy};
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::time::Duration;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "library-analytics")]
#[command(about = "Cloud Software Workbench (CSW): library book usage analytics")]
pub struct CliConfig {
    /// Directory holding books.csv, members.csv, checkouts.csv and an optional returns.csv
    #[arg(long, default_value = "./data")]
    pub data_dir: String,

    /// Read the catalog as JSON from this URL instead of the data directory
    #[arg(long)]
    pub api_endpoint: Option<String>,

    /// Use the built-in demo catalog
    #[arg(long, conflicts_with = "api_endpoint")]
    pub sample: bool,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = DEFAULT_REPORT_FILENAME)]
    pub report_file: String,

    /// Number of entries in the popular-books and active-members rankings
    #[arg(long, default_value = "10")]
    pub top: usize,

    #[arg(long, value_delimiter = ',', default_value = "json")]
    pub formats: Vec<String>,

    /// Bundle all artifacts into a single ZIP archive
    #[arg(long)]
    pub compress: bool,

    #[arg(long, default_value = DEFAULT_ARCHIVE_NAME)]
    pub archive_name: String,

    /// Use the demo catalog when the API source fails or returns nothing
    #[arg(long)]
    pub fallback_to_sample: bool,

    /// Abort on the first invalid catalog row instead of skipping it
    #[arg(long)]
    pub strict: bool,

    #[arg(long, default_value = "30")]
    pub timeout_seconds: u64,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Build the usage report and write it to the output path (default)
    Report,
    /// Print overall usage statistics
    Stats,
    /// Print the most checked-out books
    Popular {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Print the members with the most checkouts
    Active {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// List books by an author (case-insensitive)
    Author { name: String },
    /// Print a member's checkout history
    History { member_id: String },
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Report)
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn source(&self) -> CatalogSource {
        if self.sample {
            CatalogSource::Sample
        } else if let Some(endpoint) = &self.api_endpoint {
            CatalogSource::Http {
                endpoint: endpoint.clone(),
            }
        } else {
            CatalogSource::Local {
                data_dir: self.data_dir.clone(),
            }
        }
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn report_filename(&self) -> &str {
        &self.report_file
    }

    fn top_limit(&self) -> usize {
        self.top
    }

    fn output_formats(&self) -> Vec<OutputFormat> {
        self.formats
            .iter()
            .filter_map(|f| OutputFormat::parse(f))
            .collect()
    }

    fn archive_name(&self) -> Option<&str> {
        self.compress.then_some(self.archive_name.as_str())
    }

    fn fallback_to_sample(&self) -> bool {
        self.fallback_to_sample
    }

    fn record_policy(&self) -> RecordPolicy {
        if self.strict {
            RecordPolicy::Fail
        } else {
            RecordPolicy::Skip
        }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.api_endpoint {
            validation::validate_url("api_endpoint", endpoint)?;
        }
        validation::validate_path("data_dir", &self.data_dir)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_file_name("report_file", &self.report_file)?;
        validation::validate_file_name("archive_name", &self.archive_name)?;
        validation::validate_positive_number("top", self.top, 1)?;
        validation::validate_range("timeout_seconds", self.timeout_seconds, 1, 300)?;
        for format in &self.formats {
            validation::validate_one_of("formats", format, OutputFormat::NAMES)?;
        }

        tracing::debug!("✅ CLI configuration validation passed");
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        let mut argv = vec!["library-analytics"];
        argv.extend_from_slice(args);
        CliConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_read_local_data_dir() {
        let config = parse(&[]);

        assert_eq!(
            config.source(),
            CatalogSource::Local {
                data_dir: "./data".to_string()
            }
        );
        assert_eq!(config.report_filename(), DEFAULT_REPORT_FILENAME);
        assert_eq!(config.top_limit(), 10);
        assert_eq!(config.output_formats(), vec![OutputFormat::Json]);
        assert_eq!(config.archive_name(), None);
        assert_eq!(config.record_policy(), RecordPolicy::Skip);
        assert_eq!(config.command(), Command::Report);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_endpoint_and_sample_are_exclusive() {
        let result = CliConfig::try_parse_from([
            "library-analytics",
            "--sample",
            "--api-endpoint",
            "http://localhost/catalog",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_subcommands_and_flags() {
        let config = parse(&[
            "--api-endpoint",
            "https://catalog.example.com/export",
            "--formats",
            "json,csv",
            "--compress",
            "--strict",
            "popular",
            "--limit",
            "3",
        ]);

        assert!(matches!(config.source(), CatalogSource::Http { .. }));
        assert_eq!(
            config.output_formats(),
            vec![OutputFormat::Json, OutputFormat::Csv]
        );
        assert_eq!(config.archive_name(), Some(DEFAULT_ARCHIVE_NAME));
        assert_eq!(config.record_policy(), RecordPolicy::Fail);
        assert_eq!(config.command(), Command::Popular { limit: 3 });
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(parse(&["--top", "0"]).validate().is_err());
        assert!(parse(&["--formats", "xml"]).validate().is_err());
        assert!(parse(&["--report-file", "nested/report.json"]).validate().is_err());
        assert!(parse(&["--api-endpoint", "ftp://example.com"]).validate().is_err());
        assert!(parse(&["--timeout-seconds", "0"]).validate().is_err());
    }
}
