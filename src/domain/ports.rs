use crate::domain::model::{AnalyticsResult, Catalog};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// Where the catalog is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Local { data_dir: String },
    Http { endpoint: String },
    Sample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    pub const NAMES: &'static [&'static str] = &["json", "csv"];

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }
}

/// What to do with a catalog row that cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordPolicy {
    #[default]
    Skip,
    Fail,
}

pub trait ConfigProvider: Send + Sync {
    fn source(&self) -> CatalogSource;
    fn output_path(&self) -> &str;
    fn report_filename(&self) -> &str;
    fn top_limit(&self) -> usize;
    fn output_formats(&self) -> Vec<OutputFormat>;
    /// ZIP 檔名；`None` 表示不壓縮
    fn archive_name(&self) -> Option<&str>;
    fn fallback_to_sample(&self) -> bool;
    fn record_policy(&self) -> RecordPolicy;
    fn request_timeout(&self) -> Duration;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Catalog>;
    async fn transform(&self, catalog: Catalog) -> Result<AnalyticsResult>;
    async fn load(&self, result: AnalyticsResult) -> Result<String>;
}
