use crate::core::ingest::{
    catalog_from_feed, parse_csv_table, replay, sample_catalog, BOOKS_FILE, CHECKOUTS_FILE,
    MEMBERS_FILE, RETURNS_FILE,
};
use crate::domain::model::{AnalyticsResult, BookSummary, Catalog, CatalogFeed, MemberSummary};
use crate::domain::ports::{CatalogSource, ConfigProvider, OutputFormat, Pipeline, Storage};
use crate::utils::error::{AnalyticsError, Result};
use chrono::{NaiveDateTime, SubsecRound, Utc};
use reqwest::Client;
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

pub const DEFAULT_REPORT_FILENAME: &str = "library_analytics_report.json";
pub const DEFAULT_ARCHIVE_NAME: &str = "library_analytics.zip";
pub const POPULAR_BOOKS_CSV: &str = "popular_books.csv";
pub const ACTIVE_MEMBERS_CSV: &str = "active_members.csv";
pub const INGEST_SUMMARY_JSON: &str = "ingest_summary.json";

const BOOK_COLUMNS: &[&str] = &[
    "book_id",
    "title",
    "author",
    "isbn",
    "total_checkouts",
    "last_checkout",
];
const MEMBER_COLUMNS: &[&str] = &[
    "member_id",
    "name",
    "email",
    "books_currently_checked_out",
    "total_checkouts",
];

/// Report time in UTC, truncated to microseconds.
pub fn report_time() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}

/// Joins a directory and a file name into a storage key.
pub fn storage_key(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir == "." {
        return name.to_string();
    }
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

pub struct ReportPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    client: Client,
}

impl<S: Storage, C: ConfigProvider> ReportPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self {
            storage,
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    async fn extract_local(&self, data_dir: &str) -> Result<Catalog> {
        let policy = self.config.record_policy();
        let mut invalid_rows = 0;

        tracing::info!("📂 Loading catalog from {}", data_dir);

        let books = self.storage.read_file(&storage_key(data_dir, BOOKS_FILE)).await?;
        let members = self
            .storage
            .read_file(&storage_key(data_dir, MEMBERS_FILE))
            .await?;
        let checkouts = self
            .storage
            .read_file(&storage_key(data_dir, CHECKOUTS_FILE))
            .await?;

        let mut catalog = Catalog {
            books: parse_csv_table(BOOKS_FILE, &books, policy, &mut invalid_rows)?,
            members: parse_csv_table(MEMBERS_FILE, &members, policy, &mut invalid_rows)?,
            checkouts: parse_csv_table(CHECKOUTS_FILE, &checkouts, policy, &mut invalid_rows)?,
            ..Catalog::default()
        };

        // returns.csv 可省略
        let returns_key = storage_key(data_dir, RETURNS_FILE);
        if self.storage.exists(&returns_key).await {
            let returns = self.storage.read_file(&returns_key).await?;
            catalog.returns = parse_csv_table(RETURNS_FILE, &returns, policy, &mut invalid_rows)?;
        } else {
            tracing::debug!("No {} found, skipping returns", returns_key);
        }

        catalog.invalid_rows = invalid_rows;
        Ok(catalog)
    }

    /// Fetches the feed document. Rows are validated later, so only transport,
    /// status and document-level JSON errors surface here.
    async fn fetch_feed(&self, endpoint: &str) -> Result<CatalogFeed> {
        tracing::debug!("Making API request to: {}", endpoint);

        let response = self
            .client
            .get(endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.config.request_timeout())
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if !status.is_success() {
            return Err(AnalyticsError::SourceUnavailableError {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn extract_http(&self, endpoint: &str) -> Result<Catalog> {
        let feed = match self.fetch_feed(endpoint).await {
            Ok(feed) if !feed.is_empty() => feed,
            Ok(_) => {
                return self.fall_back(
                    endpoint,
                    AnalyticsError::SourceUnavailableError {
                        endpoint: endpoint.to_string(),
                        reason: "catalog feed is empty".to_string(),
                    },
                )
            }
            Err(e) => return self.fall_back(endpoint, e),
        };

        // 資料列錯誤依 record policy 處理，不改用範例資料
        catalog_from_feed(feed, self.config.record_policy())
    }

    fn fall_back(&self, endpoint: &str, error: AnalyticsError) -> Result<Catalog> {
        if !self.config.fallback_to_sample() {
            return Err(error);
        }
        tracing::warn!(
            "⚠️ Catalog source {} unusable ({}), using the sample catalog",
            endpoint,
            error
        );
        Ok(sample_catalog())
    }
}

fn render_csv<T: serde::Serialize>(columns: &[&str], rows: &[T]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(columns)?;
    for row in rows {
        writer.serialize(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AnalyticsError::ProcessingError {
            message: format!("Failed to flush CSV output: {}", e),
        })?;
    String::from_utf8(bytes).map_err(|e| AnalyticsError::ProcessingError {
        message: format!("CSV output is not valid UTF-8: {}", e),
    })
}

pub fn render_books_csv(books: &[BookSummary]) -> Result<String> {
    render_csv(BOOK_COLUMNS, books)
}

pub fn render_members_csv(members: &[MemberSummary]) -> Result<String> {
    render_csv(MEMBER_COLUMNS, members)
}

fn build_archive(artifacts: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for (name, data) in artifacts {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(name.as_str(), options)?;
        zip.write_all(data)?;
    }

    Ok(zip.finish()?.into_inner())
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ReportPipeline<S, C> {
    async fn extract(&self) -> Result<Catalog> {
        match self.config.source() {
            CatalogSource::Sample => {
                tracing::info!("📚 Using the built-in sample catalog");
                Ok(sample_catalog())
            }
            CatalogSource::Local { data_dir } => self.extract_local(&data_dir).await,
            CatalogSource::Http { endpoint } => {
                tracing::info!("🌐 Fetching catalog from {}", endpoint);
                self.extract_http(&endpoint).await
            }
        }
    }

    async fn transform(&self, catalog: Catalog) -> Result<AnalyticsResult> {
        let (analytics, summary) = replay(&catalog, self.config.record_policy())?;
        let report = analytics.build_report(self.config.top_limit(), report_time());

        let popular_books_csv = render_books_csv(&report.most_popular_books)?;
        let active_members_csv = render_members_csv(&report.most_active_members)?;

        Ok(AnalyticsResult {
            analytics,
            report,
            summary,
            popular_books_csv,
            active_members_csv,
        })
    }

    async fn load(&self, result: AnalyticsResult) -> Result<String> {
        let output_dir = self.config.output_path();
        let report_filename = self.config.report_filename();

        let mut artifacts: Vec<(String, Vec<u8>)> = vec![(
            report_filename.to_string(),
            serde_json::to_string_pretty(&result.report)?.into_bytes(),
        )];

        if self.config.output_formats().contains(&OutputFormat::Csv) {
            artifacts.push((
                POPULAR_BOOKS_CSV.to_string(),
                result.popular_books_csv.into_bytes(),
            ));
            artifacts.push((
                ACTIVE_MEMBERS_CSV.to_string(),
                result.active_members_csv.into_bytes(),
            ));
        }

        if let Some(archive_name) = self.config.archive_name() {
            artifacts.push((
                INGEST_SUMMARY_JSON.to_string(),
                serde_json::to_string_pretty(&result.summary)?.into_bytes(),
            ));

            tracing::debug!("Creating ZIP archive with {} files", artifacts.len());
            let zip_data = build_archive(&artifacts)?;

            let key = storage_key(output_dir, archive_name);
            tracing::debug!("Writing ZIP archive ({} bytes) to {}", zip_data.len(), key);
            self.storage.write_file(&key, &zip_data).await?;
            return Ok(key);
        }

        for (name, data) in &artifacts {
            self.storage
                .write_file(&storage_key(output_dir, name), data)
                .await?;
        }

        Ok(storage_key(output_dir, report_filename))
    }
}
