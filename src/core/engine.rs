use crate::domain::model::{
    AnalyticsResult, BookSummary, IngestSummary, MemberSummary, UsageStatistics,
};
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::ResourceMonitor;

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub output_path: String,
    pub summary: IngestSummary,
    pub statistics: UsageStatistics,
    pub most_popular_books: Vec<BookSummary>,
    pub most_active_members: Vec<MemberSummary>,
}

pub struct ReportEngine<P: Pipeline> {
    pipeline: P,
    monitor: ResourceMonitor,
}

impl<P: Pipeline> ReportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: ResourceMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Extract and transform only; nothing is written.
    pub async fn analyze(&self) -> Result<AnalyticsResult> {
        tracing::info!("Extracting catalog...");
        let catalog = self.pipeline.extract().await?;
        tracing::info!(
            "Extracted {} books, {} members, {} checkouts, {} returns",
            catalog.books.len(),
            catalog.members.len(),
            catalog.checkouts.len(),
            catalog.returns.len()
        );
        self.monitor.log_phase("Extract");

        tracing::info!("Replaying circulation history...");
        let result = self.pipeline.transform(catalog).await?;
        self.monitor.log_phase("Transform");

        Ok(result)
    }

    pub async fn run(&self) -> Result<ReportOutcome> {
        tracing::info!("Starting report run...");

        let result = self.analyze().await?;
        let summary = result.summary.clone();
        let statistics = result.report.statistics.clone();
        let most_popular_books = result.report.most_popular_books.clone();
        let most_active_members = result.report.most_active_members.clone();

        tracing::info!("Writing report artifacts...");
        let output_path = self.pipeline.load(result).await?;
        self.monitor.log_phase("Load");
        self.monitor.log_final();

        tracing::info!("Report saved to: {}", output_path);
        Ok(ReportOutcome {
            output_path,
            summary,
            statistics,
            most_popular_books,
            most_active_members,
        })
    }
}
