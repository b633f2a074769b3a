pub mod analytics;
pub mod engine;
pub mod ingest;
pub mod pipeline;

pub use crate::domain::model::{AnalyticsReport, AnalyticsResult, Catalog};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
