pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{Command, CliConfig};

pub use config::{cli::LocalStorage, toml_config::TomlConfig};
pub use core::{analytics::LibraryAnalytics, engine::ReportEngine, pipeline::ReportPipeline};
pub use utils::error::{AnalyticsError, Result};
