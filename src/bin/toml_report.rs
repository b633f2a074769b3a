use clap::Parser;
use library_analytics::core::ingest::{BOOKS_FILE, CHECKOUTS_FILE, MEMBERS_FILE, RETURNS_FILE};
use library_analytics::core::pipeline::storage_key;
use library_analytics::domain::ports::{CatalogSource, ConfigProvider, RecordPolicy};
use library_analytics::utils::{logger, validation::Validate};
use library_analytics::{LocalStorage, ReportEngine, ReportPipeline, TomlConfig};

#[derive(Parser)]
#[command(name = "toml-report")]
#[command(about = "Library usage report driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "report.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the ranking size from config
    #[arg(long)]
    top: Option<usize>,

    /// Show what would be processed without reading the catalog
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // [monitoring] log_level 決定預設日誌等級，--verbose 優先
    logger::init_cli_logger_with_level(args.verbose, config.log_level());

    tracing::info!("🚀 Starting TOML-based report run");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 命令列覆蓋設定
    if let Some(top) = args.top {
        config.analytics.top_limit = Some(top);
        tracing::info!("🔧 Ranking size overridden to: {}", top);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No catalog will be read and nothing will be written");
        perform_dry_run(&config).await;
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 Resource monitoring enabled");
    }

    let storage = LocalStorage::new(".");
    let pipeline = ReportPipeline::new(storage, config);
    let engine = ReportEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(outcome) => {
            tracing::info!("✅ Report run completed successfully!");
            println!("✅ Report run completed successfully!");
            println!(
                "📊 {} books, {} members, {} checkouts (avg {} per book)",
                outcome.statistics.total_books,
                outcome.statistics.total_members,
                outcome.statistics.total_checkouts,
                outcome.statistics.average_checkouts_per_book
            );
            println!("📁 Output saved to: {}", outcome.output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Report run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = e.severity().exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn describe_source(source: &CatalogSource) -> String {
    match source {
        CatalogSource::Local { data_dir } => format!("local CSV files in {}", data_dir),
        CatalogSource::Http { endpoint } => format!("JSON feed at {}", endpoint),
        CatalogSource::Sample => "built-in sample catalog".to_string(),
    }
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    match &config.report.version {
        Some(version) => println!("  Report: {} v{}", config.report.name, version),
        None => println!("  Report: {}", config.report.name),
    }
    println!("  Source: {}", describe_source(&config.source()));
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.load.output_formats.join(", "));
    println!("  Top entries: {}", config.top_limit());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

async fn perform_dry_run(config: &TomlConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📡 Catalog Source:");
    match config.source() {
        CatalogSource::Local { data_dir } => {
            for (file, required) in [
                (BOOKS_FILE, true),
                (MEMBERS_FILE, true),
                (CHECKOUTS_FILE, true),
                (RETURNS_FILE, false),
            ] {
                let key = storage_key(&data_dir, file);
                let present = tokio::fs::try_exists(&key).await.unwrap_or(false);
                let marker = match (present, required) {
                    (true, _) => "✅",
                    (false, true) => "❌",
                    (false, false) => "➖",
                };
                println!("  {} {}", marker, key);
            }
        }
        CatalogSource::Http { endpoint } => {
            println!("  Endpoint: {}", endpoint);
            println!("  Timeout: {:?}", config.request_timeout());
            println!("  Fallback to sample: {}", config.fallback_to_sample());
        }
        CatalogSource::Sample => println!("  Built-in sample catalog (5 books, 3 members)"),
    }

    println!();
    println!("⚙️ Processing:");
    match config.record_policy() {
        RecordPolicy::Skip => println!("  Invalid rows are skipped and counted"),
        RecordPolicy::Fail => println!("  The run aborts on the first invalid row"),
    }

    println!();
    println!("💾 Output Configuration:");
    println!(
        "  Report: {}",
        storage_key(config.output_path(), config.report_filename())
    );
    if let Some(archive) = config.archive_name() {
        println!(
            "  Compression: {} (ZIP)",
            storage_key(config.output_path(), archive)
        );
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
