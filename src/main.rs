use clap::Parser;
use library_analytics::core::engine::ReportOutcome;
use library_analytics::domain::model::{
    AnalyticsResult, BookSummary, MemberSummary, UsageStatistics,
};
use library_analytics::utils::error::AnalyticsError;
use library_analytics::utils::{logger, validation::Validate};
use library_analytics::{CliConfig, Command, LocalStorage, ReportEngine, ReportPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting library-analytics CLI");
    tracing::debug!("CLI config: {:?}", config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if config.monitor {
        tracing::info!("🔍 Resource monitoring enabled");
    }

    let command = config.command();
    let monitor_enabled = config.monitor;

    // 路徑已包含在設定中，storage 以目前目錄為根
    let storage = LocalStorage::new(".");
    let pipeline = ReportPipeline::new(storage, config);
    let engine = ReportEngine::new_with_monitoring(pipeline, monitor_enabled);

    let outcome = match &command {
        Command::Report => engine.run().await.map(|outcome| print_report_outcome(&outcome)),
        query => engine
            .analyze()
            .await
            .map(|result| print_query(query, &result)),
    };

    if let Err(e) = outcome {
        exit_with_error(e);
    }

    Ok(())
}

fn exit_with_error(e: AnalyticsError) {
    // 記錄詳細錯誤信息
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

fn print_banner() {
    println!("{}", "=".repeat(60));
    println!("LIBRARY BOOK USAGE ANALYTICS");
    println!("{}", "=".repeat(60));
}

fn print_statistics(stats: &UsageStatistics) {
    println!("\n📊 Usage Statistics:");
    println!("  total_books: {}", stats.total_books);
    println!("  total_members: {}", stats.total_members);
    println!("  total_checkouts: {}", stats.total_checkouts);
    println!(
        "  average_checkouts_per_book: {}",
        stats.average_checkouts_per_book
    );
}

// 報告摘要只列前五名
const SUMMARY_TOP: usize = 5;

fn print_popular_books(books: &[BookSummary]) {
    println!("\n📚 Most Popular Books:");
    for (i, book) in books.iter().enumerate() {
        println!(
            "  {}. {} by {} ({} checkouts)",
            i + 1,
            book.title,
            book.author,
            book.total_checkouts
        );
    }
}

fn print_active_members(members: &[MemberSummary]) {
    println!("\n👥 Most Active Members:");
    for (i, member) in members.iter().enumerate() {
        println!(
            "  {}. {} ({} checkouts)",
            i + 1,
            member.name,
            member.total_checkouts
        );
    }
}

fn print_report_outcome(outcome: &ReportOutcome) {
    print_banner();
    print_statistics(&outcome.statistics);
    print_popular_books(
        &outcome.most_popular_books[..outcome.most_popular_books.len().min(SUMMARY_TOP)],
    );
    print_active_members(
        &outcome.most_active_members[..outcome.most_active_members.len().min(SUMMARY_TOP)],
    );

    let summary = &outcome.summary;
    println!("\n📥 Ingest Summary:");
    println!(
        "  books: {} loaded, {} duplicates",
        summary.books_loaded, summary.duplicate_books
    );
    println!(
        "  members: {} loaded, {} duplicates",
        summary.members_loaded, summary.duplicate_members
    );
    println!(
        "  checkouts: {} applied, {} rejected",
        summary.checkouts_applied, summary.checkouts_rejected
    );
    println!(
        "  returns: {} applied, {} rejected",
        summary.returns_applied, summary.returns_rejected
    );
    if summary.invalid_rows > 0 {
        println!("  ⚠️ {} invalid rows skipped", summary.invalid_rows);
    }

    println!("\n✅ Analytics report exported to: {}", outcome.output_path);
    println!("{}", "=".repeat(60));
}

fn print_query(command: &Command, result: &AnalyticsResult) {
    let analytics = &result.analytics;

    match command {
        Command::Report => {}
        Command::Stats => print_statistics(&result.report.statistics),
        Command::Popular { limit } => print_popular_books(&analytics.most_popular_books(*limit)),
        Command::Active { limit } => print_active_members(&analytics.most_active_members(*limit)),
        Command::Author { name } => {
            let books = analytics.books_by_author(name);
            if books.is_empty() {
                println!("No books by {}", name);
            }
            for book in books {
                println!(
                    "  {} | {} | ISBN {} | {} checkouts",
                    book.book_id, book.title, book.isbn, book.total_checkouts
                );
            }
        }
        Command::History { member_id } => {
            if analytics.member(member_id).is_none() {
                println!("Unknown member {}", member_id);
                return;
            }
            let history = analytics.member_checkout_history(member_id);
            if history.is_empty() {
                println!("{} has no checkouts", member_id);
            }
            for entry in history {
                println!("  {}  {}", entry.checkout_date, entry.book_id);
            }
        }
    }
}
