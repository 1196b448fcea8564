use clap::Parser;
use map_harvest::domain::ports::MapPage;
use map_harvest::utils::error::ErrorSeverity;
use map_harvest::utils::{logger, validation::Validate};
use map_harvest::{
    CliConfig, LocalStorage, RunRequest, ScrapeEngine, ScrapeError, TableExporter, WebDriverPage,
};
use tokio_util::sync::CancellationToken;

fn exit_with(e: &ScrapeError) -> ! {
    tracing::error!(
        "❌ Scrape failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting map-harvest");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match cli.load_scraper_config() {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        exit_with(&e);
    }

    let queries = match cli.queries() {
        Ok(queries) => queries,
        Err(e) => {
            eprintln!("Error: Pass a search query with -s or list queries in {}", cli.input);
            exit_with(&e);
        }
    };
    tracing::info!("📋 {} queries to scrape", queries.len());

    let storage = LocalStorage::new(&config.output.directory);
    let exporter = match TableExporter::from_config(storage, &config.output) {
        Ok(exporter) => exporter,
        Err(e) => exit_with(&e),
    };

    let mut page = match WebDriverPage::connect(&config).await {
        Ok(page) => page,
        Err(e) => exit_with(&e),
    };

    let engine = ScrapeEngine::new_with_monitoring(config, exporter, cli.monitor);
    let request = RunRequest::new(queries);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping after the current listing");
            ctrl_c.cancel();
        }
    });

    let result = engine.run(&mut page, &request, &cancel).await;
    if let Err(e) = page.close().await {
        tracing::warn!("Failed to close browser session: {}", e);
    }

    match result {
        Ok(summary) => {
            for report in &summary.queries {
                match &report.error {
                    Some(error) => println!("⚠️  {}: {}", report.query, error),
                    None => println!(
                        "✅ {}: {} records ({} skipped, {} failed) -> {}",
                        report.query,
                        report.records,
                        report.skipped,
                        report.failed,
                        report.outputs.join(", ")
                    ),
                }
            }
            println!(
                "📁 {} records saved to {}",
                summary.total_records(),
                engine.config().output.directory
            );
            Ok(())
        }
        Err(e) => exit_with(&e),
    }
}
