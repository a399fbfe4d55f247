// Weekly grosses loader entry point.
//
// Run sequence:
// 1. Initialize tracing (stderr)
// 2. Parse arguments
// 3. Load config (seeding config/ from defaults/ on first run)
// 4. Resolve the requested weeks against the season calendar
// 5. Extract every week
// 6. Load, or print a summary for --dry-run

use bway_grosses::cli::Cli;
use bway_grosses::config;
use bway_grosses::db::Warehouse;
use bway_grosses::fetch::HttpFetcher;
use bway_grosses::pipeline::{self, RunSummary, Throttle};

use anyhow::Context;
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;

    // 2. Parse arguments
    let cli = Cli::parse();

    // 3. Load config
    let cwd = std::env::current_dir().context("failed to read working directory")?;
    let config_dir = cli.config_base(&cwd);
    let config = config::load_config(&config_dir).context("failed to load configuration")?;
    info!(
        "Config loaded from {}: source={}, database={} (table {}), {} seasons",
        config_dir.display(),
        config.source.base_url,
        config.database.path,
        config.database.table,
        config.seasons.anchors().len()
    );

    // 4. Resolve weeks
    let now = chrono::Local::now().naive_local();
    let weeks = cli
        .selection()
        .resolve(&config.seasons, now)
        .context("failed to select weeks")?;
    info!(
        "Selected {} week(s): {} through {}",
        weeks.len(),
        weeks.first().map(|w| w.key().to_string()).unwrap_or_default(),
        weeks.last().map(|w| w.key().to_string()).unwrap_or_default()
    );

    let fetcher = HttpFetcher::new(&config.source).context("failed to build HTTP client")?;
    let throttle = Throttle::new(&config.throttle);

    // 5-6. Extract, then load or report
    let summary = if cli.dry_run {
        let batch = pipeline::extract(&fetcher, &config.seasons, &weeks, &throttle).await?;
        let summary = RunSummary::from_batch(weeks.len(), &batch);
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("failed to serialize summary")?
        );
        summary
    } else {
        let warehouse = Warehouse::open(&config.database.path, &config.database.table)
            .context("failed to open database")?;
        info!("Database opened at {}", config.database.path);
        pipeline::run(&fetcher, &warehouse, &config.seasons, &weeks, &throttle).await?
    };

    info!(
        rows = summary.rows,
        unmatched = summary.unmatched_rows,
        weeks = summary.weeks_touched.len(),
        "Run complete"
    );
    Ok(())
}

/// Initialize tracing to stderr so stdout stays free for --dry-run output.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bway_grosses=info,grosses_core=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
