use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Local;

use nhk_tracker::config::Config;
use nhk_tracker::correction::CorrectionVocabulary;
use nhk_tracker::db::{Repository, UpsertStats};
use nhk_tracker::error::Result;
use nhk_tracker::feed::{parse_articles, FeedFetcher};
use nhk_tracker::notify::DesktopNotifier;
use nhk_tracker::report::write_change_report;

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let config_path = if args.len() >= 3 && args[1] == "--config" {
        Some(PathBuf::from(&args[2]))
    } else {
        None
    };

    let config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    if let Some(parent) = Path::new(&config.database.path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let repo = Repository::new(&config.database.path).await?;
    let fetcher = FeedFetcher::new(config.fetch.timeout_secs, config.fetch.concurrency);
    let notifier = DesktopNotifier::new();
    let vocab = CorrectionVocabulary::default();

    tracing::info!(
        sources = config.enabled_sources().count(),
        "starting fetch cycle"
    );

    // Fetch every enabled source concurrently, then classify and persist
    // sequentially in config order (one writer per run).
    let sources: Vec<_> = config.enabled_sources().cloned().collect();
    let mut fetched: HashMap<String, Result<String>> = fetcher
        .fetch_batch(sources)
        .await
        .into_iter()
        .map(|(source, result)| (source.name, result))
        .collect();

    let mut totals = UpsertStats::default();
    let mut failed_sources = Vec::new();

    for source in config.enabled_sources() {
        let content = match fetched.remove(&source.name) {
            Some(Ok(content)) => content,
            _ => {
                failed_sources.push(source.name.clone());
                continue;
            }
        };

        let articles = match parse_articles(&content) {
            Ok(articles) if !articles.is_empty() => articles,
            Ok(_) => {
                tracing::warn!(source = %source.name, "feed parsed to zero articles");
                failed_sources.push(source.name.clone());
                continue;
            }
            Err(e) => {
                tracing::error!(source = %source.name, error = %e, "feed parse failed");
                failed_sources.push(source.name.clone());
                continue;
            }
        };

        let stats = repo.upsert_and_classify(&source.name, articles).await?;
        notifier.notify_corrections(&source.name, &stats.correction_added, &stats.correction_removed);
        totals.absorb(stats);
    }

    tracing::info!(
        new = totals.new,
        updated = totals.updated,
        unchanged = totals.unchanged,
        failed_articles = totals.failed.len(),
        failed_sources = failed_sources.len(),
        "fetch cycle finished"
    );

    if let Some(path) = write_change_report(&repo, &config, &vocab).await? {
        tracing::info!(path = %path.display(), "report ready");
    } else {
        tracing::info!(hours = config.report.hours, "no changes in the report window");
    }

    export_snapshot(&repo, &config).await?;

    let total_count = repo.article_count().await?;
    notifier.notify_completion(totals.new, totals.updated, total_count, &failed_sources);

    Ok(())
}

async fn export_snapshot(repo: &Repository, config: &Config) -> Result<()> {
    let snapshot = repo.export_snapshot().await?;

    let dir = Path::new(&config.report.export_dir);
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "export_{}.json",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(&path, json)?;

    tracing::info!(
        path = %path.display(),
        articles = snapshot.articles.len(),
        changes = snapshot.changes.len(),
        "snapshot exported"
    );
    Ok(())
}
