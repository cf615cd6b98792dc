use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::PgPool;

use migration_engine::{
    Config, HttpFetcher, MigrationPipeline, OpenAiEmbeddingService, PostgresStorage,
};

/// Compute a redirect map between an old site's URLs and a new site's URLs.
#[derive(Parser, Debug)]
#[command(name = "run_migration")]
struct Args {
    /// CSV file of old-site URLs (first column)
    #[arg(long)]
    old_urls: PathBuf,

    /// CSV file of new-site URLs (first column)
    #[arg(long)]
    new_urls: PathBuf,

    /// Owner recorded on the migration session
    #[arg(long, default_value = "default")]
    owner: String,

    /// Print the full report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "migration_engine=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let old_urls = read_url_csv(&args.old_urls)
        .with_context(|| format!("Failed to read {}", args.old_urls.display()))?;
    let new_urls = read_url_csv(&args.new_urls)
        .with_context(|| format!("Failed to read {}", args.new_urls.display()))?;

    println!(
        "Loaded {} old URLs and {} new URLs",
        old_urls.len(),
        new_urls.len()
    );

    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let pipeline = MigrationPipeline::new(
        Arc::new(PostgresStorage::new(pool)),
        Arc::new(HttpFetcher::new(config.matcher.fetch_timeout)?),
        Arc::new(OpenAiEmbeddingService::new(
            config.openai_api_key.clone(),
            config.embedding_model.clone(),
        )),
        config.matcher.clone(),
    );

    let report = pipeline.run(old_urls, new_urls, &args.owner).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\nMigration run complete (session {})", report.session_id);
    println!("  Mappings:         {}", report.stats.total);
    println!("    exact:          {}", report.stats.exact);
    println!("    semantic high:  {}", report.stats.semantic_high);
    println!("    semantic medium:{}", report.stats.semantic_medium);
    println!("    semantic low:   {}", report.stats.semantic_low);
    println!("  Needs review:     {}", report.stats.needs_review);
    println!("  Approval progress:{}%", report.stats.approval_progress);
    println!("  Orphaned old URLs:{}", report.orphaned_old.len());
    println!("  Unclaimed new URLs:{}", report.unclaimed_new.len());
    if report.pages_skipped_embedding > 0 {
        println!(
            "  {} pages skipped due to failed embeddings",
            report.pages_skipped_embedding
        );
    }

    Ok(())
}

/// Read URLs from the first column of a CSV file, skipping blank rows.
fn read_url_csv(path: &PathBuf) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter_map(|line| {
            let first = line.split(',').next()?.trim();
            (!first.is_empty()).then(|| first.to_string())
        })
        .collect())
}
