//! Operator CLI for the monitored-page table.
//!
//! Seeds pages from a JSON file and drives the operator transitions of the
//! page state machine (pause/resume), plus read-only views over the audit
//! log and the snapshot archive.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use talemon_server::kernel::sha1_hex;
use talemon_server::models::{Page, PageInfo, PageMonitor, PageSnapshot};
use talemon_server::{db, Settings};
use url::Url;

#[derive(Parser)]
#[command(name = "pages_cli")]
#[command(about = "Operator tooling for monitored pages")]
struct Cli {
    /// Path to config.toml (defaults to the usual search locations)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register monitored URLs from a JSON seed file
    Seed { file: PathBuf },

    /// Pause a page; it drops out of scheduling until resumed
    Pause { url: String },

    /// Resume a paused page
    Resume { url: String },

    /// Show recent monitoring attempts for a page
    History {
        url: String,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Show the latest snapshot and its extracted records
    Info { url: String },
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    pages: Vec<SeedPage>,
}

#[derive(Debug, Deserialize)]
struct SeedPage {
    url: String,
    #[serde(default = "default_check_interval")]
    check_interval_seconds: u64,
}

fn default_check_interval() -> u64 {
    3600
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let pool = db::connect(&settings.database).await?;
    db::migrate(&pool).await?;

    match cli.command {
        Commands::Seed { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read seed file {}", file.display()))?;
            let seed: SeedFile = serde_json::from_str(&raw).context("invalid seed file")?;

            let mut created = 0usize;
            let mut skipped = 0usize;
            for entry in seed.pages {
                let parsed = match Url::parse(&entry.url) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        eprintln!("skipping {}: {}", entry.url, e);
                        skipped += 1;
                        continue;
                    }
                };
                let Some(domain) = parsed.host_str().map(str::to_string) else {
                    eprintln!("skipping {}: no host", entry.url);
                    skipped += 1;
                    continue;
                };

                let hash = sha1_hex(entry.url.as_bytes());
                match Page::create(
                    &pool,
                    &entry.url,
                    &hash,
                    &domain,
                    entry.check_interval_seconds as f64,
                )
                .await?
                {
                    Some(page) => {
                        println!("registered {} (id {})", page.url, page.id);
                        created += 1;
                    }
                    None => {
                        println!("already registered: {}", entry.url);
                        skipped += 1;
                    }
                }
            }
            println!("done: {created} registered, {skipped} skipped");
        }

        Commands::Pause { url } => {
            if Page::pause(&pool, &url).await? {
                println!("paused {url}");
            } else {
                anyhow::bail!("no such page: {url}");
            }
        }

        Commands::Resume { url } => {
            if Page::resume(&pool, &url).await? {
                println!("resumed {url}");
            } else {
                anyhow::bail!("no paused page: {url}");
            }
        }

        Commands::History { url, limit } => {
            let page = Page::find_by_url(&pool, &url)
                .await?
                .with_context(|| format!("no such page: {url}"))?;

            for monitor in PageMonitor::recent_for_page(&pool, page.id, limit).await? {
                let change = if monitor.change_detected {
                    "CHANGED"
                } else {
                    "no-change"
                };
                println!(
                    "{}  {:>9}  http={}  {}",
                    monitor.monitor_timestamp,
                    change,
                    monitor
                        .http_status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    monitor.error_message.unwrap_or_default(),
                );
            }
        }

        Commands::Info { url } => {
            let page = Page::find_by_url(&pool, &url)
                .await?
                .with_context(|| format!("no such page: {url}"))?;

            println!("page {} ({:?})", page.id, page.status);
            println!("  last_clean_hash: {}", page.last_clean_hash.as_deref().unwrap_or("-"));
            println!("  next_schedule_at: {}", page.next_schedule_at);

            match PageSnapshot::latest_for_page(&pool, page.id).await? {
                Some(snapshot) => {
                    println!("latest snapshot {} at {}", snapshot.id, snapshot.snapshot_timestamp);
                    println!("  oss_path: {}", snapshot.oss_path);
                    println!("  clean_hash: {}", snapshot.clean_hash);
                    for info in PageInfo::for_snapshot(&pool, snapshot.id).await? {
                        println!("  record [{}] {}", info.extractor_version, info.data);
                    }
                }
                None => println!("no snapshots yet"),
            }
        }
    }

    Ok(())
}
