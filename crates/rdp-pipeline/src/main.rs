//! RDP Pipeline - retail bronze/silver ingestion tool

use anyhow::Result;
use clap::Parser;
use rdp_common::logging::{init_logging, LogConfig, LogLevel};
use rdp_pipeline::config::PipelineConfig;
use rdp_pipeline::pipeline::{Pipeline, Source};
use sqlx::PgPool;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rdp-pipeline")]
#[command(author, version, about = "Retail data pipeline (bronze + silver)")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Full run per source: fetch, snapshot, merge, advance checkpoint
    Run {
        /// Source to ingest: products, customers, sales or all
        #[arg(short, long, default_value = "all")]
        source: String,
    },

    /// Bronze only: fetch one page and write the snapshot file(s)
    Fetch {
        /// Source to fetch: products, customers, sales or all
        #[arg(short, long, default_value = "all")]
        source: String,
    },

    /// Silver only: merge the latest snapshot(s) into the target tables
    Load {
        /// Source to load: products, customers, sales or all
        #[arg(short, long, default_value = "all")]
        source: String,
    },

    /// Apply embedded schema migrations (meta + silver)
    Migrate,
}

fn parse_sources(raw: &str) -> Result<Vec<Source>> {
    if raw.eq_ignore_ascii_case("all") {
        Ok(Source::ALL.to_vec())
    } else {
        Ok(vec![raw.parse()?])
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    log_config.log_file_prefix = "rdp-pipeline".to_string();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    let config = PipelineConfig::from_env()?;
    // Lazy pool: a connection opens only when a command touches the
    // checkpoint row or the silver tables
    let pool = PgPool::connect_lazy(&config.database_url)?;

    match cli.command {
        Command::Migrate => {
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Migrations applied");
        },
        Command::Run { source } => {
            let pipeline = Pipeline::new(config, pool)?;
            for source in parse_sources(&source)? {
                let outcome = pipeline.run(source).await?;
                info!(
                    source = %outcome.source,
                    rows_merged = outcome.rows_merged,
                    noop = outcome.is_noop(),
                    next_cursor = ?outcome.next_cursor,
                    "Run complete"
                );
            }
        },
        Command::Fetch { source } => {
            let pipeline = Pipeline::new(config, pool)?;
            for source in parse_sources(&source)? {
                let outcome = pipeline.run_bronze(source).await?;
                info!(source = %source, outcome = ?outcome, "Fetch complete");
            }
        },
        Command::Load { source } => {
            let pipeline = Pipeline::new(config, pool)?;
            for source in parse_sources(&source)? {
                let outcome = pipeline.run_silver(source).await?;
                info!(
                    source = %outcome.source,
                    rows_merged = outcome.rows_merged,
                    next_cursor = ?outcome.next_cursor,
                    "Load complete"
                );
            }
        },
    }

    Ok(())
}
