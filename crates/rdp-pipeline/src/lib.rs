//! RDP Pipeline Library
//!
//! Incremental ETL core for the retail lakehouse: pulls paginated records
//! from the upstream retail API, lands them as immutable NDJSON snapshots
//! (bronze), and merges them into versioned Postgres tables (silver) with
//! idempotent key-based upserts.
//!
//! # Layers
//!
//! - **Bronze**: raw, append-only, timestamp-named snapshot files, one per
//!   relation per run, never mutated.
//! - **Silver**: deduplicated, upserted, query-ready relations
//!   (`silver.products`, `silver.customers`, `silver.sales_customer`,
//!   `silver.sales_product`).
//!
//! # Example
//!
//! ```no_run
//! use rdp_pipeline::{config::PipelineConfig, pipeline::Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::from_env()?;
//!     let pool = sqlx::PgPool::connect(&config.database_url).await?;
//!     let pipeline = Pipeline::new(config, pool)?;
//!     let outcome = pipeline.run(rdp_pipeline::pipeline::Source::Sales).await?;
//!     println!("merged {} rows", outcome.rows_merged);
//!     Ok(())
//! }
//! ```

pub mod bronze;
pub mod checkpoint;
pub mod client;
pub mod config;
pub mod normalize;
pub mod pipeline;
pub mod silver;
