//! Pipeline coordinator
//!
//! Sequences one run per source: read checkpoint → fetch → normalize →
//! write snapshot → merge → advance checkpoint (incremental sources only).
//! Runs are strictly sequential per source; different sources touch
//! disjoint checkpoint rows, snapshot directories and silver tables, so
//! they may run concurrently with each other.
//!
//! Recovery model: a failing step aborts the run and rolls nothing back.
//! Snapshots already on disk stay valid; the next run's idempotent merge
//! reconciles them.

use crate::bronze::{try_latest_snapshot, write_snapshot, SnapshotWrite};
use crate::checkpoint::CheckpointStore;
use crate::client::SourceClient;
use crate::config::PipelineConfig;
use crate::normalize::{
    normalize_customers, normalize_products, normalize_sales, BatchContext,
};
use crate::silver;
use rdp_common::{RdpError, Result};
use sqlx::PgPool;
use std::path::PathBuf;
use tracing::{info, instrument};
use uuid::Uuid;

/// Minimum valid source-side id; the cursor for a never-ingested source
pub const INITIAL_CURSOR: i64 = 1;

/// Note recorded on every checkpoint advance
const CHECKPOINT_NOTE: &str = "upsert";

/// An ingestible source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Product catalog, full refresh per run
    Products,
    /// Customer directory, full refresh per run
    Customers,
    /// Sales transactions, incremental by sale id
    Sales,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Products, Source::Customers, Source::Sales];

    pub fn name(&self) -> &'static str {
        match self {
            Source::Products => "products",
            Source::Customers => "customers",
            Source::Sales => "sales",
        }
    }

    /// Only sales keeps a cursor; products and customers are re-snapshotted
    /// whole every run
    pub fn is_incremental(&self) -> bool {
        matches!(self, Source::Sales)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Source {
    type Err = RdpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "products" => Ok(Source::Products),
            "customers" => Ok(Source::Customers),
            "sales" => Ok(Source::Sales),
            other => Err(RdpError::config(format!(
                "unknown source: {other} (expected products, customers or sales)"
            ))),
        }
    }
}

/// Result of the bronze half of a run (fetch → normalize → snapshot)
#[derive(Debug)]
pub enum BronzeOutcome {
    /// The cursor is past every available record: nothing fetched, nothing
    /// written, checkpoint untouched. A successful no-op.
    Empty,
    /// Snapshot file(s) written for this batch
    Written {
        batch_id: Uuid,
        rows: usize,
        snapshots: Vec<PathBuf>,
    },
}

/// Result of one full run for one source
#[derive(Debug)]
pub struct RunOutcome {
    pub source: Source,
    /// Rows upserted into silver, summed over the source's relations
    pub rows_merged: u64,
    /// Provenance id of the batch, `None` for an empty no-op run
    pub batch_id: Option<Uuid>,
    /// New cursor after a sales run, `None` otherwise
    pub next_cursor: Option<i64>,
}

impl RunOutcome {
    pub fn is_noop(&self) -> bool {
        self.batch_id.is_none() && self.rows_merged == 0
    }
}

/// Coordinator owning the per-run wiring: one validated config, one HTTP
/// client, one injected Postgres pool
pub struct Pipeline {
    config: PipelineConfig,
    client: SourceClient,
    checkpoints: CheckpointStore,
    pool: PgPool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, pool: PgPool) -> Result<Self> {
        config.validate()?;
        let client = SourceClient::new(&config)?;
        Ok(Self {
            checkpoints: CheckpointStore::new(pool.clone()),
            client,
            config,
            pool,
        })
    }

    /// Run one source end to end: bronze then, unless the fetch was empty,
    /// silver
    #[instrument(skip(self))]
    pub async fn run(&self, source: Source) -> Result<RunOutcome> {
        match self.run_bronze(source).await? {
            BronzeOutcome::Empty => {
                info!(source = %source, "No new records, run is a no-op");
                Ok(RunOutcome {
                    source,
                    rows_merged: 0,
                    batch_id: None,
                    next_cursor: None,
                })
            },
            BronzeOutcome::Written { batch_id, .. } => {
                let mut outcome = self.run_silver(source).await?;
                outcome.batch_id = Some(batch_id);
                Ok(outcome)
            },
        }
    }

    /// Bronze half: read checkpoint (sales), fetch one page, normalize,
    /// write snapshot file(s)
    #[instrument(skip(self))]
    pub async fn run_bronze(&self, source: Source) -> Result<BronzeOutcome> {
        let cursor = if source.is_incremental() {
            self.checkpoints
                .get(source.name())
                .await?
                .unwrap_or(INITIAL_CURSOR)
        } else {
            INITIAL_CURSOR
        };
        self.land_bronze(source, cursor).await
    }

    /// Fetch one page at `cursor` and land it as bronze snapshot(s)
    ///
    /// Split out of [`run_bronze`](Self::run_bronze) so the fetch/normalize/
    /// write path can run against an explicit cursor without a checkpoint
    /// read (and without a database).
    #[instrument(skip(self))]
    pub async fn land_bronze(&self, source: Source, cursor: i64) -> Result<BronzeOutcome> {
        let limit = self.config.page_size;
        let page = match source {
            Source::Products => self.client.fetch_products(limit).await?,
            Source::Customers => self.client.fetch_customers(limit).await?,
            Source::Sales => self.client.fetch_sales(cursor, limit).await?,
        };

        if page.is_empty() {
            return Ok(BronzeOutcome::Empty);
        }

        let ctx = BatchContext::new();
        let mut snapshots = Vec::new();
        let rows = match source {
            Source::Products => {
                let rows = normalize_products(&page.items, &ctx)?;
                let dir = self.config.relation_dir("products");
                if let SnapshotWrite::Written { path, .. } = write_snapshot(&rows, &dir)? {
                    snapshots.push(path);
                }
                rows.len()
            },
            Source::Customers => {
                let rows = normalize_customers(&page.items, &ctx)?;
                let dir = self.config.relation_dir("customers");
                if let SnapshotWrite::Written { path, .. } = write_snapshot(&rows, &dir)? {
                    snapshots.push(path);
                }
                rows.len()
            },
            Source::Sales => {
                let (headers, lines) = normalize_sales(&page.items, &ctx)?;
                let header_dir = self.config.relation_dir("sales_customer");
                if let SnapshotWrite::Written { path, .. } = write_snapshot(&headers, &header_dir)?
                {
                    snapshots.push(path);
                }
                let line_dir = self.config.relation_dir("sales_product");
                if let SnapshotWrite::Written { path, .. } = write_snapshot(&lines, &line_dir)? {
                    snapshots.push(path);
                }
                headers.len() + lines.len()
            },
        };

        info!(
            source = %source,
            cursor,
            rows,
            batch_id = %ctx.batch_id,
            "Landed bronze batch"
        );
        Ok(BronzeOutcome::Written {
            batch_id: ctx.batch_id,
            rows,
            snapshots,
        })
    }

    /// Silver half: merge the latest snapshot(s) into the target tables,
    /// then advance the sales checkpoint to `max(id) + 1`
    #[instrument(skip(self))]
    pub async fn run_silver(&self, source: Source) -> Result<RunOutcome> {
        match source {
            Source::Products => {
                let merged = silver::merge_products(
                    &self.pool,
                    &self.config.relation_dir("products"),
                )
                .await?;
                Ok(RunOutcome {
                    source,
                    rows_merged: merged,
                    batch_id: None,
                    next_cursor: None,
                })
            },
            Source::Customers => {
                let merged = silver::merge_customers(
                    &self.pool,
                    &self.config.relation_dir("customers"),
                )
                .await?;
                Ok(RunOutcome {
                    source,
                    rows_merged: merged,
                    batch_id: None,
                    next_cursor: None,
                })
            },
            Source::Sales => {
                let headers = silver::merge_sale_headers(
                    &self.pool,
                    &self.config.relation_dir("sales_customer"),
                )
                .await?;
                // A batch whose sales all carry zero line items writes no
                // sales_product snapshot; only the headers exist to merge.
                let line_dir = self.config.relation_dir("sales_product");
                let lines_merged = match try_latest_snapshot(&line_dir)? {
                    Some(_) => silver::merge_sale_lines(&self.pool, &line_dir).await?,
                    None => {
                        info!(source = %source, "No sales_product snapshot, skipping lines merge");
                        0
                    },
                };

                let next_cursor = match headers.max_id {
                    Some(max_id) => {
                        let candidate = max_id + 1;
                        self.checkpoints
                            .advance(source.name(), candidate, Some(CHECKPOINT_NOTE))
                            .await?;
                        Some(candidate)
                    },
                    None => None,
                };

                Ok(RunOutcome {
                    source,
                    rows_merged: headers.rows_merged + lines_merged,
                    batch_id: None,
                    next_cursor,
                })
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_str() {
        assert_eq!("sales".parse::<Source>().unwrap(), Source::Sales);
        assert_eq!("Products".parse::<Source>().unwrap(), Source::Products);
        assert!("gold".parse::<Source>().is_err());
    }

    #[test]
    fn test_only_sales_is_incremental() {
        assert!(Source::Sales.is_incremental());
        assert!(!Source::Products.is_incremental());
        assert!(!Source::Customers.is_incremental());
    }

    #[test]
    fn test_noop_outcome() {
        let outcome = RunOutcome {
            source: Source::Sales,
            rows_merged: 0,
            batch_id: None,
            next_cursor: None,
        };
        assert!(outcome.is_noop());
    }
}
