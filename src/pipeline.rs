//! End-to-end wiring: ingestion → router → shard workers → aggregator.

use crate::aggregator::ResultSink;
use crate::config::{IngestOptions, RouterOptions};
use crate::error::Result;
use crate::ingest::{IngestStats, Ingestor};
use crate::router::{Router, RouterReport};
use std::io::Read;
use std::time::{Duration, Instant};

/// Outcome of a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
  pub ingest: IngestStats,
  pub router: RouterReport,
  pub elapsed: Duration,
}

/// Runs every record of `reader` through a fresh router and shuts it down.
///
/// Results reach `sink` in arrival order. The router is always shut down,
/// even if ingestion fails; the ingestion error takes precedence.
pub fn run_pipeline<R: Read, S: ResultSink>(
  reader: R,
  router_options: RouterOptions,
  ingest_options: IngestOptions,
  sink: S,
) -> Result<PipelineReport> {
  let start = Instant::now();
  let mut ingestor = Ingestor::new(ingest_options)?;
  let router = Router::new(router_options, sink)?;

  let ingested = ingestor.run(reader, &mut &router);
  router.stat();
  let shutdown = router.shutdown();

  let ingest = ingested?;
  let router = shutdown?;
  let elapsed = start.elapsed();

  tracing::info!(
    target: "ironshard",
    "Pipeline finished: {} records ({} writes, {} reads, {} rejected, {} unknown) in {:.3}s",
    ingest.records,
    ingest.writes,
    ingest.reads,
    ingest.rejected,
    ingest.unknown_objects,
    elapsed.as_secs_f64()
  );

  Ok(PipelineReport {
    ingest,
    router,
    elapsed,
  })
}
