//! # IronShard
//!
//! `ironshard` is a sharded, in-memory key/value placement router. It spreads
//! writes across a fixed pool of shard workers by accumulated write volume,
//! remembers which shard owns each object, and routes reads to the owner.
//!
//! ## Key Features
//!
//! * **Load-aware placement**: Every write goes to the shard with the fewest
//!   bytes written so far (ties go to the lowest shard id).
//! * **Isolated shards**: Each shard is a dedicated thread owning its store and
//!   a FIFO command queue. Idle shards block instead of polling.
//! * **Orderly shutdown**: Shards drain and exit before the aggregator is told
//!   to finish, so no produced result is lost.
//! * **Chunked ingestion**: Records split across read boundaries are
//!   reassembled in a fixed-size buffer.
//!
//! ## Example
//!
//! ```no_run
//! use ironshard::{CollectSink, Router, RouterOptions};
//!
//! # fn main() -> ironshard::Result<()> {
//! let sink = CollectSink::new();
//! let router = Router::new(RouterOptions::new(2), sink.clone())?;
//!
//! router.save("r1", "keyA", 10, "hashA")?; // shard 0
//! router.save("r2", "keyB", 5, "hashB")?; // shard 1, now the lighter one
//! router.read("r3", "keyA")?; // routed to shard 0
//!
//! router.shutdown()?;
//! for result in sink.results() {
//!   println!("{}", result);
//! }
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod command;
mod config;
mod error;
mod ingest;
mod pipeline;
mod router;
mod shard;

pub mod verify;

// Re-exports for the flat public API
pub use aggregator::{CollectSink, LineSink, ResultSink};
pub use command::{Outcome, Request, ShardId, ShardResult};
pub use config::{IngestOptions, PlacementPolicy, RouterOptions};
pub use error::{Error, Result};
pub use ingest::{Dispatch, IngestStats, Ingestor, ingest, parse_record};
pub use pipeline::{PipelineReport, run_pipeline};
pub use router::{Router, RouterReport, ShardLoad};
pub use shard::WorkerStats;
