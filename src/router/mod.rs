//! Placement router.
//!
//! The router owns every piece of shared state: the load heap, the object
//! directory, the sending ends of the shard queues and the result channel.
//! Workers never see router state; they only receive commands.
//!
//! ## Locking
//!
//! A `save` holds the placement lock across heap pop, charge, push and the
//! directory update, so placement decisions are strictly serialized and the
//! directory always reflects the latest decision. Enqueueing onto the shard
//! happens after the lock is released. A `read` only takes the directory's
//! read lock.
//!
//! A read that races a re-placing write for the same object may be routed to
//! either shard; only single-threaded submission gives read-after-write.

mod directory;
mod placement;

pub use placement::ShardLoad;

use crate::aggregator::{Aggregator, Emission, ResultSink};
use crate::command::{Command, ShardId};
use crate::config::{PlacementPolicy, RouterOptions};
use crate::error::{Error, Result};
use crate::shard::{ShardHandle, WorkerStats};
use directory::Directory;
use flume::Sender;
use parking_lot::Mutex;
use placement::LoadBalancer;

/// A committed placement decision, kept so it can be undone.
#[derive(Debug, Clone, Copy)]
struct Placement {
  shard_id: ShardId,
  previous: Option<ShardId>,
  charged: u64,
}

/// Final accounting returned by [`Router::shutdown`].
#[derive(Debug, Clone, Default)]
pub struct RouterReport {
  /// Shard loads, lightest first.
  pub loads: Vec<ShardLoad>,

  /// Per-worker counters, in shard id order.
  pub workers: Vec<WorkerStats>,

  /// Results handed to the sink by the aggregator.
  pub results_emitted: u64,
}

impl RouterReport {
  pub fn total_bytes(&self) -> u64 {
    self.loads.iter().map(|l| l.bytes_written).sum()
  }
}

/// Routes writes to the least-loaded shard and reads to the owning shard.
///
/// Spawns one thread per shard plus the aggregator thread. `save` and `read`
/// take `&self` and may be called from many threads.
///
/// # Example
///
/// ```no_run
/// use ironshard::{CollectSink, Router, RouterOptions};
///
/// # fn main() -> ironshard::Result<()> {
/// let sink = CollectSink::new();
/// let router = Router::new(RouterOptions::new(2), sink.clone())?;
///
/// let shard = router.save("r1", "keyA", 10, "hashA")?;
/// router.read("r2", "keyA")?;
///
/// let report = router.shutdown()?;
/// assert_eq!(report.total_bytes(), 10);
/// assert_eq!(sink.len(), 2);
/// # let _ = shard;
/// # Ok(())
/// # }
/// ```
pub struct Router {
  options: RouterOptions,
  placement: Mutex<LoadBalancer>,
  directory: Directory,
  shards: Vec<ShardHandle>,
  results: Sender<Emission>,
  aggregator: Option<Aggregator>,
}

impl Router {
  /// Starts the aggregator and the shard pool.
  ///
  /// # Errors
  ///
  /// Returns error if:
  /// - `shard_count` is zero
  /// - a thread cannot be spawned (already started threads are stopped)
  pub fn new<S: ResultSink>(options: RouterOptions, sink: S) -> Result<Self> {
    options.validate()?;

    let (results, inbox) = flume::unbounded();
    let aggregator = Aggregator::spawn(inbox, sink)?;

    let mut shards = Vec::with_capacity(options.shard_count as usize);
    for shard_id in 0..options.shard_count {
      match ShardHandle::spawn(shard_id, results.clone()) {
        Ok(handle) => shards.push(handle),
        Err(e) => {
          tracing::error!(target: "ironshard::router", "Failed to start shard {}: {}", shard_id, e);
          for shard in &mut shards {
            let _ = shard.stop();
            let _ = shard.join();
          }
          let _ = results.send(Emission::Finished);
          let _ = aggregator.join();
          return Err(e);
        }
      }
    }

    tracing::info!(
      target: "ironshard::router",
      "Router started with {} shards ({:?} placement)",
      options.shard_count,
      options.placement
    );

    Ok(Self {
      placement: Mutex::new(LoadBalancer::new(options.shard_count)),
      directory: Directory::new(),
      shards,
      results,
      aggregator: Some(aggregator),
      options,
    })
  }

  /// Places a write on the shard with the smallest byte total and enqueues it.
  ///
  /// If the chosen shard can no longer accept commands, the byte charge and
  /// the directory entry are rolled back before the error is returned.
  ///
  /// # Returns
  ///
  /// The shard that will absorb the write.
  pub fn save(
    &self,
    request_id: impl Into<String>,
    object_id: impl Into<String>,
    size: u64,
    hash: impl Into<String>,
  ) -> Result<ShardId> {
    let object_id = object_id.into();
    let placed = self.place(&object_id, size)?;

    let sent = self.shard(placed.shard_id).and_then(|shard| {
      shard.send(Command::Write {
        request_id: request_id.into(),
        object_id: object_id.clone(),
        size,
        hash: hash.into(),
      })
    });

    if let Err(e) = sent {
      self.unplace(&object_id, placed);
      return Err(e);
    }

    Ok(placed.shard_id)
  }

  /// Enqueues a read on the shard that received the object's latest write.
  ///
  /// # Errors
  ///
  /// Returns `Error::UnknownObject` if the object was never written.
  pub fn read(&self, request_id: impl Into<String>, object_id: impl Into<String>) -> Result<ShardId> {
    let object_id = object_id.into();
    let Some(shard_id) = self.directory.lookup(&object_id) else {
      return Err(Error::UnknownObject(object_id));
    };

    self.shard(shard_id)?.send(Command::Read {
      request_id: request_id.into(),
      object_id,
    })?;

    Ok(shard_id)
  }

  fn place(&self, object_id: &str, size: u64) -> Result<Placement> {
    let mut placement = self.placement.lock();

    if self.options.placement == PlacementPolicy::Sticky {
      if let Some(owner) = self.directory.lookup(object_id) {
        return Ok(Placement {
          shard_id: owner,
          previous: Some(owner),
          charged: 0,
        });
      }
    }

    let load = placement.place(size)?;
    let previous = self.directory.assign(object_id, load.shard_id);
    Ok(Placement {
      shard_id: load.shard_id,
      previous,
      charged: size,
    })
  }

  fn unplace(&self, object_id: &str, placed: Placement) {
    let mut placement = self.placement.lock();
    placement.refund(placed.shard_id, placed.charged);
    // A later save may already have moved the object elsewhere.
    if self.directory.lookup(object_id) == Some(placed.shard_id) {
      self.directory.restore(object_id, placed.previous);
    }
    tracing::warn!(
      target: "ironshard::router",
      "Rolled back placement of {:?} on unavailable shard {}",
      object_id,
      placed.shard_id
    );
  }

  fn shard(&self, shard_id: ShardId) -> Result<&ShardHandle> {
    self
      .shards
      .get(shard_id as usize)
      .ok_or(Error::ShardUnavailable(shard_id))
  }

  /// Current owner of an object, without enqueueing anything.
  pub fn locate(&self, object_id: &str) -> Option<ShardId> {
    self.directory.lookup(object_id)
  }

  /// Reports shard loads lightest first and logs one line per shard.
  pub fn stat(&self) -> Vec<ShardLoad> {
    let loads = self.placement.lock().ascending();
    for load in &loads {
      tracing::info!(
        target: "ironshard::router",
        "Shard id = {} bytes = {}",
        load.shard_id,
        load.bytes_written
      );
    }
    loads
  }

  /// The shard the next placement would choose.
  pub fn lightest(&self) -> Option<ShardLoad> {
    self.placement.lock().peek()
  }

  /// Loads indexed by shard id.
  pub fn loads(&self) -> Vec<ShardLoad> {
    self.placement.lock().by_shard()
  }

  /// Sum of bytes charged by all placements so far.
  pub fn total_bytes(&self) -> u64 {
    self.placement.lock().total_bytes()
  }

  /// Number of objects in the directory.
  pub fn object_count(&self) -> usize {
    self.directory.len()
  }

  pub fn shard_count(&self) -> u16 {
    self.options.shard_count
  }

  pub fn options(&self) -> &RouterOptions {
    &self.options
  }

  /// Stops every shard, waits for them, then stops the aggregator.
  ///
  /// Each worker drains its queue up to its `Shutdown` command before it is
  /// joined, and the aggregator's finish signal is only sent once all
  /// workers have exited, so every produced result reaches the sink.
  ///
  /// # Errors
  ///
  /// Returns the first worker or aggregator failure. The remaining threads
  /// are still shut down.
  pub fn shutdown(mut self) -> Result<RouterReport> {
    self.close()
  }

  fn close(&mut self) -> Result<RouterReport> {
    let mut failure: Option<Error> = None;

    for shard in &self.shards {
      if let Err(e) = shard.stop() {
        tracing::warn!(target: "ironshard::router", "Could not stop shard {}: {}", shard.shard_id(), e);
      }
    }

    let mut workers = Vec::with_capacity(self.shards.len());
    for shard in &mut self.shards {
      match shard.join() {
        Ok(stats) => workers.push(stats),
        Err(e) => {
          failure.get_or_insert(e);
        }
      }
      let leftover = shard.pending();
      if leftover > 0 {
        tracing::warn!(
          target: "ironshard::router",
          "Shard {} exited with {} unconsumed commands",
          shard.shard_id(),
          leftover
        );
      }
    }
    self.shards.clear();

    let mut results_emitted = 0;
    if let Some(aggregator) = self.aggregator.take() {
      let _ = self.results.send(Emission::Finished);
      match aggregator.join() {
        Ok(emitted) => results_emitted = emitted,
        Err(e) => {
          failure.get_or_insert(e);
        }
      }
    }

    let loads = self.placement.lock().drain();

    if let Some(e) = failure {
      return Err(e);
    }

    tracing::info!(
      target: "ironshard::router",
      "Router stopped: {} results emitted, {} bytes placed",
      results_emitted,
      loads.iter().map(|l| l.bytes_written).sum::<u64>()
    );

    Ok(RouterReport {
      loads,
      workers,
      results_emitted,
    })
  }
}

impl Drop for Router {
  fn drop(&mut self) {
    if self.aggregator.is_some() {
      if let Err(e) = self.close() {
        tracing::error!(target: "ironshard::router", "Router shutdown on drop failed: {}", e);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::aggregator::CollectSink;
  use crate::command::Outcome;

  fn router(shards: u16) -> (Router, CollectSink) {
    let sink = CollectSink::new();
    let router = Router::new(RouterOptions::new(shards), sink.clone()).unwrap();
    (router, sink)
  }

  #[test]
  fn test_zero_shards_rejected() {
    let result = Router::new(RouterOptions::new(0), CollectSink::new());
    assert!(matches!(result, Err(Error::Config(_))));
  }

  #[test]
  fn test_unknown_object_is_distinct_from_missing() {
    let (router, sink) = router(2);

    let err = router.read("r1", "never-written").unwrap_err();
    assert!(matches!(err, Error::UnknownObject(ref id) if id == "never-written"));

    router.shutdown().unwrap();
    assert!(sink.is_empty());
  }

  #[test]
  fn test_sticky_policy_keeps_owner() {
    let sink = CollectSink::new();
    let mut opts = RouterOptions::new(2);
    opts.placement = PlacementPolicy::Sticky;
    let router = Router::new(opts, sink.clone()).unwrap();

    assert_eq!(router.save("r1", "a", 5, "h1").unwrap(), 0);
    assert_eq!(router.save("r2", "b", 1, "h2").unwrap(), 1);
    // Shard 1 is lighter, but "a" stays put and is not charged again.
    assert_eq!(router.save("r3", "a", 100, "h3").unwrap(), 0);
    assert_eq!(router.total_bytes(), 6);

    router.read("r4", "a").unwrap();
    router.shutdown().unwrap();

    let results = sink.by_request();
    assert_eq!(results["r4"].outcome, Outcome::Found("h3".into()));
  }

  #[test]
  fn test_stat_is_non_destructive() {
    let (router, _sink) = router(3);
    router.save("r1", "a", 30, "h").unwrap();
    router.save("r2", "b", 10, "h").unwrap();

    let first = router.stat();
    let second = router.stat();
    assert_eq!(first, second);
    assert_eq!(first[0].bytes_written, 0);
    assert_eq!(first[2].bytes_written, 30);

    let report = router.shutdown().unwrap();
    assert_eq!(report.loads, first);
  }

  #[test]
  fn test_drop_without_shutdown_flushes_results() {
    let (router, sink) = router(2);
    for i in 0..50 {
      router.save(format!("r{}", i), format!("k{}", i), 1, "h").unwrap();
    }
    drop(router);

    assert_eq!(sink.len(), 50);
  }

  #[test]
  fn test_failed_enqueue_rolls_back_placement() {
    let (mut router, _sink) = router(2);
    router.shards[1].stop().unwrap();
    router.shards[1].join().unwrap();

    assert_eq!(router.save("r1", "a", 5, "h1").unwrap(), 0);

    // Shard 1 is lightest but gone: neither the charge nor the move sticks.
    let err = router.save("r2", "a", 1, "h2").unwrap_err();
    assert!(matches!(err, Error::ShardUnavailable(1)));
    assert_eq!(router.locate("a"), Some(0));

    let err = router.save("r3", "b", 3, "h3").unwrap_err();
    assert!(matches!(err, Error::ShardUnavailable(1)));
    assert_eq!(router.locate("b"), None);

    let loads: Vec<u64> = router.loads().iter().map(|l| l.bytes_written).collect();
    assert_eq!(loads, vec![5, 0]);
    assert_eq!(router.total_bytes(), 5);
    assert_eq!(router.object_count(), 1);

    // The already joined shard is reported by shutdown.
    assert!(matches!(router.shutdown(), Err(Error::ShardUnavailable(1))));
  }

  #[test]
  fn test_report_counts_workers() {
    let (router, _sink) = router(4);
    for i in 0..8 {
      router.save(format!("r{}", i), format!("k{}", i), 1, "h").unwrap();
    }

    let report = router.shutdown().unwrap();
    assert_eq!(report.workers.len(), 4);
    assert_eq!(report.results_emitted, 8);
    assert!(report.workers.iter().all(|w| w.writes == 2));
  }
}
