//! Least-loaded shard selection.
//!
//! Shards are kept in a min-heap ordered by accumulated bytes, ties broken by
//! the lowest shard id. Placing a write pops the lightest entry, charges it and
//! pushes it back; callers serialize `place` behind one lock so two concurrent
//! writes never observe the same lightest shard.

use crate::command::ShardId;
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Accumulated write volume of one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardLoad {
  pub shard_id: ShardId,
  pub bytes_written: u64,
}

// Reversed so that `BinaryHeap` (a max-heap) yields the lightest shard first.
impl Ord for ShardLoad {
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .bytes_written
      .cmp(&self.bytes_written)
      .then_with(|| other.shard_id.cmp(&self.shard_id))
  }
}

impl PartialOrd for ShardLoad {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

/// Holds exactly one `ShardLoad` per shard between placements.
#[derive(Debug)]
pub(crate) struct LoadBalancer {
  heap: BinaryHeap<ShardLoad>,
  total_bytes: u64,
}

impl LoadBalancer {
  pub fn new(shard_count: u16) -> Self {
    let heap = (0..shard_count)
      .map(|shard_id| ShardLoad {
        shard_id,
        bytes_written: 0,
      })
      .collect();

    Self { heap, total_bytes: 0 }
  }

  /// Charges `bytes` to the lightest shard and returns its updated load.
  ///
  /// On overflow the heap is left untouched.
  pub fn place(&mut self, bytes: u64) -> Result<ShardLoad> {
    let Some(mut lightest) = self.heap.pop() else {
      return Err(Error::Config("load balancer has no shards".into()));
    };

    let updated = lightest.bytes_written.checked_add(bytes);
    let total = self.total_bytes.checked_add(bytes);

    match (updated, total) {
      (Some(updated), Some(total)) => {
        lightest.bytes_written = updated;
        self.total_bytes = total;
        self.heap.push(lightest);
        Ok(lightest)
      }
      _ => {
        let shard_id = lightest.shard_id;
        self.heap.push(lightest);
        Err(Error::LoadOverflow { shard_id })
      }
    }
  }

  /// Takes back a charge made by `place` for a write that was never enqueued.
  pub fn refund(&mut self, shard_id: ShardId, bytes: u64) {
    let mut loads = std::mem::take(&mut self.heap).into_vec();
    for load in loads.iter_mut().filter(|l| l.shard_id == shard_id) {
      load.bytes_written = load.bytes_written.saturating_sub(bytes);
    }
    self.heap = BinaryHeap::from(loads);
    self.total_bytes = self.total_bytes.saturating_sub(bytes);
  }

  /// The shard the next placement would choose.
  pub fn peek(&self) -> Option<ShardLoad> {
    self.heap.peek().copied()
  }

  /// Loads in pop order: lightest first, ties by shard id.
  pub fn ascending(&self) -> Vec<ShardLoad> {
    // `into_sorted_vec` sorts by `Ord`, which is reversed.
    let mut loads = self.heap.clone().into_sorted_vec();
    loads.reverse();
    loads
  }

  /// Loads indexed by shard id.
  pub fn by_shard(&self) -> Vec<ShardLoad> {
    let mut loads: Vec<ShardLoad> = self.heap.iter().copied().collect();
    loads.sort_by_key(|l| l.shard_id);
    loads
  }

  /// Empties the heap, returning the loads lightest first.
  pub fn drain(&mut self) -> Vec<ShardLoad> {
    let mut loads = Vec::with_capacity(self.heap.len());
    while let Some(load) = self.heap.pop() {
      loads.push(load);
    }
    loads
  }

  /// Sum of all bytes ever placed.
  pub fn total_bytes(&self) -> u64 {
    self.total_bytes
  }
}
