//! Messages exchanged between the router, shard workers and the aggregator.

use std::fmt;

/// Identifier of a shard in `0..shard_count`.
pub type ShardId = u16;

/// A unit of work enqueued onto exactly one shard's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
  Write {
    request_id: String,
    object_id: String,
    size: u64,
    hash: String,
  },
  Read {
    request_id: String,
    object_id: String,
  },
  /// Stops the worker. Produces no result.
  Shutdown,
}

/// A parsed input record, before placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
  Write {
    request_id: String,
    object_id: String,
    size: u64,
    hash: String,
  },
  Read {
    request_id: String,
    object_id: String,
  },
}

impl Request {
  pub fn request_id(&self) -> &str {
    match self {
      Request::Write { request_id, .. } | Request::Read { request_id, .. } => request_id,
    }
  }

  pub fn object_id(&self) -> &str {
    match self {
      Request::Write { object_id, .. } | Request::Read { object_id, .. } => object_id,
    }
  }
}

/// What a shard did with a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// The write was absorbed by the shard that produced the result.
  Stored,
  /// The read found a value in the shard's store.
  Found(String),
  /// The read was routed to the shard but its store had no entry.
  Missing,
}

/// Result of one processed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardResult {
  pub request_id: String,
  pub shard_id: ShardId,
  pub outcome: Outcome,
}

impl ShardResult {
  /// Renders the output payload: the shard id for writes, the value (or
  /// nothing) for reads.
  pub fn payload(&self) -> String {
    match &self.outcome {
      Outcome::Stored => self.shard_id.to_string(),
      Outcome::Found(value) => value.clone(),
      Outcome::Missing => String::new(),
    }
  }
}

impl fmt::Display for ShardResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.outcome {
      Outcome::Stored => write!(f, "{},{}", self.request_id, self.shard_id),
      Outcome::Found(value) => write!(f, "{},{}", self.request_id, value),
      Outcome::Missing => write!(f, "{},", self.request_id),
    }
  }
}
