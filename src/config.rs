use crate::error::{Error, Result};

/// Defines how a Write for an already-placed object is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementPolicy {
  /// Every Write is placed on the currently lightest shard, even when the
  /// object already lives elsewhere. Reads follow the latest placement.
  #[default]
  Rebalance,

  /// Only the first Write for an object consults the load heap. Later Writes
  /// go to the owning shard and are not charged again.
  Sticky,
}

#[derive(Debug, Clone)]
pub struct RouterOptions {
  /// Number of shard workers in the pool.
  /// Fixed for the lifetime of the router.
  /// Default: 4.
  pub shard_count: u16,

  pub placement: PlacementPolicy,
}

impl Default for RouterOptions {
  fn default() -> Self {
    Self {
      shard_count: 4,
      placement: PlacementPolicy::Rebalance,
    }
  }
}

impl RouterOptions {
  pub fn new(shard_count: u16) -> Self {
    Self {
      shard_count,
      ..Default::default()
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.shard_count == 0 {
      return Err(Error::Config("shard_count must be greater than zero".into()));
    }
    Ok(())
  }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
  /// Capacity of the reassembly buffer in bytes.
  /// A single record (plus its newline) must fit, otherwise ingestion fails.
  /// Default: 819_201 bytes.
  pub buffer_size: usize,

  /// Emit a progress line every this many records.
  /// Default: 1_000_000.
  pub progress_interval: u64,
}

impl Default for IngestOptions {
  fn default() -> Self {
    Self {
      buffer_size: 819_201,
      progress_interval: 1_000_000,
    }
  }
}

impl IngestOptions {
  pub fn new(buffer_size: usize) -> Self {
    Self {
      buffer_size,
      ..Default::default()
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.buffer_size == 0 {
      return Err(Error::Config("buffer_size must be greater than zero".into()));
    }
    if self.progress_interval == 0 {
      return Err(Error::Config("progress_interval must be greater than zero".into()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_are_valid() {
    assert!(RouterOptions::default().validate().is_ok());
    assert!(IngestOptions::default().validate().is_ok());
    assert_eq!(RouterOptions::default().placement, PlacementPolicy::Rebalance);
  }

  #[test]
  fn test_zero_shards_rejected() {
    let err = RouterOptions::new(0).validate().unwrap_err();
    assert!(matches!(err, Error::Config(_)));
  }

  #[test]
  fn test_zero_buffer_rejected() {
    assert!(IngestOptions::new(0).validate().is_err());

    let mut opts = IngestOptions::new(64);
    opts.progress_interval = 0;
    assert!(opts.validate().is_err());
  }
}
