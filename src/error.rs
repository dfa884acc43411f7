use crate::command::ShardId;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
  #[error("I/O Error: {0}")]
  Io(#[from] io::Error),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Malformed Record: {0}")]
  MalformedRecord(String),

  #[error("Object not found in directory: {0}")]
  UnknownObject(String),

  #[error("Record exceeds ingestion buffer capacity of {capacity} bytes")]
  RecordTooLarge { capacity: usize },

  #[error("Byte total overflow on shard {shard_id}")]
  LoadOverflow { shard_id: ShardId },

  #[error("Shard {0} is no longer accepting commands")]
  ShardUnavailable(ShardId),

  #[error("Shard worker {0} panicked")]
  WorkerPanicked(ShardId),

  #[error("Result aggregator panicked")]
  AggregatorPanicked,
}

impl Error {
  /// Returns true for errors scoped to a single input record.
  ///
  /// The ingestion pipeline skips such records and continues; every other
  /// error aborts ingestion.
  pub fn is_record_error(&self) -> bool {
    matches!(self, Error::MalformedRecord(_) | Error::UnknownObject(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_record_errors_are_recoverable() {
    assert!(Error::MalformedRecord("bad".into()).is_record_error());
    assert!(Error::UnknownObject("key".into()).is_record_error());
  }

  #[test]
  fn test_fatal_errors_are_not_record_errors() {
    assert!(!Error::RecordTooLarge { capacity: 8 }.is_record_error());
    assert!(!Error::ShardUnavailable(3).is_record_error());
    assert!(!Error::WorkerPanicked(1).is_record_error());
    assert!(!Error::Config("zero".into()).is_record_error());
  }

  #[test]
  fn test_display_includes_context() {
    let err = Error::LoadOverflow { shard_id: 7 };
    assert_eq!(err.to_string(), "Byte total overflow on shard 7");

    let err = Error::RecordTooLarge { capacity: 16 };
    assert!(err.to_string().contains("16 bytes"));
  }
}
