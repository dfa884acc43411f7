//! Chunked ingestion of newline-terminated, comma-delimited records.
//!
//! Input is read in blocks into a fixed-capacity buffer. After each read every
//! record up to the last newline is dispatched, and the unterminated tail is
//! moved to the front of the buffer to be completed by the next read. A record
//! that cannot fit in the buffer aborts ingestion with
//! [`Error::RecordTooLarge`].
//!
//! Record shapes:
//!
//! | Fields | Meaning |
//! |---|---|
//! | `request_id,_,object_id` | Read |
//! | `request_id,_,object_id,size,hash` | Write |

use crate::command::Request;
use crate::config::IngestOptions;
use crate::error::{Error, Result};
use crate::router::Router;
use std::io::{ErrorKind, Read};

/// Receiver of parsed requests.
pub trait Dispatch {
  fn dispatch(&mut self, request: Request) -> Result<()>;
}

fn route(router: &Router, request: Request) -> Result<()> {
  match request {
    Request::Write {
      request_id,
      object_id,
      size,
      hash,
    } => router.save(request_id, object_id, size, hash).map(|_| ()),
    Request::Read { request_id, object_id } => router.read(request_id, object_id).map(|_| ()),
  }
}

impl Dispatch for Router {
  fn dispatch(&mut self, request: Request) -> Result<()> {
    route(self, request)
  }
}

impl Dispatch for &Router {
  fn dispatch(&mut self, request: Request) -> Result<()> {
    route(*self, request)
  }
}

impl Dispatch for Vec<Request> {
  fn dispatch(&mut self, request: Request) -> Result<()> {
    self.push(request);
    Ok(())
  }
}

/// Parses one record (without its line terminator).
pub fn parse_record(line: &[u8]) -> Result<Request> {
  let text = std::str::from_utf8(line).map_err(|_| Error::MalformedRecord("record is not valid UTF-8".into()))?;
  let fields: Vec<&str> = text.split(',').collect();

  match fields.as_slice() {
    [request_id, _, object_id] => Ok(Request::Read {
      request_id: request_id.to_string(),
      object_id: object_id.to_string(),
    }),
    [request_id, _, object_id, size, hash] => {
      let size = size
        .trim()
        .parse::<u64>()
        .map_err(|e| Error::MalformedRecord(format!("invalid size {:?}: {}", size, e)))?;
      Ok(Request::Write {
        request_id: request_id.to_string(),
        object_id: object_id.to_string(),
        size,
        hash: hash.to_string(),
      })
    }
    other => Err(Error::MalformedRecord(format!(
      "expected 3 or 5 fields, got {}",
      other.len()
    ))),
  }
}

/// Counters accumulated over an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
  /// Non-blank lines seen.
  pub records: u64,
  pub writes: u64,
  pub reads: u64,
  /// Malformed records skipped.
  pub rejected: u64,
  /// Reads skipped because their object was never written.
  pub unknown_objects: u64,
  pub bytes_read: u64,
  /// Successful non-empty reads from the byte source.
  pub reads_issued: u64,
}

/// Reassembles records from a byte source and dispatches them.
pub struct Ingestor {
  options: IngestOptions,
  buffer: Vec<u8>,
  filled: usize,
  stats: IngestStats,
}

impl Ingestor {
  pub fn new(options: IngestOptions) -> Result<Self> {
    options.validate()?;
    Ok(Self {
      buffer: vec![0; options.buffer_size],
      filled: 0,
      stats: IngestStats::default(),
      options,
    })
  }

  /// Reads `reader` to the end, dispatching every record.
  ///
  /// A final record without a trailing newline is dispatched at end of input.
  ///
  /// # Errors
  ///
  /// Malformed records and reads of unknown objects are logged, counted and
  /// skipped. I/O errors, `RecordTooLarge` and any other dispatch error stop
  /// ingestion.
  pub fn run<R: Read, D: Dispatch + ?Sized>(&mut self, mut reader: R, dispatch: &mut D) -> Result<IngestStats> {
    let capacity = self.buffer.len();

    loop {
      if self.filled == capacity {
        // A full buffer with no newline is only acceptable if the record ends exactly here.
        match self.next_byte(&mut reader)? {
          None => break,
          Some(b'\n') => {
            accept_line(&mut self.stats, self.options.progress_interval, &self.buffer, dispatch)?;
            self.filled = 0;
            continue;
          }
          Some(_) => {
            tracing::error!(
              target: "ironshard::ingest",
              "Record starting after {} records does not fit in {} bytes",
              self.stats.records,
              capacity
            );
            return Err(Error::RecordTooLarge { capacity });
          }
        }
      }

      let n = match reader.read(&mut self.buffer[self.filled..]) {
        Ok(n) => n,
        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
        Err(e) => return Err(e.into()),
      };
      if n == 0 {
        break;
      }

      self.stats.bytes_read += n as u64;
      self.stats.reads_issued += 1;
      self.filled += n;

      let consumed = self.dispatch_complete(dispatch)?;
      self.buffer.copy_within(consumed..self.filled, 0);
      self.filled -= consumed;
    }

    if self.filled > 0 {
      let tail = &self.buffer[..self.filled];
      accept_line(&mut self.stats, self.options.progress_interval, tail, dispatch)?;
      self.filled = 0;
    }

    Ok(self.stats)
  }

  /// Reads a single byte past a full buffer. `None` means end of input.
  fn next_byte<R: Read>(&mut self, reader: &mut R) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
      match reader.read(&mut byte) {
        Ok(0) => return Ok(None),
        Ok(_) => {
          self.stats.bytes_read += 1;
          self.stats.reads_issued += 1;
          return Ok(Some(byte[0]));
        }
        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
        Err(e) => return Err(e.into()),
      }
    }
  }

  /// Dispatches every record up to the last newline in the buffer and
  /// returns the number of bytes consumed.
  fn dispatch_complete<D: Dispatch + ?Sized>(&mut self, dispatch: &mut D) -> Result<usize> {
    let window = &self.buffer[..self.filled];
    let Some(last_newline) = window.iter().rposition(|&b| b == b'\n') else {
      return Ok(0);
    };

    for line in window[..last_newline].split(|&b| b == b'\n') {
      accept_line(&mut self.stats, self.options.progress_interval, line, dispatch)?;
    }

    Ok(last_newline + 1)
  }

  pub fn stats(&self) -> IngestStats {
    self.stats
  }
}

fn accept_line<D: Dispatch + ?Sized>(
  stats: &mut IngestStats,
  progress_interval: u64,
  line: &[u8],
  dispatch: &mut D,
) -> Result<()> {
  let line = line.strip_suffix(b"\r").unwrap_or(line);
  if line.is_empty() {
    return Ok(());
  }
  stats.records += 1;

  let outcome = parse_record(line).and_then(|request| {
    let is_write = matches!(request, Request::Write { .. });
    dispatch.dispatch(request).map(|_| is_write)
  });

  match outcome {
    Ok(true) => stats.writes += 1,
    Ok(false) => stats.reads += 1,
    Err(Error::UnknownObject(object_id)) => {
      stats.unknown_objects += 1;
      tracing::warn!(
        target: "ironshard::ingest",
        "Record {}: read for unknown object {:?}",
        stats.records,
        object_id
      );
    }
    Err(e) if e.is_record_error() => {
      stats.rejected += 1;
      tracing::warn!(target: "ironshard::ingest", "Record {} rejected: {}", stats.records, e);
    }
    Err(e) => return Err(e),
  }

  if stats.records % progress_interval == 0 {
    tracing::info!(target: "ironshard::ingest", "Handled number = {}", stats.records);
  }

  Ok(())
}

/// Convenience wrapper: ingests `reader` with a fresh [`Ingestor`].
pub fn ingest<R: Read, D: Dispatch + ?Sized>(reader: R, options: IngestOptions, dispatch: &mut D) -> Result<IngestStats> {
  Ingestor::new(options)?.run(reader, dispatch)
}
