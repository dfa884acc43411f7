//! Result aggregation.
//!
//! A single thread drains the shared result channel fed by every shard worker
//! and hands each result to a [`ResultSink`] in arrival order. Arrival order is
//! not input order: workers run concurrently and finish out of order.

use crate::command::ShardResult;
use crate::error::{Error, Result};
use flume::Receiver;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Message carried on the result channel.
#[derive(Debug)]
pub(crate) enum Emission {
  Result(ShardResult),
  /// Sent once, after every shard worker has been joined.
  Finished,
}

/// Destination of processed results.
pub trait ResultSink: Send + 'static {
  fn emit(&mut self, result: &ShardResult) -> io::Result<()>;

  /// Called once after the last result.
  fn finish(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl ResultSink for Box<dyn ResultSink> {
  fn emit(&mut self, result: &ShardResult) -> io::Result<()> {
    (**self).emit(result)
  }

  fn finish(&mut self) -> io::Result<()> {
    (**self).finish()
  }
}

/// Writes one `request_id,payload` line per result.
pub struct LineSink<W: Write> {
  writer: BufWriter<W>,
}

impl<W: Write> LineSink<W> {
  pub fn new(writer: W) -> Self {
    Self {
      writer: BufWriter::new(writer),
    }
  }

  /// Flushes and returns the underlying writer.
  pub fn into_inner(self) -> io::Result<W> {
    self.writer.into_inner().map_err(|e| e.into_error())
  }
}

impl<W: Write + Send + 'static> ResultSink for LineSink<W> {
  fn emit(&mut self, result: &ShardResult) -> io::Result<()> {
    writeln!(self.writer, "{}", result)
  }

  fn finish(&mut self) -> io::Result<()> {
    self.writer.flush()
  }
}

/// Collects results in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectSink {
  results: Arc<Mutex<Vec<ShardResult>>>,
}

impl CollectSink {
  pub fn new() -> Self {
    Self::default()
  }

  /// Results in the order the aggregator received them.
  pub fn results(&self) -> Vec<ShardResult> {
    self.results.lock().clone()
  }

  /// Results keyed by request id.
  pub fn by_request(&self) -> HashMap<String, ShardResult> {
    self
      .results
      .lock()
      .iter()
      .map(|r| (r.request_id.clone(), r.clone()))
      .collect()
  }

  pub fn len(&self) -> usize {
    self.results.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.results.lock().is_empty()
  }
}

impl ResultSink for CollectSink {
  fn emit(&mut self, result: &ShardResult) -> io::Result<()> {
    self.results.lock().push(result.clone());
    Ok(())
  }
}

/// Handle to the aggregator thread.
pub(crate) struct Aggregator {
  thread: JoinHandle<Result<u64>>,
}

impl Aggregator {
  pub fn spawn<S: ResultSink>(inbox: Receiver<Emission>, sink: S) -> Result<Self> {
    let thread = thread::Builder::new()
      .name("ironshard-aggregator".into())
      .spawn(move || drain(inbox, sink))?;
    Ok(Self { thread })
  }

  /// Waits for the aggregator to consume the finish signal.
  ///
  /// Returns the number of results handed to the sink.
  pub fn join(self) -> Result<u64> {
    match self.thread.join() {
      Ok(outcome) => outcome,
      Err(_) => {
        tracing::error!(target: "ironshard", "Result aggregator panicked");
        Err(Error::AggregatorPanicked)
      }
    }
  }
}

fn drain<S: ResultSink>(inbox: Receiver<Emission>, mut sink: S) -> Result<u64> {
  let mut emitted = 0u64;
  let mut failure: Option<io::Error> = None;

  loop {
    match inbox.recv() {
      Ok(Emission::Result(result)) => {
        // Keep draining after a sink failure so producers never back up.
        if failure.is_some() {
          continue;
        }
        match sink.emit(&result) {
          Ok(()) => emitted += 1,
          Err(e) => {
            tracing::error!(target: "ironshard", "Result sink failed after {} results: {}", emitted, e);
            failure = Some(e);
          }
        }
      }
      Ok(Emission::Finished) => break,
      Err(_) => {
        tracing::warn!(target: "ironshard", "Result channel closed without a finish signal");
        break;
      }
    }
  }

  if let Some(e) = failure {
    return Err(Error::Io(e));
  }
  sink.finish()?;
  Ok(emitted)
}
