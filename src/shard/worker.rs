use crate::aggregator::Emission;
use crate::command::{Command, Outcome, ShardId, ShardResult};
use crate::error::{Error, Result};
use crate::shard::store::ShardStore;
use flume::{Receiver, Sender};
use std::thread::{self, JoinHandle};

/// Counters reported by a worker when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
  pub shard_id: ShardId,
  pub writes: u64,
  pub reads: u64,
  /// Reads that found no entry in the shard's store.
  pub misses: u64,
  /// Distinct keys held when the worker stopped.
  pub keys: usize,
}

/// The body of a shard thread: owns the store and the receiving end of the
/// shard's command queue.
struct ShardWorker {
  shard_id: ShardId,
  store: ShardStore,
  inbox: Receiver<Command>,
  results: Sender<Emission>,
  stats: WorkerStats,
}

impl ShardWorker {
  fn new(shard_id: ShardId, inbox: Receiver<Command>, results: Sender<Emission>) -> Self {
    Self {
      shard_id,
      store: ShardStore::new(),
      inbox,
      results,
      stats: WorkerStats {
        shard_id,
        ..Default::default()
      },
    }
  }

  /// Consumes commands in FIFO order until `Shutdown`.
  fn run(mut self) -> WorkerStats {
    tracing::debug!(target: "ironshard::shard", "Shard {} started", self.shard_id);

    loop {
      let command = match self.inbox.recv() {
        Ok(command) => command,
        Err(_) => {
          tracing::warn!(
            target: "ironshard::shard",
            "Shard {} queue disconnected without a shutdown command",
            self.shard_id
          );
          break;
        }
      };

      let Some(result) = self.apply(command) else {
        break;
      };

      if self.results.send(Emission::Result(result)).is_err() {
        tracing::warn!(target: "ironshard::shard", "Shard {} lost its result channel", self.shard_id);
        break;
      }
    }

    self.stats.keys = self.store.len();
    tracing::debug!(target: "ironshard::shard", "Shard {} stopped: {:?}", self.shard_id, self.stats);
    self.stats
  }

  /// Applies one command to the store. Returns `None` for `Shutdown`.
  fn apply(&mut self, command: Command) -> Option<ShardResult> {
    match command {
      Command::Write {
        request_id,
        object_id,
        hash,
        ..
      } => {
        self.store.put(object_id, hash);
        self.stats.writes += 1;
        Some(ShardResult {
          request_id,
          shard_id: self.shard_id,
          outcome: Outcome::Stored,
        })
      }
      Command::Read { request_id, object_id } => {
        self.stats.reads += 1;
        let outcome = match self.store.get(&object_id) {
          Some(value) => Outcome::Found(value.to_string()),
          None => {
            self.stats.misses += 1;
            Outcome::Missing
          }
        };
        Some(ShardResult {
          request_id,
          shard_id: self.shard_id,
          outcome,
        })
      }
      Command::Shutdown => None,
    }
  }
}

/// Router-side handle of a running shard: the sending end of its queue and
/// its join handle.
pub(crate) struct ShardHandle {
  shard_id: ShardId,
  queue: Sender<Command>,
  thread: Option<JoinHandle<WorkerStats>>,
}

impl ShardHandle {
  /// Spawns a worker thread that owns a fresh store and queue.
  pub fn spawn(shard_id: ShardId, results: Sender<Emission>) -> Result<Self> {
    let (queue, inbox) = flume::unbounded();
    let worker = ShardWorker::new(shard_id, inbox, results);

    let thread = thread::Builder::new()
      .name(format!("ironshard-shard-{:02}", shard_id))
      .spawn(move || worker.run())?;

    Ok(Self::from_parts(shard_id, queue, thread))
  }

  fn from_parts(shard_id: ShardId, queue: Sender<Command>, thread: JoinHandle<WorkerStats>) -> Self {
    Self {
      shard_id,
      queue,
      thread: Some(thread),
    }
  }

  pub fn shard_id(&self) -> ShardId {
    self.shard_id
  }

  /// Enqueues a command. Fails if the worker is gone.
  pub fn send(&self, command: Command) -> Result<()> {
    self
      .queue
      .send(command)
      .map_err(|_| Error::ShardUnavailable(self.shard_id))
  }

  /// Enqueues the shutdown sentinel. Nothing may be sent afterwards.
  pub fn stop(&self) -> Result<()> {
    self.send(Command::Shutdown)
  }

  /// Commands enqueued but not yet taken by the worker.
  pub fn pending(&self) -> usize {
    self.queue.len()
  }

  /// Blocks until the worker exits.
  ///
  /// A worker that never receives `Shutdown` blocks here indefinitely.
  pub fn join(&mut self) -> Result<WorkerStats> {
    let Some(thread) = self.thread.take() else {
      return Err(Error::ShardUnavailable(self.shard_id));
    };

    thread.join().map_err(|_| {
      tracing::error!(target: "ironshard::shard", "Shard {} worker panicked", self.shard_id);
      Error::WorkerPanicked(self.shard_id)
    })
  }
}
