//! Offline verification of router output against its input.
//!
//! The expected value of every Read is the hash of the most recent Write to
//! the same object earlier in the input. Output order is irrelevant; lines are
//! matched by request id.

use crate::command::{Request, ShardId};
use crate::error::Result;
use crate::ingest::parse_record;
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;

/// A single disagreement between input and output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
  WrongValue {
    request_id: String,
    expected: String,
    actual: String,
  },
  /// A Write result whose payload is not a shard id.
  InvalidShard { request_id: String, payload: String },
  UnknownRequest { request_id: String },
  MalformedLine { line: String },
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
  /// Input records that should produce an output line.
  pub input_count: u64,
  pub output_count: u64,
  pub mismatches: Vec<Mismatch>,
  /// Bytes absorbed per shard according to the output.
  pub shard_bytes: BTreeMap<ShardId, u64>,
}

impl CheckReport {
  pub fn is_clean(&self) -> bool {
    self.mismatches.is_empty() && self.input_count == self.output_count
  }

  /// The `n` shards with the most bytes, heaviest first.
  pub fn heaviest(&self, n: usize) -> Vec<(ShardId, u64)> {
    let mut shards: Vec<(ShardId, u64)> = self.shard_bytes.iter().map(|(&id, &bytes)| (id, bytes)).collect();
    shards.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    shards.truncate(n);
    shards
  }
}

/// What the output of a given input should contain.
#[derive(Debug, Default)]
pub struct Expectations {
  reads: HashMap<String, String>,
  writes: HashMap<String, u64>,
  input_count: u64,
}

impl Expectations {
  /// Replays an input stream.
  ///
  /// Malformed records and reads of never-written objects are skipped, as the
  /// ingestion pipeline skips them.
  pub fn load<R: BufRead>(input: R) -> Result<Self> {
    let mut expectations = Self::default();
    let mut latest: HashMap<String, String> = HashMap::new();

    for line in input.split(b'\n') {
      let line = line?;
      let line = line.strip_suffix(b"\r").unwrap_or(&line);
      if line.is_empty() {
        continue;
      }

      match parse_record(line) {
        Ok(Request::Write {
          request_id,
          object_id,
          size,
          hash,
        }) => {
          expectations.writes.insert(request_id, size);
          latest.insert(object_id, hash);
          expectations.input_count += 1;
        }
        Ok(Request::Read { request_id, object_id }) => {
          if let Some(hash) = latest.get(&object_id) {
            expectations.reads.insert(request_id, hash.clone());
            expectations.input_count += 1;
          }
        }
        Err(_) => continue,
      }
    }

    Ok(expectations)
  }

  pub fn input_count(&self) -> u64 {
    self.input_count
  }

  /// Compares an output stream of `request_id,payload` lines.
  pub fn check<R: BufRead>(&self, output: R) -> Result<CheckReport> {
    let mut report = CheckReport {
      input_count: self.input_count,
      ..Default::default()
    };

    for line in output.lines() {
      let line = line?;
      let line = line.trim_end_matches('\r');
      if line.is_empty() {
        continue;
      }
      report.output_count += 1;

      let Some((request_id, payload)) = line.split_once(',') else {
        report.mismatches.push(Mismatch::MalformedLine { line: line.to_string() });
        continue;
      };

      if let Some(expected) = self.reads.get(request_id) {
        if expected != payload {
          report.mismatches.push(Mismatch::WrongValue {
            request_id: request_id.to_string(),
            expected: expected.clone(),
            actual: payload.to_string(),
          });
        }
      } else if let Some(&size) = self.writes.get(request_id) {
        match payload.parse::<ShardId>() {
          Ok(shard_id) => *report.shard_bytes.entry(shard_id).or_default() += size,
          Err(_) => report.mismatches.push(Mismatch::InvalidShard {
            request_id: request_id.to_string(),
            payload: payload.to_string(),
          }),
        }
      } else {
        report.mismatches.push(Mismatch::UnknownRequest {
          request_id: request_id.to_string(),
        });
      }
    }

    Ok(report)
  }
}
