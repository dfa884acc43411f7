use std::collections::HashMap;

/// Private key/value storage of a single shard worker.
///
/// Owned by exactly one worker thread, so it carries no synchronization.
#[derive(Debug, Default)]
pub(crate) struct ShardStore {
  entries: HashMap<String, String>,
}

impl ShardStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Overwrites any previous value for `object_id`.
  pub fn put(&mut self, object_id: String, hash: String) {
    self.entries.insert(object_id, hash);
  }

  pub fn get(&self, object_id: &str) -> Option<&str> {
    self.entries.get(object_id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }
}
