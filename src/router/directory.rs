use crate::command::ShardId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Maps each placed object to the shard that received its latest write.
pub(crate) struct Directory {
  inner: RwLock<HashMap<String, ShardId>>,
}

impl Directory {
  pub fn new() -> Self {
    Self {
      inner: RwLock::new(HashMap::new()),
    }
  }

  /// Points `object_id` at `shard_id`, returning the previous owner.
  pub fn assign(&self, object_id: &str, shard_id: ShardId) -> Option<ShardId> {
    let mut map = self.inner.write();
    match map.get_mut(object_id) {
      Some(owner) => Some(std::mem::replace(owner, shard_id)),
      None => {
        map.insert(object_id.to_string(), shard_id);
        None
      }
    }
  }

  /// Puts back an owner returned by `assign`; `None` forgets the object.
  pub fn restore(&self, object_id: &str, owner: Option<ShardId>) {
    let mut map = self.inner.write();
    match owner {
      Some(shard_id) => {
        map.insert(object_id.to_string(), shard_id);
      }
      None => {
        map.remove(object_id);
      }
    }
  }

  pub fn lookup(&self, object_id: &str) -> Option<ShardId> {
    self.inner.read().get(object_id).copied()
  }

  pub fn len(&self) -> usize {
    self.inner.read().len()
  }
}
