//! Shard workers.
//!
//! Each shard is a dedicated thread that exclusively owns a [`store::ShardStore`]
//! and the receiving end of its command queue. The router only ever touches a
//! shard through its [`ShardHandle`].

mod store;
mod worker;

pub use worker::WorkerStats;
pub(crate) use worker::ShardHandle;
