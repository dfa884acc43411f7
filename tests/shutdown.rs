//! Shutdown protocol tests

mod common;
use common::TestEnv;
use ironshard::{CollectSink, Router, RouterOptions};
use std::collections::HashSet;

#[test]
fn test_all_results_drained_before_aggregator_exits() {
  let env = TestEnv::with_shards(4);
  let total = 10_000;

  for i in 0..total {
    let key = format!("k{}", i % 500);
    env.router.save(format!("w{}", i), key.clone(), 16, format!("h{}", i)).unwrap();
    if i % 3 == 0 {
      env.router.read(format!("r{}", i), key).unwrap();
    }
  }
  let reads = (0..total).filter(|i| i % 3 == 0).count();

  let (report, results) = env.finish();

  assert_eq!(results.len(), total + reads);
  assert_eq!(report.results_emitted as usize, total + reads);

  let writes: u64 = report.workers.iter().map(|w| w.writes).sum();
  let worker_reads: u64 = report.workers.iter().map(|w| w.reads).sum();
  assert_eq!(writes as usize, total);
  assert_eq!(worker_reads as usize, reads);
}

#[test]
fn test_every_worker_reports_once() {
  let env = TestEnv::with_shards(6);
  let (report, _) = env.finish();

  let ids: HashSet<_> = report.workers.iter().map(|w| w.shard_id).collect();
  assert_eq!(ids.len(), 6);
  assert_eq!(report.loads.len(), 6);
  assert_eq!(report.results_emitted, 0);
}

#[test]
fn test_idle_router_shuts_down() {
  let sink = CollectSink::new();
  let router = Router::new(RouterOptions::new(1), sink.clone()).unwrap();
  let report = router.shutdown().unwrap();

  assert_eq!(report.workers.len(), 1);
  assert!(sink.is_empty());
}

#[test]
fn test_drop_runs_shutdown_protocol() {
  let sink = CollectSink::new();
  {
    let router = Router::new(RouterOptions::new(3), sink.clone()).unwrap();
    for i in 0..300 {
      router.save(format!("w{}", i), format!("k{}", i), 1, "h").unwrap();
    }
  }

  assert_eq!(sink.len(), 300);
}

#[test]
fn test_repeated_pools() {
  // Threads from earlier pools must not leak into later ones.
  for round in 0..20 {
    let env = TestEnv::with_shards(8);
    for i in 0..50 {
      env.router.save(format!("w{}", i), format!("k{}", i), round, "h").unwrap();
    }
    let (report, results) = env.finish();
    assert_eq!(results.len(), 50);
    assert_eq!(report.total_bytes(), 50 * round);
  }
}
