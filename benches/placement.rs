//! Placement throughput benchmarks

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ironshard::{CollectSink, Router, RouterOptions};
use rand::Rng;
use std::sync::{Arc, Barrier};
use std::thread;

fn bench_single_thread_saves(c: &mut Criterion) {
  let mut group = c.benchmark_group("Router/Save/SingleThread");
  let ops = 10_000u64;
  group.throughput(Throughput::Elements(ops));

  for shard_count in [1u16, 4, 16, 64].iter() {
    group.bench_with_input(BenchmarkId::new("shards", shard_count), shard_count, |b, &sc| {
      let mut rng = rand::rng();
      let sizes: Vec<u64> = (0..ops).map(|_| rng.random_range(1..4096)).collect();

      b.iter_batched(
        || Router::new(RouterOptions::new(sc), CollectSink::new()).unwrap(),
        |router| {
          for (i, size) in sizes.iter().enumerate() {
            router.save(format!("r{}", i), format!("k{}", i), *size, "hash").unwrap();
          }
          router.shutdown().unwrap();
        },
        criterion::BatchSize::SmallInput,
      )
    });
  }

  group.finish();
}

fn bench_concurrent_saves(c: &mut Criterion) {
  let mut group = c.benchmark_group("Router/Save/Concurrent");
  group.sample_size(20); // Threads are expensive

  for thread_count in [1usize, 4, 8].iter() {
    group.throughput(Throughput::Elements(*thread_count as u64 * 1000));

    group.bench_with_input(BenchmarkId::new("threads", thread_count), thread_count, |b, &tc| {
      b.iter_batched(
        || Arc::new(Router::new(RouterOptions::new(16), CollectSink::new()).unwrap()),
        |router| {
          let barrier = Arc::new(Barrier::new(tc));
          let mut handles = vec![];

          for thread_id in 0..tc {
            let router = router.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
              barrier.wait();
              for i in 0..1000u64 {
                let key = format!("t{}_k{}", thread_id, i);
                router.save(key.clone(), key, 128 + i % 512, "hash").unwrap();
              }
            }));
          }

          for h in handles {
            h.join().unwrap();
          }
        },
        criterion::BatchSize::SmallInput,
      )
    });
  }

  group.finish();
}

criterion_group!(benches, bench_single_thread_saves, bench_concurrent_saves);
criterion_main!(benches);
