use ironshard::{CollectSink, Router, RouterOptions, RouterReport, ShardResult};
use std::collections::HashMap;

pub struct TestEnv {
  pub router: Router,
  // Shares the aggregator's buffer; read it only after shutdown.
  pub sink: CollectSink,
}

impl TestEnv {
  pub fn new(options: RouterOptions) -> Self {
    let sink = CollectSink::new();
    let router = Router::new(options, sink.clone()).unwrap();
    Self { router, sink }
  }

  pub fn with_shards(shard_count: u16) -> Self {
    Self::new(RouterOptions::new(shard_count))
  }

  /// Shuts the router down and returns results keyed by request id.
  pub fn finish(self) -> (RouterReport, HashMap<String, ShardResult>) {
    let report = self.router.shutdown().unwrap();
    (report, self.sink.by_request())
  }
}
